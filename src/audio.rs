// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{error::Error, fmt, sync::Arc};

use crate::sample::Playable;

pub mod cpal;
pub mod mock;

pub trait Device: fmt::Display + Send + Sync {
    /// Renders the decoded payload to the output device, fire and forget.
    /// Rendering never consumes the payload; samples are only released by
    /// the store.
    fn render(&self, playable: &Playable) -> Result<(), Box<dyn Error>>;

    /// The device's preferred output sample rate. Decoded payloads are
    /// produced at this rate.
    fn sample_rate(&self) -> u32;

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<mock::Device>, Box<dyn Error>>;
}

/// Lists output devices known to cpal.
pub fn list_devices() -> Result<Vec<String>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets an output device with the given name.
pub fn get_device(name: &str) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    if name.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(name)));
    };

    Ok(Arc::new(cpal::Device::get(name)?))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_get_device_dispatches_mock_prefix() -> Result<(), Box<dyn Error>> {
        let device = get_device("mock-out")?;
        let mock = device.to_mock()?;

        device.render(&Playable::new(vec![0.0; 128], 2, 44_100))?;
        device.render(&Playable::new(vec![0.0; 32], 1, 44_100))?;
        assert_eq!(2, mock.render_count());
        assert_eq!(vec![64, 32], mock.rendered_frames());
        assert_eq!(44_100, device.sample_rate());
        Ok(())
    }
}
