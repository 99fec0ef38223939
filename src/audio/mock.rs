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

use parking_lot::Mutex;
use tracing::debug;

use crate::sample::Playable;

/// A mock output device. Doesn't actually render anything; it records the
/// frame count of every payload handed to it.
#[derive(Clone)]
pub struct Device {
    name: String,
    renders: Arc<Mutex<Vec<usize>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            renders: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns the number of payloads rendered so far.
    #[cfg(test)]
    pub fn render_count(&self) -> usize {
        self.renders.lock().len()
    }

    /// Returns the frame counts of all rendered payloads, in order.
    #[cfg(test)]
    pub fn rendered_frames(&self) -> Vec<usize> {
        self.renders.lock().clone()
    }
}

impl crate::audio::Device for Device {
    fn render(&self, playable: &Playable) -> Result<(), Box<dyn Error>> {
        debug!(
            device = self.name,
            frames = playable.frames(),
            "Rendering payload (mock)."
        );
        self.renders.lock().push(playable.frames());
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        44_100
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<Device>, Box<dyn Error>> {
        Ok(Arc::new(self.clone()))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
