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
use std::{
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use tracing::info;

use super::{CaptureError, Clip};

/// Sample rate of synthesized mock clips. Kept low so tests stay cheap.
const MOCK_SAMPLE_RATE: u32 = 8000;

/// A mock capture device. Synthesizes a sine clip instead of recording,
/// and can be told to fail to exercise the capture error path.
#[derive(Clone)]
pub struct Device {
    name: String,
    fail: Arc<AtomicBool>,
    captures: Arc<AtomicUsize>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            fail: Arc::new(AtomicBool::new(false)),
            captures: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Makes every subsequent capture fail with an unavailable error.
    #[cfg(test)]
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }

    /// Returns the number of successful captures.
    #[cfg(test)]
    pub fn capture_count(&self) -> usize {
        self.captures.load(Ordering::Relaxed)
    }
}

impl super::Device for Device {
    fn capture(&self, window: Duration) -> Result<Clip, CaptureError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(CaptureError::Unavailable(
                "mock capture device is failing".to_string(),
            ));
        }

        // A 440Hz mono sine spanning the capture window.
        let frames = (window.as_secs_f64() * MOCK_SAMPLE_RATE as f64) as usize;
        let samples: Vec<f32> = (0..frames)
            .map(|i| {
                (2.0 * std::f32::consts::PI * 440.0 * i as f32 / MOCK_SAMPLE_RATE as f32).sin()
            })
            .collect();

        let clip = super::encode_wav(&samples, 1, MOCK_SAMPLE_RATE).map(Clip::new)?;
        self.captures.fetch_add(1, Ordering::Relaxed);
        info!(device = self.name, frames, "Recording finished (mock).");
        Ok(clip)
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
