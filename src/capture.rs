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

//! Microphone capture devices. A capture produces a WAV-encoded clip that
//! the decoder turns into a playable payload.

use std::{error::Error, fmt, io, sync::Arc, time::Duration};

pub mod cpal;
pub mod mock;

/// The capture window used when the config doesn't specify one. Two seconds
/// makes beat-sized clips.
pub const DEFAULT_CAPTURE_WINDOW: Duration = Duration::from_secs(2);

/// An audio clip as captured from the input device: WAV-encoded bytes.
pub struct Clip {
    bytes: Vec<u8>,
}

impl Clip {
    pub fn new(bytes: Vec<u8>) -> Clip {
        Clip { bytes }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Capture failures are recoverable: the attempt is abandoned and no state
/// changes anywhere else.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// The input device is missing, denied, or cannot be opened.
    #[error("capture device unavailable: {0}")]
    Unavailable(String),
    /// The capture failed after the device was opened.
    #[error("capture failed: {0}")]
    Failed(String),
}

pub trait Device: fmt::Display + Send + Sync {
    /// Captures audio from the input device for the given window and
    /// returns the encoded clip.
    fn capture(&self, window: Duration) -> Result<Clip, CaptureError>;

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<mock::Device>, Box<dyn Error>>;
}

/// Lists input devices known to cpal.
pub fn list_devices() -> Result<Vec<String>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets a capture device with the given name.
pub fn get_device(name: &str) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    if name.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(name)));
    };

    Ok(Arc::new(cpal::Device::get(name)))
}

/// Encodes captured f32 samples as an in-memory WAV file.
pub(crate) fn encode_wav(
    samples: &[f32],
    channels: u16,
    sample_rate: u32,
) -> Result<Vec<u8>, CaptureError> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut cursor = io::Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec)
        .map_err(|e| CaptureError::Failed(e.to_string()))?;
    for sample in samples {
        writer
            .write_sample(*sample)
            .map_err(|e| CaptureError::Failed(e.to_string()))?;
    }
    writer
        .finalize()
        .map_err(|e| CaptureError::Failed(e.to_string()))?;

    Ok(cursor.into_inner())
}
