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
use std::{error::Error, fmt, sync::Arc, thread, time::Duration};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use tracing::{info, span, warn, Level};

use super::{CaptureError, Clip};

/// A capture device backed by a cpal input device. The device is resolved
/// on every capture so a microphone that shows up late (or goes away) is
/// handled per attempt.
pub struct Device {
    /// The name of the device. `default` selects the host's default input.
    name: String,
}

impl Device {
    /// Lists the names of the available input devices.
    pub fn list() -> Result<Vec<String>, Box<dyn Error>> {
        let host = cpal::default_host();
        let mut names = Vec::new();
        for device in host.input_devices()? {
            names.push(device.name()?);
        }
        Ok(names)
    }

    /// Gets the capture device with the given name.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
        }
    }

    fn resolve(&self) -> Result<cpal::Device, CaptureError> {
        let host = cpal::default_host();
        if self.name == "default" {
            return host
                .default_input_device()
                .ok_or_else(|| CaptureError::Unavailable("no default input device".to_string()));
        }

        host.input_devices()
            .map_err(|e| CaptureError::Unavailable(e.to_string()))?
            .find(|device| device.name().map(|n| n == self.name).unwrap_or(false))
            .ok_or_else(|| {
                CaptureError::Unavailable(format!("no input device named {}", self.name))
            })
    }
}

impl super::Device for Device {
    /// Opens an input stream, accumulates samples for the capture window,
    /// then encodes the take as a WAV clip.
    fn capture(&self, window: Duration) -> Result<Clip, CaptureError> {
        let span = span!(Level::INFO, "capture");
        let _enter = span.enter();

        let device = self.resolve()?;
        let config = device
            .default_input_config()
            .map_err(|e| CaptureError::Unavailable(e.to_string()))?;
        let channels = config.channels();
        let sample_rate = config.sample_rate().0;

        info!(
            device = self.name,
            channels,
            sample_rate,
            window_ms = window.as_millis() as u64,
            "Recording."
        );

        let take: Arc<Mutex<Vec<f32>>> = Arc::new(Mutex::new(Vec::with_capacity(
            (window.as_secs_f64() * sample_rate as f64) as usize * channels as usize,
        )));
        let err_fn = |e| warn!(err = %e, "Input stream error.");

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                let take = take.clone();
                device.build_input_stream(
                    &config.into(),
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        take.lock().extend_from_slice(data);
                    },
                    err_fn,
                    None,
                )
            }
            cpal::SampleFormat::I16 => {
                let take = take.clone();
                device.build_input_stream(
                    &config.into(),
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        take.lock()
                            .extend(data.iter().map(|s| *s as f32 / i16::MAX as f32));
                    },
                    err_fn,
                    None,
                )
            }
            cpal::SampleFormat::U16 => {
                let take = take.clone();
                device.build_input_stream(
                    &config.into(),
                    move |data: &[u16], _: &cpal::InputCallbackInfo| {
                        take.lock().extend(
                            data.iter()
                                .map(|s| (*s as f32 / u16::MAX as f32) * 2.0 - 1.0),
                        );
                    },
                    err_fn,
                    None,
                )
            }
            format => {
                return Err(CaptureError::Unavailable(format!(
                    "unsupported input sample format {}",
                    format
                )))
            }
        }
        .map_err(|e| CaptureError::Unavailable(e.to_string()))?;

        stream
            .play()
            .map_err(|e| CaptureError::Failed(e.to_string()))?;
        thread::sleep(window);
        drop(stream);

        let samples = std::mem::take(&mut *take.lock());
        if samples.is_empty() {
            return Err(CaptureError::Failed(
                "capture window produced no samples".to_string(),
            ));
        }

        info!(samples = samples.len(), "Recording finished.");
        super::encode_wav(&samples, channels, sample_rate).map(Clip::new)
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<crate::capture::mock::Device>, Box<dyn Error>> {
        Err("not a mock device".into())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Input)", self.name)
    }
}
