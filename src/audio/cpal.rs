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
use tracing::{debug, error, span, Level};

use crate::sample::Playable;

/// How long to keep a render stream alive past the end of its payload, so
/// the device has drained its buffers before the stream is dropped.
const DRAIN_PAD: Duration = Duration::from_millis(50);

/// A small wrapper around a cpal output device. One short-lived output
/// stream is opened per rendered payload.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The underlying cpal device.
    device: cpal::Device,
    /// The device's preferred output configuration.
    channels: u16,
    sample_rate: u32,
}

impl Device {
    /// Lists the names of the available output devices.
    pub fn list() -> Result<Vec<String>, Box<dyn Error>> {
        let host = cpal::default_host();
        let mut names = Vec::new();
        for device in host.output_devices()? {
            names.push(device.name()?);
        }
        Ok(names)
    }

    /// Gets the output device with the given name. The name `default`
    /// selects the host's default output device.
    pub fn get(name: &str) -> Result<Device, Box<dyn Error>> {
        let host = cpal::default_host();
        let device = if name == "default" {
            host.default_output_device()
                .ok_or("no default output device")?
        } else {
            host.output_devices()?
                .find(|device| device.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| format!("no output device named {}", name))?
        };

        let config = device.default_output_config()?;
        Ok(Device {
            name: device.name()?,
            channels: config.channels(),
            sample_rate: config.sample_rate().0,
            device,
        })
    }
}

impl crate::audio::Device for Device {
    /// Renders the payload on its own thread: opens an output stream, lets
    /// it run for the payload duration, and drops it.
    fn render(&self, playable: &Playable) -> Result<(), Box<dyn Error>> {
        let data = playable.data();
        let payload_channels = playable.channel_count() as usize;
        let duration = playable.duration();
        let device = self.device.clone();
        let channels = self.channels;
        let sample_rate = self.sample_rate;

        debug!(
            device = self.name,
            frames = playable.frames(),
            duration_ms = duration.as_millis() as u64,
            "Rendering payload."
        );

        thread::spawn(move || {
            let span = span!(Level::DEBUG, "render");
            let _enter = span.enter();

            let config = cpal::StreamConfig {
                channels,
                sample_rate: cpal::SampleRate(sample_rate),
                buffer_size: cpal::BufferSize::Default,
            };

            let out_channels = channels as usize;
            let mut frame = 0usize;
            let total_frames = data.len() / payload_channels;
            let result = device.build_output_stream(
                &config,
                move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for out_frame in out.chunks_mut(out_channels) {
                        for (channel, value) in out_frame.iter_mut().enumerate() {
                            *value = if frame < total_frames {
                                // Payloads with fewer channels than the
                                // device repeat their last channel.
                                let payload_channel = channel.min(payload_channels - 1);
                                data[frame * payload_channels + payload_channel]
                            } else {
                                0.0
                            };
                        }
                        frame += 1;
                    }
                },
                |e| error!(err = %e, "Output stream error."),
                None,
            );

            match result {
                Ok(stream) => {
                    if let Err(e) = stream.play() {
                        error!(err = %e, "Unable to start output stream.");
                        return;
                    }
                    thread::sleep(duration + DRAIN_PAD);
                }
                Err(e) => error!(err = %e, "Unable to build output stream."),
            }
        });

        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<crate::audio::mock::Device>, Box<dyn Error>> {
        Err("not a mock device".into())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels: {}, Sample Rate: {})",
            self.name, self.channels, self.sample_rate
        )
    }
}
