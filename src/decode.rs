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

//! Decoding captured clips into playable payloads.
//!
//! Clips are decoded entirely into memory so loop playback never touches
//! the codec again, and resampled to the output device's rate when needed.

use std::io;

use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, info};

use crate::capture::Clip;
use crate::sample::Playable;

/// Typed error for clip decode failures. Send + Sync so decodes can run on
/// blocking tasks.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unsupported clip: {0}")]
    Unsupported(String),
    #[error("audio decode error: {0}")]
    Audio(#[from] SymphoniaError),
}

/// Decodes captured clips into interleaved f32 payloads at a fixed target
/// sample rate.
pub struct Decoder {
    /// The output device's sample rate; payloads are resampled to it.
    target_sample_rate: u32,
}

impl Decoder {
    /// Creates a new decoder targeting the given sample rate.
    pub fn new(target_sample_rate: u32) -> Decoder {
        Decoder { target_sample_rate }
    }

    /// Decodes a captured clip into a playable payload.
    pub fn decode(&self, clip: &Clip) -> Result<Playable, DecodeError> {
        let mss = MediaSourceStream::new(
            Box::new(io::Cursor::new(clip.bytes().to_vec())),
            Default::default(),
        );

        // Captures are WAV-encoded, so hint the probe accordingly.
        let mut hint = Hint::new();
        hint.with_extension("wav");

        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts: FormatOptions = Default::default();
        let probed = get_probe().format(&hint, mss, &fmt_opts, &meta_opts)?;
        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| DecodeError::Unsupported("no audio track in clip".to_string()))?;
        let track_id = track.id;
        let params = &track.codec_params;

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| DecodeError::Unsupported("sample rate not specified".to_string()))?;
        let channel_count = params
            .channels
            .map(|c| c.count() as u16)
            .filter(|c| *c > 0)
            .ok_or_else(|| DecodeError::Unsupported("channels not specified".to_string()))?;

        let decoder_opts: DecoderOptions = Default::default();
        let mut decoder = get_codecs().make(params, &decoder_opts)?;

        // Decode every packet of our track into one interleaved buffer.
        let mut samples: Vec<f32> = Vec::new();
        loop {
            let packet = match format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break
                }
                // Some decoders return DecodeError at EOF instead of IoError.
                Err(SymphoniaError::DecodeError(_)) => break,
                Err(e) => return Err(e.into()),
            };
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    decoder.decode(&packet)?
                }
                Err(e) => return Err(e.into()),
            };
            Self::interleave(decoded, &mut samples);
        }

        if samples.is_empty() {
            return Err(DecodeError::Unsupported(
                "clip decoded to no samples".to_string(),
            ));
        }

        let (samples, sample_rate) = if sample_rate != self.target_sample_rate {
            debug!(
                source_rate = sample_rate,
                target_rate = self.target_sample_rate,
                "Resampling clip."
            );
            (
                Self::resample_linear(&samples, channel_count, sample_rate, self.target_sample_rate),
                self.target_sample_rate,
            )
        } else {
            (samples, sample_rate)
        };

        let playable = Playable::new(samples, channel_count, sample_rate);
        info!(
            channels = channel_count,
            sample_rate,
            duration_ms = playable.duration().as_millis() as u64,
            memory_kb = playable.memory_size() / 1024,
            "Clip decoded."
        );
        Ok(playable)
    }

    /// Appends a decoded buffer's planar samples to `out` in interleaved
    /// order, scaling integer formats to [-1.0, 1.0].
    fn interleave(decoded: AudioBufferRef, out: &mut Vec<f32>) {
        match decoded {
            AudioBufferRef::F32(buf) => Self::interleave_planar(&buf, out, |s| s),
            AudioBufferRef::F64(buf) => Self::interleave_planar(&buf, out, |s| s as f32),
            AudioBufferRef::S8(buf) => {
                Self::interleave_planar(&buf, out, |s| s as f32 / (1i64 << 7) as f32)
            }
            AudioBufferRef::S16(buf) => {
                Self::interleave_planar(&buf, out, |s| s as f32 / (1i64 << 15) as f32)
            }
            AudioBufferRef::S24(buf) => {
                Self::interleave_planar(&buf, out, |s| s.inner() as f32 / (1i64 << 23) as f32)
            }
            AudioBufferRef::S32(buf) => {
                Self::interleave_planar(&buf, out, |s| s as f32 / (1i64 << 31) as f32)
            }
            AudioBufferRef::U8(buf) => {
                Self::interleave_planar(&buf, out, |s| (s as f32 / u8::MAX as f32) * 2.0 - 1.0)
            }
            AudioBufferRef::U16(buf) => {
                Self::interleave_planar(&buf, out, |s| (s as f32 / u16::MAX as f32) * 2.0 - 1.0)
            }
            AudioBufferRef::U24(buf) => Self::interleave_planar(&buf, out, |s| {
                (s.inner() as f32 / ((1u32 << 24) - 1) as f32) * 2.0 - 1.0
            }),
            AudioBufferRef::U32(buf) => {
                Self::interleave_planar(&buf, out, |s| (s as f32 / u32::MAX as f32) * 2.0 - 1.0)
            }
        }
    }

    fn interleave_planar<T, F>(buf: &AudioBuffer<T>, out: &mut Vec<f32>, convert: F)
    where
        T: symphonia::core::sample::Sample,
        F: Fn(T) -> f32,
    {
        let frames = buf.frames();
        let channels = buf.spec().channels.count();
        let planes = buf.planes();
        out.reserve(frames * channels);
        for frame_idx in 0..frames {
            for ch_idx in 0..channels {
                out.push(convert(planes.planes()[ch_idx][frame_idx]));
            }
        }
    }

    /// Resamples interleaved samples with linear interpolation. Plenty for
    /// two-second one-shots; the loop never needs transparent quality.
    fn resample_linear(
        samples: &[f32],
        channel_count: u16,
        source_rate: u32,
        target_rate: u32,
    ) -> Vec<f32> {
        let ratio = target_rate as f64 / source_rate as f64;
        let channels = channel_count as usize;
        let source_frames = samples.len() / channels;
        let target_frames = (source_frames as f64 * ratio).ceil() as usize;

        let mut output = Vec::with_capacity(target_frames * channels);
        for target_frame in 0..target_frames {
            let source_pos = target_frame as f64 / ratio;
            let source_frame = source_pos.floor() as usize;
            let frac = source_pos.fract() as f32;

            for channel in 0..channels {
                let idx0 = source_frame * channels + channel;
                let idx1 = (source_frame + 1) * channels + channel;

                let s0 = samples.get(idx0).copied().unwrap_or(0.0);
                let s1 = samples.get(idx1).copied().unwrap_or(s0);
                output.push(s0 + (s1 - s0) * frac);
            }
        }

        output
    }
}

#[cfg(test)]
mod test {
    use crate::capture::{encode_wav, Clip};

    use super::*;

    fn sine_clip(frames: usize, channels: u16, sample_rate: u32) -> Clip {
        let samples: Vec<f32> = (0..frames * channels as usize)
            .map(|i| (2.0 * std::f32::consts::PI * 220.0 * i as f32 / sample_rate as f32).sin())
            .collect();
        Clip::new(encode_wav(&samples, channels, sample_rate).expect("encode should succeed"))
    }

    #[test]
    fn test_decode_wav_clip() {
        let decoder = Decoder::new(8000);
        let playable = decoder
            .decode(&sine_clip(4000, 1, 8000))
            .expect("decode should succeed");

        assert_eq!(1, playable.channel_count());
        assert_eq!(8000, playable.sample_rate());
        assert_eq!(4000, playable.frames());
        assert!((playable.duration().as_secs_f64() - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_decode_resamples_to_target_rate() {
        let decoder = Decoder::new(48_000);
        let playable = decoder
            .decode(&sine_clip(4410, 1, 44_100))
            .expect("decode should succeed");

        assert_eq!(48_000, playable.sample_rate());
        let expected = (4410.0_f64 * 48_000.0 / 44_100.0).ceil() as usize;
        assert_eq!(expected, playable.frames());
    }

    #[test]
    fn test_decode_stereo_preserves_channels() {
        let decoder = Decoder::new(8000);
        let playable = decoder
            .decode(&sine_clip(1000, 2, 8000))
            .expect("decode should succeed");

        assert_eq!(2, playable.channel_count());
        assert_eq!(1000, playable.frames());
    }

    #[test]
    fn test_decode_garbage_fails() {
        let decoder = Decoder::new(8000);
        assert!(decoder.decode(&Clip::new(vec![0u8; 64])).is_err());
    }

    #[test]
    fn test_resample_linear_stereo_preserves_channel_identity() {
        // L=1.0, R=-1.0 throughout; interpolation must never mix channels.
        let samples = vec![1.0f32, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0];
        let output = Decoder::resample_linear(&samples, 2, 44_100, 48_000);

        assert!(output.len() >= samples.len());
        for frame in output.chunks(2) {
            assert!(frame[0] >= 0.0);
            assert!(frame[1] <= 0.0);
        }
    }
}
