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

//! Recorded samples and their decoded, ready-to-play payloads.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::util;

/// Global atomic counter for generating unique sample IDs.
static SAMPLE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// A process-unique identifier for a recorded sample.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SampleId(u64);

impl SampleId {
    /// Allocates the next sample ID. IDs never repeat within a process.
    pub fn next() -> SampleId {
        SampleId(SAMPLE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl From<u64> for SampleId {
    fn from(raw: u64) -> SampleId {
        SampleId(raw)
    }
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A decoded audio payload, ready for output rendering.
/// The sample data is stored in an Arc for efficient sharing with render threads.
#[derive(Clone)]
pub struct Playable {
    /// The decoded data as f32 samples (interleaved if multi-channel).
    data: Arc<Vec<f32>>,
    /// Number of channels in the payload.
    channel_count: u16,
    /// Sample rate of the audio data.
    sample_rate: u32,
}

impl Playable {
    /// Creates a new playable payload from decoded samples.
    pub fn new(data: Vec<f32>, channel_count: u16, sample_rate: u32) -> Playable {
        Playable {
            data: Arc::new(data),
            channel_count: channel_count.max(1),
            sample_rate,
        }
    }

    /// Returns a shared handle to the decoded data.
    pub fn data(&self) -> Arc<Vec<f32>> {
        Arc::clone(&self.data)
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Returns the sample rate of the decoded data.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the number of frames in the payload.
    pub fn frames(&self) -> usize {
        self.data.len() / self.channel_count as usize
    }

    /// Returns the playback duration of the payload.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

impl fmt::Debug for Playable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Playable")
            .field("frames", &self.frames())
            .field("channels", &self.channel_count)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

/// One recorded clip: the decoded payload plus the raw encoded bytes it was
/// decoded from. Both are owned exclusively by the sample, so dropping it
/// (on eviction, removal, clear, or teardown) releases them exactly once.
pub struct Sample {
    id: SampleId,
    captured_at: SystemTime,
    playable: Playable,
    source: Vec<u8>,
}

impl Sample {
    /// Creates a new sample, assigning it a fresh ID and capture timestamp.
    pub fn new(playable: Playable, source: Vec<u8>) -> Sample {
        Sample {
            id: SampleId::next(),
            captured_at: SystemTime::now(),
            playable,
            source,
        }
    }

    pub fn id(&self) -> SampleId {
        self.id
    }

    pub fn captured_at(&self) -> SystemTime {
        self.captured_at
    }

    pub fn playable(&self) -> &Playable {
        &self.playable
    }

    /// Returns the size of the raw encoded clip in bytes.
    pub fn source_len(&self) -> usize {
        self.source.len()
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sample {} ({}, {:.2}s)",
            self.id,
            util::clock_time_display(self.captured_at),
            self.playable.duration().as_secs_f64()
        )
    }
}

impl fmt::Debug for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sample")
            .field("id", &self.id)
            .field("playable", &self.playable)
            .field("source_bytes", &self.source.len())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_sample_ids_never_collide() {
        let ids: HashSet<SampleId> = (0..1000).map(|_| SampleId::next()).collect();
        assert_eq!(1000, ids.len());
    }

    #[test]
    fn test_playable_duration() {
        // 1 second of stereo audio at 8kHz.
        let playable = Playable::new(vec![0.0; 16_000], 2, 8000);
        assert_eq!(8000, playable.frames());
        assert_eq!(1.0, playable.duration().as_secs_f64());
        assert_eq!(16_000 * 4, playable.memory_size());
    }

    #[test]
    fn test_payload_shared_until_sample_dropped() {
        let playable = Playable::new(vec![0.5; 64], 1, 8000);
        let weak = std::sync::Arc::downgrade(&playable.data());

        let sample = Sample::new(playable, vec![1, 2, 3]);
        assert!(weak.upgrade().is_some());
        assert_eq!(3, sample.source_len());

        drop(sample);
        assert!(weak.upgrade().is_none());
    }
}
