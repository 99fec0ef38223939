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

//! The bounded sample store. Holds at most `capacity` recorded samples in
//! insertion order; inserting into a full store drops the sample at the
//! front, whatever it is. Insertion order is also playback order.

use std::collections::VecDeque;

use tracing::{debug, info};

use crate::sample::{Sample, SampleId};
use crate::util;

/// Typed error for sample lookups so races with removal and eviction can be
/// told apart from real failures.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("no sample at position {index} (store holds {len})")]
    NotFound { index: usize, len: usize },
}

/// A display row for one stored sample.
pub struct SampleInfo {
    pub id: SampleId,
    pub position: usize,
    pub captured_at: String,
}

/// A fixed-capacity FIFO store of recorded samples.
pub struct CircularSampleStore {
    /// The maximum number of samples retained at once.
    capacity: usize,
    /// The retained samples, oldest first.
    sequence: VecDeque<Sample>,
}

impl CircularSampleStore {
    /// Creates a new, empty store. Capacity must be positive; zero is
    /// coerced to one (config validation rejects it before we get here).
    pub fn new(capacity: usize) -> CircularSampleStore {
        CircularSampleStore {
            capacity: capacity.max(1),
            sequence: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Inserts a sample, evicting the oldest if the store is full. Returns
    /// the evicted sample's ID, if any. The evicted sample's payloads are
    /// released here.
    pub fn insert(&mut self, sample: Sample) -> Option<SampleId> {
        let evicted = if self.sequence.len() == self.capacity {
            self.sequence.pop_front().map(|oldest| {
                let id = oldest.id();
                info!(evicted = %id, "Buffer full, dropping oldest sample.");
                id
            })
        } else {
            None
        };

        debug!(
            sample = %sample.id(),
            occupancy = self.sequence.len() + 1,
            capacity = self.capacity,
            "Sample stored."
        );
        self.sequence.push_back(sample);
        evicted
    }

    /// Removes the sample with the given ID and releases its payloads.
    /// Returns false if no such sample exists, which is not an error: the
    /// caller may be racing an eviction.
    pub fn remove_by_id(&mut self, id: SampleId) -> bool {
        match self.sequence.iter().position(|s| s.id() == id) {
            Some(index) => {
                self.sequence.remove(index);
                info!(sample = %id, position = index, "Sample removed.");
                true
            }
            None => {
                debug!(sample = %id, "Sample already gone, nothing to remove.");
                false
            }
        }
    }

    /// Removes all samples and releases their payloads.
    pub fn clear(&mut self) {
        let removed = self.sequence.len();
        self.sequence.clear();
        if removed > 0 {
            info!(removed, "All samples cleared.");
        }
    }

    /// Returns the sample at the given position in playback order.
    pub fn get(&self, index: usize) -> Result<&Sample, Error> {
        self.sequence.get(index).ok_or(Error::NotFound {
            index,
            len: self.sequence.len(),
        })
    }

    /// Current occupancy.
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns display rows for all stored samples, oldest first.
    pub fn snapshot(&self) -> Vec<SampleInfo> {
        self.sequence
            .iter()
            .enumerate()
            .map(|(position, sample)| SampleInfo {
                id: sample.id(),
                position,
                captured_at: util::clock_time_display(sample.captured_at()),
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use std::sync::Weak;

    use crate::sample::Playable;

    use super::*;

    /// Builds a sample along with a weak handle to its decoded payload, so
    /// tests can observe when the payload is released.
    fn probe_sample() -> (Sample, Weak<Vec<f32>>) {
        let playable = Playable::new(vec![0.25; 32], 1, 8000);
        let weak = std::sync::Arc::downgrade(&playable.data());
        (Sample::new(playable, vec![0u8; 16]), weak)
    }

    #[test]
    fn test_capacity_is_a_hard_ceiling() {
        let mut store = CircularSampleStore::new(3);
        for _ in 0..10 {
            let (sample, _) = probe_sample();
            store.insert(sample);
            assert!(store.len() <= store.capacity());
        }
        assert_eq!(3, store.len());
    }

    #[test]
    fn test_insert_evicts_oldest_in_order() {
        // Capacity 4; insert A..E; the store must end up holding B..E.
        let mut store = CircularSampleStore::new(4);
        let mut ids = Vec::new();
        for _ in 0..5 {
            let (sample, _) = probe_sample();
            ids.push(sample.id());
            store.insert(sample);
        }

        assert_eq!(4, store.len());
        for (index, expected) in ids[1..].iter().enumerate() {
            assert_eq!(*expected, store.get(index).unwrap().id());
        }
    }

    #[test]
    fn test_eviction_releases_exactly_the_oldest() {
        let mut store = CircularSampleStore::new(2);
        let (a, a_payload) = probe_sample();
        let (b, b_payload) = probe_sample();
        let a_id = a.id();
        store.insert(a);
        store.insert(b);

        let (c, _) = probe_sample();
        let evicted = store.insert(c);

        assert_eq!(Some(a_id), evicted);
        assert_eq!(2, store.len());
        assert!(a_payload.upgrade().is_none());
        assert!(b_payload.upgrade().is_some());
    }

    #[test]
    fn test_remove_missing_id_is_a_noop() {
        let mut store = CircularSampleStore::new(4);
        let (sample, _) = probe_sample();
        let id = sample.id();
        store.insert(sample);

        assert!(!store.remove_by_id(SampleId::from(u64::MAX)));
        assert_eq!(1, store.len());
        assert_eq!(id, store.get(0).unwrap().id());
    }

    #[test]
    fn test_remove_preserves_relative_order() {
        let mut store = CircularSampleStore::new(4);
        let mut ids = Vec::new();
        for _ in 0..4 {
            let (sample, _) = probe_sample();
            ids.push(sample.id());
            store.insert(sample);
        }

        assert!(store.remove_by_id(ids[1]));
        assert_eq!(3, store.len());
        assert_eq!(ids[0], store.get(0).unwrap().id());
        assert_eq!(ids[2], store.get(1).unwrap().id());
        assert_eq!(ids[3], store.get(2).unwrap().id());
    }

    #[test]
    fn test_eviction_after_removal_takes_whatever_is_in_front() {
        // Removing the front sample promotes the next one; the following
        // overflow evicts that one, not anything keyed by insertion time.
        let mut store = CircularSampleStore::new(2);
        let (a, _) = probe_sample();
        let (b, _) = probe_sample();
        let a_id = a.id();
        let b_id = b.id();
        store.insert(a);
        store.insert(b);

        assert!(store.remove_by_id(a_id));
        let (c, _) = probe_sample();
        store.insert(c);
        let (d, _) = probe_sample();
        let evicted = store.insert(d);

        assert_eq!(Some(b_id), evicted);
    }

    #[test]
    fn test_clear_releases_everything() {
        let mut store = CircularSampleStore::new(4);
        let mut payloads = Vec::new();
        for _ in 0..3 {
            let (sample, payload) = probe_sample();
            payloads.push(payload);
            store.insert(sample);
        }

        store.clear();
        assert_eq!(0, store.len());
        assert!(store.is_empty());
        assert!(payloads.iter().all(|p| p.upgrade().is_none()));
    }

    #[test]
    fn test_get_out_of_range() {
        let store = CircularSampleStore::new(4);
        assert!(matches!(
            store.get(0),
            Err(Error::NotFound { index: 0, len: 0 })
        ));
    }

    #[test]
    fn test_snapshot_positions() {
        let mut store = CircularSampleStore::new(4);
        for _ in 0..3 {
            let (sample, _) = probe_sample();
            store.insert(sample);
        }

        let snapshot = store.snapshot();
        assert_eq!(3, snapshot.len());
        for (index, info) in snapshot.iter().enumerate() {
            assert_eq!(index, info.position);
            assert_eq!(store.get(index).unwrap().id(), info.id);
        }
    }
}
