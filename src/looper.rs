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

//! The playback loop. A beat timer walks a cursor through the store's
//! current contents and renders the sample under it, spaced by the tempo's
//! beat period. The timer tolerates the store shrinking underneath it and
//! stops itself when the store empties.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, span, warn, Level, Span};

use crate::audio;
use crate::sample::Playable;
use crate::store::{self, CircularSampleStore};

/// Shared handle to the sample store.
pub type SharedStore = Arc<Mutex<CircularSampleStore>>;

/// Beats per minute, clamped to the supported range.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Bpm(u16);

impl Bpm {
    pub const MIN: u16 = 60;
    pub const MAX: u16 = 200;

    /// Creates a tempo, clamping out-of-range values.
    pub fn new(bpm: u16) -> Bpm {
        Bpm(bpm.clamp(Bpm::MIN, Bpm::MAX))
    }

    pub fn get(&self) -> u16 {
        self.0
    }

    /// The spacing between successive loop beats: 60000 / tempo ms.
    pub fn beat_duration(&self) -> Duration {
        Duration::from_millis(60_000 / u64::from(self.0))
    }
}

impl fmt::Display for Bpm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} BPM", self.0)
    }
}

/// Commands sent to an armed beat timer.
enum TimerCommand {
    /// Re-arms the timer with a new period, keeping the cursor.
    Retime(Duration),
    /// Disarms the timer.
    Cancel,
}

struct LoopState {
    running: bool,
    /// The position currently sounding. None while stopped.
    cursor: Option<usize>,
    tempo: Bpm,
    /// Timer generation. Bumped under the lock whenever the loop stops, so
    /// a tick from a disarmed timer can never act.
    epoch: u64,
    timer_tx: Option<Sender<TimerCommand>>,
}

/// Drives loop playback over a shared sample store.
pub struct Looper {
    store: SharedStore,
    device: Arc<dyn audio::Device>,
    state: Arc<Mutex<LoopState>>,
    span: Span,
}

impl Looper {
    /// Creates a new looper over the given store and output device.
    pub fn new(store: SharedStore, device: Arc<dyn audio::Device>, tempo: Bpm) -> Looper {
        Looper {
            store,
            device,
            state: Arc::new(Mutex::new(LoopState {
                running: false,
                cursor: None,
                tempo,
                epoch: 0,
                timer_tx: None,
            })),
            span: span!(Level::INFO, "looper"),
        }
    }

    /// Starts the loop: plays position 0 immediately and arms the beat
    /// timer. No-op if already running; stays stopped if the store is
    /// empty.
    pub fn start(&self) {
        let _enter = self.span.enter();

        let mut state = self.state.lock();
        if state.running {
            info!("Loop is already running.");
            return;
        }

        let first = {
            let store = self.store.lock();
            match store.get(0) {
                Ok(sample) => sample.playable().clone(),
                Err(_) => {
                    info!("No samples recorded, staying stopped.");
                    return;
                }
            }
        };

        state.running = true;
        state.cursor = Some(0);
        let epoch = state.epoch;
        let period = state.tempo.beat_duration();
        let (timer_tx, timer_rx) = crossbeam_channel::unbounded();
        state.timer_tx = Some(timer_tx);

        info!(
            tempo = %state.tempo,
            period_ms = period.as_millis() as u64,
            "Starting playback loop."
        );

        Looper::render(self.device.as_ref(), &first);

        let state = Arc::clone(&self.state);
        let store = Arc::clone(&self.store);
        let device = Arc::clone(&self.device);
        thread::spawn(move || Looper::run_timer(state, store, device, epoch, period, timer_rx));
    }

    /// Stops the loop and disarms the timer. Idempotent. Any tick observed
    /// after this returns finds a bumped epoch and does nothing.
    pub fn stop(&self) {
        let _enter = self.span.enter();

        let mut state = self.state.lock();
        if !state.running {
            debug!("Loop is not running, nothing to stop.");
            return;
        }

        state.running = false;
        state.cursor = None;
        state.epoch += 1;
        if let Some(timer_tx) = state.timer_tx.take() {
            // The timer also exits when the sender disconnects; the explicit
            // cancel just wakes it immediately.
            let _ = timer_tx.send(TimerCommand::Cancel);
        }

        info!("Playback loop stopped.");
    }

    /// Updates the tempo. If the loop is running, the armed timer is
    /// replaced with one using the new period; the cursor continues from
    /// where it is rather than restarting at 0.
    pub fn set_tempo(&self, bpm: u16) {
        let _enter = self.span.enter();

        let tempo = Bpm::new(bpm);
        if tempo.get() != bpm {
            warn!(
                requested = bpm,
                clamped = tempo.get(),
                "Tempo outside supported range."
            );
        }

        let mut state = self.state.lock();
        state.tempo = tempo;
        let period = tempo.beat_duration();
        if state.running {
            if let Some(timer_tx) = &state.timer_tx {
                if timer_tx.send(TimerCommand::Retime(period)).is_err() {
                    warn!("Beat timer is gone; tempo will apply on the next start.");
                }
            }
        }

        info!(
            tempo = %tempo,
            period_ms = period.as_millis() as u64,
            "Tempo updated."
        );
    }

    /// Plays the sample at the given position once, outside the loop. The
    /// cursor and timer are untouched. Fails with NotFound when the
    /// position raced away with a removal or eviction.
    pub fn play_sample(&self, index: usize) -> Result<(), store::Error> {
        let _enter = self.span.enter();

        let playable = {
            let store = self.store.lock();
            store.get(index)?.playable().clone()
        };

        debug!(index, "Previewing sample.");
        Looper::render(self.device.as_ref(), &playable);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// The position currently sounding, or None while stopped.
    pub fn current_cursor(&self) -> Option<usize> {
        self.state.lock().cursor
    }

    pub fn tempo(&self) -> Bpm {
        self.state.lock().tempo
    }

    pub fn beat_duration(&self) -> Duration {
        self.state.lock().tempo.beat_duration()
    }

    /// The armed timer. Sleeps a beat at a time, handling retime and cancel
    /// commands between beats. Exits when its generation goes stale.
    fn run_timer(
        state: Arc<Mutex<LoopState>>,
        store: SharedStore,
        device: Arc<dyn audio::Device>,
        epoch: u64,
        mut period: Duration,
        timer_rx: Receiver<TimerCommand>,
    ) {
        let span = span!(Level::DEBUG, "beat timer");
        let _enter = span.enter();

        loop {
            match timer_rx.recv_timeout(period) {
                Ok(TimerCommand::Retime(new_period)) => period = new_period,
                Ok(TimerCommand::Cancel) | Err(RecvTimeoutError::Disconnected) => return,
                Err(RecvTimeoutError::Timeout) => {
                    if !Looper::tick(&state, &store, device.as_ref(), epoch) {
                        return;
                    }
                }
            }
        }
    }

    /// One beat: advance the cursor modulo the store's current size and
    /// render the sample under it. Returns false when the timer that
    /// produced this tick should disarm.
    fn tick(
        state: &Mutex<LoopState>,
        store: &Mutex<CircularSampleStore>,
        device: &dyn audio::Device,
        epoch: u64,
    ) -> bool {
        let mut state = state.lock();
        if !state.running || state.epoch != epoch {
            // A stale timer; the loop was stopped or restarted.
            return false;
        }

        let store = store.lock();
        if store.is_empty() {
            info!("All samples gone, stopping playback loop.");
            state.running = false;
            state.cursor = None;
            state.epoch += 1;
            state.timer_tx = None;
            return false;
        }

        let cursor = (state.cursor.unwrap_or(0) + 1) % store.len();
        state.cursor = Some(cursor);
        match store.get(cursor) {
            Ok(sample) => {
                debug!(cursor, sample = %sample.id(), "Beat.");
                Looper::render(device, sample.playable());
            }
            // Unreachable given the modulus, but a race is never worth a panic.
            Err(e) => warn!(err = %e, "Cursor raced past the store."),
        }

        true
    }

    /// Fire-and-forget render. Failures are logged, never propagated; a
    /// dropped beat doesn't stop the loop.
    fn render(device: &dyn audio::Device, playable: &Playable) {
        if let Err(e) = device.render(playable) {
            error!(err = %e, "Error rendering sample.");
        }
    }
}

impl Drop for Looper {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod test {
    use crate::audio::{self, mock};
    use crate::sample::{Playable, Sample};
    use crate::test::eventually;

    use super::*;

    fn test_sample() -> Sample {
        Sample::new(Playable::new(vec![0.1; 64], 1, 8000), vec![0u8; 8])
    }

    fn test_fixture(samples: usize) -> (Looper, SharedStore, mock::Device) {
        let store: SharedStore = Arc::new(Mutex::new(CircularSampleStore::new(4)));
        {
            let mut store = store.lock();
            for _ in 0..samples {
                store.insert(test_sample());
            }
        }
        let device = mock::Device::get("mock-out");
        let looper = Looper::new(
            Arc::clone(&store),
            Arc::new(device.clone()) as Arc<dyn audio::Device>,
            Bpm::new(120),
        );
        (looper, store, device)
    }

    /// Drives one beat by hand, bypassing the timer thread.
    fn manual_tick(looper: &Looper, device: &mock::Device) -> bool {
        let epoch = looper.state.lock().epoch;
        Looper::tick(&looper.state, &looper.store, device, epoch)
    }

    #[test]
    fn test_beat_duration() {
        assert_eq!(Duration::from_millis(500), Bpm::new(120).beat_duration());
        assert_eq!(Duration::from_millis(1000), Bpm::new(60).beat_duration());
        assert_eq!(Duration::from_millis(300), Bpm::new(200).beat_duration());
    }

    #[test]
    fn test_bpm_clamps() {
        assert_eq!(60, Bpm::new(10).get());
        assert_eq!(200, Bpm::new(999).get());
        assert_eq!(90, Bpm::new(90).get());
    }

    #[test]
    fn test_start_on_empty_store_stays_stopped() {
        let (looper, _store, device) = test_fixture(0);

        looper.start();
        assert!(!looper.is_running());
        assert_eq!(None, looper.current_cursor());
        assert_eq!(0, device.render_count());
    }

    #[test]
    fn test_start_plays_position_zero_immediately() {
        let (looper, _store, device) = test_fixture(3);

        looper.start();
        assert!(looper.is_running());
        assert_eq!(Some(0), looper.current_cursor());
        assert_eq!(1, device.render_count());

        // Starting again is a no-op.
        looper.start();
        assert_eq!(1, device.render_count());
        looper.stop();
    }

    #[test]
    fn test_ticks_wrap_around_the_store() {
        let (looper, _store, device) = test_fixture(3);
        looper.start();

        for expected in [1, 2, 0, 1] {
            assert!(manual_tick(&looper, &device));
            assert_eq!(Some(expected), looper.current_cursor());
        }
        assert_eq!(5, device.render_count());
        looper.stop();
    }

    #[test]
    fn test_shrinking_store_never_indexes_out_of_bounds() {
        let (looper, store, device) = test_fixture(4);
        looper.start();
        assert!(manual_tick(&looper, &device));
        assert_eq!(Some(1), looper.current_cursor());

        // Remove one sample mid-loop; the modulus recomputes against the
        // new size on the next beat.
        let removed = store.lock().get(2).unwrap().id();
        assert!(store.lock().remove_by_id(removed));

        for _ in 0..6 {
            assert!(manual_tick(&looper, &device));
            assert!(looper.current_cursor().unwrap() < 3);
        }
        looper.stop();
    }

    #[test]
    fn test_empty_store_at_tick_stops_the_loop() {
        let (looper, store, device) = test_fixture(2);
        looper.start();

        store.lock().clear();
        assert!(!manual_tick(&looper, &device));
        assert!(!looper.is_running());
        assert_eq!(None, looper.current_cursor());

        // Only the immediate start render happened.
        assert_eq!(1, device.render_count());
    }

    #[test]
    fn test_tempo_change_keeps_the_cursor() {
        let (looper, _store, device) = test_fixture(4);
        looper.start();
        assert!(manual_tick(&looper, &device));
        assert!(manual_tick(&looper, &device));
        assert_eq!(Some(2), looper.current_cursor());

        looper.set_tempo(90);
        assert_eq!(90, looper.tempo().get());
        assert_eq!(Some(2), looper.current_cursor());

        assert!(manual_tick(&looper, &device));
        assert_eq!(Some(3), looper.current_cursor());
        looper.stop();
    }

    #[test]
    fn test_tempo_while_stopped_applies_on_next_start() {
        let (looper, _store, _device) = test_fixture(1);
        looper.set_tempo(60);
        assert_eq!(Duration::from_millis(1000), looper.beat_duration());
        assert!(!looper.is_running());
    }

    #[test]
    fn test_stop_is_idempotent_and_invalidates_stale_ticks() {
        let (looper, _store, device) = test_fixture(2);
        looper.start();
        let stale_epoch = looper.state.lock().epoch;

        looper.stop();
        looper.stop();
        assert!(!looper.is_running());
        assert_eq!(None, looper.current_cursor());

        // A tick armed before the stop must find the bumped epoch and act
        // on nothing.
        assert!(!Looper::tick(
            &looper.state,
            &looper.store,
            &device,
            stale_epoch
        ));
        assert_eq!(1, device.render_count());
    }

    #[test]
    fn test_preview_does_not_touch_cursor_or_timer() {
        let (looper, _store, device) = test_fixture(3);
        looper.start();
        assert!(manual_tick(&looper, &device));
        let cursor = looper.current_cursor();

        looper.play_sample(2).expect("preview should succeed");
        assert_eq!(cursor, looper.current_cursor());
        assert!(looper.is_running());

        assert!(matches!(
            looper.play_sample(17),
            Err(store::Error::NotFound { index: 17, len: 3 })
        ));
        looper.stop();
    }

    #[test]
    fn test_timer_thread_actually_ticks() {
        let (looper, _store, device) = test_fixture(2);
        looper.set_tempo(200);
        looper.start();

        eventually(
            || device.render_count() >= 3,
            "Beat timer never advanced the loop",
        );
        looper.stop();
    }
}
