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
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{error, info, span, warn, Level};

use crate::capture::{self, CaptureError};
use crate::decode::{DecodeError, Decoder};
use crate::looper::{Looper, SharedStore};
use crate::sample::{Sample, SampleId};

pub mod keyboard;

/// Controller events that drive the looper session.
#[derive(Debug, PartialEq)]
pub enum Event {
    /// Captures a new clip from the input device and stores it.
    Record,

    /// Starts the playback loop if stopped, stops it if running.
    Toggle,

    /// Changes the loop tempo.
    Tempo(u16),

    /// Plays the sample at the given position once, outside the loop.
    Play(usize),

    /// Removes the sample with the given ID from the store.
    Remove(u64),

    /// Removes every sample and stops the loop.
    Clear,

    /// Prints the store contents and loop state.
    Status,

    /// Shuts the session down.
    Quit,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// A recording attempt that produced no sample.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// One looper session: the store, the looper driving it, and the capture
/// pipeline that feeds it.
pub struct Session {
    store: SharedStore,
    looper: Arc<Looper>,
    capture: Arc<dyn capture::Device>,
    decoder: Arc<Decoder>,
    capture_window: Duration,
    recording: Arc<AtomicBool>,
}

impl Session {
    pub fn new(
        store: SharedStore,
        looper: Arc<Looper>,
        capture: Arc<dyn capture::Device>,
        decoder: Decoder,
        capture_window: Duration,
    ) -> Session {
        Session {
            store,
            looper,
            capture,
            decoder: Arc::new(decoder),
            capture_window,
            recording: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Records a new clip in the background. Only one capture runs at a
    /// time; a record request during a capture is dropped. A failed
    /// capture changes nothing.
    fn record(&self) {
        if self.recording.swap(true, Ordering::SeqCst) {
            warn!("Capture already in progress, ignoring.");
            return;
        }

        let capture = Arc::clone(&self.capture);
        let decoder = Arc::clone(&self.decoder);
        let store = Arc::clone(&self.store);
        let recording = Arc::clone(&self.recording);
        let window = self.capture_window;
        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || -> Result<Sample, RecordError> {
                let clip = capture.capture(window)?;
                let playable = decoder.decode(&clip)?;
                Ok(Sample::new(playable, clip.into_bytes()))
            })
            .await;

            match result {
                Ok(Ok(sample)) => {
                    info!(sample = %sample, "Recorded new sample.");
                    store.lock().insert(sample);
                }
                Ok(Err(e)) => error!(err = %e, "Recording failed."),
                Err(e) => error!(err = %e, "Recording task panicked."),
            }
            recording.store(false, Ordering::SeqCst);
        });
    }

    fn toggle(&self) {
        if self.looper.is_running() {
            self.looper.stop();
        } else {
            self.looper.start();
        }
    }

    fn remove(&self, id: u64) {
        if self.store.lock().remove_by_id(SampleId::from(id)) {
            info!(id, "Removed sample.");
        } else {
            warn!(id, "No sample with that ID.");
        }
    }

    /// Clears every sample. Clearing stops playback; an empty loop has
    /// nothing to play.
    fn clear(&self) {
        self.looper.stop();
        self.store.lock().clear();
        info!("Cleared all samples.");
    }

    fn status(&self) {
        let (rows, capacity) = {
            let store = self.store.lock();
            (store.snapshot(), store.capacity())
        };
        println!("Buffer ({}/{} samples):", rows.len(), capacity);
        for row in rows {
            println!(
                "  [{}] sample {} recorded at {}",
                row.position, row.id, row.captured_at
            );
        }
        println!(
            "loop: {} | tempo: {} | cursor: {}",
            if self.looper.is_running() {
                "running"
            } else {
                "stopped"
            },
            self.looper.tempo(),
            match self.looper.current_cursor() {
                Some(cursor) => cursor.to_string(),
                None => "-".to_string(),
            },
        );
    }

    fn shutdown(&self) {
        self.looper.stop();
    }
}

/// Controls a looper session.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given driver.
    pub fn new(session: Session, driver: Arc<dyn Driver>) -> Controller {
        Controller {
            handle: tokio::spawn(async move { Controller::trigger_events(session, driver).await }),
        }
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Dispatches session operations by watching the driver for events.
    async fn trigger_events(session: Session, driver: Arc<dyn Driver>) {
        let span = span!(Level::INFO, "controller");
        let _enter = span.enter();

        let (events_tx, mut events_rx) = mpsc::channel(1);
        let join_handle = driver.monitor_events(events_tx);

        info!("Controller started.");

        loop {
            match events_rx.recv().await {
                Some(Event::Quit) | None => {
                    info!("Controller closing.");
                    session.shutdown();
                    if let Err(e) = join_handle.await {
                        error!("Error waiting for event monitor to stop: {}", e);
                    }
                    return;
                }
                Some(event) => {
                    info!(event = format!("{:?}", event), "Received event.");

                    match event {
                        Event::Record => session.record(),
                        Event::Toggle => session.toggle(),
                        Event::Tempo(bpm) => session.looper.set_tempo(bpm),
                        Event::Play(index) => {
                            if let Err(e) = session.looper.play_sample(index) {
                                error!("Error playing sample: {}", e);
                            }
                        }
                        Event::Remove(id) => session.remove(id),
                        Event::Clear => session.clear(),
                        Event::Status => session.status(),
                        Event::Quit => unreachable!(),
                    }
                }
            }
        }
    }
}
