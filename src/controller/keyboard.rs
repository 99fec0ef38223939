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

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;

const RECORD: &str = "record";
const TOGGLE: &str = "loop";
const TEMPO: &str = "tempo";
const PLAY: &str = "play";
const REMOVE: &str = "remove";
const CLEAR: &str = "clear";
const STATUS: &str = "status";
const QUIT: &str = "quit";

/// A controller that drives a looper session using the keyboard.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Reads one command and sends the matching event. Returns false once
    /// the session should close.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({}, {}, {} <bpm>, {} <pos>, {} <id>, {}, {}, {}): ",
            RECORD, TOGGLE, TEMPO, PLAY, REMOVE, CLEAR, STATUS, QUIT,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            // Stdin closed.
            return Ok(false);
        }

        let input = input.trim().to_lowercase();
        let mut words = input.split_whitespace();
        let command = words.next().unwrap_or_default();
        let argument = words.next();

        let event = match (command, argument) {
            (RECORD, None) => Some(Event::Record),
            (TOGGLE, None) => Some(Event::Toggle),
            (TEMPO, Some(arg)) => match arg.parse::<u16>() {
                Ok(bpm) => Some(Event::Tempo(bpm)),
                Err(_) => {
                    warn!(input = arg, "Tempo must be a number");
                    None
                }
            },
            (PLAY, Some(arg)) => match arg.parse::<usize>() {
                Ok(index) => Some(Event::Play(index)),
                Err(_) => {
                    warn!(input = arg, "Position must be a number");
                    None
                }
            },
            (REMOVE, Some(arg)) => match arg.parse::<u64>() {
                Ok(id) => Some(Event::Remove(id)),
                Err(_) => {
                    warn!(input = arg, "Sample ID must be a number");
                    None
                }
            },
            (CLEAR, None) => Some(Event::Clear),
            (STATUS, None) => Some(Event::Status),
            (QUIT, None) => Some(Event::Quit),
            ("", None) => None,
            _ => {
                warn!(input = input.as_str(), "Unrecognized input");
                None
            }
        };

        let closing = matches!(event, Some(Event::Quit));
        if let Some(event) = event {
            events_tx
                .blocking_send(event)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        }
        Ok(!closing)
    }
}

impl Default for Driver {
    fn default() -> Driver {
        Driver::new()
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}
            Ok(())
        })
    }
}
