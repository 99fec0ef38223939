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

//! YAML configuration for the looper.

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::capture::DEFAULT_CAPTURE_WINDOW;
use crate::looper::Bpm;

/// An error arising from reading or validating a config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("error reading config file: {0}")]
    Io(#[from] io::Error),
    #[error("error parsing config file: {0}")]
    Parse(#[from] serde_yml::Error),
    #[error("capacity must be greater than zero")]
    ZeroCapacity,
    #[error("capture window must be greater than zero")]
    ZeroCaptureWindow,
}

/// The looper configuration.
#[derive(Deserialize, Debug, PartialEq)]
pub struct Config {
    /// The maximum number of samples kept. Recording past this evicts the
    /// oldest sample.
    #[serde(default = "default_capacity")]
    capacity: usize,

    /// The initial loop tempo in beats per minute.
    #[serde(default = "default_tempo")]
    tempo: u16,

    /// The output device to play samples through.
    #[serde(default = "default_device")]
    audio_device: String,

    /// The input device to capture samples from.
    #[serde(default = "default_device")]
    capture_device: String,

    /// The length of each capture in milliseconds.
    #[serde(default = "default_capture_window_ms")]
    capture_window_ms: u64,
}

fn default_capacity() -> usize {
    4
}

fn default_tempo() -> u16 {
    120
}

fn default_device() -> String {
    "default".to_string()
}

fn default_capture_window_ms() -> u64 {
    DEFAULT_CAPTURE_WINDOW.as_millis() as u64
}

impl Default for Config {
    fn default() -> Config {
        Config {
            capacity: default_capacity(),
            tempo: default_tempo(),
            audio_device: default_device(),
            capture_device: default_device(),
            capture_window_ms: default_capture_window_ms(),
        }
    }
}

impl Config {
    /// Parses the config at the given path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let config: Config = serde_yml::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.capture_window_ms == 0 {
            return Err(ConfigError::ZeroCaptureWindow);
        }
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The initial tempo, clamped to the supported range.
    pub fn tempo(&self) -> Bpm {
        Bpm::new(self.tempo)
    }

    pub fn audio_device(&self) -> &str {
        &self.audio_device
    }

    pub fn capture_device(&self) -> &str {
        &self.capture_device
    }

    pub fn capture_window(&self) -> Duration {
        Duration::from_millis(self.capture_window_ms)
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;
    use std::io::Write;

    use super::*;

    fn write_config(contents: &str) -> Result<tempfile::NamedTempFile, Box<dyn Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(contents.as_bytes())?;
        Ok(file)
    }

    #[test]
    fn test_full_config() -> Result<(), Box<dyn Error>> {
        let file = write_config(
            "capacity: 8\n\
             tempo: 90\n\
             audio_device: \"UMC1820\"\n\
             capture_device: \"UMC1820\"\n\
             capture_window_ms: 1500\n",
        )?;

        let config = Config::from_path(file.path())?;
        assert_eq!(8, config.capacity());
        assert_eq!(90, config.tempo().get());
        assert_eq!("UMC1820", config.audio_device());
        assert_eq!("UMC1820", config.capture_device());
        assert_eq!(Duration::from_millis(1500), config.capture_window());
        Ok(())
    }

    #[test]
    fn test_empty_config_uses_defaults() -> Result<(), Box<dyn Error>> {
        let file = write_config("{}")?;

        let config = Config::from_path(file.path())?;
        assert_eq!(Config::default(), config);
        assert_eq!(4, config.capacity());
        assert_eq!(120, config.tempo().get());
        assert_eq!(Duration::from_secs(2), config.capture_window());
        Ok(())
    }

    #[test]
    fn test_out_of_range_tempo_clamps() -> Result<(), Box<dyn Error>> {
        let file = write_config("tempo: 500\n")?;
        let config = Config::from_path(file.path())?;
        assert_eq!(200, config.tempo().get());
        Ok(())
    }

    #[test]
    fn test_invalid_configs() -> Result<(), Box<dyn Error>> {
        let file = write_config("capacity: 0\n")?;
        assert!(matches!(
            Config::from_path(file.path()),
            Err(ConfigError::ZeroCapacity)
        ));

        let file = write_config("capture_window_ms: 0\n")?;
        assert!(matches!(
            Config::from_path(file.path()),
            Err(ConfigError::ZeroCaptureWindow)
        ));

        let file = write_config("capacity: [nope\n")?;
        assert!(matches!(
            Config::from_path(file.path()),
            Err(ConfigError::Parse(_))
        ));

        assert!(matches!(
            Config::from_path("/definitely/not/a/real/path.yaml"),
            Err(ConfigError::Io(_))
        ));
        Ok(())
    }
}
