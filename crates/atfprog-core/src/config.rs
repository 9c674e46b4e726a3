//! TOML programmer configuration
//!
//! Overrides the default wiring and delays:
//!
//! ```toml
//! [pins]
//! program = 14
//! write = 15
//! erase = 23
//! access_olmc = 18
//! clock = 24
//! data_in = 15
//! data_out = 7
//! strobe = 8
//!
//! [timing]
//! mode_settle_ms = 5
//! erase_settle_ms = 10
//! erase_strobe_ms = 30
//! row_strobe_ms = 5
//! row_settle_ms = 10
//! ```
//!
//! Every key is optional. Missing keys keep their defaults; unknown keys are
//! rejected so typos don't silently fall back to the default wiring.

use std::fs;
use std::path::{Path, PathBuf};
use std::vec::Vec;

use core::time::Duration;

use crate::error::Error;
use crate::pins::{Pin, PinMap, Role};
use crate::timing::Timing;

/// Failure to load a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or has unexpected keys
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The values parse but describe an unusable setup
    #[error("invalid configuration: {0}")]
    Invalid(#[from] Error),
}

/// Configuration file structure
#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    pins: Option<TomlPins>,
    timing: Option<TomlTiming>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlPins {
    program: Option<Pin>,
    write: Option<Pin>,
    erase: Option<Pin>,
    access_olmc: Option<Pin>,
    clock: Option<Pin>,
    data_in: Option<Pin>,
    data_out: Option<Pin>,
    strobe: Option<Pin>,
}

#[derive(Debug, Default, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlTiming {
    mode_settle_ms: Option<u64>,
    erase_settle_ms: Option<u64>,
    erase_strobe_ms: Option<u64>,
    row_strobe_ms: Option<u64>,
    row_settle_ms: Option<u64>,
}

impl TomlPins {
    fn assignments(&self) -> Vec<(Role, Pin)> {
        [
            (Role::Program, self.program),
            (Role::Write, self.write),
            (Role::Erase, self.erase),
            (Role::AccessOlmc, self.access_olmc),
            (Role::Clock, self.clock),
            (Role::DataIn, self.data_in),
            (Role::DataOut, self.data_out),
            (Role::Strobe, self.strobe),
        ]
        .into_iter()
        .filter_map(|(role, pin)| pin.map(|pin| (role, pin)))
        .collect()
    }
}

impl TomlTiming {
    fn apply(&self, timing: &mut Timing) {
        let ms = Duration::from_millis;
        if let Some(v) = self.mode_settle_ms {
            timing.mode_settle = ms(v);
        }
        if let Some(v) = self.erase_settle_ms {
            timing.erase_settle = ms(v);
        }
        if let Some(v) = self.erase_strobe_ms {
            timing.erase_strobe = ms(v);
        }
        if let Some(v) = self.row_strobe_ms {
            timing.row_strobe = ms(v);
        }
        if let Some(v) = self.row_settle_ms {
            timing.row_settle = ms(v);
        }
    }
}

/// Wiring and delays for a programming run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Config {
    /// Role to GPIO line assignment
    pub pins: PinMap,
    /// Protocol delays
    pub timing: Timing,
}

impl Config {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: TomlConfig = toml::from_str(content)?;

        let pins = match &file.pins {
            Some(pins) => PinMap::new(&pins.assignments())?,
            None => PinMap::default(),
        };

        let mut timing = Timing::default();
        if let Some(t) = &file.timing {
            t.apply(&mut timing);
        }
        timing.validate()?;

        Ok(Self { pins, timing })
    }

    /// Load a configuration file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_pins() {
        let config = Config::from_toml_str(
            r#"
[pins]
clock = 4
data_in = 17
"#,
        )
        .unwrap();
        assert_eq!(config.pins.pin(Role::Clock), 4);
        assert_eq!(config.pins.pin(Role::DataIn), 17);
        assert_eq!(config.pins.pin(Role::Write), 15);
        assert_eq!(config.pins.shared_line(), None);
        assert_eq!(config.timing, Timing::default());
    }

    #[test]
    fn test_timing_override() {
        let config = Config::from_toml_str(
            r#"
[timing]
erase_strobe_ms = 100
row_settle_ms = 20
"#,
        )
        .unwrap();
        assert_eq!(config.timing.erase_strobe, Duration::from_millis(100));
        assert_eq!(config.timing.row_settle, Duration::from_millis(20));
        assert_eq!(config.timing.mode_settle, Duration::from_millis(5));
    }

    #[test]
    fn test_timing_below_minimum() {
        let err = Config::from_toml_str("[timing]\nrow_strobe_ms = 1\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid(Error::TimingBelowMinimum)
        ));
    }

    #[test]
    fn test_pin_conflict() {
        let err = Config::from_toml_str("[pins]\nerase = 24\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid(Error::PinConflict { pin: 24 })
        ));
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(matches!(
            Config::from_toml_str("[pins]\nclk = 4\n"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            Config::from_toml_str("[wiring]\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_toml_file("/nonexistent/atfprog.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
