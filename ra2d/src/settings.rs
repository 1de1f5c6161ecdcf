//! Converter settings file.
//!
//! Plain text, one `key = value` pair per line. `#` starts a comment and
//! blank lines are ignored.
//!
//! ```text
//! # deflection ignored around the center
//! inner_deadzone = 30
//! # deflection treated as full press near the rim
//! outer_deadzone = 10
//! # duty-cycle period in samples
//! window = 8
//! stick = right
//! ```
//!
//! Every key is optional. A bad line is reported and skipped; the remaining
//! lines still apply.

use alloc::vec::Vec;

use crate::convert::{DeadzoneConfig, MAX_DEFLECTION};
use crate::sample::Stick;

/// File name of the settings file under the configuration root.
pub const SETTINGS_FILE: &str = "settings.txt";

/// Largest accepted duty-cycle window.
pub const MAX_WINDOW: u32 = 255;

/// Error for one line of a settings file.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum SettingsError {
    /// The line has no `=`.
    InvalidFormat { line: usize },
    /// The key is not one of the known settings.
    UnknownKey { line: usize },
    /// The value does not parse or is out of range.
    InvalidValue { line: usize },
}

impl core::fmt::Debug for SettingsError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidFormat { line } => write!(f, "SettingsError::InvalidFormat({line})"),
            Self::UnknownKey { line } => write!(f, "SettingsError::UnknownKey({line})"),
            Self::InvalidValue { line } => write!(f, "SettingsError::InvalidValue({line})"),
        }
    }
}

impl core::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidFormat { line } => write!(f, "line {line}: expected `key = value`"),
            Self::UnknownKey { line } => write!(f, "line {line}: unknown setting"),
            Self::InvalidValue { line } => write!(f, "line {line}: invalid value"),
        }
    }
}

/// Deadzone, window and stick used by the converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub deadzone: DeadzoneConfig,
    pub window: u32,
    pub stick: Stick,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            deadzone: DeadzoneConfig::default(),
            window: 8,
            stick: Stick::default(),
        }
    }
}

/// Settings parsed from a file, with the lines that were skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded {
    pub settings: Settings,
    pub errors: Vec<SettingsError>,
}

fn parse_u32(value: &str, max: u32) -> Option<u32> {
    value.parse::<u32>().ok().filter(|v| *v <= max)
}

impl Settings {
    /// Apply the lines of `contents` on top of `self`.
    pub fn parse(&self, contents: &[u8]) -> Loaded {
        let mut settings = *self;
        let mut errors = Vec::new();

        for (i, raw) in contents.split(|&b| b == b'\n').enumerate() {
            let line = i + 1;
            let Ok(text) = core::str::from_utf8(raw) else {
                errors.push(SettingsError::InvalidFormat { line });
                continue;
            };
            let text = text.split('#').next().unwrap_or("").trim();
            if text.is_empty() {
                continue;
            }
            let Some((key, value)) = text.split_once('=') else {
                errors.push(SettingsError::InvalidFormat { line });
                continue;
            };
            if let Err(e) = settings.set(key.trim(), value.trim(), line) {
                errors.push(e);
            }
        }

        Loaded { settings, errors }
    }

    fn set(&mut self, key: &str, value: &str, line: usize) -> Result<(), SettingsError> {
        let invalid = SettingsError::InvalidValue { line };
        match key {
            "inner_deadzone" => {
                self.deadzone.inner = parse_u32(value, MAX_DEFLECTION).ok_or(invalid)? as u8;
            },
            "outer_deadzone" => {
                self.deadzone.outer = parse_u32(value, MAX_DEFLECTION).ok_or(invalid)? as u8;
            },
            "window" => {
                self.window = parse_u32(value, MAX_WINDOW)
                    .filter(|w| *w >= 1)
                    .ok_or(invalid)?;
            },
            "stick" => {
                self.stick = Stick::from_name(value).ok_or(invalid)?;
            },
            _ => return Err(SettingsError::UnknownKey { line }),
        }
        Ok(())
    }
}
