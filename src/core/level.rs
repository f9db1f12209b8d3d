//! Severity levels
//!
//! Levels are compared by *specificity*: a lower numeric severity is more
//! specific. `ERROR` is at least as specific as `WARN`, `DEBUG` is not.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum Level {
    Off,
    Fatal,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
    All,
}

impl Level {
    pub const VALUES: [Level; 8] = [
        Level::Off,
        Level::Fatal,
        Level::Error,
        Level::Warn,
        Level::Info,
        Level::Debug,
        Level::Trace,
        Level::All,
    ];

    /// Numeric severity; smaller is more specific.
    #[inline]
    pub const fn severity(self) -> i32 {
        match self {
            Level::Off => 0,
            Level::Fatal => 100,
            Level::Error => 200,
            Level::Warn => 300,
            Level::Info => 400,
            Level::Debug => 500,
            Level::Trace => 600,
            Level::All => i32::MAX,
        }
    }

    /// `true` if this level's severity is less than or equal to `other`'s.
    #[inline]
    pub const fn is_at_least_as_specific_as(self, other: Level) -> bool {
        self.severity() <= other.severity()
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            Level::Off => "OFF",
            Level::Fatal => "FATAL",
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
            Level::All => "ALL",
        }
    }

    #[cfg(feature = "console")]
    pub fn color_code(&self) -> colored::Color {
        use colored::Color::*;
        match self {
            Level::Trace | Level::All => BrightBlack,
            Level::Debug => Blue,
            Level::Info => Green,
            Level::Warn => Yellow,
            Level::Error => Red,
            Level::Fatal | Level::Off => BrightRed,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.to_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "OFF" => Ok(Level::Off),
            "FATAL" => Ok(Level::Fatal),
            "ERROR" => Ok(Level::Error),
            "WARN" | "WARNING" => Ok(Level::Warn),
            "INFO" => Ok(Level::Info),
            "DEBUG" => Ok(Level::Debug),
            "TRACE" => Ok(Level::Trace),
            "ALL" => Ok(Level::All),
            _ => Err(format!("Invalid log level: '{}'", s)),
        }
    }
}

impl TryFrom<String> for Level {
    type Error = String;

    fn try_from(value: String) -> Result<Self, String> {
        value.parse()
    }
}

impl From<Level> for String {
    fn from(level: Level) -> Self {
        level.to_str().to_string()
    }
}
