//! Finding severity levels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Severity of a constraint and of the findings it produces.
///
/// Levels are totally ordered: `Informational < Warning < Error < Critical`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Level {
    /// Informational note.
    Informational,
    /// Suspicious but tolerated content.
    Warning,
    /// Invalid content.
    #[default]
    Error,
    /// Invalid content that makes the document unusable.
    Critical,
}

impl Level {
    /// All levels in ascending order.
    pub const ALL: [Level; 4] = [
        Level::Informational,
        Level::Warning,
        Level::Error,
        Level::Critical,
    ];

    /// Canonical upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Informational => "INFORMATIONAL",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "informational" | "info" => Ok(Level::Informational),
            "warning" | "warn" => Ok(Level::Warning),
            "error" => Ok(Level::Error),
            "critical" => Ok(Level::Critical),
            _ => Err(ConfigError::UnknownLevel(s.to_string())),
        }
    }
}
