//! Compiled regular expressions carried by constraints.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConfigError;

/// A regular expression compiled once when the constraint is loaded.
///
/// Two compilations are kept: an anchored one for whole-value matching and
/// an unanchored one for substring extraction.
#[derive(Clone)]
pub struct Pattern {
    source: String,
    full: Regex,
    search: Regex,
}

impl Pattern {
    /// Compile a pattern.
    pub fn new(source: impl Into<String>) -> Result<Self, ConfigError> {
        let source = source.into();
        let invalid = |e: regex::Error| ConfigError::InvalidPattern {
            pattern: source.clone(),
            reason: e.to_string(),
        };
        let full = Regex::new(&format!("^(?:{})$", source)).map_err(invalid)?;
        let search = Regex::new(&source).map_err(invalid)?;
        Ok(Self {
            source,
            full,
            search,
        })
    }

    /// Source text of the pattern.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the whole value matches the pattern.
    pub fn matches_whole(&self, value: &str) -> bool {
        self.full.is_match(value)
    }

    /// Whether the pattern defines at least one capture group.
    pub fn has_capture_group(&self) -> bool {
        self.search.captures_len() > 1
    }

    /// Extract the key component from a value.
    ///
    /// Returns the first capture group when the pattern defines one,
    /// otherwise the whole match. `None` when the pattern does not occur.
    pub fn extract<'v>(&self, value: &'v str) -> Option<&'v str> {
        let captures = self.search.captures(value)?;
        if self.has_capture_group() {
            captures.get(1).map(|m| m.as_str())
        } else {
            captures.get(0).map(|m| m.as_str())
        }
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Pattern::new(source).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_value_matching() {
        let pattern = Pattern::new("[a-z]+").unwrap();
        assert!(pattern.matches_whole("abc"));
        assert!(!pattern.matches_whole("abc1"));
        assert!(!pattern.matches_whole("1abc"));
    }

    #[test]
    fn test_alternation_is_fully_anchored() {
        let pattern = Pattern::new("a|b").unwrap();
        assert!(pattern.matches_whole("a"));
        assert!(!pattern.matches_whole("ab"));
    }

    #[test]
    fn test_extract_capture_group() {
        let pattern = Pattern::new("#(.+)").unwrap();
        assert!(pattern.has_capture_group());
        assert_eq!(pattern.extract("#ac-1"), Some("ac-1"));
        assert_eq!(pattern.extract("ac-1"), None);
    }

    #[test]
    fn test_extract_whole_match() {
        let pattern = Pattern::new("[0-9]+").unwrap();
        assert!(!pattern.has_capture_group());
        assert_eq!(pattern.extract("rev-42-final"), Some("42"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = Pattern::new("(unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn test_deserialize_compiles() {
        let pattern: Pattern = serde_json::from_str("\"^c[0-9]$\"").unwrap();
        assert!(pattern.matches_whole("c1"));
        assert!(serde_json::from_str::<Pattern>("\"[\"").is_err());
    }
}
