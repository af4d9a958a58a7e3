//! Datatype registry service boundary and the built-in Metaschema datatypes.

use std::collections::HashMap;
use std::fmt;

use regex::Regex;
use thiserror::Error;

/// Errors raised by a datatype adapter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DatatypeError {
    /// The registry has no adapter for the name.
    #[error("unknown datatype: {0}")]
    UnknownType(String),

    /// The text is not in the lexical space of the datatype.
    #[error("'{text}' is not a valid {datatype}: {reason}")]
    Invalid {
        /// Datatype name.
        datatype: String,
        /// Offending text.
        text: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The value cannot be formatted as the datatype.
    #[error("cannot format {value} as {datatype}")]
    Format {
        /// Datatype name.
        datatype: String,
        /// Value that was rejected.
        value: String,
    },
}

/// A parsed scalar value.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Decimal value.
    Decimal(f64),
    /// Textual value (strings, tokens, identifiers, dates, URIs).
    String(String),
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::Bool(b) => write!(f, "{}", b),
            DataValue::Int(i) => write!(f, "{}", i),
            DataValue::Decimal(d) => write!(f, "{}", d),
            DataValue::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for DataValue {
    fn from(s: &str) -> Self {
        DataValue::String(s.to_string())
    }
}

impl From<i64> for DataValue {
    fn from(i: i64) -> Self {
        DataValue::Int(i)
    }
}

impl From<bool> for DataValue {
    fn from(b: bool) -> Self {
        DataValue::Bool(b)
    }
}

/// Name → parse/format adapters for scalar datatypes.
pub trait DatatypeRegistry: Sync {
    /// Whether the registry has an adapter for `datatype`.
    fn contains(&self, datatype: &str) -> bool;

    /// Parse text in the lexical space of `datatype`.
    fn parse(&self, datatype: &str, text: &str) -> Result<DataValue, DatatypeError>;

    /// Format a value as `datatype`.
    fn format(&self, datatype: &str, value: &DataValue) -> Result<String, DatatypeError>;
}

#[derive(Debug, Clone)]
enum Adapter {
    Text(Regex),
    Boolean,
    Integer { min: Option<i64> },
    Decimal,
}

const STRING_PATTERN: &str = r"^\S(.*\S)?$";
const TOKEN_PATTERN: &str = r"^(\p{L}|_)(\p{L}|\p{N}|[.\-_])*$";
const UUID_PATTERN: &str =
    r"^[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[45][0-9A-Fa-f]{3}-[89ABab][0-9A-Fa-f]{3}-[0-9A-Fa-f]{12}$";
const URI_PATTERN: &str = r"^[a-zA-Z][a-zA-Z0-9+\-.]+:\S+$";
const URI_REFERENCE_PATTERN: &str = r"^\S*$";
const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+$";
const DATE_PATTERN: &str = r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])(Z|[+-]\d{2}:\d{2})?$";
const DATE_TIME_PATTERN: &str = r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])T([01]\d|2[0-3]):[0-5]\d:[0-5]\d(\.\d+)?(Z|[+-]\d{2}:\d{2})?$";

/// The standard Metaschema datatypes.
///
/// Textual types are checked against their lexical patterns; numeric and
/// boolean types are parsed into typed values.
#[derive(Debug, Clone)]
pub struct BuiltinDatatypes {
    adapters: HashMap<&'static str, Adapter>,
}

impl BuiltinDatatypes {
    /// Create the registry with every built-in datatype.
    pub fn new() -> Self {
        let mut adapters = HashMap::new();
        for (name, pattern) in [
            ("string", STRING_PATTERN),
            ("token", TOKEN_PATTERN),
            ("ncname", TOKEN_PATTERN),
            ("uuid", UUID_PATTERN),
            ("uri", URI_PATTERN),
            ("uri-reference", URI_REFERENCE_PATTERN),
            ("email-address", EMAIL_PATTERN),
            ("date", DATE_PATTERN),
            ("date-time", DATE_TIME_PATTERN),
        ] {
            let regex = Regex::new(pattern).expect("built-in datatype pattern is valid");
            adapters.insert(name, Adapter::Text(regex));
        }
        adapters.insert("boolean", Adapter::Boolean);
        adapters.insert("integer", Adapter::Integer { min: None });
        adapters.insert("non-negative-integer", Adapter::Integer { min: Some(0) });
        adapters.insert("positive-integer", Adapter::Integer { min: Some(1) });
        adapters.insert("decimal", Adapter::Decimal);
        Self { adapters }
    }

    /// Names of every registered datatype, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.adapters.keys().copied().collect();
        names.sort_unstable();
        names
    }

    fn adapter(&self, datatype: &str) -> Result<&Adapter, DatatypeError> {
        self.adapters
            .get(datatype)
            .ok_or_else(|| DatatypeError::UnknownType(datatype.to_string()))
    }
}

impl Default for BuiltinDatatypes {
    fn default() -> Self {
        Self::new()
    }
}

impl DatatypeRegistry for BuiltinDatatypes {
    fn contains(&self, datatype: &str) -> bool {
        self.adapters.contains_key(datatype)
    }

    fn parse(&self, datatype: &str, text: &str) -> Result<DataValue, DatatypeError> {
        let invalid = |reason: &str| DatatypeError::Invalid {
            datatype: datatype.to_string(),
            text: text.to_string(),
            reason: reason.to_string(),
        };

        match self.adapter(datatype)? {
            Adapter::Text(regex) => {
                if regex.is_match(text) {
                    Ok(DataValue::String(text.to_string()))
                } else {
                    Err(invalid("does not match the lexical pattern"))
                }
            }
            Adapter::Boolean => match text {
                "true" | "1" => Ok(DataValue::Bool(true)),
                "false" | "0" => Ok(DataValue::Bool(false)),
                _ => Err(invalid("expected true, false, 1 or 0")),
            },
            Adapter::Integer { min } => {
                let value: i64 = text.parse().map_err(|_| invalid("not an integer"))?;
                match min {
                    Some(min) if value < *min => Err(invalid(&format!("must be at least {}", min))),
                    _ => Ok(DataValue::Int(value)),
                }
            }
            Adapter::Decimal => {
                let trimmed = text.strip_prefix(['+', '-']).unwrap_or(text);
                let well_formed = !trimmed.is_empty()
                    && trimmed.chars().all(|c| c.is_ascii_digit() || c == '.')
                    && trimmed.matches('.').count() <= 1
                    && trimmed != ".";
                if !well_formed {
                    return Err(invalid("not a decimal"));
                }
                text.parse::<f64>()
                    .map(DataValue::Decimal)
                    .map_err(|_| invalid("not a decimal"))
            }
        }
    }

    fn format(&self, datatype: &str, value: &DataValue) -> Result<String, DatatypeError> {
        let mismatch = || DatatypeError::Format {
            datatype: datatype.to_string(),
            value: value.to_string(),
        };

        let text = match (self.adapter(datatype)?, value) {
            (Adapter::Boolean, DataValue::Bool(b)) => b.to_string(),
            (Adapter::Integer { .. }, DataValue::Int(i)) => i.to_string(),
            (Adapter::Decimal, DataValue::Decimal(d)) => d.to_string(),
            (Adapter::Decimal, DataValue::Int(i)) => i.to_string(),
            (Adapter::Text(_), DataValue::String(s)) => s.clone(),
            _ => return Err(mismatch()),
        };
        // Formatted text must parse back under the same datatype.
        self.parse(datatype, &text).map_err(|_| mismatch())?;
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_textual_types() {
        let types = BuiltinDatatypes::new();

        assert!(types.parse("token", "ac-1").is_ok());
        assert!(types.parse("token", "1ac").is_err());
        assert!(types.parse("string", " padded").is_err());
        assert!(types.parse("uuid", "6f1c4e46-7bb6-4c0b-9f0e-2b2fbb6f3f5a").is_ok());
        assert!(types.parse("uuid", "not-a-uuid").is_err());
        assert!(types.parse("date", "2024-02-30").is_ok());
        assert!(types.parse("date", "2024-13-01").is_err());
        assert!(types.parse("date-time", "2024-01-01T12:30:00Z").is_ok());
        assert!(types.parse("email-address", "a@example.com").is_ok());
        assert!(types.parse("uri", "https://example.com/x").is_ok());
        assert!(types.parse("uri", "relative/path").is_err());
    }

    #[test]
    fn test_numeric_types() {
        let types = BuiltinDatatypes::new();

        assert_eq!(types.parse("integer", "-5").unwrap(), DataValue::Int(-5));
        assert!(types.parse("non-negative-integer", "-1").is_err());
        assert!(types.parse("non-negative-integer", "0").is_ok());
        assert!(types.parse("positive-integer", "0").is_err());
        assert_eq!(types.parse("decimal", "2.50").unwrap(), DataValue::Decimal(2.5));
        assert!(types.parse("decimal", "1e5").is_err());
        assert!(types.parse("decimal", "NaN").is_err());
    }

    #[test]
    fn test_boolean() {
        let types = BuiltinDatatypes::new();

        assert_eq!(types.parse("boolean", "1").unwrap(), DataValue::Bool(true));
        assert_eq!(types.parse("boolean", "false").unwrap(), DataValue::Bool(false));
        assert!(types.parse("boolean", "yes").is_err());
    }

    #[test]
    fn test_unknown_type() {
        let types = BuiltinDatatypes::new();

        assert!(!types.contains("markup-line"));
        assert_eq!(
            types.parse("markup-line", "x"),
            Err(DatatypeError::UnknownType("markup-line".to_string()))
        );
    }

    #[test]
    fn test_format() {
        let types = BuiltinDatatypes::new();

        assert_eq!(types.format("integer", &DataValue::Int(42)).unwrap(), "42");
        assert_eq!(types.format("boolean", &DataValue::Bool(true)).unwrap(), "true");
        assert!(types.format("positive-integer", &DataValue::Int(0)).is_err());
        assert!(types.format("integer", &DataValue::from("x")).is_err());
    }
}
