//! Definition identity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// The three structural kinds of a Metaschema definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionKind {
    /// Composite node with flags and a model of child nodes.
    Assembly,
    /// Scalar value with flags.
    Field,
    /// Attribute-like scalar.
    Flag,
}

impl DefinitionKind {
    /// Lower-case name used in definition references.
    pub fn as_str(&self) -> &'static str {
        match self {
            DefinitionKind::Assembly => "assembly",
            DefinitionKind::Field => "field",
            DefinitionKind::Flag => "flag",
        }
    }
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DefinitionKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "assembly" => Ok(DefinitionKind::Assembly),
            "field" => Ok(DefinitionKind::Field),
            "flag" => Ok(DefinitionKind::Flag),
            _ => Err(ConfigError::InvalidDefinitionRef(s.to_string())),
        }
    }
}

/// Identity of a definition: its kind and name, written `kind:name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct DefinitionRef {
    /// Structural kind.
    pub kind: DefinitionKind,
    /// Definition name.
    pub name: String,
}

impl DefinitionRef {
    /// Create a definition reference.
    pub fn new(kind: DefinitionKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Reference an assembly definition.
    pub fn assembly(name: impl Into<String>) -> Self {
        Self::new(DefinitionKind::Assembly, name)
    }

    /// Reference a field definition.
    pub fn field(name: impl Into<String>) -> Self {
        Self::new(DefinitionKind::Field, name)
    }

    /// Reference a flag definition.
    pub fn flag(name: impl Into<String>) -> Self {
        Self::new(DefinitionKind::Flag, name)
    }
}

impl fmt::Display for DefinitionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

impl FromStr for DefinitionRef {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, name) = s
            .split_once(':')
            .ok_or_else(|| ConfigError::InvalidDefinitionRef(s.to_string()))?;
        if name.is_empty() {
            return Err(ConfigError::InvalidDefinitionRef(s.to_string()));
        }
        let kind = kind
            .parse()
            .map_err(|_| ConfigError::InvalidDefinitionRef(s.to_string()))?;
        Ok(Self::new(kind, name))
    }
}

impl From<DefinitionRef> for String {
    fn from(def: DefinitionRef) -> Self {
        def.to_string()
    }
}

impl TryFrom<String> for DefinitionRef {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
