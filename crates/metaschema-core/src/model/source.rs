//! Source attribution and property names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Where a constraint was declared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    /// Module that declared the constraint.
    #[serde(default)]
    pub module: String,
    /// File or URI of the module source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Line within `location`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl SourceRef {
    /// Create a source reference for a module.
    pub fn module(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            location: None,
            line: None,
        }
    }

    /// Set the file location.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the line number.
    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }

    /// Attribute this source to `module`.
    ///
    /// The module name always comes from `module`; a location or line set
    /// here is kept.
    pub fn within(self, module: &SourceRef) -> Self {
        Self {
            module: module.module.clone(),
            location: self.location.or_else(|| module.location.clone()),
            line: self.line.or(module.line),
        }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let module = if self.module.is_empty() {
            "<anonymous>"
        } else {
            &self.module
        };
        write!(f, "module '{}'", module)?;
        match (&self.location, self.line) {
            (Some(location), Some(line)) => write!(f, " ({}:{})", location, line),
            (Some(location), None) => write!(f, " ({})", location),
            (None, Some(line)) => write!(f, " (line {})", line),
            (None, None) => Ok(()),
        }
    }
}

/// A namespace-qualified property name.
///
/// Written in Clark notation, `{namespace}name`, or as a bare name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct QualifiedName {
    /// Namespace URI, if any.
    pub namespace: Option<String>,
    /// Local name.
    pub name: String,
}

impl QualifiedName {
    /// Create an unqualified name.
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// Create a namespaced name.
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{}}}{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl FromStr for QualifiedName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidQualifiedName(s.to_string());
        match s.strip_prefix('{') {
            Some(rest) => {
                let (ns, name) = rest.split_once('}').ok_or_else(invalid)?;
                if name.is_empty() {
                    return Err(invalid());
                }
                Ok(Self::namespaced(ns, name))
            }
            None if s.is_empty() || s.contains('}') => Err(invalid()),
            None => Ok(Self::local(s)),
        }
    }
}

impl From<QualifiedName> for String {
    fn from(name: QualifiedName) -> Self {
        name.to_string()
    }
}

impl TryFrom<String> for QualifiedName {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
