//! Path expressions used as constraint targets and tests.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An unevaluated path expression.
///
/// The engine never interprets the text; it is handed to the
/// [`PathEvaluator`](crate::path::PathEvaluator) together with a context node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathExpression(String);

impl PathExpression {
    /// The expression selecting the context node itself.
    pub const CONTEXT: &'static str = ".";

    /// Create a path expression from its source text.
    pub fn new(expr: impl Into<String>) -> Self {
        Self(expr.into())
    }

    /// The context-item expression `.`.
    pub fn context() -> Self {
        Self(Self::CONTEXT.to_string())
    }

    /// Source text of the expression.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this expression selects only the context node.
    pub fn is_context(&self) -> bool {
        self.0.trim() == Self::CONTEXT
    }
}

impl Default for PathExpression {
    fn default() -> Self {
        Self::context()
    }
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PathExpression {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PathExpression {
    fn from(s: String) -> Self {
        Self(s)
    }
}
