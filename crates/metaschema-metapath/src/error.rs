//! Error types for parsing and evaluation.

use std::fmt;

use thiserror::Error;

use crate::span::{line_col, Span};

/// Error during lexing or parsing.
#[derive(Debug, Clone, PartialEq, Error)]
pub struct ParseError {
    /// The error message.
    pub message: String,
    /// Source span where the error occurred.
    pub span: Span,
    /// Optional hint for fixing the error.
    pub hint: Option<String>,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.message, self.span.start)
    }
}

impl ParseError {
    /// Create a parse error.
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            hint: None,
        }
    }

    /// Add a hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Render the error under the offending line, with a caret.
    pub fn format_with_source(&self, source: &str) -> String {
        let (line, col) = line_col(source, self.span.start);
        let mut out = format!("error: {}\n  --> {}:{}\n", self.message, line, col);

        if let Some(text) = source.lines().nth(line - 1) {
            out.push_str(&format!("   |\n{:3}| {}\n   | ", line, text));
            out.push_str(&" ".repeat(col - 1));
            let width = self.span.len().clamp(1, text.len().saturating_sub(col - 1).max(1));
            out.push_str(&"^".repeat(width));
            out.push('\n');
        }

        if let Some(hint) = &self.hint {
            out.push_str(&format!("   = hint: {}\n", hint));
        }
        out
    }
}

/// Error while evaluating a parsed expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PathError {
    /// The expression does not parse.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// A `matches()` pattern is not a valid regular expression.
    #[error("invalid regular expression '{pattern}': {reason}")]
    InvalidRegex {
        /// Pattern text.
        pattern: String,
        /// Compiler message.
        reason: String,
    },

    /// A path was required but the expression yields an atomic value.
    #[error("expression yields a {found}, not a node sequence")]
    NotNodes {
        /// Kind of value produced.
        found: &'static str,
    },
}
