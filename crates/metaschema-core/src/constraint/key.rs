//! Composite keys and key-field resolution.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::FindingKind;
use crate::document::{DocumentTree, NodeId};
use crate::model::{KeyField, PathExpression};
use crate::path::{EvaluationError, PathEvaluator};

/// Ordered tuple of key components, one per key field.
///
/// Equality is component-wise; field order is part of the key's identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CompositeKey(Vec<String>);

impl CompositeKey {
    /// Create a key from its components.
    pub fn new(components: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(components.into_iter().map(Into::into).collect())
    }

    /// Key components in key-field order.
    pub fn components(&self) -> &[String] {
        &self.0
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if the key has no components.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(", "))
    }
}

/// Why a key could not be resolved for a node.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KeyResolutionError {
    /// The key field target selected no node.
    #[error("key field {field} ('{target}') selected no node")]
    Unresolved {
        /// Position of the key field (0-based).
        field: usize,
        /// Key field target.
        target: PathExpression,
    },

    /// The key field target selected a node without a value.
    #[error("key field {field} ('{target}') selected a node without a value")]
    NullValue {
        /// Position of the key field (0-based).
        field: usize,
        /// Key field target.
        target: PathExpression,
    },

    /// The key field target selected several nodes.
    #[error("key field {field} ('{target}') selected {count} nodes, expected exactly one")]
    Ambiguous {
        /// Position of the key field (0-based).
        field: usize,
        /// Key field target.
        target: PathExpression,
        /// Number of selected nodes.
        count: usize,
    },

    /// The key field pattern did not occur in the value.
    #[error("key field {field} value '{value}' does not match pattern '{pattern}'")]
    PatternMismatch {
        /// Position of the key field (0-based).
        field: usize,
        /// Pattern source.
        pattern: String,
        /// Value that did not match.
        value: String,
    },

    /// The evaluator failed on the key field target.
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

impl KeyResolutionError {
    /// Finding kind used to report this error.
    pub fn finding_kind(&self) -> FindingKind {
        match self {
            KeyResolutionError::Unresolved { .. } | KeyResolutionError::NullValue { .. } => {
                FindingKind::KeyFieldUnresolved
            }
            KeyResolutionError::Ambiguous { .. } => FindingKind::KeyFieldAmbiguous,
            KeyResolutionError::PatternMismatch { .. } => FindingKind::KeyFieldPatternMismatch,
            KeyResolutionError::Evaluation(_) => FindingKind::EvaluationFailed,
        }
    }
}

/// Resolves key fields against nodes of one document.
#[derive(Clone, Copy)]
pub struct KeyResolver<'a> {
    tree: &'a dyn DocumentTree,
    evaluator: &'a dyn PathEvaluator,
}

impl<'a> KeyResolver<'a> {
    /// Create a resolver for a document.
    pub fn new(tree: &'a dyn DocumentTree, evaluator: &'a dyn PathEvaluator) -> Self {
        Self { tree, evaluator }
    }

    /// Resolve the composite key of `node`.
    ///
    /// Every key field must select exactly one node with a value; the first
    /// field that does not aborts resolution.
    pub fn resolve(
        &self,
        node: NodeId,
        key_fields: &[KeyField],
    ) -> Result<CompositeKey, KeyResolutionError> {
        let mut components = Vec::with_capacity(key_fields.len());

        for (field, key_field) in key_fields.iter().enumerate() {
            let selected = self.evaluator.select(self.tree, node, &key_field.target)?;
            let target_node = match selected.as_slice() {
                [single] => *single,
                [] => {
                    return Err(KeyResolutionError::Unresolved {
                        field,
                        target: key_field.target.clone(),
                    })
                }
                many => {
                    return Err(KeyResolutionError::Ambiguous {
                        field,
                        target: key_field.target.clone(),
                        count: many.len(),
                    })
                }
            };

            let value = self.tree.string_value(target_node).ok_or_else(|| {
                KeyResolutionError::NullValue {
                    field,
                    target: key_field.target.clone(),
                }
            })?;

            let component = match &key_field.pattern {
                Some(pattern) => pattern.extract(value).ok_or_else(|| {
                    KeyResolutionError::PatternMismatch {
                        field,
                        pattern: pattern.as_str().to_string(),
                        value: value.to_string(),
                    }
                })?,
                None => value,
            };
            components.push(component.to_string());
        }

        Ok(CompositeKey(components))
    }
}
