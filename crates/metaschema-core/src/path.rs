//! Path evaluator service boundary.

use thiserror::Error;

use crate::document::{DocumentTree, NodeId};
use crate::model::PathExpression;

/// Error raised by a path evaluator.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot evaluate '{expression}': {message}")]
pub struct EvaluationError {
    /// Expression that failed.
    pub expression: String,
    /// Evaluator message.
    pub message: String,
}

impl EvaluationError {
    /// Create an evaluation error for an expression.
    pub fn new(expression: &PathExpression, message: impl Into<String>) -> Self {
        Self {
            expression: expression.to_string(),
            message: message.into(),
        }
    }
}

/// Evaluates constraint targets and tests against a document tree.
///
/// Implementations must be free of side effects; the engine may call them
/// from several worker threads at once.
pub trait PathEvaluator: Sync {
    /// Select nodes relative to `context`, in document order.
    fn select(
        &self,
        tree: &dyn DocumentTree,
        context: NodeId,
        expr: &PathExpression,
    ) -> Result<Vec<NodeId>, EvaluationError>;

    /// Effective boolean value of `expr` with `context` as the context node.
    fn evaluate_boolean(
        &self,
        tree: &dyn DocumentTree,
        context: NodeId,
        expr: &PathExpression,
    ) -> Result<bool, EvaluationError>;

    /// String value of `expr`, used to render message templates.
    ///
    /// The default joins the string values of the selected nodes with a space.
    fn evaluate_string(
        &self,
        tree: &dyn DocumentTree,
        context: NodeId,
        expr: &PathExpression,
    ) -> Result<String, EvaluationError> {
        let nodes = self.select(tree, context, expr)?;
        Ok(nodes
            .into_iter()
            .filter_map(|n| tree.string_value(n))
            .collect::<Vec<_>>()
            .join(" "))
    }
}
