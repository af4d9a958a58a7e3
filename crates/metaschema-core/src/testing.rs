//! Minimal path evaluator for unit tests.
//!
//! Understands `/`-separated steps (`.`, `..`, `*`, `@*`, `@name`, `name`),
//! a leading `//name` descendant step, and boolean tests of the form
//! `path`, `not(path)`, `path = 'x'`, `path != 'x'`, `true()`, `false()`.
//! The expression `error()` always fails.

use crate::document::{DocumentTree, NodeId};
use crate::model::PathExpression;
use crate::path::{EvaluationError, PathEvaluator};

pub(crate) struct StepEvaluator;

fn descendants(tree: &dyn DocumentTree, node: NodeId, name: &str, out: &mut Vec<NodeId>) {
    for child in tree.children(node) {
        if tree.name(*child) == name {
            out.push(*child);
        }
        descendants(tree, *child, name, out);
    }
}

fn step(tree: &dyn DocumentTree, nodes: Vec<NodeId>, step: &str) -> Vec<NodeId> {
    let mut out = Vec::new();
    for node in nodes {
        match step {
            "." => out.push(node),
            ".." => out.extend(tree.parent(node)),
            "*" => out.extend_from_slice(tree.children(node)),
            "@*" => out.extend_from_slice(tree.flags(node)),
            _ => {
                if let Some(flag) = step.strip_prefix('@') {
                    out.extend(tree.flags(node).iter().filter(|f| tree.name(**f) == flag));
                } else {
                    out.extend(tree.children(node).iter().filter(|c| tree.name(**c) == step));
                }
            }
        }
    }
    out
}

fn select_str(
    tree: &dyn DocumentTree,
    context: NodeId,
    expr: &str,
) -> Result<Vec<NodeId>, EvaluationError> {
    let expr = expr.trim();
    if expr == "error()" {
        return Err(EvaluationError::new(&PathExpression::new(expr), "forced failure"));
    }
    let (mut nodes, rest) = match expr.strip_prefix("//") {
        Some(rest) => {
            let (name, rest) = rest.split_once('/').unwrap_or((rest, ""));
            let mut found = Vec::new();
            descendants(tree, context, name, &mut found);
            (found, rest)
        }
        None => (vec![context], expr),
    };
    for part in rest.split('/').filter(|p| !p.is_empty()) {
        nodes = step(tree, nodes, part);
    }
    Ok(nodes)
}

impl PathEvaluator for StepEvaluator {
    fn select(
        &self,
        tree: &dyn DocumentTree,
        context: NodeId,
        expr: &PathExpression,
    ) -> Result<Vec<NodeId>, EvaluationError> {
        select_str(tree, context, expr.as_str())
    }

    fn evaluate_boolean(
        &self,
        tree: &dyn DocumentTree,
        context: NodeId,
        expr: &PathExpression,
    ) -> Result<bool, EvaluationError> {
        let text = expr.as_str().trim();
        match text {
            "true()" => return Ok(true),
            "false()" => return Ok(false),
            _ => {}
        }
        if let Some(inner) = text.strip_prefix("not(").and_then(|t| t.strip_suffix(')')) {
            return Ok(select_str(tree, context, inner)?.is_empty());
        }
        for (op, negate) in [("!=", true), ("=", false)] {
            if let Some((path, literal)) = text.split_once(op) {
                let literal = literal.trim().trim_matches('\'');
                let values = select_str(tree, context, path)?;
                let any_equal = values
                    .iter()
                    .any(|n| tree.string_value(*n) == Some(literal));
                return Ok(any_equal != negate);
            }
        }
        Ok(!select_str(tree, context, text)?.is_empty())
    }
}
