//! Evaluation of parsed expressions against a document tree.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use regex::Regex;
use tracing::debug;

use metaschema_core::{DocumentTree, EvaluationError, NodeId, PathEvaluator, PathExpression};

use crate::ast::{Axis, CompareOp, Expr, Function, PathExpr, Step};
use crate::error::{ParseError, PathError};
use crate::parser::parse;

/// A position in the tree: a node, or the document above the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Focus {
    Document,
    Node(NodeId),
}

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Nodes in document order.
    Nodes(Vec<NodeId>),
    /// A string.
    String(String),
    /// A number.
    Number(f64),
    /// A boolean.
    Boolean(bool),
}

impl Value {
    /// Effective boolean value.
    pub fn effective_boolean(&self) -> bool {
        match self {
            Value::Nodes(nodes) => !nodes.is_empty(),
            Value::String(s) => !s.is_empty(),
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Boolean(b) => *b,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Nodes(_) => "node sequence",
            Value::String(_) => "string",
            Value::Number(_) => "number",
            Value::Boolean(_) => "boolean",
        }
    }
}

/// One atomized item, used by comparisons.
#[derive(Debug, Clone, PartialEq)]
enum Atom {
    Str(String),
    Num(f64),
    Bool(bool),
}

impl Atom {
    fn as_number(&self) -> Option<f64> {
        match self {
            Atom::Num(n) => Some(*n),
            Atom::Str(s) => s.trim().parse().ok(),
            Atom::Bool(_) => None,
        }
    }

    fn compare(&self, other: &Atom, op: CompareOp) -> bool {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return a.partial_cmp(&b).is_some_and(|ordering| op.holds(ordering));
        }
        op.holds(self.to_string().cmp(&other.to_string()))
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Str(s) => f.write_str(s),
            Atom::Num(n) => f.write_str(&format_number(*n)),
            Atom::Bool(b) => write!(f, "{}", b),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Evaluator for the Metapath subset.
///
/// Parsed expressions and compiled `matches()` patterns are cached by their
/// text and shared between threads.
#[derive(Debug, Default)]
pub struct MetapathEvaluator {
    expressions: DashMap<String, Arc<Expr>>,
    regexes: DashMap<String, Arc<Regex>>,
}

impl MetapathEvaluator {
    /// Create an evaluator with empty caches.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an expression, reusing the cached AST when available.
    pub fn compile(&self, source: &str) -> Result<Arc<Expr>, ParseError> {
        if let Some(expr) = self.expressions.get(source) {
            return Ok(Arc::clone(expr.value()));
        }
        let expr = Arc::new(parse(source)?);
        debug!(expression = source, "Compiled expression");
        self.expressions
            .insert(source.to_string(), Arc::clone(&expr));
        Ok(expr)
    }

    /// Number of cached expressions.
    pub fn cached_expressions(&self) -> usize {
        self.expressions.len()
    }

    /// Evaluate `source` with `context` as the context node.
    pub fn evaluate(
        &self,
        tree: &dyn DocumentTree,
        context: NodeId,
        source: &str,
    ) -> Result<Value, PathError> {
        let expr = self.compile(source)?;
        let eval = Eval {
            evaluator: self,
            tree,
        };
        let value = eval.expr(&expr, Focus::Node(context))?;
        Ok(eval.publish(value))
    }

    fn regex(&self, pattern: &str) -> Result<Arc<Regex>, PathError> {
        if let Some(regex) = self.regexes.get(pattern) {
            return Ok(Arc::clone(regex.value()));
        }
        let regex = Regex::new(pattern).map_err(|e| PathError::InvalidRegex {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        let regex = Arc::new(regex);
        self.regexes.insert(pattern.to_string(), Arc::clone(&regex));
        Ok(regex)
    }
}

impl PathEvaluator for MetapathEvaluator {
    fn select(
        &self,
        tree: &dyn DocumentTree,
        context: NodeId,
        expr: &PathExpression,
    ) -> Result<Vec<NodeId>, EvaluationError> {
        match self.evaluate(tree, context, expr.as_str()) {
            Ok(Value::Nodes(nodes)) => Ok(nodes),
            Ok(other) => Err(EvaluationError::new(
                expr,
                PathError::NotNodes {
                    found: other.kind(),
                }
                .to_string(),
            )),
            Err(e) => Err(EvaluationError::new(expr, e.to_string())),
        }
    }

    fn evaluate_boolean(
        &self,
        tree: &dyn DocumentTree,
        context: NodeId,
        expr: &PathExpression,
    ) -> Result<bool, EvaluationError> {
        self.evaluate(tree, context, expr.as_str())
            .map(|value| value.effective_boolean())
            .map_err(|e| EvaluationError::new(expr, e.to_string()))
    }

    fn evaluate_string(
        &self,
        tree: &dyn DocumentTree,
        context: NodeId,
        expr: &PathExpression,
    ) -> Result<String, EvaluationError> {
        let value = self
            .evaluate(tree, context, expr.as_str())
            .map_err(|e| EvaluationError::new(expr, e.to_string()))?;
        Ok(match value {
            Value::Nodes(nodes) => nodes
                .into_iter()
                .filter_map(|n| tree.string_value(n))
                .collect::<Vec<_>>()
                .join(" "),
            Value::String(s) => s,
            Value::Number(n) => format_number(n),
            Value::Boolean(b) => b.to_string(),
        })
    }
}

/// Internal value: node sequences may still contain the document focus.
enum Item {
    Nodes(Vec<Focus>),
    Atomic(Value),
}

struct Eval<'e> {
    evaluator: &'e MetapathEvaluator,
    tree: &'e dyn DocumentTree,
}

impl Eval<'_> {
    fn publish(&self, item: Item) -> Value {
        match item {
            Item::Atomic(value) => value,
            Item::Nodes(focus) => {
                let root = self.tree.root();
                let mut seen = HashSet::new();
                Value::Nodes(
                    focus
                        .into_iter()
                        .map(|f| match f {
                            Focus::Document => root,
                            Focus::Node(n) => n,
                        })
                        .filter(|n| seen.insert(*n))
                        .collect(),
                )
            }
        }
    }

    fn expr(&self, expr: &Expr, context: Focus) -> Result<Item, PathError> {
        match expr {
            Expr::Path(path) => Ok(Item::Nodes(self.path(path, context)?)),
            Expr::String(s) => Ok(Item::Atomic(Value::String(s.clone()))),
            Expr::Number(n) => Ok(Item::Atomic(Value::Number(*n))),
            Expr::Compare { op, left, right } => {
                let left = self.atoms(self.expr(left, context)?);
                let right = self.atoms(self.expr(right, context)?);
                let holds = left
                    .iter()
                    .any(|l| right.iter().any(|r| l.compare(r, *op)));
                Ok(Item::Atomic(Value::Boolean(holds)))
            }
            Expr::And(operands) => {
                for operand in operands {
                    if !self.boolean(operand, context)? {
                        return Ok(Item::Atomic(Value::Boolean(false)));
                    }
                }
                Ok(Item::Atomic(Value::Boolean(true)))
            }
            Expr::Or(operands) => {
                for operand in operands {
                    if self.boolean(operand, context)? {
                        return Ok(Item::Atomic(Value::Boolean(true)));
                    }
                }
                Ok(Item::Atomic(Value::Boolean(false)))
            }
            Expr::Call { function, args, .. } => self.call(*function, args, context),
        }
    }

    fn boolean(&self, expr: &Expr, context: Focus) -> Result<bool, PathError> {
        let item = self.expr(expr, context)?;
        Ok(match item {
            Item::Nodes(nodes) => !nodes.is_empty(),
            Item::Atomic(value) => value.effective_boolean(),
        })
    }

    fn string(&self, expr: Option<&Expr>, context: Focus) -> Result<String, PathError> {
        let item = match expr {
            Some(expr) => self.expr(expr, context)?,
            None => Item::Nodes(vec![context]),
        };
        Ok(match item {
            Item::Nodes(nodes) => nodes
                .first()
                .map(|f| self.string_value(*f))
                .unwrap_or_default(),
            Item::Atomic(value) => match value {
                Value::String(s) => s,
                Value::Number(n) => format_number(n),
                Value::Boolean(b) => b.to_string(),
                Value::Nodes(_) => String::new(),
            },
        })
    }

    fn call(&self, function: Function, args: &[Expr], context: Focus) -> Result<Item, PathError> {
        let value = match function {
            Function::True => Value::Boolean(true),
            Function::False => Value::Boolean(false),
            Function::Not => Value::Boolean(!self.boolean(&args[0], context)?),
            Function::Count => match self.expr(&args[0], context)? {
                Item::Nodes(nodes) => Value::Number(nodes.len() as f64),
                Item::Atomic(_) => Value::Number(1.0),
            },
            Function::Exists | Function::Empty => {
                let present = match self.expr(&args[0], context)? {
                    Item::Nodes(nodes) => !nodes.is_empty(),
                    Item::Atomic(_) => true,
                };
                Value::Boolean(present == (function == Function::Exists))
            }
            Function::String => Value::String(self.string(args.first(), context)?),
            Function::StringLength => {
                Value::Number(self.string(args.first(), context)?.chars().count() as f64)
            }
            Function::StartsWith | Function::EndsWith | Function::Contains => {
                let text = self.string(args.first(), context)?;
                let part = self.string(args.get(1), context)?;
                Value::Boolean(match function {
                    Function::StartsWith => text.starts_with(&part),
                    Function::EndsWith => text.ends_with(&part),
                    _ => text.contains(&part),
                })
            }
            Function::Matches => {
                let text = self.string(args.first(), context)?;
                let pattern = self.string(args.get(1), context)?;
                Value::Boolean(self.evaluator.regex(&pattern)?.is_match(&text))
            }
        };
        Ok(Item::Atomic(value))
    }

    fn atoms(&self, item: Item) -> Vec<Atom> {
        match item {
            Item::Nodes(nodes) => nodes
                .into_iter()
                .map(|f| Atom::Str(self.string_value(f)))
                .collect(),
            Item::Atomic(Value::String(s)) => vec![Atom::Str(s)],
            Item::Atomic(Value::Number(n)) => vec![Atom::Num(n)],
            Item::Atomic(Value::Boolean(b)) => vec![Atom::Bool(b)],
            Item::Atomic(Value::Nodes(nodes)) => nodes
                .into_iter()
                .map(|n| Atom::Str(self.string_value(Focus::Node(n))))
                .collect(),
        }
    }

    // --- Paths ---

    fn path(&self, path: &PathExpr, context: Focus) -> Result<Vec<Focus>, PathError> {
        let mut current = if path.absolute {
            vec![Focus::Document]
        } else {
            vec![context]
        };
        for step in &path.steps {
            current = self.step(step, current)?;
        }
        Ok(current)
    }

    fn step(&self, step: &Step, input: Vec<Focus>) -> Result<Vec<Focus>, PathError> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();

        for focus in input {
            let mut group: Vec<Focus> = match step.axis {
                Axis::Child => self
                    .children(focus)
                    .into_iter()
                    .filter(|f| step.test.accepts(self.name(*f)))
                    .collect(),
                Axis::Flag => self
                    .flags(focus)
                    .into_iter()
                    .filter(|f| step.test.accepts(self.name(*f)))
                    .collect(),
                Axis::SelfNode => vec![focus],
                Axis::Parent => self.parent(focus).into_iter().collect(),
                Axis::DescendantOrSelf => {
                    let mut all = Vec::new();
                    self.descendants_or_self(focus, &mut all);
                    all
                }
            };

            for predicate in &step.predicates {
                group = self.filter(group, predicate)?;
            }
            for f in group {
                if seen.insert(f) {
                    out.push(f);
                }
            }
        }

        Ok(out)
    }

    fn filter(&self, group: Vec<Focus>, predicate: &Expr) -> Result<Vec<Focus>, PathError> {
        let mut kept = Vec::with_capacity(group.len());
        for (i, focus) in group.into_iter().enumerate() {
            let keep = match self.expr(predicate, focus)? {
                Item::Atomic(Value::Number(position)) => (i + 1) as f64 == position,
                Item::Atomic(value) => value.effective_boolean(),
                Item::Nodes(nodes) => !nodes.is_empty(),
            };
            if keep {
                kept.push(focus);
            }
        }
        Ok(kept)
    }

    fn children(&self, focus: Focus) -> Vec<Focus> {
        match focus {
            Focus::Document => vec![Focus::Node(self.tree.root())],
            Focus::Node(n) => self.tree.children(n).iter().map(|c| Focus::Node(*c)).collect(),
        }
    }

    fn flags(&self, focus: Focus) -> Vec<Focus> {
        match focus {
            Focus::Document => Vec::new(),
            Focus::Node(n) => self.tree.flags(n).iter().map(|f| Focus::Node(*f)).collect(),
        }
    }

    fn parent(&self, focus: Focus) -> Option<Focus> {
        match focus {
            Focus::Document => None,
            Focus::Node(n) => Some(self.tree.parent(n).map_or(Focus::Document, Focus::Node)),
        }
    }

    fn descendants_or_self(&self, focus: Focus, out: &mut Vec<Focus>) {
        out.push(focus);
        for child in self.children(focus) {
            self.descendants_or_self(child, out);
        }
    }

    fn name(&self, focus: Focus) -> &str {
        match focus {
            Focus::Document => "",
            Focus::Node(n) => self.tree.name(n),
        }
    }

    fn string_value(&self, focus: Focus) -> String {
        match focus {
            Focus::Document => String::new(),
            Focus::Node(n) => self.tree.string_value(n).unwrap_or_default().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metaschema_core::Document;
    use pretty_assertions::assert_eq;

    /// catalog
    ///   group @id=ac
    ///     control @id=ac-1 title="Policy" prop @name=status value="draft"
    ///     control @id=ac-2 title="Account Management"
    ///   back-matter
    ///     resource @uuid=r1
    fn catalog() -> (Document, Vec<NodeId>) {
        let mut builder = Document::builder("catalog");
        let root = builder.root();
        let group = builder.assembly(root, "group");
        builder.flag(group, "id", "ac");

        let first = builder.assembly(group, "control");
        builder.flag(first, "id", "ac-1");
        builder.field(first, "title", "Policy");
        let prop = builder.field(first, "prop", "draft");
        builder.flag(prop, "name", "status");

        let second = builder.assembly(group, "control");
        builder.flag(second, "id", "ac-2");
        builder.field(second, "title", "Account Management");

        let back_matter = builder.assembly(root, "back-matter");
        let resource = builder.assembly(back_matter, "resource");
        builder.flag(resource, "uuid", "r1");

        (builder.build(), vec![root, group, first, second, resource])
    }

    fn select(doc: &Document, context: NodeId, expr: &str) -> Vec<NodeId> {
        MetapathEvaluator::new()
            .select(doc, context, &PathExpression::new(expr))
            .unwrap()
    }

    fn boolean(doc: &Document, context: NodeId, expr: &str) -> bool {
        MetapathEvaluator::new()
            .evaluate_boolean(doc, context, &PathExpression::new(expr))
            .unwrap()
    }

    fn values(doc: &Document, nodes: &[NodeId]) -> Vec<String> {
        nodes
            .iter()
            .map(|n| doc.string_value(*n).unwrap_or("").to_string())
            .collect()
    }

    #[test]
    fn test_child_and_flag_steps() {
        let (doc, nodes) = catalog();
        let ids = select(&doc, nodes[0], "group/control/@id");
        assert_eq!(values(&doc, &ids), vec!["ac-1", "ac-2"]);

        let flags = select(&doc, nodes[2], "@*");
        assert_eq!(values(&doc, &flags), vec!["ac-1"]);
        assert_eq!(select(&doc, nodes[2], "*").len(), 2);
    }

    #[test]
    fn test_self_and_parent() {
        let (doc, nodes) = catalog();
        assert_eq!(select(&doc, nodes[2], "."), vec![nodes[2]]);
        assert_eq!(select(&doc, nodes[2], ".."), vec![nodes[1]]);
        assert_eq!(select(&doc, nodes[2], "../@id").len(), 1);
    }

    #[test]
    fn test_absolute_and_descendant_paths() {
        let (doc, nodes) = catalog();
        assert_eq!(select(&doc, nodes[4], "/catalog"), vec![nodes[0]]);
        assert!(select(&doc, nodes[4], "/group").is_empty());

        let controls = select(&doc, nodes[4], "//control");
        assert_eq!(controls, vec![nodes[2], nodes[3]]);

        let titles = select(&doc, nodes[0], "group//title");
        assert_eq!(values(&doc, &titles), vec!["Policy", "Account Management"]);

        let uuids = select(&doc, nodes[2], "//@uuid");
        assert_eq!(values(&doc, &uuids), vec!["r1"]);
    }

    #[test]
    fn test_predicates() {
        let (doc, nodes) = catalog();
        assert_eq!(select(&doc, nodes[1], "control[2]"), vec![nodes[3]]);
        assert_eq!(select(&doc, nodes[1], "control[@id = 'ac-1']"), vec![nodes[2]]);
        assert_eq!(select(&doc, nodes[1], "control[prop]"), vec![nodes[2]]);

        let status = select(&doc, nodes[2], "prop[@name = 'status']");
        assert_eq!(values(&doc, &status), vec!["draft"]);
    }

    #[test]
    fn test_comparisons() {
        let (doc, nodes) = catalog();
        assert!(boolean(&doc, nodes[1], "control/@id = 'ac-2'"));
        assert!(!boolean(&doc, nodes[1], "control/@id = 'ac-3'"));
        assert!(boolean(&doc, nodes[1], "count(control) = 2"));
        assert!(boolean(&doc, nodes[1], "count(control) >= 2.0"));
        assert!(boolean(&doc, nodes[1], "count(control) < 10"));
        // General comparison: some id differs from 'ac-1'.
        assert!(boolean(&doc, nodes[1], "control/@id != 'ac-1'"));
        assert!(boolean(&doc, nodes[1], "'b' > 'a'"));
    }

    #[test]
    fn test_logic_and_functions() {
        let (doc, nodes) = catalog();
        assert!(boolean(&doc, nodes[2], "title and @id"));
        assert!(boolean(&doc, nodes[3], "prop or title"));
        assert!(boolean(&doc, nodes[3], "not(prop)"));
        assert!(boolean(&doc, nodes[3], "empty(prop) and exists(title)"));
        assert!(boolean(&doc, nodes[2], "starts-with(@id, 'ac-')"));
        assert!(boolean(&doc, nodes[2], "ends-with(title, 'icy')"));
        assert!(boolean(&doc, nodes[3], "contains(title, 'Account')"));
        assert!(boolean(&doc, nodes[2], "matches(@id, '^[a-z]+-\\d+$')"));
        assert!(boolean(&doc, nodes[2], "string-length(@id) = 4"));
        assert!(boolean(&doc, nodes[2], "true() and not(false())"));
    }

    #[test]
    fn test_evaluate_string() {
        let (doc, nodes) = catalog();
        let evaluator = MetapathEvaluator::new();
        let text = |expr: &str| {
            evaluator
                .evaluate_string(&doc, nodes[1], &PathExpression::new(expr))
                .unwrap()
        };

        assert_eq!(text("control/@id"), "ac-1 ac-2");
        assert_eq!(text("count(control)"), "2");
        assert_eq!(text("string(@id)"), "ac");
    }

    #[test]
    fn test_select_requires_nodes() {
        let (doc, nodes) = catalog();
        let err = MetapathEvaluator::new()
            .select(&doc, nodes[0], &PathExpression::new("count(group)"))
            .unwrap_err();
        assert!(err.message.contains("not a node sequence"));
    }

    #[test]
    fn test_errors_become_evaluation_errors() {
        let (doc, nodes) = catalog();
        let evaluator = MetapathEvaluator::new();

        let err = evaluator
            .evaluate_boolean(&doc, nodes[0], &PathExpression::new("@id = "))
            .unwrap_err();
        assert_eq!(err.expression, "@id = ");
        assert!(err.message.starts_with("parse error"));

        let err = evaluator
            .evaluate_boolean(&doc, nodes[2], &PathExpression::new("matches(@id, '(')"))
            .unwrap_err();
        assert!(err.message.contains("invalid regular expression"));
    }

    #[test]
    fn test_expression_cache() {
        let (doc, nodes) = catalog();
        let evaluator = MetapathEvaluator::new();
        for _ in 0..3 {
            evaluator
                .select(&doc, nodes[0], &PathExpression::new("//control"))
                .unwrap();
        }
        evaluator
            .select(&doc, nodes[0], &PathExpression::new("group"))
            .unwrap();
        assert_eq!(evaluator.cached_expressions(), 2);
    }
}
