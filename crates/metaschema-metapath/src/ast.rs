//! Abstract syntax tree for the Metapath subset.

use crate::span::{Span, Spanned};

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A location path.
    Path(PathExpr),
    /// A string literal.
    String(String),
    /// A numeric literal.
    Number(f64),
    /// A general comparison.
    Compare {
        /// Operator.
        op: CompareOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Conjunction of two or more operands.
    And(Vec<Expr>),
    /// Disjunction of two or more operands.
    Or(Vec<Expr>),
    /// A call to a built-in function.
    Call {
        /// The function.
        function: Function,
        /// Arguments in order.
        args: Vec<Expr>,
        /// Span of the whole call.
        span: Span,
    },
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// Apply the operator to an ordering.
    pub fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            CompareOp::Eq => ordering == Equal,
            CompareOp::Ne => ordering != Equal,
            CompareOp::Lt => ordering == Less,
            CompareOp::Le => ordering != Greater,
            CompareOp::Gt => ordering == Greater,
            CompareOp::Ge => ordering != Less,
        }
    }
}

/// Built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Not,
    True,
    False,
    Count,
    Exists,
    Empty,
    String,
    StringLength,
    StartsWith,
    EndsWith,
    Contains,
    Matches,
}

impl Function {
    /// Look up a function by name.
    pub fn from_name(name: &str) -> Option<Self> {
        let function = match name {
            "not" => Function::Not,
            "true" => Function::True,
            "false" => Function::False,
            "count" => Function::Count,
            "exists" => Function::Exists,
            "empty" => Function::Empty,
            "string" => Function::String,
            "string-length" => Function::StringLength,
            "starts-with" => Function::StartsWith,
            "ends-with" => Function::EndsWith,
            "contains" => Function::Contains,
            "matches" => Function::Matches,
            _ => return None,
        };
        Some(function)
    }

    /// Function name as written.
    pub fn name(&self) -> &'static str {
        match self {
            Function::Not => "not",
            Function::True => "true",
            Function::False => "false",
            Function::Count => "count",
            Function::Exists => "exists",
            Function::Empty => "empty",
            Function::String => "string",
            Function::StringLength => "string-length",
            Function::StartsWith => "starts-with",
            Function::EndsWith => "ends-with",
            Function::Contains => "contains",
            Function::Matches => "matches",
        }
    }

    /// Accepted argument counts, inclusive.
    pub fn arity(&self) -> (usize, usize) {
        match self {
            Function::True | Function::False => (0, 0),
            Function::Not | Function::Count | Function::Exists | Function::Empty => (1, 1),
            Function::String | Function::StringLength => (0, 1),
            Function::StartsWith | Function::EndsWith | Function::Contains | Function::Matches => {
                (2, 2)
            }
        }
    }
}

/// A location path: optional root anchor followed by steps.
#[derive(Debug, Clone, PartialEq)]
pub struct PathExpr {
    /// Starts at the document root.
    pub absolute: bool,
    /// Steps in order.
    pub steps: Vec<Step>,
    /// Span of the whole path.
    pub span: Span,
}

/// One step of a location path.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Direction of the step.
    pub axis: Axis,
    /// Which nodes along the axis are selected.
    pub test: NodeTest,
    /// Filters applied in order.
    pub predicates: Vec<Expr>,
    /// Span of the step, predicates included.
    pub span: Span,
}

/// Step axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// `name`, `*`
    Child,
    /// `@name`, `@*`
    Flag,
    /// `.`
    SelfNode,
    /// `..`
    Parent,
    /// The implicit step introduced by `//`.
    DescendantOrSelf,
}

/// Node test of a step.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeTest {
    /// Any node on the axis.
    Any,
    /// Nodes with this name.
    Name(Spanned<String>),
}

impl NodeTest {
    /// Whether a node named `name` passes the test.
    pub fn accepts(&self, name: &str) -> bool {
        match self {
            NodeTest::Any => true,
            NodeTest::Name(expected) => expected.value == name,
        }
    }
}

impl Step {
    /// The implicit `descendant-or-self` step.
    pub fn descendant_or_self(span: Span) -> Self {
        Self {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::Any,
            predicates: Vec::new(),
            span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_function_table() {
        assert_eq!(Function::from_name("string-length"), Some(Function::StringLength));
        assert_eq!(Function::from_name("upper-case"), None);
        assert_eq!(Function::Contains.arity(), (2, 2));
        assert_eq!(Function::from_name(Function::Matches.name()), Some(Function::Matches));
    }

    #[test]
    fn test_compare_op() {
        assert!(CompareOp::Le.holds(Ordering::Equal));
        assert!(CompareOp::Ne.holds(Ordering::Less));
        assert!(!CompareOp::Gt.holds(Ordering::Equal));
    }

    #[test]
    fn test_node_test() {
        let named = NodeTest::Name(Spanned::new("id".to_string(), Span::new(1, 3)));
        assert!(named.accepts("id"));
        assert!(!named.accepts("uuid"));
        assert!(NodeTest::Any.accepts("anything"));
    }
}
