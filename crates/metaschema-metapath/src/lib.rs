//! Metapath subset for Metaschema constraints
//!
//! This crate parses and evaluates the small XPath-like language used in
//! constraint targets, tests and message templates.
//!
//! # Syntax
//!
//! ## Paths
//!
//! ```text
//! .                       the context node
//! ..                      its parent
//! @id                     a flag
//! group/control           children, by name
//! *  @*                   any child, any flag
//! /catalog                from the document root
//! //control/@id           descendants at any depth
//! control[2]              second match within each parent
//! prop[@name = 'status']  filtered by a predicate
//! ```
//!
//! ## Expressions
//!
//! ```text
//! @id = 'ac-1'  count(part) >= 1  not(@href)
//! title and (prop or link)
//! starts-with(@href, '#')  matches(@id, '^[a-z]+-\d+$')
//! ```
//!
//! Comparisons are general: they hold when any pair of atomized values
//! satisfies the operator. Values compare as numbers when both sides parse
//! as numbers and as strings otherwise.
//!
//! # Usage
//!
//! ```rust
//! use metaschema_core::{Document, PathEvaluator, PathExpression};
//! use metaschema_metapath::MetapathEvaluator;
//!
//! let mut builder = Document::builder("catalog");
//! let root = builder.root();
//! let control = builder.assembly(root, "control");
//! builder.flag(control, "id", "ac-1");
//! let doc = builder.build();
//!
//! let evaluator = MetapathEvaluator::new();
//! let ids = evaluator
//!     .select(&doc, root, &PathExpression::new("//control/@id"))
//!     .unwrap();
//! assert_eq!(ids.len(), 1);
//! ```

pub mod ast;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod span;

// Re-export main types
pub use ast::{Axis, CompareOp, Expr, Function, NodeTest, PathExpr, Step};
pub use error::{ParseError, PathError};
pub use evaluator::{MetapathEvaluator, Value};
pub use lexer::{tokenize, SpannedToken, Token};
pub use span::{Span, Spanned};

/// Parse a source string into an expression tree.
///
/// # Example
///
/// ```rust
/// use metaschema_metapath::{parse, Expr};
///
/// let expr = parse("count(part) > 0").unwrap();
/// assert!(matches!(expr, Expr::Compare { .. }));
/// ```
pub fn parse(source: &str) -> Result<Expr, ParseError> {
    parser::parse(source)
}
