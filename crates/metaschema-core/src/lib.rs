//! Metaschema Core - constraint model and validation engine.
//!
//! This crate holds the constraint data model, the aggregation of
//! constraints contributed by several schema modules, and the two-phase
//! validator that checks a document tree against a [`Schema`]. Path
//! evaluation and datatype parsing are consumed through the
//! [`PathEvaluator`] and [`DatatypeRegistry`] traits.

pub mod config;
pub mod constraint;
pub mod datatype;
pub mod document;
pub mod error;
pub mod model;
pub mod path;

#[cfg(test)]
mod testing;

pub use config::ValidationConfig;
pub use constraint::{
    validate, CompositeKey, ConstraintAggregator, Finding, FindingKind, IndexRegistry,
    KeyResolutionError, KeyResolver, ValidationPhase, ValidationReport, Validator,
};
pub use datatype::{BuiltinDatatypes, DataValue, DatatypeError, DatatypeRegistry};
pub use document::{Document, DocumentBuilder, DocumentTree, NodeId, NodeSpec};
pub use error::{ConfigError, Error};
pub use model::{
    Constraint, ConstraintKind, ConstraintSet, DefinitionKind, DefinitionRef, Extensibility,
    KeyField, Level, PathExpression, Pattern, QualifiedName, Schema, SchemaBuilder, SourceRef,
};
pub use path::{EvaluationError, PathEvaluator};
