//! Constraint model for Metaschema definitions.
//!
//! The model holds immutable descriptions of every constraint kind, the
//! per-definition constraint sets they are aggregated into, and the schema
//! that maps definitions to those sets.

mod constraint;
mod constraint_set;
mod definition;
mod level;
mod path;
mod pattern;
mod schema;
mod source;

pub use constraint::{Constraint, ConstraintKind, Extensibility, KeyField};
pub use constraint_set::ConstraintSet;
pub use definition::{DefinitionKind, DefinitionRef};
pub use level::Level;
pub use path::PathExpression;
pub use pattern::Pattern;
pub use schema::{Schema, SchemaBuilder};
pub use source::{QualifiedName, SourceRef};
