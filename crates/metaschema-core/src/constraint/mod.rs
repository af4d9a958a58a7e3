//! Constraint evaluation.
//!
//! This module turns a [`Schema`](crate::model::Schema) into findings for a
//! document:
//! - `aggregator`: merging of constraints contributed by several modules
//! - `key`: composite keys and key-field resolution
//! - `index`: the named index registry built in the first phase
//! - `validator`: the two-phase validation run

mod aggregator;
mod finding;
mod index;
mod key;
mod message;
mod validator;

pub use aggregator::ConstraintAggregator;
pub use finding::{Finding, FindingKind, ValidationReport};
pub use index::{IndexEntry, IndexRegistry, IndexRegistryBuilder, IndexTable, InsertOutcome};
pub use key::{CompositeKey, KeyResolutionError, KeyResolver};
pub use message::render_template;
pub use validator::{validate, ValidationPhase, Validator};
