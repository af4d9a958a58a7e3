//! Metaschema - constraint validation for Metaschema-based documents
//!
//! This crate bundles the constraint engine from `metaschema-core` with the
//! Metapath subset evaluator from `metaschema-metapath`.
//!
//! # Example
//!
//! ```rust
//! use metaschema::{Constraint, DefinitionRef, Document, Engine, KeyField, Schema};
//!
//! let schema = Schema::builder()
//!     .with_constraint(
//!         DefinitionRef::assembly("catalog"),
//!         Constraint::unique("group", [KeyField::new("@uuid")]),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let mut builder = Document::builder("catalog");
//! let root = builder.root();
//! for uuid in ["a1", "a1"] {
//!     let group = builder.assembly(root, "group");
//!     builder.flag(group, "uuid", uuid);
//! }
//! let document = builder.build();
//!
//! let engine = Engine::new(schema).unwrap();
//! let report = engine.validate(&document).unwrap();
//! assert_eq!(report.len(), 1);
//! ```

pub use metaschema_core::*;

#[cfg(feature = "metapath")]
pub use metaschema_metapath as metapath;

#[cfg(feature = "metapath")]
pub use metaschema_metapath::MetapathEvaluator;

#[cfg(feature = "metapath")]
mod engine {
    use metaschema_core::{
        BuiltinDatatypes, DocumentTree, Error, Schema, ValidationConfig, ValidationReport,
        Validator,
    };
    use metaschema_metapath::MetapathEvaluator;
    use tracing::debug;

    /// A schema paired with the bundled evaluator and datatype registry.
    ///
    /// Parsed expressions stay cached across runs.
    #[derive(Debug)]
    pub struct Engine {
        schema: Schema,
        evaluator: MetapathEvaluator,
        datatypes: BuiltinDatatypes,
        config: ValidationConfig,
    }

    impl Engine {
        /// Create an engine, rejecting schemas that name unknown datatypes.
        pub fn new(schema: Schema) -> Result<Self, Error> {
            let evaluator = MetapathEvaluator::new();
            let datatypes = BuiltinDatatypes::new();
            Validator::new(&schema, &evaluator, &datatypes)?;
            debug!(definitions = schema.len(), "Created engine");
            Ok(Self {
                schema,
                evaluator,
                datatypes,
                config: ValidationConfig::default(),
            })
        }

        /// Use a run configuration.
        pub fn with_config(mut self, config: ValidationConfig) -> Self {
            self.config = config;
            self
        }

        /// The aggregated schema.
        pub fn schema(&self) -> &Schema {
            &self.schema
        }

        /// The bundled evaluator.
        pub fn evaluator(&self) -> &MetapathEvaluator {
            &self.evaluator
        }

        /// Validate a document.
        pub fn validate(&self, tree: &dyn DocumentTree) -> Result<ValidationReport, Error> {
            let validator = Validator::new(&self.schema, &self.evaluator, &self.datatypes)?
                .with_config(self.config.clone());
            Ok(validator.validate(tree))
        }
    }
}

#[cfg(feature = "metapath")]
pub use engine::Engine;
