//! Schema - the aggregated constraints of every definition.

use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::debug;

use super::{Constraint, ConstraintKind, ConstraintSet, DefinitionRef, SourceRef};
use crate::constraint::ConstraintAggregator;
use crate::error::ConfigError;

/// Definition → aggregated constraint set.
///
/// Built once by [`SchemaBuilder::build`]; read-only and shareable across
/// validation runs afterwards.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    definitions: IndexMap<DefinitionRef, ConstraintSet>,
}

impl Schema {
    /// Start building a schema.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Get the constraint set for a definition.
    pub fn get(&self, definition: &DefinitionRef) -> Option<&ConstraintSet> {
        self.definitions.get(definition)
    }

    /// Iterate over definitions and their constraint sets, in registration order.
    pub fn definitions(&self) -> impl Iterator<Item = (&DefinitionRef, &ConstraintSet)> {
        self.definitions.iter()
    }

    /// All index declarations with their owning definition.
    pub fn index_declarations(&self) -> impl Iterator<Item = (&DefinitionRef, &Constraint)> {
        self.definitions
            .iter()
            .flat_map(|(def, set)| set.indexes().map(move |c| (def, c)))
    }

    /// Whether any definition declares an index.
    pub fn has_indexes(&self) -> bool {
        self.definitions.values().any(|set| set.has_indexes())
    }

    /// Total number of constraints across all definitions.
    pub fn constraint_count(&self) -> usize {
        self.definitions.values().map(|s| s.len()).sum()
    }

    /// Number of definitions with at least one constraint.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Check if the schema has no constrained definitions.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Collects constraint contributions per definition and aggregates them.
///
/// Contributions must be added in import order: the base module first,
/// then each importing module.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    contributions: IndexMap<DefinitionRef, Vec<Constraint>>,
}

impl SchemaBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Contribute a constraint to a definition. The constraint keeps its own source.
    pub fn contribute(&mut self, definition: DefinitionRef, constraint: Constraint) -> &mut Self {
        self.contributions
            .entry(definition)
            .or_default()
            .push(constraint);
        self
    }

    /// Contribute a constraint declared by the module `source`.
    ///
    /// A location or line already on the constraint's own source is kept.
    pub fn contribute_from(
        &mut self,
        definition: DefinitionRef,
        source: &SourceRef,
        constraint: Constraint,
    ) -> &mut Self {
        let attributed = constraint.source.clone().within(source);
        self.contribute(definition, constraint.with_source(attributed))
    }

    /// Builder-style variant of [`contribute`](Self::contribute).
    pub fn with_constraint(mut self, definition: DefinitionRef, constraint: Constraint) -> Self {
        self.contribute(definition, constraint);
        self
    }

    /// Aggregate every definition's contributions and check schema-wide invariants.
    pub fn build(self) -> Result<Schema, ConfigError> {
        let mut definitions = IndexMap::with_capacity(self.contributions.len());

        for (definition, constraints) in self.contributions {
            let mut aggregator = ConstraintAggregator::new();
            for constraint in constraints {
                aggregator.add(constraint)?;
            }
            let set = aggregator.finish();
            debug!(definition = %definition, constraints = set.len(), "Aggregated constraint set");
            definitions.insert(definition, set);
        }

        let schema = Schema { definitions };
        check_index_names(&schema)?;
        Ok(schema)
    }
}

/// Index names must be unique across the whole schema.
fn check_index_names(schema: &Schema) -> Result<(), ConfigError> {
    let mut declared: HashMap<&str, &SourceRef> = HashMap::new();
    for (_, constraint) in schema.index_declarations() {
        if let ConstraintKind::Index { name, .. } = &constraint.kind {
            if let Some(first) = declared.insert(name.as_str(), &constraint.source) {
                return Err(ConfigError::DuplicateIndexName {
                    name: name.clone(),
                    first: first.clone(),
                    second: constraint.source.clone(),
                });
            }
        }
    }
    Ok(())
}
