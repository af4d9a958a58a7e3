//! Per-definition constraint sets.

use super::{Constraint, ConstraintKind};

/// The aggregated constraints of one definition.
///
/// Constraints are partitioned into value constraints (allowed-values,
/// matches, expect) and model constraints (unique, index, index-has-key,
/// cardinality); each partition keeps source order, then declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintSet {
    value: Vec<Constraint>,
    model: Vec<Constraint>,
}

impl ConstraintSet {
    /// Create an empty constraint set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from constraints that are already aggregated.
    pub fn from_constraints(constraints: impl IntoIterator<Item = Constraint>) -> Self {
        let mut set = Self::new();
        for constraint in constraints {
            set.push(constraint);
        }
        set
    }

    pub(crate) fn push(&mut self, constraint: Constraint) {
        if constraint.is_value_constraint() {
            self.value.push(constraint);
        } else {
            self.model.push(constraint);
        }
    }

    /// Allowed-values, matches, and expect constraints.
    pub fn value_constraints(&self) -> &[Constraint] {
        &self.value
    }

    /// Unique, index, index-has-key, and cardinality constraints.
    pub fn model_constraints(&self) -> &[Constraint] {
        &self.model
    }

    /// All constraints, value constraints first.
    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.value.iter().chain(self.model.iter())
    }

    /// Number of constraints.
    pub fn len(&self) -> usize {
        self.value.len() + self.model.len()
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty() && self.model.is_empty()
    }

    /// Allowed-values constraints.
    pub fn allowed_values(&self) -> impl Iterator<Item = &Constraint> {
        self.value
            .iter()
            .filter(|c| matches!(c.kind, ConstraintKind::AllowedValues { .. }))
    }

    /// Matches constraints.
    pub fn matches(&self) -> impl Iterator<Item = &Constraint> {
        self.value
            .iter()
            .filter(|c| matches!(c.kind, ConstraintKind::Matches { .. }))
    }

    /// Expect constraints.
    pub fn expectations(&self) -> impl Iterator<Item = &Constraint> {
        self.value
            .iter()
            .filter(|c| matches!(c.kind, ConstraintKind::Expect { .. }))
    }

    /// Unique constraints.
    pub fn uniques(&self) -> impl Iterator<Item = &Constraint> {
        self.model
            .iter()
            .filter(|c| matches!(c.kind, ConstraintKind::Unique { .. }))
    }

    /// Index constraints.
    pub fn indexes(&self) -> impl Iterator<Item = &Constraint> {
        self.model
            .iter()
            .filter(|c| matches!(c.kind, ConstraintKind::Index { .. }))
    }

    /// Index-has-key constraints.
    pub fn index_has_keys(&self) -> impl Iterator<Item = &Constraint> {
        self.model
            .iter()
            .filter(|c| matches!(c.kind, ConstraintKind::IndexHasKey { .. }))
    }

    /// Cardinality constraints.
    pub fn cardinalities(&self) -> impl Iterator<Item = &Constraint> {
        self.model
            .iter()
            .filter(|c| matches!(c.kind, ConstraintKind::Cardinality { .. }))
    }

    /// Whether any constraint in the set runs during index building.
    pub fn has_indexes(&self) -> bool {
        self.indexes().next().is_some()
    }
}
