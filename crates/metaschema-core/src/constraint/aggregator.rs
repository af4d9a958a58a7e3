//! Merging of constraints contributed by several schema modules.
//!
//! Allowed-values constraints on the same target are merged into one
//! enumeration under the base constraint's extensibility policy. Every other
//! kind accumulates: overlapping rules are independent and all evaluated.

use std::collections::HashMap;

use tracing::debug;

use crate::error::ConfigError;
use crate::model::{Constraint, ConstraintKind, ConstraintSet, Extensibility, PathExpression};

/// Combines the constraints of one definition, in import order.
#[derive(Debug, Default)]
pub struct ConstraintAggregator {
    constraints: Vec<Constraint>,
    allowed_by_target: HashMap<PathExpression, usize>,
}

impl ConstraintAggregator {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the next contribution.
    ///
    /// Contributions must arrive base module first, then importing modules,
    /// each in declaration order.
    pub fn add(&mut self, constraint: Constraint) -> Result<(), ConfigError> {
        if !matches!(constraint.kind, ConstraintKind::AllowedValues { .. }) {
            self.constraints.push(constraint);
            return Ok(());
        }

        match self.allowed_by_target.get(&constraint.target) {
            Some(&position) => self.merge_allowed_values(position, constraint),
            None => {
                self.allowed_by_target
                    .insert(constraint.target.clone(), self.constraints.len());
                self.constraints.push(constraint);
                Ok(())
            }
        }
    }

    /// Add several contributions in order.
    pub fn add_all(
        &mut self,
        constraints: impl IntoIterator<Item = Constraint>,
    ) -> Result<(), ConfigError> {
        for constraint in constraints {
            self.add(constraint)?;
        }
        Ok(())
    }

    fn merge_allowed_values(
        &mut self,
        position: usize,
        incoming: Constraint,
    ) -> Result<(), ConfigError> {
        let existing = &mut self.constraints[position];
        let unmerged = match (&mut existing.kind, incoming.kind) {
            (
                ConstraintKind::AllowedValues {
                    values,
                    allow_other,
                    extensibility,
                },
                ConstraintKind::AllowedValues {
                    values: new_values,
                    allow_other: new_allow_other,
                    extensibility: new_extensibility,
                },
            ) => {
                match *extensibility {
                    Extensibility::None => {
                        return Err(ConfigError::ClosedEnumeration {
                            target: incoming.target,
                            source_ref: incoming.source,
                        });
                    }
                    Extensibility::Model if existing.source.module != incoming.source.module => {
                        return Err(ConfigError::ExternalExtension {
                            target: incoming.target,
                            base_module: existing.source.module.clone(),
                            module: incoming.source.module,
                        });
                    }
                    Extensibility::Model | Extensibility::External => {}
                }

                // Validate the whole contribution before touching the merged set.
                for (value, description) in &new_values {
                    if let Some(current) = values.get(value) {
                        if current != description {
                            return Err(ConfigError::AllowedValueRedefined {
                                target: incoming.target,
                                value: value.clone(),
                                source_ref: incoming.source,
                            });
                        }
                    }
                }

                let before = values.len();
                for (value, description) in new_values {
                    values.entry(value).or_insert(description);
                }
                *allow_other |= new_allow_other;
                *extensibility = (*extensibility).min(new_extensibility);

                debug!(
                    target = %existing.target,
                    module = %incoming.source.module,
                    added = values.len() - before,
                    "Merged allowed-values extension"
                );
                return Ok(());
            }
            (_, kind) => kind,
        };

        // Nothing to merge with; keep the contribution as an independent rule.
        self.constraints.push(Constraint {
            kind: unmerged,
            ..incoming
        });
        Ok(())
    }

    /// Finish aggregation.
    pub fn finish(self) -> ConstraintSet {
        ConstraintSet::from_constraints(self.constraints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{KeyField, SourceRef};

    fn allowed(module: &str, values: &[(&str, &str)], ext: Extensibility) -> Constraint {
        Constraint::allowed_values("@rel", values.iter().copied())
            .with_extensibility(ext)
            .with_source(SourceRef::module(module))
    }

    fn merged_values(set: &ConstraintSet) -> Vec<String> {
        match &set.value_constraints()[0].kind {
            ConstraintKind::AllowedValues { values, .. } => values.keys().cloned().collect(),
            _ => panic!("Expected allowed-values constraint"),
        }
    }

    #[test]
    fn test_closed_enumeration_rejects_extension() {
        let mut aggregator = ConstraintAggregator::new();
        aggregator
            .add(allowed("base", &[("a", "A")], Extensibility::None))
            .unwrap();

        let result = aggregator.add(allowed("base", &[("b", "B")], Extensibility::None));
        assert!(matches!(result, Err(ConfigError::ClosedEnumeration { .. })));
    }

    #[test]
    fn test_model_extension_same_module() {
        let mut aggregator = ConstraintAggregator::new();
        aggregator
            .add(allowed("base", &[("a", "A")], Extensibility::Model))
            .unwrap();
        aggregator
            .add(allowed("base", &[("a", "A"), ("b", "B")], Extensibility::Model))
            .unwrap();

        let set = aggregator.finish();
        assert_eq!(set.len(), 1);
        assert_eq!(merged_values(&set), ["a", "b"]);
    }

    #[test]
    fn test_model_extension_other_module_rejected() {
        let mut aggregator = ConstraintAggregator::new();
        aggregator
            .add(allowed("base", &[("a", "A")], Extensibility::Model))
            .unwrap();

        let result = aggregator.add(allowed("ext", &[("b", "B")], Extensibility::Model));
        match result {
            Err(ConfigError::ExternalExtension {
                base_module,
                module,
                ..
            }) => {
                assert_eq!(base_module, "base");
                assert_eq!(module, "ext");
            }
            other => panic!("Expected ExternalExtension, got {:?}", other),
        }
    }

    #[test]
    fn test_redefinition_rejected() {
        let mut aggregator = ConstraintAggregator::new();
        aggregator
            .add(allowed("base", &[("a", "A")], Extensibility::External))
            .unwrap();

        let result = aggregator.add(allowed("ext", &[("a", "Something else")], Extensibility::External));
        assert!(matches!(
            result,
            Err(ConfigError::AllowedValueRedefined { ref value, .. }) if value == "a"
        ));
    }

    #[test]
    fn test_external_extension_is_union() {
        let mut aggregator = ConstraintAggregator::new();
        aggregator
            .add(allowed("base", &[("a", "A"), ("b", "B")], Extensibility::External))
            .unwrap();
        aggregator
            .add(allowed("ext", &[("b", "B"), ("c", "C")], Extensibility::External))
            .unwrap();

        let set = aggregator.finish();
        assert_eq!(merged_values(&set), ["a", "b", "c"]);
        assert_eq!(set.value_constraints()[0].source.module, "base");
    }

    #[test]
    fn test_extension_can_close_but_not_reopen() {
        let mut aggregator = ConstraintAggregator::new();
        aggregator
            .add(allowed("base", &[("a", "A")], Extensibility::External))
            .unwrap();
        aggregator
            .add(allowed("ext", &[("b", "B")], Extensibility::None))
            .unwrap();

        let result = aggregator.add(allowed("other", &[("c", "C")], Extensibility::External));
        assert!(matches!(result, Err(ConfigError::ClosedEnumeration { .. })));
    }

    #[test]
    fn test_allow_other_is_sticky() {
        let mut aggregator = ConstraintAggregator::new();
        aggregator
            .add(allowed("base", &[("a", "A")], Extensibility::External))
            .unwrap();
        aggregator
            .add(allowed("ext", &[("b", "B")], Extensibility::External).with_allow_other(true))
            .unwrap();

        let set = aggregator.finish();
        assert!(matches!(
            set.value_constraints()[0].kind,
            ConstraintKind::AllowedValues { allow_other: true, .. }
        ));
    }

    #[test]
    fn test_different_targets_not_merged() {
        let mut aggregator = ConstraintAggregator::new();
        aggregator
            .add(allowed("base", &[("a", "A")], Extensibility::None))
            .unwrap();
        aggregator
            .add(
                Constraint::allowed_values("@type", [("x", "X")])
                    .with_source(SourceRef::module("base")),
            )
            .unwrap();

        assert_eq!(aggregator.finish().allowed_values().count(), 2);
    }

    #[test]
    fn test_other_kinds_accumulate_in_order() {
        let mut aggregator = ConstraintAggregator::new();
        aggregator
            .add_all([
                Constraint::matches_datatype("@id", "token").with_id("m1"),
                Constraint::unique("part", [KeyField::new("@id")]).with_id("u1"),
                Constraint::matches_datatype("@id", "token").with_id("m2"),
                Constraint::unique("part", [KeyField::new("@id")]).with_id("u2"),
            ])
            .unwrap();

        let set = aggregator.finish();
        let ids: Vec<_> = set.iter().map(|c| c.display_id()).collect();
        assert_eq!(ids, ["m1", "m2", "u1", "u2"]);
    }

    #[test]
    fn test_merge_with_other_kind_keeps_both() {
        let mut aggregator = ConstraintAggregator::new();
        aggregator
            .add(allowed("base", &[("a", "")], Extensibility::External))
            .unwrap();
        aggregator
            .merge_allowed_values(0, Constraint::matches_datatype("@rel", "token").with_id("m1"))
            .unwrap();

        let set = aggregator.finish();
        assert_eq!(set.len(), 2);
        assert_eq!(set.allowed_values().count(), 1);
    }
}
