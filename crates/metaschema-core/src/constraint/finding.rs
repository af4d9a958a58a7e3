//! Validation findings and the report that collects them.

use std::fmt;

use serde::Serialize;

use crate::document::NodeId;
use crate::model::{Constraint, Level, SourceRef};

/// What a finding reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingKind {
    /// A value is outside an allowed-values set.
    ValueNotAllowed,
    /// A value does not match a pattern.
    PatternMismatch,
    /// A value does not parse as the required datatype.
    DatatypeMismatch,
    /// An expect test evaluated to false.
    ExpectationFailed,
    /// Two nodes share a key under a unique constraint.
    DuplicateKey,
    /// Two nodes share a key within a named index.
    DuplicateIndexKey,
    /// A key is missing from the referenced index.
    DanglingReference,
    /// Fewer occurrences than `min_occurs`.
    CardinalityBelowMinimum,
    /// More occurrences than `max_occurs`.
    CardinalityAboveMaximum,
    /// A key field selected no node, or a node without a value.
    KeyFieldUnresolved,
    /// A key field selected several nodes.
    KeyFieldAmbiguous,
    /// A key field pattern did not match.
    KeyFieldPatternMismatch,
    /// An index-has-key constraint references an undeclared index.
    MissingIndex,
    /// The path evaluator raised an error.
    EvaluationFailed,
}

impl FindingKind {
    /// Kebab-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingKind::ValueNotAllowed => "value-not-allowed",
            FindingKind::PatternMismatch => "pattern-mismatch",
            FindingKind::DatatypeMismatch => "datatype-mismatch",
            FindingKind::ExpectationFailed => "expectation-failed",
            FindingKind::DuplicateKey => "duplicate-key",
            FindingKind::DuplicateIndexKey => "duplicate-index-key",
            FindingKind::DanglingReference => "dangling-reference",
            FindingKind::CardinalityBelowMinimum => "cardinality-below-minimum",
            FindingKind::CardinalityAboveMaximum => "cardinality-above-maximum",
            FindingKind::KeyFieldUnresolved => "key-field-unresolved",
            FindingKind::KeyFieldAmbiguous => "key-field-ambiguous",
            FindingKind::KeyFieldPatternMismatch => "key-field-pattern-mismatch",
            FindingKind::MissingIndex => "missing-index",
            FindingKind::EvaluationFailed => "evaluation-failed",
        }
    }

    /// Whether the finding reports a resolution problem rather than a rule violation.
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            FindingKind::KeyFieldUnresolved
                | FindingKind::KeyFieldAmbiguous
                | FindingKind::KeyFieldPatternMismatch
                | FindingKind::MissingIndex
                | FindingKind::EvaluationFailed
        )
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One validation result. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    /// What was found.
    pub kind: FindingKind,
    /// Severity.
    pub level: Level,
    /// Identifier of the constraint that raised the finding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint_id: Option<String>,
    /// Node the finding is about.
    pub node: NodeId,
    /// Other nodes involved, e.g. the first holder of a duplicated key.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<NodeId>,
    /// Human-readable description.
    pub message: String,
    /// Where the constraint was declared.
    pub source: SourceRef,
}

impl Finding {
    /// Create a finding raised by `constraint` at the constraint's level.
    pub fn violation(
        kind: FindingKind,
        constraint: &Constraint,
        node: NodeId,
        message: impl Into<String>,
    ) -> Self {
        Self::new(kind, constraint.level, constraint, node, message)
    }

    /// Create a resolution-error finding at ERROR level.
    pub fn resolution(
        kind: FindingKind,
        constraint: &Constraint,
        node: NodeId,
        message: impl Into<String>,
    ) -> Self {
        Self::new(kind, Level::Error, constraint, node, message)
    }

    /// Create a finding at an explicit level.
    pub fn new(
        kind: FindingKind,
        level: Level,
        constraint: &Constraint,
        node: NodeId,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            level,
            constraint_id: constraint.id.clone(),
            node,
            related: Vec::new(),
            message: message.into(),
            source: constraint.source.clone(),
        }
    }

    /// Attach related nodes.
    pub fn with_related(mut self, related: impl IntoIterator<Item = NodeId>) -> Self {
        self.related.extend(related);
        self
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.level, self.kind, self.message)
    }
}

/// The outcome of one validation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    /// Findings in document order, phase-1 findings first.
    pub findings: Vec<Finding>,
    /// Whether dispatch stopped early because the finding budget was reached.
    pub truncated: bool,
}

impl ValidationReport {
    /// Whether the run produced no findings at all.
    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    /// Number of findings.
    pub fn len(&self) -> usize {
        self.findings.len()
    }

    /// Whether no finding reaches `level`.
    pub fn passes_at(&self, level: Level) -> bool {
        self.count_at_or_above(level) == 0
    }

    /// Number of findings at or above `level`.
    pub fn count_at_or_above(&self, level: Level) -> usize {
        self.findings.iter().filter(|f| f.level >= level).count()
    }

    /// Highest level among the findings.
    pub fn highest_level(&self) -> Option<Level> {
        self.findings.iter().map(|f| f.level).max()
    }

    /// Findings of one kind.
    pub fn of_kind(&self, kind: FindingKind) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.kind == kind)
    }

    /// Consume the report, returning the findings.
    pub fn into_findings(self) -> Vec<Finding> {
        self.findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::KeyField;

    #[test]
    fn test_finding_levels() {
        let constraint = Constraint::unique("part", [KeyField::new("@id")])
            .with_id("unique-parts")
            .with_level(Level::Warning);

        let violation = Finding::violation(FindingKind::DuplicateKey, &constraint, NodeId(3), "dup");
        assert_eq!(violation.level, Level::Warning);
        assert_eq!(violation.constraint_id.as_deref(), Some("unique-parts"));

        let resolution =
            Finding::resolution(FindingKind::KeyFieldUnresolved, &constraint, NodeId(3), "none");
        assert_eq!(resolution.level, Level::Error);
        assert!(resolution.kind.is_resolution_error());
    }

    #[test]
    fn test_report_summary() {
        let constraint = Constraint::matches_datatype(".", "token").with_level(Level::Warning);
        let report = ValidationReport {
            findings: vec![
                Finding::violation(FindingKind::DatatypeMismatch, &constraint, NodeId(1), "a"),
                Finding::resolution(FindingKind::EvaluationFailed, &constraint, NodeId(2), "b"),
            ],
            truncated: false,
        };

        assert_eq!(report.highest_level(), Some(Level::Error));
        assert_eq!(report.count_at_or_above(Level::Warning), 2);
        assert!(!report.passes_at(Level::Error));
        assert!(report.passes_at(Level::Critical));
        assert_eq!(report.of_kind(FindingKind::DatatypeMismatch).count(), 1);
    }

    #[test]
    fn test_serialize_finding() {
        let constraint = Constraint::expect(".", "@id").with_id("has-id");
        let finding = Finding::violation(FindingKind::ExpectationFailed, &constraint, NodeId(7), "missing id")
            .with_related([NodeId(2)]);

        let json = serde_json::to_value(&finding).unwrap();
        assert_eq!(json["kind"], "expectation-failed");
        assert_eq!(json["level"], "ERROR");
        assert_eq!(json["node"], 7);
        assert_eq!(json["related"][0], 2);
    }
}
