//! Constraint definitions attached to Metaschema definitions.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{Level, PathExpression, Pattern, QualifiedName, SourceRef};

/// How an allowed-values set may be extended by later contributions.
///
/// Ordered from most to least restrictive.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Extensibility {
    /// The enumeration is closed.
    None,
    /// Only the declaring module may add values.
    #[default]
    Model,
    /// Any importing module may add values.
    External,
}

/// One component of a composite key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct KeyField {
    /// Expression relative to the matched node; must select exactly one node.
    pub target: PathExpression,
    /// Extracts the key component from the node's value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<Pattern>,
    /// Free-form remarks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

impl KeyField {
    /// Create a key field selecting `target`.
    pub fn new(target: impl Into<PathExpression>) -> Self {
        Self {
            target: target.into(),
            pattern: None,
            remarks: None,
        }
    }

    /// Apply a pattern to the selected value.
    pub fn with_pattern(mut self, pattern: Pattern) -> Self {
        self.pattern = Some(pattern);
        self
    }
}

/// The rule-specific part of a constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "kebab-case")]
pub enum ConstraintKind {
    /// The value must be one of an enumerated set.
    AllowedValues {
        /// Permitted literals and their descriptions, in declaration order.
        values: IndexMap<String, String>,
        /// Accept values outside `values`.
        #[serde(default)]
        allow_other: bool,
        /// Who may extend `values`.
        #[serde(default)]
        extensibility: Extensibility,
    },
    /// The value must match a pattern and/or parse as a datatype.
    Matches {
        /// Whole-value regular expression.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<Pattern>,
        /// Datatype name resolved through the datatype registry.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        datatype: Option<String>,
    },
    /// A boolean test must hold for each matched node.
    Expect {
        /// Boolean expression evaluated with the matched node as context.
        test: PathExpression,
        /// Message template; `{ expr }` placeholders are evaluated.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Matched nodes must have distinct composite keys.
    Unique {
        /// Key fields in declaration order.
        key_fields: Vec<KeyField>,
    },
    /// Matched nodes are entered into a document-global named index.
    Index {
        /// Index name.
        name: String,
        /// Key fields in declaration order.
        key_fields: Vec<KeyField>,
    },
    /// Each matched node's key must be present in a named index.
    IndexHasKey {
        /// Name of the referenced index.
        index_name: String,
        /// Key fields in declaration order.
        key_fields: Vec<KeyField>,
    },
    /// The number of matched nodes per parent must fall within bounds.
    Cardinality {
        /// Lower bound; unchecked when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_occurs: Option<u32>,
        /// Upper bound; unbounded when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_occurs: Option<u32>,
    },
}

impl ConstraintKind {
    /// Short name of the rule kind.
    pub fn name(&self) -> &'static str {
        match self {
            ConstraintKind::AllowedValues { .. } => "allowed-values",
            ConstraintKind::Matches { .. } => "matches",
            ConstraintKind::Expect { .. } => "expect",
            ConstraintKind::Unique { .. } => "unique",
            ConstraintKind::Index { .. } => "index",
            ConstraintKind::IndexHasKey { .. } => "index-has-key",
            ConstraintKind::Cardinality { .. } => "cardinality",
        }
    }

    /// Whether this kind checks node values rather than document structure.
    pub fn is_value_kind(&self) -> bool {
        matches!(
            self,
            ConstraintKind::AllowedValues { .. }
                | ConstraintKind::Matches { .. }
                | ConstraintKind::Expect { .. }
        )
    }
}

/// A constraint definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Constraint {
    /// Stable identity for reporting and suppression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formal_name: Option<String>,
    /// Markup description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Severity of findings raised by this constraint.
    #[serde(default)]
    pub level: Level,
    /// Nodes the rule applies to, relative to the definition instance.
    #[serde(default)]
    pub target: PathExpression,
    /// Where the constraint was declared.
    #[serde(default)]
    pub source: SourceRef,
    /// Markup remarks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    /// Arbitrary annotations.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<QualifiedName, BTreeSet<String>>,
    /// Rule-specific part.
    #[serde(flatten)]
    pub kind: ConstraintKind,
}

impl Constraint {
    /// Create a constraint of the given kind on `target` with default metadata.
    pub fn new(target: impl Into<PathExpression>, kind: ConstraintKind) -> Self {
        Self {
            id: None,
            formal_name: None,
            description: None,
            level: Level::default(),
            target: target.into(),
            source: SourceRef::default(),
            remarks: None,
            properties: BTreeMap::new(),
            kind,
        }
    }

    /// Create an allowed-values constraint from `(value, description)` pairs.
    pub fn allowed_values<V, D>(
        target: impl Into<PathExpression>,
        values: impl IntoIterator<Item = (V, D)>,
    ) -> Self
    where
        V: Into<String>,
        D: Into<String>,
    {
        Self::new(
            target,
            ConstraintKind::AllowedValues {
                values: values
                    .into_iter()
                    .map(|(v, d)| (v.into(), d.into()))
                    .collect(),
                allow_other: false,
                extensibility: Extensibility::default(),
            },
        )
    }

    /// Create a matches constraint with a pattern.
    pub fn matches_pattern(target: impl Into<PathExpression>, pattern: Pattern) -> Self {
        Self::new(
            target,
            ConstraintKind::Matches {
                pattern: Some(pattern),
                datatype: None,
            },
        )
    }

    /// Create a matches constraint with a datatype.
    pub fn matches_datatype(
        target: impl Into<PathExpression>,
        datatype: impl Into<String>,
    ) -> Self {
        Self::new(
            target,
            ConstraintKind::Matches {
                pattern: None,
                datatype: Some(datatype.into()),
            },
        )
    }

    /// Create an expect constraint.
    pub fn expect(target: impl Into<PathExpression>, test: impl Into<PathExpression>) -> Self {
        Self::new(
            target,
            ConstraintKind::Expect {
                test: test.into(),
                message: None,
            },
        )
    }

    /// Create a unique constraint.
    pub fn unique(
        target: impl Into<PathExpression>,
        key_fields: impl IntoIterator<Item = KeyField>,
    ) -> Self {
        Self::new(
            target,
            ConstraintKind::Unique {
                key_fields: key_fields.into_iter().collect(),
            },
        )
    }

    /// Create an index constraint.
    pub fn index(
        name: impl Into<String>,
        target: impl Into<PathExpression>,
        key_fields: impl IntoIterator<Item = KeyField>,
    ) -> Self {
        Self::new(
            target,
            ConstraintKind::Index {
                name: name.into(),
                key_fields: key_fields.into_iter().collect(),
            },
        )
    }

    /// Create an index-has-key constraint.
    pub fn index_has_key(
        index_name: impl Into<String>,
        target: impl Into<PathExpression>,
        key_fields: impl IntoIterator<Item = KeyField>,
    ) -> Self {
        Self::new(
            target,
            ConstraintKind::IndexHasKey {
                index_name: index_name.into(),
                key_fields: key_fields.into_iter().collect(),
            },
        )
    }

    /// Create a cardinality constraint.
    pub fn cardinality(
        target: impl Into<PathExpression>,
        min_occurs: Option<u32>,
        max_occurs: Option<u32>,
    ) -> Self {
        Self::new(
            target,
            ConstraintKind::Cardinality {
                min_occurs,
                max_occurs,
            },
        )
    }

    /// Set the identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the severity level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set the source attribution.
    pub fn with_source(mut self, source: SourceRef) -> Self {
        self.source = source;
        self
    }

    /// Set the message template of an expect constraint. No-op for other kinds.
    pub fn with_message(mut self, template: impl Into<String>) -> Self {
        if let ConstraintKind::Expect { message, .. } = &mut self.kind {
            *message = Some(template.into());
        }
        self
    }

    /// Set `allow_other` on an allowed-values constraint. No-op for other kinds.
    pub fn with_allow_other(mut self, allow: bool) -> Self {
        if let ConstraintKind::AllowedValues { allow_other, .. } = &mut self.kind {
            *allow_other = allow;
        }
        self
    }

    /// Set the extensibility of an allowed-values constraint. No-op for other kinds.
    pub fn with_extensibility(mut self, ext: Extensibility) -> Self {
        if let ConstraintKind::AllowedValues { extensibility, .. } = &mut self.kind {
            *extensibility = ext;
        }
        self
    }

    /// Add a property value.
    pub fn with_property(mut self, name: QualifiedName, value: impl Into<String>) -> Self {
        self.properties.entry(name).or_default().insert(value.into());
        self
    }

    /// Short name of the rule kind.
    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    /// Whether this is a value constraint (allowed-values, matches, expect).
    pub fn is_value_constraint(&self) -> bool {
        self.kind.is_value_kind()
    }

    /// Key fields for key-based kinds.
    pub fn key_fields(&self) -> Option<&[KeyField]> {
        match &self.kind {
            ConstraintKind::Unique { key_fields }
            | ConstraintKind::Index { key_fields, .. }
            | ConstraintKind::IndexHasKey { key_fields, .. } => Some(key_fields),
            _ => None,
        }
    }

    /// Identity used in messages: the id when set, otherwise kind and target.
    pub fn display_id(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!("{}[{}]", self.kind_name(), self.target),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} constraint '{}'", self.kind_name(), self.display_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_values_constraint() {
        let constraint = Constraint::allowed_values("@status", [("draft", "Draft"), ("final", "Final")])
            .with_id("status-values")
            .with_allow_other(true);

        assert!(constraint.is_value_constraint());
        assert_eq!(constraint.display_id(), "status-values");
        if let ConstraintKind::AllowedValues {
            values,
            allow_other,
            extensibility,
        } = &constraint.kind
        {
            assert_eq!(values.keys().collect::<Vec<_>>(), ["draft", "final"]);
            assert!(allow_other);
            assert_eq!(*extensibility, Extensibility::Model);
        } else {
            panic!("Expected allowed-values constraint");
        }
    }

    #[test]
    fn test_index_constraint() {
        let constraint = Constraint::index("controls", "//control", [KeyField::new("@id")]);

        assert!(!constraint.is_value_constraint());
        assert_eq!(constraint.key_fields().map(|k| k.len()), Some(1));
        assert_eq!(constraint.display_id(), "index[//control]");
    }

    #[test]
    fn test_with_message_only_applies_to_expect() {
        let expect = Constraint::expect(".", "@a = 'x'").with_message("bad {@a}");
        assert!(matches!(
            expect.kind,
            ConstraintKind::Expect { message: Some(ref m), .. } if m == "bad {@a}"
        ));

        let unique = Constraint::unique(".", [KeyField::new("@id")]).with_message("ignored");
        assert!(matches!(unique.kind, ConstraintKind::Unique { .. }));
    }

    #[test]
    fn test_extensibility_order() {
        assert!(Extensibility::None < Extensibility::Model);
        assert!(Extensibility::Model < Extensibility::External);
    }

    #[test]
    fn test_deserialize_from_json() {
        let json = r##"{
            "id": "control-refs",
            "level": "WARNING",
            "target": "link/@href",
            "type": "index-has-key",
            "index-name": "controls",
            "key-fields": [{ "target": ".", "pattern": "#(.+)" }]
        }"##;
        let constraint: Constraint = serde_json::from_str(json).unwrap();

        assert_eq!(constraint.level, Level::Warning);
        assert_eq!(constraint.target.as_str(), "link/@href");
        if let ConstraintKind::IndexHasKey {
            index_name,
            key_fields,
        } = &constraint.kind
        {
            assert_eq!(index_name, "controls");
            assert_eq!(key_fields[0].pattern.as_ref().map(|p| p.as_str()), Some("#(.+)"));
        } else {
            panic!("Expected index-has-key constraint");
        }
    }

    #[test]
    fn test_deserialize_defaults() {
        let json = r#"{ "type": "cardinality", "min-occurs": 1 }"#;
        let constraint: Constraint = serde_json::from_str(json).unwrap();

        assert_eq!(constraint.level, Level::Error);
        assert!(constraint.target.is_context());
        assert_eq!(
            constraint.kind,
            ConstraintKind::Cardinality {
                min_occurs: Some(1),
                max_occurs: None
            }
        );
    }

    #[test]
    fn test_properties() {
        let constraint = Constraint::matches_datatype("@id", "token")
            .with_property(QualifiedName::local("tag"), "identifier")
            .with_property(QualifiedName::local("tag"), "required");

        let tags = &constraint.properties[&QualifiedName::local("tag")];
        assert_eq!(tags.len(), 2);

        let json = serde_json::to_string(&constraint).unwrap();
        let decoded: Constraint = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, constraint);
    }
}
