//! Constraint-set and document file loading.
//!
//! A constraint-set file lists modules in import order:
//!
//! ```json
//! { "modules": [
//!     { "name": "oscal-catalog", "location": "catalog_metaschema.xml",
//!       "constraints": [
//!         { "definition": "assembly:catalog", "type": "index",
//!           "name": "controls", "target": "//control",
//!           "key-fields": [ { "target": "@id" } ] } ] } ] }
//! ```

use std::path::Path;

use metaschema_core::{Constraint, DefinitionRef, Document, Schema, SourceRef};
use serde::Deserialize;
use tracing::debug;

use crate::error::CliError;

/// Top-level constraint-set file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaFile {
    /// Modules, base module first.
    pub modules: Vec<ModuleSpec>,
}

/// One module's contributions.
#[derive(Debug, Deserialize)]
pub struct ModuleSpec {
    /// Module name, used for source attribution and extension checks.
    pub name: String,
    /// Where the module was loaded from.
    #[serde(default)]
    pub location: Option<String>,
    /// Contributed constraints.
    #[serde(default)]
    pub constraints: Vec<Contribution>,
}

/// A constraint together with the definition it applies to.
#[derive(Debug, Deserialize)]
pub struct Contribution {
    /// Owning definition, e.g. `assembly:catalog`.
    pub definition: DefinitionRef,
    /// The constraint itself.
    #[serde(flatten)]
    pub constraint: Constraint,
}

impl SchemaFile {
    /// Parse a constraint-set file from JSON text.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Aggregate every module's contributions into a schema.
    pub fn into_schema(self) -> Result<Schema, CliError> {
        let mut builder = Schema::builder();
        for module in self.modules {
            let mut source = SourceRef::module(&module.name);
            if let Some(location) = &module.location {
                source = source.with_location(location);
            }
            debug!(module = %module.name, constraints = module.constraints.len(), "Loading module");
            for contribution in module.constraints {
                builder.contribute_from(contribution.definition, &source, contribution.constraint);
            }
        }
        Ok(builder.build()?)
    }
}

fn read(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load and aggregate a constraint-set file.
pub fn load_schema(path: &Path) -> Result<Schema, CliError> {
    let text = read(path)?;
    let file = SchemaFile::from_json(&text).map_err(|source| CliError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    file.into_schema()
}

/// Load a JSON document description.
pub fn load_document(path: &Path) -> Result<Document, CliError> {
    let text = read(path)?;
    Ok(Document::from_json(&text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use metaschema_core::{ConstraintKind, DocumentTree, Level};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SCHEMA: &str = r#"{
        "modules": [
            { "name": "base", "location": "base.xml", "constraints": [
                { "definition": "flag:status", "type": "allowed-values",
                  "values": { "draft": "", "final": "" }, "extensibility": "external" }
            ] },
            { "name": "profile", "constraints": [
                { "definition": "flag:status", "id": "status-ext", "level": "WARNING",
                  "type": "allowed-values", "values": { "retired": "" } },
                { "definition": "assembly:catalog", "type": "cardinality",
                  "target": "group", "min-occurs": 1 },
                { "definition": "assembly:group", "type": "cardinality",
                  "target": "control", "min-occurs": 1, "source": { "line": 12 } }
            ] }
        ]
    }"#;

    fn temp_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_schema_aggregates_modules() {
        let file = temp_file(SCHEMA);
        let schema = load_schema(file.path()).unwrap();

        assert_eq!(schema.len(), 3);
        let status = schema.get(&DefinitionRef::flag("status")).unwrap();
        let merged: Vec<_> = status.allowed_values().collect();
        assert_eq!(merged.len(), 1);
        if let ConstraintKind::AllowedValues { values, .. } = &merged[0].kind {
            let literals: Vec<&str> = values.keys().map(|v| v.as_str()).collect();
            assert_eq!(literals, vec!["draft", "final", "retired"]);
        } else {
            panic!("Expected allowed-values constraint");
        }
    }

    #[test]
    fn test_source_attribution() {
        let schema = SchemaFile::from_json(SCHEMA).unwrap().into_schema().unwrap();
        let catalog = schema.get(&DefinitionRef::assembly("catalog")).unwrap();
        let cardinality = catalog.cardinalities().next().unwrap();

        assert_eq!(cardinality.source.module, "profile");
        assert_eq!(cardinality.source.location, None);
        assert_eq!(cardinality.level, Level::Error);
    }

    #[test]
    fn test_constraint_line_survives_module_attribution() {
        let schema = SchemaFile::from_json(SCHEMA).unwrap().into_schema().unwrap();
        let group = schema.get(&DefinitionRef::assembly("group")).unwrap();
        let cardinality = group.cardinalities().next().unwrap();

        assert_eq!(cardinality.source.module, "profile");
        assert_eq!(cardinality.source.line, Some(12));
    }

    #[test]
    fn test_invalid_definition_ref() {
        let json = r#"{ "modules": [ { "name": "m", "constraints": [
            { "definition": "catalog", "type": "cardinality" } ] } ] }"#;
        assert!(SchemaFile::from_json(json).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = load_schema(Path::new("/nonexistent/schema.json")).unwrap_err();
        assert!(matches!(err, CliError::Io { .. }));
    }

    #[test]
    fn test_load_document() {
        let file = temp_file(
            r#"{ "kind": "assembly", "name": "catalog",
                 "flags": { "uuid": "u1" },
                 "children": [ { "kind": "field", "name": "title", "value": "Demo" } ] }"#,
        );
        let doc = load_document(file.path()).unwrap();
        assert_eq!(doc.name(doc.root()), "catalog");
        assert_eq!(doc.children(doc.root()).len(), 1);
    }
}
