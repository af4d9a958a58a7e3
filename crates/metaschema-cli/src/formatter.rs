//! Output formatters for validation reports.

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use metaschema_core::{DocumentTree, Finding, Level, Schema, SourceRef, ValidationReport};
use serde::Serialize;

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Trait for formatting output.
pub trait Formatter {
    /// Format the findings of a run against `tree`.
    fn format_report(&self, report: &ValidationReport, tree: &dyn DocumentTree, fail_level: Level)
        -> String;

    /// Format a summary of a loaded schema.
    fn format_schema(&self, schema: &Schema) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// A finding with its node handles replaced by readable paths.
#[derive(Debug, Serialize)]
struct FindingRow<'a> {
    level: Level,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    constraint_id: Option<&'a str>,
    path: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    related: Vec<String>,
    message: &'a str,
    source: &'a SourceRef,
}

impl<'a> FindingRow<'a> {
    fn new(finding: &'a Finding, tree: &dyn DocumentTree) -> Self {
        Self {
            level: finding.level,
            kind: finding.kind.as_str(),
            constraint_id: finding.constraint_id.as_deref(),
            path: tree.display_path(finding.node),
            related: finding
                .related
                .iter()
                .map(|n| tree.display_path(*n))
                .collect(),
            message: &finding.message,
            source: &finding.source,
        }
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_report(
        &self,
        report: &ValidationReport,
        tree: &dyn DocumentTree,
        fail_level: Level,
    ) -> String {
        if report.is_empty() {
            return "No findings".to_string();
        }

        let mut table = Table::new();
        table.set_header(vec!["Level", "Kind", "Constraint", "Path", "Message", "Source"]);

        for finding in &report.findings {
            let row = FindingRow::new(finding, tree);
            let mut path = row.path;
            for related in &row.related {
                path.push_str(&format!("\n(see {})", related));
            }
            table.add_row(vec![
                Cell::new(row.level),
                Cell::new(row.kind),
                Cell::new(row.constraint_id.unwrap_or("-")),
                Cell::new(path),
                Cell::new(row.message),
                Cell::new(row.source),
            ]);
        }

        let mut output = format!(
            "{}\n{} finding(s), {} at or above {}",
            table,
            report.len(),
            report.count_at_or_above(fail_level),
            fail_level
        );
        if report.truncated {
            output.push_str("\nOutput truncated: finding limit reached");
        }
        output
    }

    fn format_schema(&self, schema: &Schema) -> String {
        let mut table = Table::new();
        table.set_header(vec!["Definition", "Value", "Model"]);

        for (definition, set) in schema.definitions() {
            table.add_row(vec![
                Cell::new(definition),
                Cell::new(set.value_constraints().len()),
                Cell::new(set.model_constraints().len()),
            ]);
        }

        format!(
            "{}\n{} definition(s), {} constraint(s)",
            table,
            schema.len(),
            schema.constraint_count()
        )
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_report(
        &self,
        report: &ValidationReport,
        tree: &dyn DocumentTree,
        fail_level: Level,
    ) -> String {
        let findings: Vec<FindingRow<'_>> = report
            .findings
            .iter()
            .map(|f| FindingRow::new(f, tree))
            .collect();

        serde_json::to_string_pretty(&serde_json::json!({
            "passed": report.passes_at(fail_level),
            "truncated": report.truncated,
            "findings": findings,
        }))
        .unwrap_or_else(|_| "{}".to_string())
    }

    fn format_schema(&self, schema: &Schema) -> String {
        let definitions: Vec<serde_json::Value> = schema
            .definitions()
            .map(|(definition, set)| {
                serde_json::json!({
                    "definition": definition,
                    "value-constraints": set.value_constraints().len(),
                    "model-constraints": set.model_constraints().len(),
                })
            })
            .collect();

        serde_json::to_string_pretty(&definitions).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metaschema_core::{
        Constraint, DefinitionRef, Document, FindingKind, KeyField, NodeId, PathExpression,
    };

    fn sample() -> (Document, ValidationReport) {
        let mut builder = Document::builder("catalog");
        let root = builder.root();
        let first = builder.assembly(root, "group");
        builder.flag(first, "uuid", "a1");
        let second = builder.assembly(root, "group");
        let dup = builder.flag(second, "uuid", "a1");
        let doc = builder.build();

        let constraint = Constraint::unique(
            PathExpression::new("group"),
            vec![KeyField::new("@uuid")],
        )
        .with_id("unique-uuid");
        let finding = Finding::violation(
            FindingKind::DuplicateKey,
            &constraint,
            dup,
            "duplicate key (a1)",
        )
        .with_related([NodeId(2)]);

        let report = ValidationReport {
            findings: vec![finding],
            truncated: false,
        };
        (doc, report)
    }

    #[test]
    fn test_table_output() {
        let (doc, report) = sample();
        let output = TableFormatter.format_report(&report, &doc, Level::Error);

        assert!(output.contains("duplicate-key"));
        assert!(output.contains("unique-uuid"));
        assert!(output.contains("/catalog/group[2]/@uuid"));
        assert!(output.contains("(see /catalog/group[1]/@uuid)"));
        assert!(output.ends_with("1 finding(s), 1 at or above ERROR"));
    }

    #[test]
    fn test_table_empty() {
        let doc = Document::builder("catalog").build();
        let output = TableFormatter.format_report(&ValidationReport::default(), &doc, Level::Error);
        assert_eq!(output, "No findings");
    }

    #[test]
    fn test_json_output() {
        let (doc, report) = sample();
        let output = JsonFormatter.format_report(&report, &doc, Level::Critical);
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["passed"], true);
        assert_eq!(value["findings"][0]["kind"], "duplicate-key");
        assert_eq!(value["findings"][0]["level"], "ERROR");
        assert_eq!(value["findings"][0]["path"], "/catalog/group[2]/@uuid");
        assert_eq!(value["findings"][0]["related"][0], "/catalog/group[1]/@uuid");
    }

    #[test]
    fn test_schema_summary() {
        let schema = Schema::builder()
            .with_constraint(
                DefinitionRef::assembly("catalog"),
                Constraint::cardinality(PathExpression::new("group"), Some(1), None),
            )
            .build()
            .unwrap();

        let output = TableFormatter.format_schema(&schema);
        assert!(output.contains("assembly:catalog"));
        assert!(output.ends_with("1 definition(s), 1 constraint(s)"));

        let json: serde_json::Value =
            serde_json::from_str(&JsonFormatter.format_schema(&schema)).unwrap();
        assert_eq!(json[0]["model-constraints"], 1);
    }
}
