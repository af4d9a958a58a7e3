//! Subcommand implementations.

use std::path::{Path, PathBuf};

use metaschema_core::{BuiltinDatatypes, Level, ValidationConfig, Validator};
use metaschema_metapath::MetapathEvaluator;
use tracing::info;

use crate::error::CliError;
use crate::formatter::{create_formatter, OutputFormat};
use crate::schema_file::{load_document, load_schema};

/// Options of the `validate` subcommand.
#[derive(Debug, Clone)]
pub struct ValidateOptions {
    pub schema: PathBuf,
    pub document: PathBuf,
    pub format: OutputFormat,
    pub fail_level: Level,
    pub threads: usize,
    pub max_findings: Option<usize>,
}

impl ValidateOptions {
    fn config(&self) -> ValidationConfig {
        let config = ValidationConfig::default().with_parallelism(self.threads);
        match self.max_findings {
            Some(max) => config.with_max_findings(max),
            None => config,
        }
    }
}

/// Result of running a command.
#[derive(Debug)]
pub struct CommandOutput {
    /// Text to print.
    pub output: String,
    /// Whether the document passed at the requested level.
    pub passed: bool,
}

/// Validate a document against a constraint-set file.
pub fn validate(options: &ValidateOptions) -> Result<CommandOutput, CliError> {
    let schema = load_schema(&options.schema)?;
    let document = load_document(&options.document)?;
    info!(
        definitions = schema.len(),
        constraints = schema.constraint_count(),
        nodes = document.len(),
        "Loaded inputs"
    );

    let evaluator = MetapathEvaluator::new();
    let datatypes = BuiltinDatatypes::new();
    let validator = Validator::new(&schema, &evaluator, &datatypes)?.with_config(options.config());
    let report = validator.validate(&document);

    let formatter = create_formatter(options.format);
    Ok(CommandOutput {
        output: formatter.format_report(&report, &document, options.fail_level),
        passed: report.passes_at(options.fail_level),
    })
}

/// Load and aggregate a constraint-set file without validating anything.
pub fn check_schema(schema: &Path, format: OutputFormat) -> Result<CommandOutput, CliError> {
    let schema = load_schema(schema)?;
    // Unknown datatype names are configuration errors as well.
    let evaluator = MetapathEvaluator::new();
    let datatypes = BuiltinDatatypes::new();
    Validator::new(&schema, &evaluator, &datatypes)?;

    Ok(CommandOutput {
        output: create_formatter(format).format_schema(&schema),
        passed: true,
    })
}
