//! Metaschema Command-Line Validator
//!
//! Validates JSON document descriptions against Metaschema constraint sets.

mod commands;
mod error;
mod formatter;
mod schema_file;

use clap::{Parser, Subcommand};
use commands::ValidateOptions;
use formatter::OutputFormat;
use metaschema_core::Level;
use std::path::PathBuf;
use std::process::ExitCode;

/// Exit status when findings reach the fail level.
const EXIT_FINDINGS: u8 = 1;
/// Exit status for configuration and input errors.
const EXIT_ERROR: u8 = 2;

/// Metaschema Command-Line Validator
#[derive(Parser, Debug)]
#[command(name = "metaschema")]
#[command(version, about = "Validate documents against Metaschema constraints")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a document against a constraint-set file
    Validate {
        /// Constraint-set file (JSON)
        #[arg(short, long)]
        schema: PathBuf,

        /// Document file (JSON node description)
        #[arg(short, long)]
        document: PathBuf,

        /// Output format
        #[arg(long, default_value = "table", value_enum)]
        format: OutputFormat,

        /// Lowest level that fails the run
        #[arg(long, default_value = "error", value_parser = parse_level)]
        fail_level: Level,

        /// Worker threads for the checking phase
        #[arg(long, default_value_t = 1)]
        threads: usize,

        /// Stop after this many findings
        #[arg(long)]
        max_findings: Option<usize>,
    },

    /// Load and aggregate a constraint-set file
    CheckSchema {
        /// Constraint-set file (JSON)
        #[arg(short, long)]
        schema: PathBuf,

        /// Output format
        #[arg(long, default_value = "table", value_enum)]
        format: OutputFormat,
    },
}

fn parse_level(s: &str) -> Result<Level, String> {
    s.parse().map_err(|e: metaschema_core::ConfigError| e.to_string())
}

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("metaschema_cli=info")),
        )
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_FINDINGS),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn run(args: Args) -> Result<bool, Box<dyn std::error::Error>> {
    let result = match args.command {
        Command::Validate {
            schema,
            document,
            format,
            fail_level,
            threads,
            max_findings,
        } => commands::validate(&ValidateOptions {
            schema,
            document,
            format,
            fail_level,
            threads,
            max_findings,
        })?,
        Command::CheckSchema { schema, format } => commands::check_schema(&schema, format)?,
    };

    println!("{}", result.output);
    Ok(result.passed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_validate_args() {
        let args = Args::try_parse_from([
            "metaschema",
            "validate",
            "--schema",
            "s.json",
            "--document",
            "d.json",
            "--fail-level",
            "warning",
            "--threads",
            "4",
            "--format",
            "json",
        ])
        .unwrap();

        match args.command {
            Command::Validate {
                fail_level,
                threads,
                format,
                max_findings,
                ..
            } => {
                assert_eq!(fail_level, Level::Warning);
                assert_eq!(threads, 4);
                assert_eq!(format, OutputFormat::Json);
                assert_eq!(max_findings, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_rejects_unknown_level() {
        let result = Args::try_parse_from([
            "metaschema",
            "validate",
            "-s",
            "s.json",
            "-d",
            "d.json",
            "--fail-level",
            "fatal",
        ]);
        assert!(result.is_err());
    }
}
