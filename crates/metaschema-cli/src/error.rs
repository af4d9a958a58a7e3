//! CLI errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that stop a command before or during setup.
#[derive(Debug, Error)]
pub enum CliError {
    /// A file could not be read.
    #[error("cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A constraint-set file is not valid JSON for the expected layout.
    #[error("cannot parse '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The schema or document was rejected by the engine.
    #[error(transparent)]
    Engine(#[from] metaschema_core::Error),

    /// Constraint aggregation failed.
    #[error("schema configuration error: {0}")]
    Config(#[from] metaschema_core::ConfigError),
}
