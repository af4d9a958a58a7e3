//! Core error types.

use thiserror::Error;

use crate::model::{PathExpression, SourceRef};

/// Core engine errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The schema is misconfigured; no document can be validated against it.
    #[error("schema configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A document description could not be turned into a node tree.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),
}

/// Schema-level misconfiguration, detected before any document is checked.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Two `Index` constraints declare the same index name.
    #[error("index '{name}' is declared twice (first in {first}, again in {second})")]
    DuplicateIndexName {
        /// The duplicated index name.
        name: String,
        /// Where the index was first declared.
        first: SourceRef,
        /// Where the second declaration lives.
        second: SourceRef,
    },

    /// An allowed-values set with extensibility `none` received more values.
    #[error("cannot extend a closed enumeration on target '{target}' (extension from {source_ref})")]
    ClosedEnumeration {
        /// Target shared by the base and the extension.
        target: PathExpression,
        /// Source of the rejected extension.
        source_ref: SourceRef,
    },

    /// An allowed-values set with extensibility `model` was extended by another module.
    #[error(
        "allowed values on target '{target}' may only be extended by module '{base_module}', not '{module}'"
    )]
    ExternalExtension {
        /// Target shared by the base and the extension.
        target: PathExpression,
        /// Module that declared the base enumeration.
        base_module: String,
        /// Module that attempted the extension.
        module: String,
    },

    /// An extension redefined the description of an existing allowed value.
    #[error("allowed value '{value}' on target '{target}' is redefined by {source_ref}")]
    AllowedValueRedefined {
        /// Target of the allowed-values set.
        target: PathExpression,
        /// The literal that was redefined.
        value: String,
        /// Source of the redefinition.
        source_ref: SourceRef,
    },

    /// A regular expression failed to compile.
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// Pattern source text.
        pattern: String,
        /// Compiler message.
        reason: String,
    },

    /// A `Matches` constraint names a datatype the registry does not know.
    #[error("unknown datatype '{datatype}' in constraint {constraint}")]
    UnknownDatatype {
        /// Datatype name.
        datatype: String,
        /// Display identity of the constraint.
        constraint: String,
    },

    /// A definition reference string is malformed.
    #[error("invalid definition reference '{0}', expected '<assembly|field|flag>:<name>'")]
    InvalidDefinitionRef(String),

    /// A qualified property name is malformed.
    #[error("invalid qualified name '{0}'")]
    InvalidQualifiedName(String),

    /// A severity level name is not recognized.
    #[error("unknown level '{0}'")]
    UnknownLevel(String),
}
