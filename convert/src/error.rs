//! Error types for building command-line options and assembling models.

use schemaclap_core::{ConfigError, DottedName, OptionName, ValidationError};
use thiserror::Error;

/// Errors raised while converting a schema or reassembling parsed values.
///
/// Everything except [`Matches`](Error::Matches) and
/// [`Validation`](Error::Validation) is a configuration error, raised when
/// the options are built and never when a command runs.
#[derive(Debug, Error)]
pub enum Error {
    /// A dual boolean alias (`--on/--off`) was applied to a nested field.
    #[error("boolean alias {alias} for {ancestor} cannot be extended with suffix '{suffix}' for {field}")]
    InvalidBooleanAlias {
        field: DottedName,
        ancestor: DottedName,
        alias: OptionName,
        suffix: String,
    },

    /// A setting names a field path that does not exist in the schema.
    #[error("{setting} refers to unknown field: {field}")]
    UnknownField {
        setting: &'static str,
        field: DottedName,
    },

    /// A schema field has an empty name.
    #[error("field without a name under '{0}'")]
    UnnamedField(String),

    /// No schema was given for the model.
    #[error("no schema provided for {0}")]
    MissingSchema(String),

    /// No command-line parser exists for the field's type.
    #[error("unsupported type for field {field}: {reason}")]
    UnsupportedType { field: DottedName, reason: String },

    /// A dotted name has an empty segment.
    #[error("empty key in dotted name: '{0}'")]
    EmptyKey(String),

    /// Reading a value out of clap's matches failed.
    #[error("failed to read parsed value for {id}: {source}")]
    Matches {
        id: String,
        #[source]
        source: clap::parser::MatchesError,
    },

    /// The assembled data did not satisfy the schema.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// An invalid setting value.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Convenience alias for results with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
