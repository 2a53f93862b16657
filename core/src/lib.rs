//! Schema model, naming rules and conversion settings for schema-driven CLIs.
//!
//! This crate holds everything the command-line conversion needs to know
//! about a model, independent of any argument parser:
//!
//! - [`Schema`], [`FieldInfo`] and the closed [`FieldShape`] variant describing
//!   how field values nest; typed models implement [`Model`].
//! - Validating construction ([`Schema::validate`], [`validate_model`]) that
//!   fills defaults, coerces command-line strings and reports every
//!   [`FieldError`] at once.
//! - Naming utilities and the [`DottedName`], [`OptionName`] and
//!   [`ArgumentName`] newtypes.
//! - Attribute documentation parsing ([`parse_attribute_docs`]).
//! - Conversion settings: [`CliConfig`] fragments, per-field
//!   [`FieldCliOptions`] and the resolved [`EffectiveConfig`].
//!
//! # Example
//!
//! ```
//! use schemaclap_core::*;
//! use serde_json::json;
//!
//! let schema = Schema::new("Logging")
//!     .with_doc("Logging config.\n\nAttributes:\n    level: logging level\n")
//!     .field(FieldInfo::new("level", FieldShape::literal(["info", "debug"])).with_default("info"))
//!     .field(FieldInfo::new("filename", FieldShape::optional(FieldShape::path())).with_default(json!(null)));
//!
//! let docs = schema.attribute_docs(DocstringStyle::Google);
//! assert_eq!(docs["level"], "logging level");
//!
//! let data = schema.validate(&json!({"level": "debug"})).unwrap();
//! assert_eq!(data, json!({"level": "debug", "filename": null}));
//!
//! let config = EffectiveConfig::resolve(&CliConfig::default().with_prefix("log"), None);
//! assert_eq!(config.prefix.as_deref(), Some("log"));
//! ```

mod config;
mod docstrings;
mod error;
mod names;
mod types;
mod validate;

pub use config::{CliConfig, EffectiveConfig, ExtraOptions, FieldCliOptions};
pub use docstrings::{DocstringStyle, parse_attribute_docs};
pub use error::ConfigError;
pub use names::*;
pub use types::*;
pub use validate::{
    FieldError, FieldErrorKind, ValidationError, check_value, literal_text, parse_bool_token,
    validate_model,
};
