//! Command-line options generated from model schemas.
//!
//! A [`Schema`] (usually obtained through [`Model::schema`]) is walked into a
//! flat list of clap options: nested fields get dotted names such as
//! `--optimizer-learning-rate`, booleans become `--x/--no-x` flags, and
//! `list<Schema>` fields can be unpacked into repeatable options. Parsed
//! values are reassembled into nested data and validated back into the
//! model.
//!
//! # Main entry points
//!
//! - [`from_model`]: configure and build the options of one model.
//! - [`ModelOptions::augment`]: add the options to a [`clap::Command`].
//! - [`ModelOptions::parse`] / [`ModelOptions::extract`]: build the model
//!   from parsed matches or keyword values.
//! - [`ModelOptions::wrap`]: decorate a handler that receives the model in
//!   its [`Kwargs`].
//!
//! # Example
//!
//! ```
//! use clap::Command;
//! use schemaclap::from_model;
//! use schemaclap_core::{Constraint, FieldInfo, FieldShape, Model, Schema};
//!
//! #[derive(Debug, serde::Deserialize)]
//! struct Training {
//!     epochs: i64,
//!     learning_rate: f64,
//!     early_stopping: bool,
//! }
//!
//! impl Model for Training {
//!     fn schema() -> Schema {
//!         Schema::new("Training")
//!             .field(FieldInfo::new("epochs", FieldShape::integer()).with_default(4))
//!             .field(
//!                 FieldInfo::new("learning_rate", FieldShape::float())
//!                     .with_default(0.01)
//!                     .with_constraint(Constraint::Gt(0.0)),
//!             )
//!             .field(FieldInfo::new("early_stopping", FieldShape::boolean()).with_default(false))
//!     }
//! }
//!
//! let options = from_model::<Training>().shorten("learning_rate", "-l").build().unwrap();
//! let cmd = options.augment(Command::new("train"));
//! let matches = cmd
//!     .try_get_matches_from(["train", "-l", "0.5", "--early-stopping"])
//!     .unwrap();
//!
//! let training = options.parse(&matches).unwrap();
//! assert_eq!(training.epochs, 4);
//! assert_eq!(training.learning_rate, 0.5);
//! assert!(training.early_stopping);
//! ```

pub mod assemble;
pub mod collect;
pub mod error;
pub mod fields;
pub mod naming;
pub mod options;
pub mod parsers;

use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::sync::Arc;

use clap::{ArgMatches, Command};
use schemaclap_core::{
    CliConfig, DocstringStyle, DottedName, EffectiveConfig, ExtraOptions, Model, Schema,
    camel_to_snake,
};
use serde::de::DeserializeOwned;
use tracing::info;

pub use assemble::{Validator, assemble, pack_columns, parse_options, unflatten};
pub use collect::{FieldDescriptor, collect_fields, exclude_fields};
pub use error::{Error, Result};
pub use fields::{NameMapping, OptionDefault, OptionSpec, check_config_paths, convert_fields};
pub use naming::{argument_name, option_name};
pub use options::{Kwargs, add_options};
pub use parsers::{
    TypeRegistry, ValueParser, global_registry, map_type, register_type, register_type_fn,
};

/// Starts configuring the options of `T`, using its own schema.
pub fn from_model<T: Model>() -> FromModel<T> {
    FromModel::new().schema(T::schema())
}

/// Builder for the options of one model.
///
/// Settings given here override the ones embedded in the schema key by key.
#[derive(Debug)]
pub struct FromModel<T> {
    variable: Option<String>,
    schema: Option<Schema>,
    overrides: CliConfig,
    registry: Option<TypeRegistry>,
    _model: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Default for FromModel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> FromModel<T> {
    /// Starts a builder without a schema; [`schema`](Self::schema) must be
    /// called before [`build`](Self::build).
    pub fn new() -> Self {
        Self {
            variable: None,
            schema: None,
            overrides: CliConfig::default(),
            registry: None,
            _model: PhantomData,
        }
    }

    /// Name under which [`ModelOptions::inject`] stores the model.
    ///
    /// Defaults to the snake-cased schema name.
    pub fn var(mut self, name: &str) -> Self {
        self.variable = Some(name.to_string());
        self
    }

    pub fn schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Merges a whole settings fragment; keys set in `config` win.
    pub fn config(mut self, config: &CliConfig) -> Self {
        self.overrides = self.overrides.merge(config);
        self
    }

    pub fn exclude<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<DottedName>,
    {
        self.overrides = self.overrides.with_exclude(fields);
        self
    }

    pub fn rename(mut self, field: &str, option: &str) -> Self {
        self.overrides = self.overrides.with_rename(field, option);
        self
    }

    pub fn shorten(mut self, field: &str, option: &str) -> Self {
        self.overrides = self.overrides.with_shorten(field, option);
        self
    }

    pub fn prefix(mut self, prefix: &str) -> Self {
        self.overrides = self.overrides.with_prefix(prefix);
        self
    }

    pub fn parse_docstring(mut self, parse: bool) -> Self {
        self.overrides = self.overrides.with_parse_docstring(parse);
        self
    }

    pub fn docstring_style(mut self, style: DocstringStyle) -> Self {
        self.overrides = self.overrides.with_docstring_style(style);
        self
    }

    pub fn extra_options(mut self, field: &str, extra: ExtraOptions) -> Self {
        self.overrides = self.overrides.with_extra_options(field, extra);
        self
    }

    pub fn ignore_unsupported(mut self, ignore: bool) -> Self {
        self.overrides = self.overrides.with_ignore_unsupported(ignore);
        self
    }

    pub fn unpack_list(mut self, unpack: bool) -> Self {
        self.overrides = self.overrides.with_unpack_list(unpack);
        self
    }

    pub fn env_prefix(mut self, prefix: &str) -> Self {
        self.overrides = self.overrides.with_env_prefix(prefix);
        self
    }

    /// Uses `registry` instead of a snapshot of the process-wide one.
    pub fn registry(mut self, registry: TypeRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Builds the option specifications and the name mapping.
    ///
    /// # Errors
    ///
    /// Every configuration problem is reported here: a missing schema, an
    /// invalid setting, a setting naming an unknown field, a dual boolean
    /// alias with a suffix, or an unsupported field type.
    pub fn build(self) -> Result<ModelOptions<T>> {
        let schema = self
            .schema
            .map(Arc::new)
            .ok_or_else(|| Error::MissingSchema(std::any::type_name::<T>().to_string()))?;

        let embedded = schema.cli_config();
        embedded.validate()?;
        self.overrides.validate()?;
        let config = EffectiveConfig::resolve(&self.overrides, Some(&embedded));
        let registry = self.registry.unwrap_or_else(global_registry);

        let fields = collect_fields(
            &schema,
            &BTreeSet::new(),
            config.parse_docstring,
            config.docstring_style,
            config.unpack_list,
        )?;
        check_config_paths(&fields, &config)?;
        let fields = exclude_fields(fields, &config.exclude);
        let (mapping, specs) = convert_fields(&fields, &config, &registry)?;

        let variable = self
            .variable
            .unwrap_or_else(|| camel_to_snake(&schema.name));
        info!(
            model = %schema.name,
            variable = %variable,
            options = specs.len(),
            "Built command-line options"
        );

        Ok(ModelOptions {
            variable: Arc::from(variable),
            specs: Arc::from(specs),
            validator: Validator::new(Arc::clone(&schema), Arc::new(mapping)),
            schema,
        })
    }
}

/// Built options of one model, reusable for any number of invocations.
#[derive(Debug)]
pub struct ModelOptions<T> {
    variable: Arc<str>,
    specs: Arc<[OptionSpec]>,
    schema: Arc<Schema>,
    validator: Validator<T>,
}

impl<T> Clone for ModelOptions<T> {
    fn clone(&self) -> Self {
        Self {
            variable: Arc::clone(&self.variable),
            specs: Arc::clone(&self.specs),
            schema: Arc::clone(&self.schema),
            validator: self.validator.clone(),
        }
    }
}

impl<T: DeserializeOwned> ModelOptions<T> {
    pub fn options(&self) -> &[OptionSpec] {
        &self.specs
    }

    pub fn name_mapping(&self) -> &NameMapping {
        self.validator.mapping()
    }

    pub fn variable_name(&self) -> &str {
        &self.variable
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn validator(&self) -> &Validator<T> {
        &self.validator
    }

    /// Adds this model's options to `cmd`.
    pub fn augment(&self, cmd: Command) -> Command {
        add_options(cmd, &self.specs)
    }

    /// Adds this model's parsed values to `kwargs`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Matches`] if `matches` came from a command without
    /// these options.
    pub fn collect(&self, matches: &ArgMatches, kwargs: &mut Kwargs) -> Result<()> {
        kwargs.extend_from_matches(matches, &self.specs)
    }

    /// Consumes this model's values from `kwargs` and builds the model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the values do not satisfy the schema.
    pub fn extract(&self, kwargs: &mut Kwargs) -> Result<T> {
        self.validator.extract(kwargs)
    }

    /// Builds the model straight from clap's matches.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the values do not satisfy the schema.
    pub fn parse(&self, matches: &ArgMatches) -> Result<T> {
        let mut kwargs = Kwargs::from_matches(matches, &self.specs)?;
        self.extract(&mut kwargs)
    }
}

impl<T: DeserializeOwned + Send + 'static> ModelOptions<T> {
    /// Replaces this model's values in `kwargs` with the built model, stored
    /// under [`variable_name`](Self::variable_name).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the values do not satisfy the schema.
    pub fn inject(&self, kwargs: &mut Kwargs) -> Result<()> {
        let model = self.extract(kwargs)?;
        kwargs.insert_model(&self.variable, model);
        Ok(())
    }

    /// Wraps `handler` so it receives the built model in its [`Kwargs`].
    ///
    /// Wrapping the result again with the options of another model gives a
    /// handler receiving both.
    ///
    /// # Examples
    ///
    /// ```
    /// use clap::Command;
    /// use schemaclap::{Kwargs, from_model};
    /// use schemaclap_core::{FieldInfo, FieldShape, Model, Schema};
    ///
    /// #[derive(serde::Deserialize)]
    /// struct Logging {
    ///     level: String,
    /// }
    ///
    /// impl Model for Logging {
    ///     fn schema() -> Schema {
    ///         Schema::new("Logging").field(FieldInfo::new("level", FieldShape::string()).with_default("INFO"))
    ///     }
    /// }
    ///
    /// let options = from_model::<Logging>().prefix("--log").build().unwrap();
    /// let handler = options.clone().wrap(|mut kwargs: Kwargs| {
    ///     let logging = kwargs.take_model::<Logging>("logging").unwrap();
    ///     Ok::<_, schemaclap::Error>(logging.level)
    /// });
    ///
    /// let matches = options
    ///     .augment(Command::new("app"))
    ///     .try_get_matches_from(["app", "--log-level", "DEBUG"])
    ///     .unwrap();
    /// let mut kwargs = Kwargs::new();
    /// options.collect(&matches, &mut kwargs).unwrap();
    /// assert_eq!(handler(kwargs).unwrap(), "DEBUG");
    /// ```
    pub fn wrap<F, R, E>(self, handler: F) -> impl Fn(Kwargs) -> std::result::Result<R, E>
    where
        F: Fn(Kwargs) -> std::result::Result<R, E>,
        E: From<Error>,
    {
        move |mut kwargs| {
            self.inject(&mut kwargs)?;
            handler(kwargs)
        }
    }
}
