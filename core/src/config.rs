//! Conversion settings and their layered resolution.
//!
//! Settings come from three layers, highest priority first:
//!
//! 1. call-site overrides given when building the command surface,
//! 2. the fragment embedded in the schema ([`Schema::config`](crate::Schema),
//!    itself layered over the per-field annotations),
//! 3. built-in defaults.
//!
//! Each layer is a [`CliConfig`] fragment where every key is optional, and
//! merging is per key: overriding `rename` leaves a lower layer's `shorten`
//! untouched.
//!
//! # Example YAML
//!
//! ```yaml
//! prefix: opt
//! rename:
//!   optimizer: --opt
//! shorten:
//!   learning_rate: -l
//!   optimizer: -o
//! exclude:
//!   - decay_rate
//! extra_options:
//!   batch_size:
//!     default: 12
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::docstrings::DocstringStyle;
use crate::error::{ConfigError, Result};
use crate::names::{DottedName, OptionName, strip_option_name};

/// Extra settings applied to a single generated option.
///
/// Every key set here overrides what the converter derived from the schema.
///
/// # Examples
///
/// ```
/// use schemaclap_core::ExtraOptions;
///
/// let base = ExtraOptions { value_name: Some("N".into()), ..Default::default() };
/// let overlay = ExtraOptions { hidden: Some(true), ..Default::default() };
/// let merged = base.merge(&overlay);
/// assert_eq!(merged.value_name.as_deref(), Some("N"));
/// assert_eq!(merged.hidden, Some(true));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtraOptions {
    /// Help text shown for the option.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    /// Command-line default, forwarded to the model as an explicit value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Whether the option must be given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    /// Hide the option from `--help`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    /// Placeholder shown for the option value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_name: Option<String>,
    /// Environment variable read when the option is absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<String>,
    /// Show the default value in `--help`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_default: Option<bool>,
}

impl ExtraOptions {
    /// Merges two settings sets; keys set in `overlay` win.
    pub fn merge(&self, overlay: &ExtraOptions) -> ExtraOptions {
        ExtraOptions {
            help: overlay.help.clone().or_else(|| self.help.clone()),
            default: overlay.default.clone().or_else(|| self.default.clone()),
            required: overlay.required.or(self.required),
            hidden: overlay.hidden.or(self.hidden),
            value_name: overlay.value_name.clone().or_else(|| self.value_name.clone()),
            env: overlay.env.clone().or_else(|| self.env.clone()),
            show_default: overlay.show_default.or(self.show_default),
        }
    }

    /// Returns `true` when no key is set.
    pub fn is_empty(&self) -> bool {
        *self == ExtraOptions::default()
    }
}

/// Conversion settings attached to a single field of a schema.
///
/// Several annotations on one field are merged left to right, later ones
/// winning key by key.
///
/// # Examples
///
/// ```
/// use schemaclap_core::FieldCliOptions;
///
/// let first = FieldCliOptions::default().rename("--str");
/// let second = FieldCliOptions::default().shorten("-s");
/// let merged = first.merge(&second);
/// assert_eq!(merged.rename.as_deref(), Some("--str"));
/// assert_eq!(merged.shorten.as_deref(), Some("-s"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldCliOptions {
    pub exclude: Option<bool>,
    pub rename: Option<String>,
    pub shorten: Option<String>,
    pub extra: ExtraOptions,
}

impl FieldCliOptions {
    /// Excludes the field from the generated options.
    pub fn exclude(mut self) -> Self {
        self.exclude = Some(true);
        self
    }

    /// Sets the option name of the field.
    pub fn rename(mut self, name: &str) -> Self {
        self.rename = Some(name.to_string());
        self
    }

    /// Sets the short option name of the field.
    pub fn shorten(mut self, name: &str) -> Self {
        self.shorten = Some(name.to_string());
        self
    }

    /// Sets extra option settings.
    pub fn with_extra(mut self, extra: ExtraOptions) -> Self {
        self.extra = extra;
        self
    }

    /// Merges two annotations; keys set in `overlay` win.
    pub fn merge(&self, overlay: &FieldCliOptions) -> FieldCliOptions {
        FieldCliOptions {
            exclude: overlay.exclude.or(self.exclude),
            rename: overlay.rename.clone().or_else(|| self.rename.clone()),
            shorten: overlay.shorten.clone().or_else(|| self.shorten.clone()),
            extra: self.extra.merge(&overlay.extra),
        }
    }
}

/// A partial set of conversion settings.
///
/// Unset keys defer to lower-priority layers. Fragments can be built in code,
/// embedded into a schema, or loaded from YAML/JSON files.
///
/// # Examples
///
/// ```
/// use schemaclap_core::CliConfig;
///
/// let schema_level = CliConfig::default().with_prefix("log").with_shorten("level", "-l");
/// let call_site = CliConfig::default().with_prefix("logging");
///
/// let merged = schema_level.merge(&call_site);
/// assert_eq!(merged.prefix.as_deref(), Some("logging"));
/// assert!(merged.shorten.is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    /// Dotted names of fields that get no option.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<DottedName>>,
    /// Option names overriding the generated ones (longest matching ancestor wins).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rename: Option<BTreeMap<DottedName, OptionName>>,
    /// Short option names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shorten: Option<BTreeMap<DottedName, OptionName>>,
    /// Prefix prepended to generated option and argument names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    /// Derive help text from the schema's docstring.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_docstring: Option<bool>,
    /// Layout of the docstring attribute section.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docstring_style: Option<DocstringStyle>,
    /// Per-field extra option settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_options: Option<BTreeMap<DottedName, ExtraOptions>>,
    /// Drop fields whose type has no command-line parser instead of failing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_unsupported: Option<bool>,
    /// Expand `list<Schema>` fields into repeatable per-child options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unpack_list: Option<bool>,
    /// Read `{PREFIX}{ARGUMENT_NAME}` environment variables as fallbacks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_prefix: Option<String>,
}

impl CliConfig {
    /// Loads a fragment from a YAML or JSON file (chosen by extension).
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::ConfigError::IoError) if the file cannot be
    /// read, or a JSON/YAML error if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config: CliConfig = if is_json(path) {
            serde_json::from_reader(reader)?
        } else {
            serde_yaml::from_reader(reader)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks option names given in `rename` and `shorten`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidSetting`](ConfigError::InvalidSetting) for an empty
    /// rename or a short name that is not a dash followed by one character.
    pub fn validate(&self) -> Result<()> {
        for (field, name) in self.rename.iter().flatten() {
            if strip_option_name(name.as_str()).is_empty() {
                return Err(ConfigError::InvalidSetting {
                    key: format!("rename.{field}"),
                    message: "option name cannot be empty".to_string(),
                });
            }
        }
        for (field, name) in self.shorten.iter().flatten() {
            let short = name.as_str();
            let valid = short.starts_with('-')
                && !short.starts_with("--")
                && short[1..].chars().count() == 1;
            if !valid {
                return Err(ConfigError::InvalidSetting {
                    key: format!("shorten.{field}"),
                    message: format!("expected a short option like -x, got {short:?}"),
                });
            }
        }
        Ok(())
    }

    /// Saves the fragment as YAML or JSON (chosen by extension).
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::ConfigError::IoError) if the file cannot be
    /// written, or a JSON/YAML error if serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        if is_json(path) {
            serde_json::to_writer_pretty(writer, self)?;
        } else {
            serde_yaml::to_writer(writer, self)?;
        }
        Ok(())
    }

    /// Merges two fragments key by key; keys set in `overlay` win.
    pub fn merge(&self, overlay: &CliConfig) -> CliConfig {
        CliConfig {
            exclude: overlay.exclude.clone().or_else(|| self.exclude.clone()),
            rename: overlay.rename.clone().or_else(|| self.rename.clone()),
            shorten: overlay.shorten.clone().or_else(|| self.shorten.clone()),
            prefix: overlay.prefix.clone().or_else(|| self.prefix.clone()),
            parse_docstring: overlay.parse_docstring.or(self.parse_docstring),
            docstring_style: overlay.docstring_style.or(self.docstring_style),
            extra_options: overlay
                .extra_options
                .clone()
                .or_else(|| self.extra_options.clone()),
            ignore_unsupported: overlay.ignore_unsupported.or(self.ignore_unsupported),
            unpack_list: overlay.unpack_list.or(self.unpack_list),
            env_prefix: overlay.env_prefix.clone().or_else(|| self.env_prefix.clone()),
        }
    }

    pub fn with_exclude<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<DottedName>,
    {
        self.exclude = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_rename(mut self, field: &str, option: &str) -> Self {
        self.rename
            .get_or_insert_with(BTreeMap::new)
            .insert(field.into(), option.into());
        self
    }

    pub fn with_shorten(mut self, field: &str, option: &str) -> Self {
        self.shorten
            .get_or_insert_with(BTreeMap::new)
            .insert(field.into(), option.into());
        self
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_string());
        self
    }

    pub fn with_parse_docstring(mut self, parse: bool) -> Self {
        self.parse_docstring = Some(parse);
        self
    }

    pub fn with_docstring_style(mut self, style: DocstringStyle) -> Self {
        self.docstring_style = Some(style);
        self
    }

    pub fn with_extra_options(mut self, field: &str, extra: ExtraOptions) -> Self {
        self.extra_options
            .get_or_insert_with(BTreeMap::new)
            .insert(field.into(), extra);
        self
    }

    pub fn with_ignore_unsupported(mut self, ignore: bool) -> Self {
        self.ignore_unsupported = Some(ignore);
        self
    }

    pub fn with_unpack_list(mut self, unpack: bool) -> Self {
        self.unpack_list = Some(unpack);
        self
    }

    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_string());
        self
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

/// Fully resolved conversion settings for one schema.
///
/// Built once when the command surface is generated and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    pub exclude: BTreeSet<DottedName>,
    pub rename: BTreeMap<DottedName, OptionName>,
    pub shorten: BTreeMap<DottedName, OptionName>,
    pub prefix: Option<String>,
    pub parse_docstring: bool,
    pub docstring_style: DocstringStyle,
    pub extra_options: BTreeMap<DottedName, ExtraOptions>,
    pub ignore_unsupported: bool,
    pub unpack_list: bool,
    pub env_prefix: Option<String>,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            exclude: BTreeSet::new(),
            rename: BTreeMap::new(),
            shorten: BTreeMap::new(),
            prefix: None,
            parse_docstring: true,
            docstring_style: DocstringStyle::Google,
            extra_options: BTreeMap::new(),
            ignore_unsupported: false,
            unpack_list: false,
            env_prefix: None,
        }
    }
}

impl EffectiveConfig {
    /// Resolves call-site overrides over the schema-embedded fragment over
    /// the defaults.
    ///
    /// # Examples
    ///
    /// ```
    /// use schemaclap_core::{CliConfig, EffectiveConfig};
    ///
    /// let embedded = CliConfig::default()
    ///     .with_exclude(["a"])
    ///     .with_parse_docstring(false);
    /// let call_site = CliConfig::default().with_exclude(["b"]);
    ///
    /// let config = EffectiveConfig::resolve(&call_site, Some(&embedded));
    /// assert!(config.exclude.contains("b"));
    /// assert!(!config.exclude.contains("a"));
    /// assert!(!config.parse_docstring);
    /// ```
    pub fn resolve(call_site: &CliConfig, embedded: Option<&CliConfig>) -> Self {
        let merged = match embedded {
            Some(embedded) => embedded.merge(call_site),
            None => call_site.clone(),
        };
        let defaults = Self::default();

        Self {
            exclude: merged
                .exclude
                .map(|e| e.into_iter().collect())
                .unwrap_or(defaults.exclude),
            rename: merged
                .rename
                .map(|r| {
                    r.into_iter()
                        .map(|(k, v)| (k, OptionName::long(v.as_str())))
                        .collect()
                })
                .unwrap_or(defaults.rename),
            shorten: merged.shorten.unwrap_or(defaults.shorten),
            prefix: merged
                .prefix
                .filter(|p| !p.is_empty())
                .or(defaults.prefix),
            parse_docstring: merged.parse_docstring.unwrap_or(defaults.parse_docstring),
            docstring_style: merged.docstring_style.unwrap_or(defaults.docstring_style),
            extra_options: merged.extra_options.unwrap_or(defaults.extra_options),
            ignore_unsupported: merged
                .ignore_unsupported
                .unwrap_or(defaults.ignore_unsupported),
            unpack_list: merged.unpack_list.unwrap_or(defaults.unpack_list),
            env_prefix: merged.env_prefix.or(defaults.env_prefix),
        }
    }
}
