//! Turning collected fields into option specifications.

use std::collections::{BTreeMap, BTreeSet};

use schemaclap_core::{
    ArgumentName, ConfigError, DottedName, EffectiveConfig, ExtraOptions, FieldDefault,
    FieldInfo, OptionName, ScalarType,
};
use serde_json::Value;
use tracing::debug;

use crate::collect::FieldDescriptor;
use crate::error::{Error, Result};
use crate::naming::{argument_name, option_name};
use crate::parsers::{TypeRegistry, ValueParser, map_type};

/// Default of an option, as shown in `--help`.
#[derive(Debug, Clone)]
pub enum OptionDefault {
    Value(Value),
    /// Computed by the schema engine when the model is built.
    Factory(fn() -> Value),
}

impl OptionDefault {
    /// Text shown after `default:` in the help of the option.
    pub fn display(&self) -> String {
        match self {
            Self::Value(Value::String(s)) => s.clone(),
            Self::Value(value) => value.to_string(),
            Self::Factory(_) => "(dynamic)".to_string(),
        }
    }
}

/// Everything needed to register one option with clap.
#[derive(Debug, Clone)]
pub struct OptionSpec {
    /// Key of the parsed value.
    pub argument_name: ArgumentName,
    pub option_name: OptionName,
    pub short_name: Option<char>,
    pub dotted_name: DottedName,
    pub parser: ValueParser,
    pub default: Option<OptionDefault>,
    /// Default passed on to the schema engine when the option is absent.
    pub forwarded_default: Option<Value>,
    pub required: bool,
    pub help: Option<String>,
    /// Repeatable option collecting one value per occurrence.
    pub multiple: bool,
    pub is_flag: bool,
    /// Environment variable read when the option is absent.
    pub env: Option<String>,
    pub extra: ExtraOptions,
}

/// Argument names mapped back to dotted field names, plus the dotted names
/// of unpacked `list<Schema>` fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameMapping {
    pub arguments: BTreeMap<ArgumentName, DottedName>,
    pub unpacked: BTreeSet<DottedName>,
}

/// Converts collected fields into option specifications.
///
/// # Errors
///
/// Returns [`Error::UnsupportedType`] for a field without a parser unless
/// `ignore_unsupported` is set, [`Error::InvalidBooleanAlias`] for a bad
/// rename, and [`Error::Config`] for a short name that is not `-x` or a
/// forwarded default the option's parser rejects.
pub fn convert_fields(
    fields: &[FieldDescriptor<'_>],
    config: &EffectiveConfig,
    registry: &TypeRegistry,
) -> Result<(NameMapping, Vec<OptionSpec>)> {
    let mut mapping = NameMapping::default();
    let mut specs = Vec::with_capacity(fields.len());
    let prefix = config.prefix.as_deref();

    for descriptor in fields {
        let field = descriptor.field;
        let dotted = &descriptor.dotted_name;
        let multiple = descriptor.is_multiple();

        let parser = match map_type(field, registry) {
            Ok(parser) => parser,
            Err(reason) if config.ignore_unsupported => {
                debug!(field = %dotted, reason = %reason, "Skipping unsupported field");
                continue;
            }
            Err(reason) => {
                return Err(Error::UnsupportedType {
                    field: dotted.clone(),
                    reason,
                });
            }
        };

        let argument = argument_name(dotted, prefix);
        let is_flag = field.is_boolean_flag();
        let name = option_name(dotted, &config.rename, is_flag, prefix)?;
        let short_name = config
            .shorten
            .get(dotted)
            .map(|short| short_char(dotted, short))
            .transpose()?;

        let extra = config.extra_options.get(dotted).cloned().unwrap_or_default();

        let mut default = if multiple {
            Some(OptionDefault::Value(Value::Array(Vec::new())))
        } else {
            match &field.default {
                FieldDefault::Required => None,
                FieldDefault::Value(value) => Some(OptionDefault::Value(value.clone())),
                FieldDefault::Factory(factory) => Some(OptionDefault::Factory(*factory)),
            }
        };
        let forwarded_default = extra.default.clone();
        if let Some(value) = &forwarded_default {
            check_forwarded_default(dotted, field, &parser, value, multiple)?;
            default = Some(OptionDefault::Value(value.clone()));
        }

        let required = extra
            .required
            .unwrap_or(field.is_required() && !multiple && forwarded_default.is_none());
        let help = extra.help.clone().or_else(|| {
            field
                .description
                .clone()
                .or_else(|| descriptor.documentation.clone())
        });
        let env = extra.env.clone().or_else(|| {
            config
                .env_prefix
                .as_ref()
                .map(|env_prefix| format!("{env_prefix}{argument}").to_uppercase())
        });

        if let Some(unpacked) = &descriptor.unpacked_from {
            mapping.unpacked.insert(unpacked.clone());
        }
        mapping.arguments.insert(argument.clone(), dotted.clone());

        specs.push(OptionSpec {
            argument_name: argument,
            option_name: name,
            short_name,
            dotted_name: dotted.clone(),
            parser,
            default,
            forwarded_default,
            required,
            help,
            multiple,
            is_flag,
            env,
            extra,
        });
    }

    Ok((mapping, specs))
}

fn short_char(dotted: &DottedName, short: &OptionName) -> Result<char> {
    let mut chars = short.as_str().strip_prefix('-').unwrap_or("").chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c != '-' => Ok(c),
        _ => Err(Error::Config(ConfigError::InvalidSetting {
            key: format!("shorten.{dotted}"),
            message: format!("expected a short option like -x, got {:?}", short.as_str()),
        })),
    }
}

/// Rejects a forwarded default that the option itself could never produce:
/// a non-list default on a repeatable option, or a domain-typed string its
/// parser refuses. The schema engine only checks that such values are
/// strings.
fn check_forwarded_default(
    dotted: &DottedName,
    field: &FieldInfo,
    parser: &ValueParser,
    value: &Value,
    multiple: bool,
) -> Result<()> {
    let invalid = |message: String| {
        Error::Config(ConfigError::InvalidSetting {
            key: format!("extra_options.{dotted}.default"),
            message,
        })
    };
    let cells = match value {
        Value::Array(cells) if multiple => cells.as_slice(),
        _ if multiple => {
            return Err(invalid(format!(
                "repeatable option needs a list default, got {value}"
            )));
        }
        _ => std::slice::from_ref(value),
    };
    if matches!(field.shape.scalar(), Some(ScalarType::Known(_))) {
        for raw in cells.iter().filter_map(Value::as_str) {
            parser.parse(raw).map_err(invalid)?;
        }
    }
    Ok(())
}

/// Checks that every dotted name used in the settings resolves to a field.
///
/// `exclude` and `rename` may name any ancestor of a field; `shorten` and
/// `extra_options` must name a field exactly.
///
/// # Errors
///
/// Returns [`Error::UnknownField`] for the first name that does not resolve.
pub fn check_config_paths(fields: &[FieldDescriptor<'_>], config: &EffectiveConfig) -> Result<()> {
    let covers = |name: &DottedName| fields.iter().any(|f| name.is_prefix_of(&f.dotted_name));
    let exact = |name: &DottedName| fields.iter().any(|f| f.dotted_name == *name);

    let checks: [(&'static str, Vec<&DottedName>, &dyn Fn(&DottedName) -> bool); 4] = [
        ("exclude", config.exclude.iter().collect(), &covers),
        ("rename", config.rename.keys().collect(), &covers),
        ("shorten", config.shorten.keys().collect(), &exact),
        ("extra_options", config.extra_options.keys().collect(), &exact),
    ];
    for (setting, names, resolves) in checks {
        if let Some(unknown) = names.into_iter().find(|name| !resolves(*name)) {
            return Err(Error::UnknownField {
                setting,
                field: unknown.clone(),
            });
        }
    }
    Ok(())
}
