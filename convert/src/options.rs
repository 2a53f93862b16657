//! Binding option specifications to clap and reading parsed values back.
//!
//! Boolean options become two clap args, `--x` and `--no-x`, overriding each
//! other. Only values that came from the command line or the environment
//! are read back; absent options are left to the schema engine, which
//! applies the real default.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};
use schemaclap_core::{parse_bool_token, strip_option_name};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::fields::OptionSpec;
use crate::parsers::ValueParser;

const NEGATION_SUFFIX: &str = ".no";

impl OptionSpec {
    /// Id of the `--no-x` arg of a boolean option.
    fn negation_id(&self) -> String {
        format!("{}{NEGATION_SUFFIX}", self.argument_name)
    }

    fn help_text(&self) -> Option<String> {
        let show_default = self.extra.show_default.unwrap_or(true) && !self.multiple;
        let default = self
            .default
            .as_ref()
            .filter(|_| show_default && !self.required)
            .map(|default| format!("[default: {}]", default.display()));
        match (self.help.clone(), default) {
            (Some(help), Some(default)) => Some(format!("{help} {default}")),
            (help, None) => help,
            (None, default) => default,
        }
    }

    /// Builds the clap args for this option.
    pub fn to_args(&self) -> Vec<Arg> {
        let action = if self.multiple {
            ArgAction::Append
        } else {
            ArgAction::Set
        };
        let metavar = self
            .extra
            .value_name
            .clone()
            .unwrap_or_else(|| self.parser.metavar().to_string());
        let (long, negation) = match self.option_name.dual_parts() {
            Some((on, off)) => (on, Some(off)),
            None => (self.option_name.as_str(), None),
        };

        let mut arg = Arg::new(self.argument_name.to_string())
            .long(strip_option_name(long).to_string())
            .value_parser(self.parser.clone())
            .value_name(metavar)
            .action(action.clone())
            .required(self.required)
            .hide(self.extra.hidden.unwrap_or(false));
        if let Some(help) = self.help_text() {
            arg = arg.help(help);
        }
        if let Some(short) = self.short_name {
            arg = arg.short(short);
        }
        if let Some(env) = &self.env {
            arg = arg.env(env.clone());
        }

        let Some(negation) = negation.filter(|_| self.is_flag) else {
            return vec![arg];
        };

        // Either form may be given, so a missing required flag is reported
        // by the schema engine instead of clap.
        arg = arg
            .num_args(0..=1)
            .require_equals(true)
            .default_missing_value("true");
        let mut negated = Arg::new(self.negation_id())
            .long(strip_option_name(negation).to_string())
            .value_parser(negated_bool_parser())
            .value_name("BOOLEAN")
            .num_args(0..=1)
            .require_equals(true)
            .default_missing_value("true")
            .action(action)
            .help(format!("Negate --{}", strip_option_name(long)))
            .hide(self.extra.hidden.unwrap_or(false));
        if !self.multiple {
            arg = arg.overrides_with(self.negation_id());
            negated = negated.overrides_with(self.argument_name.to_string());
        }
        vec![arg.required(false), negated]
    }
}

fn negated_bool_parser() -> ValueParser {
    ValueParser::new("boolean", "BOOLEAN", |raw| {
        parse_bool_token(raw)
            .map(|b| Value::Bool(!b))
            .ok_or_else(|| format!("'{raw}' is not a valid boolean."))
    })
}

/// Adds the args of every option to `cmd`.
///
/// # Examples
///
/// ```
/// use clap::Command;
/// use schemaclap::{add_options, from_model};
/// use schemaclap_core::{FieldInfo, FieldShape, Model, Schema};
///
/// #[derive(serde::Deserialize)]
/// struct Opts {
///     verbose: bool,
/// }
///
/// impl Model for Opts {
///     fn schema() -> Schema {
///         Schema::new("Opts").field(FieldInfo::new("verbose", FieldShape::boolean()).with_default(false))
///     }
/// }
///
/// let options = from_model::<Opts>().build().unwrap();
/// let cmd = add_options(Command::new("demo"), options.options());
/// assert!(cmd.get_arguments().any(|a| a.get_long() == Some("no-verbose")));
/// ```
pub fn add_options(cmd: Command, specs: &[OptionSpec]) -> Command {
    cmd.args(specs.iter().flat_map(OptionSpec::to_args))
}

fn explicitly_set(matches: &ArgMatches, id: &str) -> bool {
    matches
        .value_source(id)
        .is_some_and(|source| source != ValueSource::DefaultValue)
}

fn read_one(matches: &ArgMatches, id: &str) -> Result<Option<Value>> {
    if !explicitly_set(matches, id) {
        return Ok(None);
    }
    matches
        .try_get_one::<Value>(id)
        .map(|value| value.cloned())
        .map_err(|source| Error::Matches {
            id: id.to_string(),
            source,
        })
}

fn read_indexed(matches: &ArgMatches, id: &str) -> Result<Vec<(usize, Value)>> {
    if !explicitly_set(matches, id) {
        return Ok(Vec::new());
    }
    let values = matches
        .try_get_many::<Value>(id)
        .map_err(|source| Error::Matches {
            id: id.to_string(),
            source,
        })?;
    let Some(values) = values else {
        return Ok(Vec::new());
    };
    let indexed = match matches.indices_of(id) {
        Some(indices) => indices.zip(values.cloned()).collect(),
        None => values.cloned().enumerate().collect(),
    };
    Ok(indexed)
}

/// Parsed keyword values keyed by argument name, plus validated models
/// injected by [`ModelOptions::wrap`](crate::ModelOptions::wrap).
#[derive(Debug, Default)]
pub struct Kwargs {
    values: BTreeMap<String, Value>,
    models: HashMap<String, Box<dyn Any + Send>>,
}

impl Kwargs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the values of `specs` from clap's matches.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Matches`] if a value has an unexpected type.
    pub fn from_matches(matches: &ArgMatches, specs: &[OptionSpec]) -> Result<Self> {
        let mut kwargs = Self::new();
        kwargs.extend_from_matches(matches, specs)?;
        Ok(kwargs)
    }

    /// Adds the values of `specs` from clap's matches.
    ///
    /// Values given on the command line or through the environment are
    /// read; an absent option contributes its forwarded default, if any.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Matches`] if a value has an unexpected type.
    pub fn extend_from_matches(&mut self, matches: &ArgMatches, specs: &[OptionSpec]) -> Result<()> {
        for spec in specs {
            let id = spec.argument_name.as_str();
            let value = if spec.multiple {
                let mut indexed = read_indexed(matches, id)?;
                if spec.is_flag && spec.option_name.is_dual() {
                    indexed.extend(read_indexed(matches, &spec.negation_id())?);
                    indexed.sort_by_key(|(index, _)| *index);
                }
                (!indexed.is_empty())
                    .then(|| Value::Array(indexed.into_iter().map(|(_, v)| v).collect()))
            } else {
                match read_one(matches, id)? {
                    Some(value) => Some(value),
                    None if spec.is_flag && spec.option_name.is_dual() => {
                        read_one(matches, &spec.negation_id())?
                    }
                    None => None,
                }
            };

            if let Some(value) = value.or_else(|| spec.forwarded_default.clone()) {
                self.values.insert(id.to_string(), value);
            }
        }
        Ok(())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Raw values not consumed yet.
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    pub fn insert_model<T: Send + 'static>(&mut self, name: &str, model: T) {
        self.models.insert(name.to_string(), Box::new(model));
    }

    pub fn model<T: 'static>(&self, name: &str) -> Option<&T> {
        self.models.get(name).and_then(|model| model.downcast_ref::<T>())
    }

    /// Removes and returns the model stored under `name` if it is a `T`.
    pub fn take_model<T: 'static>(&mut self, name: &str) -> Option<T> {
        let model = self.models.remove(name)?;
        match model.downcast::<T>() {
            Ok(model) => Some(*model),
            Err(other) => {
                self.models.insert(name.to_string(), other);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::OptionDefault;
    use schemaclap_core::{ArgumentName, DottedName, ExtraOptions, OptionName};
    use serde_json::json;

    fn spec(name: &str, option: &str, parser: ValueParser) -> OptionSpec {
        OptionSpec {
            argument_name: ArgumentName::from(name),
            option_name: OptionName::from(option),
            short_name: None,
            dotted_name: DottedName::from(name),
            parser,
            default: None,
            forwarded_default: None,
            required: false,
            help: None,
            multiple: false,
            is_flag: false,
            env: None,
            extra: ExtraOptions::default(),
        }
    }

    fn int_parser() -> ValueParser {
        ValueParser::new("integer", "INTEGER", |raw| {
            raw.parse::<i64>().map(Value::from).map_err(|e| e.to_string())
        })
    }

    fn bool_parser() -> ValueParser {
        ValueParser::new("boolean", "BOOLEAN", |raw| {
            parse_bool_token(raw).map(Value::Bool).ok_or_else(|| "bad".to_string())
        })
    }

    fn flag(name: &str, multiple: bool) -> OptionSpec {
        let option = format!("--{name}/--no-{name}");
        OptionSpec {
            is_flag: true,
            multiple,
            ..spec(name, &option, bool_parser())
        }
    }

    fn parse(specs: &[OptionSpec], argv: &[&str]) -> Kwargs {
        let cmd = add_options(Command::new("test"), specs);
        let matches = cmd.try_get_matches_from(argv.iter().copied()).unwrap();
        Kwargs::from_matches(&matches, specs).unwrap()
    }

    #[test]
    fn test_only_given_values_are_read() {
        let mut count = spec("count", "--count", int_parser());
        count.default = Some(OptionDefault::Value(json!(3)));
        let specs = [count, spec("other", "--other", int_parser())];
        let kwargs = parse(&specs, &["test", "--count", "5"]);
        assert_eq!(kwargs.get("count"), Some(&json!(5)));
        assert!(!kwargs.contains_key("other"));

        let kwargs = parse(&specs, &["test"]);
        assert!(kwargs.values().is_empty());
    }

    #[test]
    fn test_forwarded_default() {
        let mut count = spec("count", "--count", int_parser());
        count.forwarded_default = Some(json!(12));
        let kwargs = parse(&[count], &["test"]);
        assert_eq!(kwargs.get("count"), Some(&json!(12)));
    }

    #[test]
    fn test_dual_flag() {
        let specs = [flag("early_stopping", false)];
        let kwargs = parse(&specs, &["test", "--early_stopping"]);
        assert_eq!(kwargs.get("early_stopping"), Some(&json!(true)));
        let kwargs = parse(&specs, &["test", "--no-early_stopping"]);
        assert_eq!(kwargs.get("early_stopping"), Some(&json!(false)));
        let kwargs = parse(&specs, &["test", "--no-early_stopping", "--early_stopping"]);
        assert_eq!(kwargs.get("early_stopping"), Some(&json!(true)));
        let kwargs = parse(&specs, &["test"]);
        assert!(!kwargs.contains_key("early_stopping"));
    }

    #[test]
    fn test_repeatable_values_keep_order() {
        let mut a = spec("foos_a", "--foos-a", int_parser());
        a.multiple = true;
        let specs = [a, flag("foos_b", true)];
        let kwargs = parse(
            &specs,
            &["test", "--foos-a", "2", "--no-foos_b", "--foos-a", "3", "--foos_b"],
        );
        assert_eq!(kwargs.get("foos_a"), Some(&json!([2, 3])));
        assert_eq!(kwargs.get("foos_b"), Some(&json!([false, true])));
    }

    #[test]
    fn test_invalid_value_is_usage_error() {
        let specs = [spec("count", "--count", int_parser())];
        let cmd = add_options(Command::new("test"), &specs);
        let err = cmd
            .try_get_matches_from(["test", "--count", "x"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_models_round_trip_by_type() {
        let mut kwargs = Kwargs::new();
        kwargs.insert_model("config", 42_u32);
        assert_eq!(kwargs.model::<u32>("config"), Some(&42));
        assert!(kwargs.take_model::<String>("config").is_none());
        assert_eq!(kwargs.take_model::<u32>("config"), Some(42));
        assert!(kwargs.model::<u32>("config").is_none());
    }
}
