//! Command-line value parsers and the registry of string-parseable types.
//!
//! Every option gets a [`ValueParser`]: a display name plus a function from
//! the raw command-line string to a JSON value. [`map_type`] picks the parser
//! for a field, first match wins:
//!
//! 1. `Optional(scalar)` with a `null` default collapses to the scalar
//! 2. strings
//! 3. numbers, honoring declared bounds
//! 4. booleans
//! 5. literal choices
//! 6. registered domain types ([`TypeRegistry`])
//! 7. paths, dates, datetimes and times
//! 8. anything else decodes JSON text
//!
//! # Examples
//!
//! ```
//! use schemaclap::{TypeRegistry, map_type};
//! use schemaclap_core::{Constraint, FieldInfo, FieldShape};
//!
//! let field = FieldInfo::new("x", FieldShape::integer())
//!     .with_constraint(Constraint::Ge(0.0))
//!     .with_constraint(Constraint::Le(10.0));
//! let parser = map_type(&field, &TypeRegistry::with_defaults()).unwrap();
//! assert_eq!(parser.parse("5").unwrap(), serde_json::json!(5));
//! assert_eq!(parser.parse("11").unwrap_err(), "11 is not in the range 0<=x<=10.");
//! ```

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use clap::builder::TypedValueParser;
use clap::error::ErrorKind;
use regex::Regex;
use schemaclap_core::{
    Bound, FieldDefault, FieldInfo, FieldShape, ScalarType, check_value, literal_text,
    numeric_bounds, parse_bool_token,
};
use serde::de::DeserializeOwned;
use serde_json::{Number, Value};

type ParseFn = dyn Fn(&str) -> Result<Value, String> + Send + Sync;

/// A parser from raw command-line text to a JSON value.
#[derive(Clone)]
pub struct ValueParser {
    type_name: String,
    metavar: String,
    parse: Arc<ParseFn>,
}

impl ValueParser {
    /// Creates a parser; `metavar` is the placeholder shown in `--help`.
    pub fn new<F>(type_name: &str, metavar: &str, parse: F) -> Self
    where
        F: Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            type_name: type_name.to_string(),
            metavar: metavar.to_string(),
            parse: Arc::new(parse),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn metavar(&self) -> &str {
        &self.metavar
    }

    /// Parses one raw value.
    ///
    /// # Errors
    ///
    /// Returns a user-facing message describing why `raw` was rejected.
    pub fn parse(&self, raw: &str) -> Result<Value, String> {
        (self.parse)(raw)
    }
}

impl fmt::Debug for ValueParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueParser")
            .field("type_name", &self.type_name)
            .field("metavar", &self.metavar)
            .finish_non_exhaustive()
    }
}

impl TypedValueParser for ValueParser {
    type Value = Value;

    fn parse_ref(
        &self,
        cmd: &clap::Command,
        arg: Option<&clap::Arg>,
        value: &OsStr,
    ) -> Result<Self::Value, clap::Error> {
        let Some(raw) = value.to_str() else {
            return Err(clap::Error::raw(
                ErrorKind::InvalidUtf8,
                "invalid UTF-8 was detected in a value\n",
            )
            .format(&mut cmd.clone()));
        };
        self.parse(raw).map_err(|message| {
            let target = arg
                .map(ToString::to_string)
                .unwrap_or_else(|| "...".to_string());
            clap::Error::raw(
                ErrorKind::ValueValidation,
                format!("invalid value '{raw}' for '{target}': {message}\n"),
            )
            .format(&mut cmd.clone())
        })
    }
}

/// Picks the command-line parser for a field.
///
/// # Errors
///
/// Returns the reason when the field's type has no parser, which only
/// happens for domain types missing from `registry`.
pub fn map_type(field: &FieldInfo, registry: &TypeRegistry) -> Result<ValueParser, String> {
    if let FieldShape::Optional(inner) = &field.shape {
        let null_default = matches!(field.default, FieldDefault::Value(Value::Null));
        if let FieldShape::Scalar(scalar) = inner.as_ref() {
            if null_default && *scalar != ScalarType::Json {
                return map_scalar(scalar, field, registry);
            }
        }
    }

    match &field.shape {
        FieldShape::Scalar(ScalarType::Json) => Ok(json_parser(field.shape.clone())),
        FieldShape::Scalar(scalar) => map_scalar(scalar, field, registry),
        shape => Ok(json_parser(shape.clone())),
    }
}

fn map_scalar(
    scalar: &ScalarType,
    field: &FieldInfo,
    registry: &TypeRegistry,
) -> Result<ValueParser, String> {
    let parser = match scalar {
        ScalarType::String => {
            ValueParser::new("string", "TEXT", |raw| Ok(Value::String(raw.to_string())))
        }
        ScalarType::Integer | ScalarType::Float | ScalarType::Decimal => {
            let (lower, upper) = numeric_bounds(&field.constraints);
            numeric_parser(*scalar == ScalarType::Integer, lower, upper)
        }
        ScalarType::Bool => ValueParser::new("boolean", "BOOLEAN", |raw| {
            parse_bool_token(raw)
                .map(Value::Bool)
                .ok_or_else(|| format!("'{raw}' is not a valid boolean."))
        }),
        ScalarType::Literal(choices) => choice_parser(choices.clone()),
        ScalarType::Known(tag) => registry
            .get(tag)
            .cloned()
            .ok_or_else(|| format!("no parser registered for type '{tag}'"))?,
        ScalarType::Path => {
            ValueParser::new("path", "PATH", |raw| Ok(Value::String(raw.to_string())))
        }
        ScalarType::Date => ValueParser::new("date", "DATE", |raw| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(|_| Value::String(raw.to_string()))
                .map_err(|_| format!("'{raw}' does not match the format '%Y-%m-%d'."))
        }),
        ScalarType::DateTime => ValueParser::new("datetime", "DATETIME", |raw| {
            let valid = DateTime::parse_from_rfc3339(raw).is_ok()
                || NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
                || NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").is_ok();
            if valid {
                Ok(Value::String(raw.to_string()))
            } else {
                Err(format!(
                    "'{raw}' does not match the formats '%Y-%m-%dT%H:%M:%S', '%Y-%m-%d %H:%M:%S'."
                ))
            }
        }),
        ScalarType::Time => ValueParser::new("time", "TIME", |raw| {
            let valid = NaiveTime::parse_from_str(raw, "%H:%M:%S%.f").is_ok()
                || NaiveTime::parse_from_str(raw, "%H:%M").is_ok();
            if valid {
                Ok(Value::String(raw.to_string()))
            } else {
                Err(format!("'{raw}' does not match the formats '%H:%M:%S', '%H:%M'."))
            }
        }),
        ScalarType::Json => json_parser(FieldShape::Scalar(ScalarType::Json)),
    };
    Ok(parser)
}

fn describe_range(lower: Option<Bound>, upper: Option<Bound>) -> Option<String> {
    let op = |bound: &Bound| if bound.inclusive { "<=" } else { "<" };
    match (lower, upper) {
        (Some(l), Some(u)) => Some(format!("{}{}x{}{}", l.value, op(&l), op(&u), u.value)),
        (Some(l), None) => {
            let op = if l.inclusive { ">=" } else { ">" };
            Some(format!("x{op}{}", l.value))
        }
        (None, Some(u)) => Some(format!("x{}{}", op(&u), u.value)),
        (None, None) => None,
    }
}

fn in_range(value: f64, lower: Option<Bound>, upper: Option<Bound>) -> bool {
    let above = lower.is_none_or(|b| if b.inclusive { value >= b.value } else { value > b.value });
    let below = upper.is_none_or(|b| if b.inclusive { value <= b.value } else { value < b.value });
    above && below
}

fn numeric_parser(integer: bool, lower: Option<Bound>, upper: Option<Bound>) -> ValueParser {
    let range = describe_range(lower, upper);
    let (type_name, base) = if integer {
        ("integer", "INTEGER")
    } else {
        ("float", "FLOAT")
    };
    let metavar = match range {
        Some(_) => format!("{base} RANGE"),
        None => base.to_string(),
    };

    ValueParser::new(type_name, &metavar, move |raw| {
        let trimmed = raw.trim();
        let (value, number) = if integer {
            let parsed = trimmed
                .parse::<i64>()
                .map_err(|_| format!("'{raw}' is not a valid integer."))?;
            (Value::from(parsed), parsed as f64)
        } else {
            let parsed = trimmed
                .parse::<f64>()
                .map_err(|_| format!("'{raw}' is not a valid float."))?;
            let number =
                Number::from_f64(parsed).ok_or_else(|| format!("'{raw}' is not a valid float."))?;
            (Value::Number(number), parsed)
        };
        match &range {
            Some(range) if !in_range(number, lower, upper) => {
                Err(format!("{trimmed} is not in the range {range}."))
            }
            _ => Ok(value),
        }
    })
}

fn choice_parser(choices: Vec<Value>) -> ValueParser {
    let texts: Vec<String> = choices.iter().map(literal_text).collect();
    let metavar = format!("[{}]", texts.join("|"));
    ValueParser::new("choice", &metavar, move |raw| {
        match texts.iter().position(|text| text == raw) {
            Some(index) => Ok(choices[index].clone()),
            None => {
                let quoted: Vec<String> = texts.iter().map(|t| format!("'{t}'")).collect();
                Err(format!("'{raw}' is not one of {}.", quoted.join(", ")))
            }
        }
    })
}

/// Decodes JSON text and checks it against `shape`; shapes that accept a
/// plain string also take the raw text as is.
fn json_parser(shape: FieldShape) -> ValueParser {
    ValueParser::new("json", "JSON STRING", move |raw| {
        let decoded = serde_json::from_str::<Value>(raw);
        let first_error = match &decoded {
            Ok(value) => match check_value(&shape, &[], value) {
                Ok(checked) => return Ok(checked),
                Err(errors) => errors
                    .first()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "invalid value".to_string()),
            },
            Err(err) => format!("{raw:?} is not valid JSON: {err}"),
        };
        if shape.accepts_string() {
            if let Ok(checked) = check_value(&shape, &[], &Value::String(raw.to_string())) {
                return Ok(checked);
            }
        }
        Err(first_error)
    })
}

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s<>]+@[^@\s<>]+\.[^@\s<>]+$").expect("static regex must compile")
});
static NAMED_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^<>]*<(?P<addr>[^<>]+)>$").expect("static regex must compile")
});

fn parse_cidr(raw: &str) -> Result<(IpAddr, u8), String> {
    let (addr, prefix) = match raw.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (raw, None),
    };
    let ip: IpAddr = addr
        .parse()
        .map_err(|_| format!("'{raw}' is not a valid IP address."))?;
    let max = if ip.is_ipv4() { 32 } else { 128 };
    let prefix = match prefix {
        Some(prefix) => prefix
            .parse::<u8>()
            .ok()
            .filter(|p| *p <= max)
            .ok_or_else(|| format!("'{raw}' has an invalid prefix length."))?,
        None => max,
    };
    Ok((ip, prefix))
}

fn host_bits_clear(ip: IpAddr, prefix: u8) -> bool {
    match ip {
        IpAddr::V4(addr) => {
            let mask = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);
            u32::from(addr) & !mask == 0
        }
        IpAddr::V6(addr) => {
            let mask = u128::MAX.checked_shl(128 - u32::from(prefix)).unwrap_or(0);
            u128::from(addr) & !mask == 0
        }
    }
}

fn string_value(raw: &str) -> Value {
    Value::String(raw.to_string())
}

/// Parsers for string-parseable domain types, keyed by type tag.
///
/// [`TypeRegistry::with_defaults`] knows `secret`, `url`, `email`, `ip`,
/// `ipv4`, `ipv6`, `network`, `interface` and `uuid`.
///
/// # Examples
///
/// ```
/// use schemaclap::TypeRegistry;
///
/// #[derive(serde::Deserialize)]
/// #[serde(rename_all = "lowercase")]
/// enum Color {
///     Red,
///     Green,
/// }
///
/// let mut registry = TypeRegistry::with_defaults();
/// registry.register::<Color>("color", "COLOR");
///
/// let parser = registry.get("color").unwrap();
/// assert_eq!(parser.parse("red").unwrap(), serde_json::json!("red"));
/// assert!(parser.parse("blue").is_err());
/// assert!(registry.get("url").is_some());
/// ```
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    parsers: BTreeMap<String, ValueParser>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl TypeRegistry {
    /// A registry without any type.
    pub fn empty() -> Self {
        Self {
            parsers: BTreeMap::new(),
        }
    }

    /// A registry with the built-in domain types.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry
            .register_fn("secret", "TEXT", |raw| Ok(string_value(raw)))
            .register_fn("url", "URL", |raw| {
                url::Url::parse(raw)
                    .map(|url| Value::String(url.into()))
                    .map_err(|err| format!("'{raw}' is not a valid URL: {err}."))
            })
            .register_fn("email", "EMAIL", |raw| {
                let addr = NAMED_EMAIL
                    .captures(raw)
                    .and_then(|caps| caps.name("addr"))
                    .map_or(raw, |m| m.as_str());
                if EMAIL.is_match(addr.trim()) {
                    Ok(string_value(raw.trim()))
                } else {
                    Err(format!("'{raw}' is not a valid email address."))
                }
            })
            .register_fn("ip", "IP", |raw| {
                raw.parse::<IpAddr>()
                    .map(|ip| Value::String(ip.to_string()))
                    .map_err(|_| format!("'{raw}' is not a valid IP address."))
            })
            .register_fn("ipv4", "IPV4", |raw| {
                raw.parse::<Ipv4Addr>()
                    .map(|ip| Value::String(ip.to_string()))
                    .map_err(|_| format!("'{raw}' is not a valid IPv4 address."))
            })
            .register_fn("ipv6", "IPV6", |raw| {
                raw.parse::<Ipv6Addr>()
                    .map(|ip| Value::String(ip.to_string()))
                    .map_err(|_| format!("'{raw}' is not a valid IPv6 address."))
            })
            .register_fn("network", "NETWORK", |raw| {
                let (ip, prefix) = parse_cidr(raw)?;
                if host_bits_clear(ip, prefix) {
                    Ok(Value::String(format!("{ip}/{prefix}")))
                } else {
                    Err(format!("'{raw}' has host bits set."))
                }
            })
            .register_fn("interface", "INTERFACE", |raw| {
                let (ip, prefix) = parse_cidr(raw)?;
                Ok(Value::String(format!("{ip}/{prefix}")))
            })
            .register_fn("uuid", "UUID", |raw| {
                uuid::Uuid::parse_str(raw)
                    .map(|id| Value::String(id.hyphenated().to_string()))
                    .map_err(|err| format!("'{raw}' is not a valid UUID: {err}."))
            });
        registry
    }

    /// Registers a type whose values deserialize from a JSON string.
    ///
    /// The parser validates through `serde_json::from_value::<T>` and passes
    /// the raw string on to the schema engine.
    pub fn register<T>(&mut self, tag: &str, metavar: &str) -> &mut Self
    where
        T: DeserializeOwned + 'static,
    {
        self.register_fn(tag, metavar, |raw| {
            serde_json::from_value::<T>(string_value(raw))
                .map(|_| string_value(raw))
                .map_err(|err| format!("'{raw}' is not valid: {err}"))
        })
    }

    /// Registers a type with an explicit parse function.
    pub fn register_fn<F>(&mut self, tag: &str, metavar: &str, parse: F) -> &mut Self
    where
        F: Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.parsers
            .insert(tag.to_string(), ValueParser::new(tag, metavar, parse));
        self
    }

    pub fn get(&self, tag: &str) -> Option<&ValueParser> {
        self.parsers.get(tag)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.parsers.contains_key(tag)
    }
}

static GLOBAL_REGISTRY: LazyLock<RwLock<TypeRegistry>> =
    LazyLock::new(|| RwLock::new(TypeRegistry::with_defaults()));

/// Snapshot of the process-wide registry.
pub fn global_registry() -> TypeRegistry {
    GLOBAL_REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Registers a type in the process-wide registry.
///
/// Options built afterwards pick it up; already built options keep the
/// registry they were built with.
pub fn register_type<T>(tag: &str, metavar: &str)
where
    T: DeserializeOwned + 'static,
{
    GLOBAL_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register::<T>(tag, metavar);
}

/// Registers a type with an explicit parse function in the process-wide
/// registry.
pub fn register_type_fn<F>(tag: &str, metavar: &str, parse: F)
where
    F: Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
{
    GLOBAL_REGISTRY
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register_fn(tag, metavar, parse);
}
