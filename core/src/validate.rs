//! Validating construction of model data.
//!
//! [`Schema::validate`] turns nested raw data into data that satisfies the
//! schema: missing fields are filled from defaults, values are checked
//! against their [`FieldShape`] and [`Constraint`]s, and every problem is
//! reported with its location instead of stopping at the first one.
//!
//! Checking is lax: numeric and boolean strings are coerced the way they
//! arrive from the command line or environment. Unions are matched in two
//! passes, first without coercion and then with it, so `"5"` matches a
//! `string` arm before an `integer` arm.
//!
//! # Examples
//!
//! ```
//! use schemaclap_core::*;
//! use serde_json::json;
//!
//! let schema = Schema::new("Training")
//!     .field(FieldInfo::new("epochs", FieldShape::integer()).with_constraint(Constraint::Gt(0.0)))
//!     .field(FieldInfo::new("lr", FieldShape::float()).with_default(0.01));
//!
//! let data = schema.validate(&json!({"epochs": "3"})).unwrap();
//! assert_eq!(data, json!({"epochs": 3, "lr": 0.01}));
//!
//! let err = schema.validate(&json!({"epochs": 0})).unwrap_err();
//! assert_eq!(err.errors.len(), 1);
//! assert!(err.to_string().starts_with("1 validation error for Training"));
//! ```

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::{Constraint, FieldShape, Model, ScalarType, Schema, numeric_bounds};

/// What went wrong with one value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldErrorKind {
    #[error("field required")]
    Missing,
    #[error("input should be a valid {0}")]
    InvalidType(String),
    #[error("input should be {0}")]
    OutOfRange(String),
    #[error("{0}")]
    InvalidLength(String),
    #[error("string should match pattern '{0}'")]
    PatternMismatch(String),
    #[error("input should be {0}")]
    NotOneOf(String),
    #[error("input does not match any member of the union")]
    NoMatchingUnionArm,
    #[error("{0}")]
    Deserialize(String),
}

/// A problem at one location of the validated data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Path from the model root, field names and list indices.
    pub loc: Vec<String>,
    pub kind: FieldErrorKind,
}

impl FieldError {
    fn new(loc: &[String], kind: FieldErrorKind) -> Self {
        Self {
            loc: loc.to_vec(),
            kind,
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.loc.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}\n  {}", self.loc.join("."), self.kind)
        }
    }
}

/// Structured validation failure for one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub model: String,
    pub errors: Vec<FieldError>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.errors.len();
        let plural = if count == 1 { "" } else { "s" };
        write!(f, "{count} validation error{plural} for {}", self.model)?;
        for error in &self.errors {
            write!(f, "\n{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Strict,
    Lax,
}

impl Schema {
    /// Validates nested raw data, returning the completed data.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] listing every field that is missing or
    /// does not satisfy its shape and constraints.
    pub fn validate(&self, raw: &Value) -> Result<Value, ValidationError> {
        let mut errors = Vec::new();
        let data = validate_object(self, raw, &mut Vec::new(), &mut errors, Mode::Lax);
        if errors.is_empty() {
            Ok(data)
        } else {
            Err(ValidationError {
                model: self.name.clone(),
                errors,
            })
        }
    }

    /// Validates `raw` and deserializes the completed data into `T`.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if validation fails, or if the validated
    /// data does not deserialize into `T`.
    pub fn instantiate<T: DeserializeOwned>(&self, raw: &Value) -> Result<T, ValidationError> {
        let data = self.validate(raw)?;
        serde_json::from_value(data).map_err(|err| ValidationError {
            model: self.name.clone(),
            errors: vec![FieldError::new(
                &[],
                FieldErrorKind::Deserialize(err.to_string()),
            )],
        })
    }
}

/// Validates `raw` against `T`'s schema and deserializes the result.
///
/// # Errors
///
/// Returns a [`ValidationError`] if validation fails, or if the validated
/// data does not deserialize into `T`.
///
/// # Examples
///
/// ```
/// use schemaclap_core::{FieldInfo, FieldShape, Model, Schema, validate_model};
///
/// #[derive(Debug, serde::Deserialize, PartialEq)]
/// struct Point {
///     x: i64,
///     y: i64,
/// }
///
/// impl Model for Point {
///     fn schema() -> Schema {
///         Schema::new("Point")
///             .field(FieldInfo::new("x", FieldShape::integer()))
///             .field(FieldInfo::new("y", FieldShape::integer()).with_default(0))
///     }
/// }
///
/// let point: Point = validate_model(&serde_json::json!({"x": "2"})).unwrap();
/// assert_eq!(point, Point { x: 2, y: 0 });
/// ```
pub fn validate_model<T: Model>(raw: &Value) -> Result<T, ValidationError> {
    T::schema().instantiate(raw)
}

/// Checks a single value against a shape and its constraints.
///
/// # Errors
///
/// Returns every [`FieldError`] found, located relative to the value.
///
/// ```
/// use schemaclap_core::{Constraint, FieldShape, check_value};
/// use serde_json::json;
///
/// let shape = FieldShape::list(FieldShape::integer());
/// assert_eq!(check_value(&shape, &[], &json!(["1", 2])).unwrap(), json!([1, 2]));
///
/// let errors = check_value(&shape, &[Constraint::MaxItems(1)], &json!([1, 2])).unwrap_err();
/// assert_eq!(errors.len(), 1);
/// ```
pub fn check_value(
    shape: &FieldShape,
    constraints: &[Constraint],
    value: &Value,
) -> Result<Value, Vec<FieldError>> {
    let mut errors = Vec::new();
    let checked = check_shape(shape, constraints, value, &mut Vec::new(), &mut errors, Mode::Lax);
    if errors.is_empty() {
        Ok(checked)
    } else {
        Err(errors)
    }
}

fn validate_object(
    schema: &Schema,
    raw: &Value,
    loc: &mut Vec<String>,
    errors: &mut Vec<FieldError>,
    mode: Mode,
) -> Value {
    let Some(input) = raw.as_object() else {
        errors.push(FieldError::new(
            loc,
            FieldErrorKind::InvalidType("dictionary".to_string()),
        ));
        return Value::Null;
    };

    let mut output = Map::new();
    for field in &schema.fields {
        loc.push(field.name.clone());
        match input.get(&field.name) {
            Some(value) => {
                let checked =
                    check_shape(&field.shape, &field.constraints, value, loc, errors, mode);
                output.insert(field.name.clone(), checked);
            }
            None => match field.default_value() {
                Some(default) => {
                    output.insert(field.name.clone(), default);
                }
                None => errors.push(FieldError::new(loc, FieldErrorKind::Missing)),
            },
        }
        loc.pop();
    }
    Value::Object(output)
}

fn check_shape(
    shape: &FieldShape,
    constraints: &[Constraint],
    value: &Value,
    loc: &mut Vec<String>,
    errors: &mut Vec<FieldError>,
    mode: Mode,
) -> Value {
    let before = errors.len();
    let checked = match shape {
        FieldShape::Scalar(scalar) => match check_scalar(scalar, value, mode) {
            Ok(v) => v,
            Err(kind) => {
                errors.push(FieldError::new(loc, kind));
                return value.clone();
            }
        },
        FieldShape::Optional(inner) => {
            if value.is_null() {
                return Value::Null;
            }
            return check_shape(inner, constraints, value, loc, errors, mode);
        }
        FieldShape::List(item) => {
            let Some(items) = value.as_array() else {
                errors.push(FieldError::new(
                    loc,
                    FieldErrorKind::InvalidType("list".to_string()),
                ));
                return value.clone();
            };
            let mut output = Vec::with_capacity(items.len());
            for (index, element) in items.iter().enumerate() {
                loc.push(index.to_string());
                output.push(check_shape(item, &[], element, loc, errors, mode));
                loc.pop();
            }
            Value::Array(output)
        }
        FieldShape::Map(inner) => {
            let Some(entries) = value.as_object() else {
                errors.push(FieldError::new(
                    loc,
                    FieldErrorKind::InvalidType("dictionary".to_string()),
                ));
                return value.clone();
            };
            let mut output = Map::new();
            for (key, element) in entries {
                loc.push(key.clone());
                output.insert(key.clone(), check_shape(inner, &[], element, loc, errors, mode));
                loc.pop();
            }
            Value::Object(output)
        }
        FieldShape::Union(arms) => match match_union(arms, value, loc) {
            Some(v) => v,
            None => {
                errors.push(FieldError::new(loc, FieldErrorKind::NoMatchingUnionArm));
                return value.clone();
            }
        },
        FieldShape::Nested(schema) => validate_object(schema, value, loc, errors, mode),
    };

    if errors.len() == before {
        if let Err(kind) = check_constraints(constraints, &checked) {
            errors.push(FieldError::new(loc, kind));
        }
    }
    checked
}

fn match_union(arms: &[FieldShape], value: &Value, loc: &mut Vec<String>) -> Option<Value> {
    for mode in [Mode::Strict, Mode::Lax] {
        for arm in arms {
            let mut scratch = Vec::new();
            let checked = check_shape(arm, &[], value, loc, &mut scratch, mode);
            if scratch.is_empty() {
                return Some(checked);
            }
        }
    }
    None
}

const TRUE_TOKENS: &[&str] = &["true", "1", "yes", "y", "on", "t"];
const FALSE_TOKENS: &[&str] = &["false", "0", "no", "n", "off", "f"];

/// Parses a boolean token (`true/false/yes/no/1/0/on/off/t/f/y/n`, any case).
///
/// ```
/// assert_eq!(schemaclap_core::parse_bool_token("Yes"), Some(true));
/// assert_eq!(schemaclap_core::parse_bool_token("off"), Some(false));
/// assert_eq!(schemaclap_core::parse_bool_token("maybe"), None);
/// ```
pub fn parse_bool_token(token: &str) -> Option<bool> {
    let lowered = token.trim().to_lowercase();
    if TRUE_TOKENS.contains(&lowered.as_str()) {
        Some(true)
    } else if FALSE_TOKENS.contains(&lowered.as_str()) {
        Some(false)
    } else {
        None
    }
}

fn invalid(expected: &str) -> FieldErrorKind {
    FieldErrorKind::InvalidType(expected.to_string())
}

// `i64::MAX as f64` rounds up to 2^63, so the upper bound is exclusive.
const I64_MIN: f64 = i64::MIN as f64;
const I64_MAX: f64 = i64::MAX as f64;

fn check_scalar(scalar: &ScalarType, value: &Value, mode: Mode) -> Result<Value, FieldErrorKind> {
    let lax = mode == Mode::Lax;
    match scalar {
        ScalarType::String | ScalarType::Path | ScalarType::Known(_) => match value {
            Value::String(_) => Ok(value.clone()),
            _ => Err(invalid("string")),
        },
        ScalarType::Integer => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
            Value::Number(n) if lax => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && (I64_MIN..I64_MAX).contains(f))
                .map(|f| Value::from(f as i64))
                .ok_or_else(|| invalid("integer")),
            Value::String(s) if lax => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| invalid("integer")),
            _ => Err(invalid("integer")),
        },
        ScalarType::Float | ScalarType::Decimal => match value {
            Value::Number(_) => Ok(value.clone()),
            Value::String(s) if lax => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| invalid("number")),
            _ => Err(invalid("number")),
        },
        ScalarType::Bool => match value {
            Value::Bool(_) => Ok(value.clone()),
            Value::String(s) if lax => parse_bool_token(s)
                .map(Value::Bool)
                .ok_or_else(|| invalid("boolean")),
            Value::Number(n) if lax => match n.as_i64() {
                Some(0) => Ok(Value::Bool(false)),
                Some(1) => Ok(Value::Bool(true)),
                _ => Err(invalid("boolean")),
            },
            _ => Err(invalid("boolean")),
        },
        ScalarType::Literal(choices) => {
            if let Some(found) = choices.iter().find(|c| *c == value) {
                return Ok(found.clone());
            }
            if lax {
                if let Value::String(s) = value {
                    if let Some(found) = choices.iter().find(|c| literal_text(c) == *s) {
                        return Ok(found.clone());
                    }
                }
            }
            Err(FieldErrorKind::NotOneOf(describe_choices(choices)))
        }
        ScalarType::Date => match value.as_str() {
            Some(s) if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() => Ok(value.clone()),
            _ => Err(invalid("date")),
        },
        ScalarType::DateTime => match value.as_str() {
            Some(s) if is_datetime(s) => Ok(value.clone()),
            _ => Err(invalid("datetime")),
        },
        ScalarType::Time => match value.as_str() {
            Some(s) if is_time(s) => Ok(value.clone()),
            _ => Err(invalid("time")),
        },
        ScalarType::Json => Ok(value.clone()),
    }
}

/// Text form of a literal as typed on the command line.
pub fn literal_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn describe_choices(choices: &[Value]) -> String {
    let quoted: Vec<String> = choices
        .iter()
        .map(|c| format!("'{}'", literal_text(c)))
        .collect();
    match quoted.split_last() {
        Some((last, rest)) if !rest.is_empty() => format!("{} or {last}", rest.join(", ")),
        Some((last, _)) => last.clone(),
        None => "nothing".to_string(),
    }
}

fn is_datetime(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").is_ok()
}

fn is_time(s: &str) -> bool {
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f").is_ok()
        || NaiveTime::parse_from_str(s, "%H:%M").is_ok()
}

fn check_constraints(constraints: &[Constraint], value: &Value) -> Result<(), FieldErrorKind> {
    if let Some(number) = value.as_f64() {
        let (lower, upper) = numeric_bounds(constraints);
        if let Some(bound) = lower {
            let ok = if bound.inclusive { number >= bound.value } else { number > bound.value };
            if !ok {
                let op = if bound.inclusive { "greater than or equal to" } else { "greater than" };
                return Err(FieldErrorKind::OutOfRange(format!("{op} {}", bound.value)));
            }
        }
        if let Some(bound) = upper {
            let ok = if bound.inclusive { number <= bound.value } else { number < bound.value };
            if !ok {
                let op = if bound.inclusive { "less than or equal to" } else { "less than" };
                return Err(FieldErrorKind::OutOfRange(format!("{op} {}", bound.value)));
            }
        }
    }

    for constraint in constraints {
        match (constraint, value) {
            (Constraint::MinLength(min), Value::String(s)) if s.chars().count() < *min => {
                return Err(FieldErrorKind::InvalidLength(format!(
                    "string should have at least {min} characters"
                )));
            }
            (Constraint::MaxLength(max), Value::String(s)) if s.chars().count() > *max => {
                return Err(FieldErrorKind::InvalidLength(format!(
                    "string should have at most {max} characters"
                )));
            }
            (Constraint::MinItems(min), _) if item_count(value).is_some_and(|n| n < *min) => {
                return Err(FieldErrorKind::InvalidLength(format!(
                    "collection should have at least {min} items"
                )));
            }
            (Constraint::MaxItems(max), _) if item_count(value).is_some_and(|n| n > *max) => {
                return Err(FieldErrorKind::InvalidLength(format!(
                    "collection should have at most {max} items"
                )));
            }
            (Constraint::Pattern(pattern), Value::String(s)) => {
                let matched = Regex::new(pattern).map(|re| re.is_match(s)).unwrap_or(false);
                if !matched {
                    return Err(FieldErrorKind::PatternMismatch(pattern.clone()));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn item_count(value: &Value) -> Option<usize> {
    match value {
        Value::Array(items) => Some(items.len()),
        Value::Object(entries) => Some(entries.len()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldInfo;
    use serde_json::json;

    fn foo() -> Schema {
        Schema::new("Foo")
            .field(FieldInfo::new("a", FieldShape::integer()))
            .field(FieldInfo::new("b", FieldShape::boolean()).with_default(true))
    }

    fn bar() -> Schema {
        Schema::new("Bar")
            .field(FieldInfo::new("name", FieldShape::string()))
            .field(FieldInfo::new("foos", FieldShape::list(FieldShape::nested(foo()))))
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let data = foo().validate(&json!({"a": 1})).unwrap();
        assert_eq!(data, json!({"a": 1, "b": true}));
    }

    #[test]
    fn test_collects_every_error() {
        let err = bar()
            .validate(&json!({"foos": [{"a": "x"}, {"b": "nope"}]}))
            .unwrap_err();
        let locs: Vec<String> = err.errors.iter().map(|e| e.loc.join(".")).collect();
        assert_eq!(locs, ["name", "foos.0.a", "foos.1.a", "foos.1.b"]);
        assert_eq!(err.errors[0].kind, FieldErrorKind::Missing);
        assert!(err.to_string().starts_with("4 validation errors for Bar"));
    }

    #[test]
    fn test_lax_coercion() {
        let schema = Schema::new("S")
            .field(FieldInfo::new("i", FieldShape::integer()))
            .field(FieldInfo::new("f", FieldShape::float()))
            .field(FieldInfo::new("b", FieldShape::boolean()));
        let data = schema
            .validate(&json!({"i": "7", "f": "0.5", "b": "off"}))
            .unwrap();
        assert_eq!(data, json!({"i": 7, "f": 0.5, "b": false}));
    }

    #[test]
    fn test_lax_integer_out_of_range() {
        let shape = FieldShape::integer();
        assert_eq!(check_value(&shape, &[], &json!(3.0)).unwrap(), json!(3));
        assert_eq!(check_value(&shape, &[], &json!(-9.0e18)).unwrap(), json!(-9_000_000_000_000_000_000_i64));
        for big in [json!(1e30), json!(-1e300), json!(9.223372036854775807e18)] {
            let err = check_value(&shape, &[], &big).unwrap_err();
            assert_eq!(err[0].kind, invalid("integer"), "{big}");
        }
        let list = FieldShape::list(FieldShape::integer());
        assert!(check_value(&list, &[], &json!([1, -1e300])).is_err());
    }

    #[test]
    fn test_range_constraints() {
        let field = FieldInfo::new("x", FieldShape::float())
            .with_constraint(Constraint::Gt(0.0))
            .with_constraint(Constraint::Lt(10.0));
        let schema = Schema::new("R").field(field);
        assert!(schema.validate(&json!({"x": 5})).is_ok());
        let err = schema.validate(&json!({"x": 10})).unwrap_err();
        assert_eq!(
            err.errors[0].kind,
            FieldErrorKind::OutOfRange("less than 10".to_string())
        );
        let err = schema.validate(&json!({"x": 0})).unwrap_err();
        assert_eq!(err.errors[0].kind.to_string(), "input should be greater than 0");
    }

    #[test]
    fn test_literal_choices() {
        let shape = FieldShape::literal(["sgd", "adam"]);
        assert_eq!(check_value(&shape, &[], &json!("adam")).unwrap(), json!("adam"));
        let errors = check_value(&shape, &[], &json!("rmsprop")).unwrap_err();
        assert_eq!(errors[0].kind.to_string(), "input should be 'sgd' or 'adam'");

        let numeric = FieldShape::literal([1, 2]);
        assert_eq!(check_value(&numeric, &[], &json!("2")).unwrap(), json!(2));
    }

    #[test]
    fn test_union_prefers_exact_match() {
        let shape = FieldShape::union(vec![FieldShape::integer(), FieldShape::string()]);
        assert_eq!(check_value(&shape, &[], &json!("5")).unwrap(), json!("5"));
        assert_eq!(check_value(&shape, &[], &json!(5)).unwrap(), json!(5));
        assert!(check_value(&shape, &[], &json!([1])).is_err());
    }

    #[test]
    fn test_optional_accepts_null() {
        let shape = FieldShape::optional(FieldShape::integer());
        assert_eq!(check_value(&shape, &[], &Value::Null).unwrap(), Value::Null);
        assert_eq!(check_value(&shape, &[], &json!("3")).unwrap(), json!(3));
    }

    #[test]
    fn test_length_and_pattern() {
        let constraints = [Constraint::MinLength(2), Constraint::Pattern("^[a-z]+$".into())];
        assert!(check_value(&FieldShape::string(), &constraints, &json!("ab")).is_ok());
        assert!(check_value(&FieldShape::string(), &constraints, &json!("a")).is_err());
        let errors = check_value(&FieldShape::string(), &constraints, &json!("AB")).unwrap_err();
        assert_eq!(errors[0].kind, FieldErrorKind::PatternMismatch("^[a-z]+$".into()));
    }

    #[test]
    fn test_dates_and_times() {
        assert!(check_value(&FieldShape::date(), &[], &json!("2024-01-31")).is_ok());
        assert!(check_value(&FieldShape::date(), &[], &json!("2024-02-31")).is_err());
        assert!(check_value(&FieldShape::datetime(), &[], &json!("2024-01-31T10:00:00")).is_ok());
        assert!(check_value(&FieldShape::datetime(), &[], &json!("2024-01-31T10:00:00+02:00")).is_ok());
        assert!(check_value(&FieldShape::time(), &[], &json!("10:30")).is_ok());
        assert!(check_value(&FieldShape::time(), &[], &json!("25:00")).is_err());
    }

    #[test]
    fn test_nested_requires_mapping() {
        let shape = FieldShape::nested(foo());
        let errors = check_value(&shape, &[], &json!(3)).unwrap_err();
        assert_eq!(errors[0].kind, FieldErrorKind::InvalidType("dictionary".into()));
    }
}
