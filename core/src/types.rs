//! Schema model consumed by the conversion pipeline.
//!
//! A [`Schema`] is a named, ordered list of [`FieldInfo`]s. Each field has a
//! closed [`FieldShape`] describing how its values nest, a [`FieldDefault`],
//! optional [`Constraint`]s and optional per-field conversion annotations.
//! Typed models expose their schema through the [`Model`] trait.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::{CliConfig, ExtraOptions, FieldCliOptions};
use crate::docstrings::{DocstringStyle, parse_attribute_docs};
use crate::names::{DottedName, OptionName};

/// Leaf value types.
///
/// # Examples
///
/// ```
/// use schemaclap_core::ScalarType;
///
/// assert!(ScalarType::Integer.is_numeric());
/// assert!(ScalarType::Decimal.is_numeric());
/// assert!(!ScalarType::Bool.is_numeric());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarType {
    String,
    Integer,
    Float,
    /// Non-integer number with float semantics on the command line.
    Decimal,
    Bool,
    /// One of a closed set of literal values.
    Literal(Vec<Value>),
    Path,
    /// ISO 8601 date (`2024-01-31`).
    Date,
    /// ISO 8601 date and time.
    DateTime,
    /// ISO 8601 time of day.
    Time,
    /// A string-parseable domain type, looked up by tag in the type registry.
    Known(String),
    /// Arbitrary JSON value.
    Json,
}

impl ScalarType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float | Self::Decimal)
    }
}

/// Closed description of how a field's values nest.
///
/// # Examples
///
/// ```
/// use schemaclap_core::{FieldShape, Schema};
///
/// let foo = Schema::new("Foo");
/// let shape = FieldShape::list(FieldShape::nested(foo));
/// assert_eq!(shape.list_item_schema().map(|s| s.name.as_str()), Some("Foo"));
///
/// let opt = FieldShape::optional(FieldShape::integer());
/// assert!(opt.is_optional());
/// assert!(opt.nested_schema().is_none());
/// ```
#[derive(Debug, Clone)]
pub enum FieldShape {
    Scalar(ScalarType),
    /// Value or `null`.
    Optional(Box<FieldShape>),
    List(Box<FieldShape>),
    /// String-keyed mapping.
    Map(Box<FieldShape>),
    /// First matching arm wins.
    Union(Vec<FieldShape>),
    Nested(Arc<Schema>),
}

impl FieldShape {
    pub fn string() -> Self {
        Self::Scalar(ScalarType::String)
    }

    pub fn integer() -> Self {
        Self::Scalar(ScalarType::Integer)
    }

    pub fn float() -> Self {
        Self::Scalar(ScalarType::Float)
    }

    pub fn decimal() -> Self {
        Self::Scalar(ScalarType::Decimal)
    }

    pub fn boolean() -> Self {
        Self::Scalar(ScalarType::Bool)
    }

    pub fn path() -> Self {
        Self::Scalar(ScalarType::Path)
    }

    pub fn date() -> Self {
        Self::Scalar(ScalarType::Date)
    }

    pub fn datetime() -> Self {
        Self::Scalar(ScalarType::DateTime)
    }

    pub fn time() -> Self {
        Self::Scalar(ScalarType::Time)
    }

    pub fn json() -> Self {
        Self::Scalar(ScalarType::Json)
    }

    /// Closed set of literal choices.
    pub fn literal<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Scalar(ScalarType::Literal(
            values.into_iter().map(Into::into).collect(),
        ))
    }

    /// Domain type registered under `tag`.
    pub fn known(tag: &str) -> Self {
        Self::Scalar(ScalarType::Known(tag.to_string()))
    }

    pub fn optional(inner: FieldShape) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn list(item: FieldShape) -> Self {
        Self::List(Box::new(item))
    }

    pub fn map(value: FieldShape) -> Self {
        Self::Map(Box::new(value))
    }

    pub fn union(arms: Vec<FieldShape>) -> Self {
        Self::Union(arms)
    }

    pub fn nested(schema: Schema) -> Self {
        Self::Nested(Arc::new(schema))
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Self::Optional(_))
    }

    /// Returns the scalar type, looking through one optional wrapper.
    pub fn scalar(&self) -> Option<&ScalarType> {
        match self {
            Self::Scalar(s) => Some(s),
            Self::Optional(inner) => match inner.as_ref() {
                Self::Scalar(s) => Some(s),
                _ => None,
            },
            _ => None,
        }
    }

    /// Schema of a nested field, directly or as the sole member of an
    /// optional wrapper.
    pub fn nested_schema(&self) -> Option<&Arc<Schema>> {
        match self {
            Self::Nested(schema) => Some(schema),
            Self::Optional(inner) => match inner.as_ref() {
                Self::Nested(schema) => Some(schema),
                _ => None,
            },
            _ => None,
        }
    }

    /// Item schema of a `list<Schema>` field.
    pub fn list_item_schema(&self) -> Option<&Arc<Schema>> {
        match self {
            Self::List(item) => match item.as_ref() {
                Self::Nested(schema) => Some(schema),
                _ => None,
            },
            _ => None,
        }
    }

    /// Schema members of a union, in declaration order.
    ///
    /// An optional union (`Optional(Union(..))`) is looked through.
    pub fn union_schemas(&self) -> Vec<&Arc<Schema>> {
        match self {
            Self::Union(arms) => arms
                .iter()
                .filter_map(|arm| match arm {
                    Self::Nested(schema) => Some(schema),
                    _ => None,
                })
                .collect(),
            Self::Optional(inner) => inner.union_schemas(),
            _ => Vec::new(),
        }
    }

    /// Returns `true` if a plain JSON string can satisfy this shape.
    pub fn accepts_string(&self) -> bool {
        match self {
            Self::Scalar(ScalarType::Literal(values)) => values.iter().any(Value::is_string),
            Self::Scalar(ScalarType::Bool) => false,
            Self::Scalar(s) => !s.is_numeric(),
            Self::Optional(inner) => inner.accepts_string(),
            Self::Union(arms) => arms.iter().any(Self::accepts_string),
            Self::List(_) | Self::Map(_) | Self::Nested(_) => false,
        }
    }
}

/// Declared constraint on a field's value.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Exclusive lower bound.
    Gt(f64),
    /// Inclusive lower bound.
    Ge(f64),
    /// Exclusive upper bound.
    Lt(f64),
    /// Inclusive upper bound.
    Le(f64),
    MinLength(usize),
    MaxLength(usize),
    MinItems(usize),
    MaxItems(usize),
    /// Regular expression a string value must match.
    Pattern(String),
}

/// Numeric bound extracted from a set of constraints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound {
    pub value: f64,
    pub inclusive: bool,
}

/// Returns the lower and upper numeric bounds declared in `constraints`.
///
/// The last declaration of each side wins.
///
/// ```
/// use schemaclap_core::{Constraint, numeric_bounds};
///
/// let (lower, upper) = numeric_bounds(&[Constraint::Gt(0.0), Constraint::Le(10.0)]);
/// assert!(!lower.unwrap().inclusive);
/// assert_eq!(upper.unwrap().value, 10.0);
/// ```
pub fn numeric_bounds(constraints: &[Constraint]) -> (Option<Bound>, Option<Bound>) {
    let mut lower = None;
    let mut upper = None;
    for constraint in constraints {
        match *constraint {
            Constraint::Gt(value) => lower = Some(Bound { value, inclusive: false }),
            Constraint::Ge(value) => lower = Some(Bound { value, inclusive: true }),
            Constraint::Lt(value) => upper = Some(Bound { value, inclusive: false }),
            Constraint::Le(value) => upper = Some(Bound { value, inclusive: true }),
            _ => {}
        }
    }
    (lower, upper)
}

/// Default of a field.
#[derive(Debug, Clone, Default)]
pub enum FieldDefault {
    /// No default: the field must be supplied.
    #[default]
    Required,
    Value(Value),
    /// Produces a fresh default each time one is needed.
    Factory(fn() -> Value),
}

/// A single field of a [`Schema`].
///
/// # Examples
///
/// ```
/// use schemaclap_core::{Constraint, FieldInfo, FieldShape};
///
/// let epochs = FieldInfo::new("epochs", FieldShape::integer())
///     .with_default(4)
///     .with_constraint(Constraint::Gt(0.0))
///     .with_description("number of epochs");
/// assert!(!epochs.is_required());
/// assert_eq!(epochs.default_value(), Some(serde_json::json!(4)));
///
/// let verbose = FieldInfo::new("verbose", FieldShape::boolean());
/// assert!(verbose.is_required());
/// assert!(verbose.is_boolean_flag());
/// ```
#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub name: String,
    pub shape: FieldShape,
    pub default: FieldDefault,
    pub constraints: Vec<Constraint>,
    /// Field-level description; takes priority over docstring text.
    pub description: Option<String>,
    /// Conversion annotations attached to the field.
    pub cli: Option<FieldCliOptions>,
}

impl FieldInfo {
    /// Creates a required field.
    pub fn new(name: &str, shape: FieldShape) -> Self {
        Self {
            name: name.to_string(),
            shape,
            default: FieldDefault::Required,
            constraints: Vec::new(),
            description: None,
            cli: None,
        }
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = FieldDefault::Value(value.into());
        self
    }

    pub fn with_factory(mut self, factory: fn() -> Value) -> Self {
        self.default = FieldDefault::Factory(factory);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Attaches an annotation; several annotations merge left to right.
    pub fn with_cli(mut self, options: FieldCliOptions) -> Self {
        self.cli = Some(match self.cli.take() {
            Some(existing) => existing.merge(&options),
            None => options,
        });
        self
    }

    pub fn is_required(&self) -> bool {
        matches!(self.default, FieldDefault::Required)
    }

    pub fn is_boolean_flag(&self) -> bool {
        matches!(self.shape, FieldShape::Scalar(ScalarType::Bool))
    }

    /// Resolves the default, calling the factory if there is one.
    pub fn default_value(&self) -> Option<Value> {
        match &self.default {
            FieldDefault::Required => None,
            FieldDefault::Value(value) => Some(value.clone()),
            FieldDefault::Factory(factory) => Some(factory()),
        }
    }
}

/// A named aggregate of typed fields.
///
/// # Examples
///
/// ```
/// use schemaclap_core::{FieldInfo, FieldShape, Schema};
///
/// let base = Schema::new("Base")
///     .with_doc("Base.\n\nAttributes:\n    a: from base\n    b: base b\n")
///     .field(FieldInfo::new("a", FieldShape::integer()))
///     .field(FieldInfo::new("b", FieldShape::string()));
///
/// let child = Schema::new("Child")
///     .extending(base)
///     .with_doc("Child.\n\nAttributes:\n    b: child b\n")
///     .field(FieldInfo::new("b", FieldShape::string()).with_default("x"))
///     .field(FieldInfo::new("c", FieldShape::float()));
///
/// let names: Vec<&str> = child.fields.iter().map(|f| f.name.as_str()).collect();
/// assert_eq!(names, ["a", "b", "c"]);
///
/// let docs = child.attribute_docs(Default::default());
/// assert_eq!(docs["a"], "from base");
/// assert_eq!(docs["b"], "child b");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub name: String,
    /// Docstring, possibly carrying an attribute section.
    pub doc: Option<String>,
    pub fields: Vec<FieldInfo>,
    /// Schema this one extends.
    pub base: Option<Arc<Schema>>,
    /// Conversion settings embedded in the schema.
    pub config: Option<CliConfig>,
}

impl Schema {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Inherits every field of `base`, in its declaration order.
    ///
    /// Fields declared on `self` (before or after this call) replace an
    /// inherited field of the same name in place.
    pub fn extending(mut self, base: Schema) -> Self {
        let own = std::mem::replace(&mut self.fields, base.fields.clone());
        for field in own {
            self.upsert_field(field);
        }
        self.base = Some(Arc::new(base));
        self
    }

    pub fn with_doc(mut self, doc: &str) -> Self {
        self.doc = Some(doc.to_string());
        self
    }

    pub fn with_config(mut self, config: CliConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Declares a field, replacing any existing field of the same name.
    pub fn field(mut self, field: FieldInfo) -> Self {
        self.upsert_field(field);
        self
    }

    fn upsert_field(&mut self, field: FieldInfo) {
        match self.fields.iter_mut().find(|f| f.name == field.name) {
            Some(slot) => *slot = field,
            None => self.fields.push(field),
        }
    }

    pub fn get_field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Attribute documentation parsed from this schema's docstring and its
    /// bases' docstrings; the most derived schema wins.
    pub fn attribute_docs(&self, style: DocstringStyle) -> BTreeMap<String, String> {
        let mut docs = self
            .base
            .as_ref()
            .map(|base| base.attribute_docs(style))
            .unwrap_or_default();
        if let Some(doc) = &self.doc {
            docs.extend(parse_attribute_docs(doc, style));
        }
        docs
    }

    /// Lifts the per-field annotations of this schema (and the schemas
    /// nested in it) into a config fragment keyed by dotted name.
    pub fn annotation_config(&self) -> CliConfig {
        let mut exclude = Vec::new();
        let mut rename = BTreeMap::new();
        let mut shorten = BTreeMap::new();
        let mut extra = BTreeMap::new();
        collect_annotations(
            self,
            &[],
            &mut exclude,
            &mut rename,
            &mut shorten,
            &mut extra,
        );

        CliConfig {
            exclude: (!exclude.is_empty()).then_some(exclude),
            rename: (!rename.is_empty()).then_some(rename),
            shorten: (!shorten.is_empty()).then_some(shorten),
            extra_options: (!extra.is_empty()).then_some(extra),
            ..Default::default()
        }
    }

    /// The full schema-level fragment: annotations, then inherited configs,
    /// then this schema's own config, later layers winning per key.
    pub fn cli_config(&self) -> CliConfig {
        self.annotation_config().merge(&self.inherited_config())
    }

    fn inherited_config(&self) -> CliConfig {
        let inherited = self
            .base
            .as_ref()
            .map(|base| base.inherited_config())
            .unwrap_or_default();
        match &self.config {
            Some(own) => inherited.merge(own),
            None => inherited,
        }
    }
}

fn collect_annotations(
    schema: &Schema,
    parents: &[String],
    exclude: &mut Vec<DottedName>,
    rename: &mut BTreeMap<DottedName, OptionName>,
    shorten: &mut BTreeMap<DottedName, OptionName>,
    extra: &mut BTreeMap<DottedName, ExtraOptions>,
) {
    for field in &schema.fields {
        let mut path = parents.to_vec();
        path.push(field.name.clone());
        let dotted = DottedName::from_parts(&path);

        if let Some(cli) = &field.cli {
            if cli.exclude == Some(true) {
                exclude.push(dotted.clone());
            }
            if let Some(name) = &cli.rename {
                rename.insert(dotted.clone(), OptionName::from(name.as_str()));
            }
            if let Some(name) = &cli.shorten {
                shorten.insert(dotted.clone(), OptionName::from(name.as_str()));
            }
            if !cli.extra.is_empty() {
                extra.insert(dotted.clone(), cli.extra.clone());
            }
        }

        if let Some(nested) = field.shape.nested_schema() {
            collect_annotations(nested, &path, exclude, rename, shorten, extra);
        }
    }
}

/// A typed model with a schema describing its fields.
///
/// The model is deserialized from the validated data produced by
/// [`Schema::validate`].
///
/// # Examples
///
/// ```
/// use schemaclap_core::{FieldInfo, FieldShape, Model, Schema};
///
/// #[derive(serde::Deserialize)]
/// struct Greeting {
///     name: String,
/// }
///
/// impl Model for Greeting {
///     fn schema() -> Schema {
///         Schema::new("Greeting").field(FieldInfo::new("name", FieldShape::string()))
///     }
/// }
///
/// assert_eq!(Greeting::schema().fields.len(), 1);
/// ```
pub trait Model: DeserializeOwned {
    fn schema() -> Schema;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn foo() -> Schema {
        Schema::new("Foo")
            .field(FieldInfo::new("a", FieldShape::integer()))
            .field(FieldInfo::new("b", FieldShape::boolean()).with_default(true))
    }

    #[test]
    fn test_nested_schema_through_optional() {
        let shape = FieldShape::optional(FieldShape::nested(foo()));
        assert_eq!(shape.nested_schema().map(|s| s.name.as_str()), Some("Foo"));
        assert!(shape.list_item_schema().is_none());
    }

    #[test]
    fn test_union_schemas_keep_order() {
        let shape = FieldShape::union(vec![
            FieldShape::nested(Schema::new("A")),
            FieldShape::integer(),
            FieldShape::nested(Schema::new("B")),
        ]);
        let names: Vec<&str> = shape
            .union_schemas()
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, ["A", "B"]);
    }

    #[test]
    fn test_accepts_string() {
        assert!(FieldShape::string().accepts_string());
        assert!(!FieldShape::integer().accepts_string());
        assert!(FieldShape::literal(["a", "b"]).accepts_string());
        assert!(!FieldShape::literal([1, 2]).accepts_string());
        assert!(!FieldShape::list(FieldShape::string()).accepts_string());
        assert!(FieldShape::union(vec![FieldShape::integer(), FieldShape::path()]).accepts_string());
    }

    #[test]
    fn test_factory_default_is_fresh() {
        let field = FieldInfo::new("tags", FieldShape::list(FieldShape::string()))
            .with_factory(|| serde_json::json!([]));
        assert!(!field.is_required());
        assert_eq!(field.default_value(), Some(serde_json::json!([])));
    }

    #[test]
    fn test_redeclared_field_replaces_in_place() {
        let schema = foo().field(FieldInfo::new("a", FieldShape::float()));
        assert_eq!(schema.fields.len(), 2);
        assert_eq!(schema.fields[0].name, "a");
        assert!(matches!(
            schema.fields[0].shape,
            FieldShape::Scalar(ScalarType::Float)
        ));
    }

    #[test]
    fn test_annotations_merge_left_to_right() {
        let field = FieldInfo::new("a", FieldShape::string())
            .with_cli(FieldCliOptions::default().rename("--first"))
            .with_cli(FieldCliOptions::default().rename("--second").shorten("-a"));
        let cli = field.cli.unwrap();
        assert_eq!(cli.rename.as_deref(), Some("--second"));
        assert_eq!(cli.shorten.as_deref(), Some("-a"));
    }

    #[test]
    fn test_annotation_config_includes_nested_fields() {
        let inner = Schema::new("Inner").field(
            FieldInfo::new("c", FieldShape::integer())
                .with_cli(FieldCliOptions::default().shorten("-c")),
        );
        let outer = Schema::new("Outer")
            .field(
                FieldInfo::new("a", FieldShape::string())
                    .with_cli(FieldCliOptions::default().exclude()),
            )
            .field(FieldInfo::new("inner", FieldShape::nested(inner)));

        let config = outer.annotation_config();
        assert_eq!(config.exclude, Some(vec![DottedName::from("a")]));
        let shorten = config.shorten.unwrap();
        assert_eq!(shorten[&DottedName::from("inner.c")].as_str(), "-c");
        assert!(config.rename.is_none());
    }

    #[test]
    fn test_cli_config_layers() {
        let base = Schema::new("Base")
            .with_config(CliConfig::default().with_prefix("base").with_unpack_list(true));
        let child = Schema::new("Child")
            .extending(base)
            .with_config(CliConfig::default().with_prefix("child"))
            .field(
                FieldInfo::new("x", FieldShape::integer())
                    .with_cli(FieldCliOptions::default().shorten("-x")),
            );

        let config = child.cli_config();
        assert_eq!(config.prefix.as_deref(), Some("child"));
        assert_eq!(config.unpack_list, Some(true));
        assert!(config.shorten.is_some());
    }
}
