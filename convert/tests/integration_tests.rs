//! End-to-end tests: schema -> clap command -> argv -> validated model.

use clap::Command;
use clap::error::ErrorKind;
use schemaclap::{Error, Kwargs, ModelOptions, from_model};
use schemaclap_core::{
    CliConfig, Constraint, ExtraOptions, FieldErrorKind, FieldInfo, FieldShape, Model, Schema,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

fn command<T: DeserializeOwned>(options: &ModelOptions<T>) -> Command {
    options.augment(Command::new("test").no_binary_name(true))
}

fn parse<T: DeserializeOwned>(options: &ModelOptions<T>, argv: &[&str]) -> schemaclap::Result<T> {
    let matches = command(options)
        .try_get_matches_from(argv.iter().copied())
        .unwrap_or_else(|err| panic!("argv {argv:?} rejected: {err}"));
    options.parse(&matches)
}

fn usage_error<T: DeserializeOwned>(options: &ModelOptions<T>, argv: &[&str]) -> clap::Error {
    match command(options).try_get_matches_from(argv.iter().copied()) {
        Ok(_) => panic!("argv {argv:?} unexpectedly accepted"),
        Err(err) => err,
    }
}

#[derive(Debug, PartialEq, Deserialize)]
struct Simple {
    name: String,
    epochs: i64,
    ratio: f64,
    mode: String,
}

impl Model for Simple {
    fn schema() -> Schema {
        Schema::new("Simple")
            .field(FieldInfo::new("name", FieldShape::string()))
            .field(FieldInfo::new("epochs", FieldShape::integer()).with_default(4))
            .field(
                FieldInfo::new("ratio", FieldShape::float())
                    .with_default(0.5)
                    .with_constraint(Constraint::Gt(0.0))
                    .with_constraint(Constraint::Lt(10.0)),
            )
            .field(
                FieldInfo::new("mode", FieldShape::literal(["fast", "slow"])).with_default("fast"),
            )
    }
}

#[test]
fn test_scalar_round_trip() {
    let options = from_model::<Simple>().build().unwrap();
    let simple = parse(
        &options,
        &["--name", "run", "--epochs", "7", "--ratio=2.5", "--mode", "slow"],
    )
    .unwrap();
    assert_eq!(
        simple,
        Simple {
            name: "run".into(),
            epochs: 7,
            ratio: 2.5,
            mode: "slow".into(),
        }
    );

    let direct: Simple = Simple::schema()
        .instantiate(&json!({"name": "run", "epochs": 7, "ratio": 2.5, "mode": "slow"}))
        .unwrap();
    assert_eq!(simple, direct);
}

#[test]
fn test_required_option_is_usage_error() {
    let options = from_model::<Simple>().build().unwrap();
    let err = usage_error(&options, &["--epochs", "1"]);
    assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn test_range_bounds_are_exclusive() {
    let options = from_model::<Simple>().build().unwrap();
    for rejected in ["0", "10"] {
        let err = usage_error(&options, &["--name", "x", "--ratio", rejected]);
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
        assert!(err.to_string().contains("0<x<10"), "{err}");
    }
    let simple = parse(&options, &["--name", "x", "--ratio", "5"]).unwrap();
    assert_eq!(simple.ratio, 5.0);
}

#[test]
fn test_choice_rejects_unknown_literal() {
    let options = from_model::<Simple>().build().unwrap();
    let err = usage_error(&options, &["--name", "x", "--mode", "medium"]);
    assert!(err.to_string().contains("'medium' is not one of 'fast', 'slow'."), "{err}");
}

#[test]
fn test_help_lists_defaults_and_metavars() {
    let options = from_model::<Simple>().build().unwrap();
    let help = command(&options).render_help().to_string();
    assert!(help.contains("--ratio <FLOAT RANGE>"), "{help}");
    assert!(help.contains("--mode <[fast|slow]>"), "{help}");
    assert!(help.contains("[default: 4]"), "{help}");
}

#[derive(Debug, PartialEq, Deserialize)]
struct Foo {
    a: i64,
    b: bool,
}

fn foo_schema() -> Schema {
    Schema::new("Foo")
        .field(FieldInfo::new("a", FieldShape::integer()))
        .field(FieldInfo::new("b", FieldShape::boolean()).with_default(true))
}

#[derive(Debug, PartialEq, Deserialize)]
struct Foos {
    foos: Vec<Foo>,
}

impl Model for Foos {
    fn schema() -> Schema {
        Schema::new("Foos").field(FieldInfo::new(
            "foos",
            FieldShape::list(FieldShape::nested(foo_schema())),
        ))
    }
}

#[test]
fn test_unpacked_list_rows() {
    let options = from_model::<Foos>().unpack_list(true).build().unwrap();
    let names: Vec<&str> = options
        .options()
        .iter()
        .map(|spec| spec.option_name.as_str())
        .collect();
    assert_eq!(names, ["--foos-a", "--foos-b/--no-foos-b"]);

    let foos = parse(&options, &["--foos-a", "2", "--foos-a", "3"]).unwrap();
    assert_eq!(
        foos.foos,
        vec![Foo { a: 2, b: true }, Foo { a: 3, b: true }]
    );

    let foos = parse(
        &options,
        &["--foos-a", "2", "--no-foos-b", "--foos-a", "3", "--foos-b"],
    )
    .unwrap();
    assert_eq!(
        foos.foos,
        vec![Foo { a: 2, b: false }, Foo { a: 3, b: true }]
    );
}

#[test]
fn test_unpacked_list_without_values_fails_validation() {
    let options = from_model::<Foos>().unpack_list(true).build().unwrap();
    let err = parse(&options, &[]).unwrap_err();
    let Error::Validation(validation) = err else {
        panic!("expected a validation error, got {err:?}");
    };
    assert_eq!(validation.model, "Foos");
    assert_eq!(validation.errors[0].loc, ["foos"]);
    assert_eq!(validation.errors[0].kind, FieldErrorKind::Missing);
}

#[test]
fn test_unpacked_row_missing_required_child() {
    let options = from_model::<Foos>().unpack_list(true).build().unwrap();
    let err = parse(&options, &["--no-foos-b"]).unwrap_err();
    let Error::Validation(validation) = err else {
        panic!("expected a validation error, got {err:?}");
    };
    assert_eq!(validation.errors[0].loc, ["foos", "0", "a"]);
}

#[test]
fn test_list_of_schema_as_json_without_unpacking() {
    let options = from_model::<Foos>().build().unwrap();
    assert_eq!(options.options().len(), 1);
    let foos = parse(&options, &["--foos", r#"[{"a": 1}, {"a": 2, "b": false}]"#]).unwrap();
    assert_eq!(
        foos.foos,
        vec![Foo { a: 1, b: true }, Foo { a: 2, b: false }]
    );
}

#[derive(Debug, Deserialize)]
struct Training {
    early_stopping: bool,
    verbose: bool,
}

impl Model for Training {
    fn schema() -> Schema {
        Schema::new("Training")
            .field(FieldInfo::new("early_stopping", FieldShape::boolean()).with_default(true))
            .field(FieldInfo::new("verbose", FieldShape::boolean()).with_default(false))
    }
}

#[test]
fn test_boolean_dual_flags() {
    let options = from_model::<Training>().build().unwrap();
    assert_eq!(
        options.options()[0].option_name.as_str(),
        "--early-stopping/--no-early-stopping"
    );

    let training = parse(&options, &["--early-stopping"]).unwrap();
    assert!(training.early_stopping);
    let training = parse(&options, &["--no-early-stopping"]).unwrap();
    assert!(!training.early_stopping);
    let training = parse(&options, &[]).unwrap();
    assert!(training.early_stopping);
    assert!(!training.verbose);
    let training = parse(&options, &["--verbose=no"]).unwrap();
    assert!(!training.verbose);
}

#[derive(Debug, Deserialize)]
struct Inner {
    bar: String,
    baz: String,
}

#[derive(Debug, Deserialize)]
struct Outer {
    foo: Inner,
}

impl Model for Outer {
    fn schema() -> Schema {
        let inner = Schema::new("Inner")
            .field(FieldInfo::new("bar", FieldShape::string()).with_default("r"))
            .field(FieldInfo::new("baz", FieldShape::string()).with_default("z"));
        Schema::new("Outer").field(FieldInfo::new("foo", FieldShape::nested(inner)))
    }
}

#[test]
fn test_longest_alias_wins() {
    let options = from_model::<Outer>()
        .rename("foo", "--oof")
        .rename("foo.bar", "--baz")
        .build()
        .unwrap();
    let names: Vec<&str> = options
        .options()
        .iter()
        .map(|spec| spec.option_name.as_str())
        .collect();
    assert_eq!(names, ["--baz", "--oof-baz"]);

    let outer = parse(&options, &["--baz", "1", "--oof-baz", "2"]).unwrap();
    assert_eq!(outer.foo.bar, "1");
    assert_eq!(outer.foo.baz, "2");
}

#[test]
fn test_exclusion_leaves_schema_default() {
    let options = from_model::<Outer>().exclude(["foo.baz"]).build().unwrap();
    assert_eq!(options.options().len(), 1);
    let err = usage_error(&options, &["--foo-baz", "x"]);
    assert_eq!(err.kind(), ErrorKind::UnknownArgument);

    let outer = parse(&options, &["--foo-bar", "x"]).unwrap();
    assert_eq!(outer.foo.baz, "z");
}

#[test]
fn test_dual_alias_on_ancestor_is_rejected() {
    let err = from_model::<Outer>()
        .rename("foo", "--on/--off")
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::InvalidBooleanAlias { .. }));
}

#[test]
fn test_bad_short_name_is_rejected() {
    let err = from_model::<Outer>()
        .shorten("foo.bar", "--long")
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)), "{err:?}");
}

#[derive(Debug, Deserialize)]
struct Logging {
    level: String,
}

impl Model for Logging {
    fn schema() -> Schema {
        Schema::new("Logging")
            .field(FieldInfo::new("level", FieldShape::string()).with_default("INFO"))
    }
}

#[derive(Debug, Deserialize)]
struct Server {
    level: i64,
}

impl Model for Server {
    fn schema() -> Schema {
        Schema::new("Server").field(FieldInfo::new("level", FieldShape::integer()).with_default(1))
    }
}

#[test]
fn test_two_models_share_one_command() {
    let logging = from_model::<Logging>().prefix("--log").build().unwrap();
    let server = from_model::<Server>().prefix("--srv").build().unwrap();

    let cmd = server.augment(logging.augment(Command::new("app")));
    let matches = cmd
        .try_get_matches_from(["app", "--log-level", "DEBUG", "--srv-level", "3"])
        .unwrap();

    let mut kwargs = Kwargs::new();
    logging.collect(&matches, &mut kwargs).unwrap();
    server.collect(&matches, &mut kwargs).unwrap();
    kwargs.insert("other", json!(true));

    let handler = server.wrap(logging.wrap(|mut kwargs: Kwargs| {
        let logging = kwargs.take_model::<Logging>("logging").unwrap();
        let server = kwargs.take_model::<Server>("server").unwrap();
        assert_eq!(kwargs.values().keys().collect::<Vec<_>>(), ["other"]);
        Ok::<_, Error>((logging.level, server.level))
    }));
    assert_eq!(handler(kwargs).unwrap(), ("DEBUG".to_string(), 3));
}

#[derive(Debug, Deserialize)]
struct Patterned {
    code: String,
}

impl Model for Patterned {
    fn schema() -> Schema {
        Schema::new("Patterned").field(
            FieldInfo::new("code", FieldShape::string())
                .with_default("AB")
                .with_constraint(Constraint::Pattern("^[A-Z]+$".into())),
        )
    }
}

#[test]
fn test_validation_error_is_propagated() {
    let options = from_model::<Patterned>().build().unwrap();
    let err = parse(&options, &["--code", "lower"]).unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ref validation) if validation.errors[0].loc == ["code"]
    ));
    assert!(err.to_string().starts_with("1 validation error for Patterned"));
}

#[derive(Debug, Deserialize)]
struct Documented {
    epochs: i64,
    rate: f64,
}

impl Model for Documented {
    fn schema() -> Schema {
        Schema::new("Documented")
            .with_doc(
                "Training settings.\n\nAttributes:\n    epochs: number of passes\n    rate: step size\n",
            )
            .field(FieldInfo::new("epochs", FieldShape::integer()).with_default(1))
            .field(
                FieldInfo::new("rate", FieldShape::float())
                    .with_default(0.1)
                    .with_description("learning rate"),
            )
    }
}

#[test]
fn test_help_text_sources() {
    let options = from_model::<Documented>().build().unwrap();
    let help: Vec<Option<&str>> = options
        .options()
        .iter()
        .map(|spec| spec.help.as_deref())
        .collect();
    assert_eq!(help, [Some("number of passes"), Some("learning rate")]);

    let options = from_model::<Documented>().parse_docstring(false).build().unwrap();
    assert_eq!(options.options()[0].help, None);
}

#[test]
fn test_extra_options_and_env_names() {
    let options = from_model::<Documented>()
        .env_prefix("train_")
        .extra_options(
            "rate",
            ExtraOptions {
                default: Some(json!(0.3)),
                hidden: Some(true),
                ..ExtraOptions::default()
            },
        )
        .build()
        .unwrap();
    assert_eq!(options.options()[0].env.as_deref(), Some("TRAIN_EPOCHS"));
    assert_eq!(options.options()[1].env.as_deref(), Some("TRAIN_RATE"));

    let mut kwargs = Kwargs::new();
    let matches = command(&options).try_get_matches_from(Vec::<&str>::new()).unwrap();
    options.collect(&matches, &mut kwargs).unwrap();
    assert_eq!(kwargs.get("rate"), Some(&json!(0.3)));
    let documented = options.extract(&mut kwargs).unwrap();
    assert_eq!(documented.rate, 0.3);
    assert_eq!(documented.epochs, 1);
}

#[test]
fn test_config_file_settings() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cli.yaml");
    CliConfig::default()
        .with_prefix("--train")
        .with_shorten("epochs", "-e")
        .save(&path)
        .unwrap();

    let config = CliConfig::load(&path).unwrap();
    let options = from_model::<Documented>().config(&config).build().unwrap();
    assert_eq!(options.options()[0].option_name.as_str(), "--train-epochs");
    assert_eq!(options.options()[0].short_name, Some('e'));

    let documented = parse(&options, &["-e", "9"]).unwrap();
    assert_eq!(documented.epochs, 9);
}

#[derive(Debug, Deserialize)]
struct Endpoint {
    url: String,
    contact: Option<String>,
}

impl Model for Endpoint {
    fn schema() -> Schema {
        Schema::new("Endpoint")
            .field(FieldInfo::new("url", FieldShape::known("url")))
            .field(
                FieldInfo::new("contact", FieldShape::optional(FieldShape::known("email")))
                    .with_default(serde_json::Value::Null),
            )
    }
}

#[test]
fn test_known_types() {
    let options = from_model::<Endpoint>().build().unwrap();
    let endpoint = parse(
        &options,
        &["--url", "https://example.com/api", "--contact", "Ops <ops@example.com>"],
    )
    .unwrap();
    assert_eq!(endpoint.url, "https://example.com/api");
    assert_eq!(endpoint.contact.as_deref(), Some("Ops <ops@example.com>"));

    let err = usage_error(&options, &["--url", "https://example.com", "--contact", "nope"]);
    assert_eq!(err.kind(), ErrorKind::ValueValidation);
}

#[test]
fn test_unregistered_type() {
    #[derive(Debug, Deserialize)]
    struct Custom {
        #[allow(dead_code)]
        value: Option<String>,
    }
    let schema = Schema::new("Custom").field(
        FieldInfo::new("value", FieldShape::known("color")).with_default(serde_json::Value::Null),
    );

    let err = schemaclap::FromModel::<Custom>::new()
        .schema(schema.clone())
        .registry(schemaclap::TypeRegistry::empty())
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedType { .. }));

    let options = schemaclap::FromModel::<Custom>::new()
        .schema(schema)
        .registry(schemaclap::TypeRegistry::empty())
        .ignore_unsupported(true)
        .build()
        .unwrap();
    assert!(options.options().is_empty());
}

#[derive(Debug, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Shade {
    Light,
    Dark,
}

#[derive(Debug, Deserialize)]
struct Paint {
    shade: Shade,
    coats: i64,
}

impl Model for Paint {
    fn schema() -> Schema {
        Schema::new("Paint")
            .field(FieldInfo::new("shade", FieldShape::known("shade")))
            .field(FieldInfo::new("coats", FieldShape::integer()).with_default(1))
    }
}

#[test]
fn test_globally_registered_type() {
    schemaclap::register_type::<Shade>("shade", "SHADE");
    assert!(schemaclap::global_registry().contains("shade"));

    let options = from_model::<Paint>().prefix("paint").build().unwrap();
    let shade = &options.options()[0];
    assert_eq!(shade.option_name.as_str(), "--paint-shade");
    assert_eq!(shade.parser.metavar(), "SHADE");
    let help = command(&options).render_help().to_string();
    assert!(help.contains("--paint-shade <SHADE>"), "{help}");

    let paint = parse(&options, &["--paint-shade", "dark", "--paint-coats", "2"]).unwrap();
    assert_eq!(paint.shade, Shade::Dark);
    assert_eq!(paint.coats, 2);

    let err = usage_error(&options, &["--paint-shade", "blue"]);
    assert_eq!(err.kind(), ErrorKind::ValueValidation);
}

#[test]
fn test_name_mapping_and_non_consuming_validation() {
    schemaclap::register_type::<Shade>("shade", "SHADE");
    let options = from_model::<Paint>().prefix("paint").build().unwrap();

    let mapping = options.name_mapping();
    let arguments: Vec<(&str, &str)> = mapping
        .arguments
        .iter()
        .map(|(argument, dotted)| (argument.as_str(), dotted.as_str()))
        .collect();
    assert_eq!(arguments, [("paint_coats", "coats"), ("paint_shade", "shade")]);
    assert!(mapping.unpacked.is_empty());

    let matches = command(&options)
        .try_get_matches_from(["--paint-shade", "light"])
        .unwrap();
    let kwargs = Kwargs::from_matches(&matches, options.options()).unwrap();
    let paint = options.validator().validate(&kwargs).unwrap();
    assert_eq!(paint.shade, Shade::Light);
    assert_eq!(paint.coats, 1);
    assert!(kwargs.contains_key("paint_shade"));

    let mut bad = Kwargs::new();
    bad.insert("paint_shade", json!("light"));
    bad.insert("paint_coats", json!("many"));
    let err = options.validator().validate(&bad).unwrap_err();
    assert!(matches!(err, Error::Validation(_)), "{err}");
    assert_eq!(bad.values().len(), 2);
}
