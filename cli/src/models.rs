//! Models behind the demo commands.

use std::collections::BTreeMap;
use std::path::PathBuf;

use schemaclap_core::{
    CliConfig, Constraint, FieldCliOptions, FieldInfo, FieldShape, Model, Schema,
};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Value, json};

/// Settings of the `simple` command.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub epochs: i64,
    pub lr: f64,
    pub early_stopping: bool,
}

impl Model for TrainingConfig {
    fn schema() -> Schema {
        Schema::new("TrainingConfig")
            .with_doc(
                "Simple training config.

Attributes:
    epochs: number of epochs
    lr: learning rate
    early_stopping: whether to stop training when validation loss stops decreasing
",
            )
            .field(FieldInfo::new("epochs", FieldShape::integer()))
            .field(
                FieldInfo::new("lr", FieldShape::float())
                    .with_default(1e-4)
                    .with_constraint(Constraint::Gt(0.0)),
            )
            .field(FieldInfo::new("early_stopping", FieldShape::boolean()).with_default(false))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Foo {
    pub a: i64,
    pub b: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Baz {
    pub c: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Bar {
    pub a: f64,
    pub b: String,
    pub baz: Baz,
}

/// Settings of the `nested` command.
#[derive(Debug, Serialize, Deserialize)]
pub struct Obj {
    pub foo: Foo,
    pub bar: Bar,
}

impl Model for Obj {
    fn schema() -> Schema {
        let foo = Schema::new("Foo")
            .with_doc("Foo.\n\nAttributes:\n    a: first letter\n    b: second letter\n")
            .field(FieldInfo::new("a", FieldShape::integer()).with_default(1))
            .field(FieldInfo::new("b", FieldShape::boolean()).with_default(true));
        let baz = Schema::new("Baz")
            .with_doc("Baz.\n\nAttributes:\n    c: third letter\n")
            .field(FieldInfo::new("c", FieldShape::literal(["a", "b"])).with_default("a"));
        let bar = Schema::new("Bar")
            .with_doc("Bar.\n\nAttributes:\n    a: an argument\n    b: another one\n    baz: a third one\n")
            .field(FieldInfo::new("a", FieldShape::float()).with_default(0.1))
            .field(FieldInfo::new("b", FieldShape::string()).with_default("b"))
            .field(FieldInfo::new("baz", FieldShape::nested(baz)).with_factory(|| json!({"c": "a"})));

        Schema::new("Obj")
            .with_doc("Obj.\n\nAttributes:\n    foo: foo attribute\n    bar: bar attribute\n")
            .field(
                FieldInfo::new("foo", FieldShape::nested(foo))
                    .with_factory(|| json!({"a": 1, "b": true})),
            )
            .field(
                FieldInfo::new("bar", FieldShape::nested(bar))
                    .with_factory(|| json!({"a": 0.1, "b": "b", "baz": {"c": "a"}})),
            )
    }
}

/// Training part of the `complex` command.
#[derive(Debug, Serialize, Deserialize)]
pub struct ComplexTraining {
    pub epochs: i64,
    pub batch_size: i64,
    pub log_file: Option<PathBuf>,
}

impl Model for ComplexTraining {
    fn schema() -> Schema {
        Schema::new("TrainingConfig")
            .field(FieldInfo::new("epochs", FieldShape::integer()).with_default(4))
            .field(FieldInfo::new("batch_size", FieldShape::integer()).with_default(64))
            .field(
                FieldInfo::new("log_file", FieldShape::optional(FieldShape::path()))
                    .with_default(Value::Null),
            )
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub optimizer: String,
    pub learning_rate: f64,
    pub decay_steps: i64,
    pub decay_rate: f64,
}

impl Model for OptimizerConfig {
    fn schema() -> Schema {
        Schema::new("OptimizerConfig")
            .field(
                FieldInfo::new("optimizer", FieldShape::literal(["sgd", "adam", "adamw", "adagrad"]))
                    .with_default("adam"),
            )
            .field(
                FieldInfo::new("learning_rate", FieldShape::float())
                    .with_default(1e-2)
                    .with_constraint(Constraint::Gt(0.0)),
            )
            .field(
                FieldInfo::new("decay_steps", FieldShape::integer())
                    .with_default(2_000)
                    .with_description("Attach a description directly in the field"),
            )
            .field(
                FieldInfo::new("decay_rate", FieldShape::float())
                    .with_default(1e-4)
                    .with_constraint(Constraint::Gt(0.0))
                    .with_constraint(Constraint::Lt(1.0))
                    .with_cli(FieldCliOptions::default().exclude()),
            )
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LossConfig {
    pub func: String,
    pub from_logits: bool,
}

impl Model for LossConfig {
    fn schema() -> Schema {
        Schema::new("LossConfig")
            .with_doc(
                "Loss configuration.

Attributes:
    func: loss function
    from_logits: if True, interpret `y` as logits
",
            )
            .field(
                FieldInfo::new("func", FieldShape::literal(["cross_entropy", "mse", "hinge"]))
                    .with_default("cross_entropy"),
            )
            .field(FieldInfo::new("from_logits", FieldShape::boolean()).with_default(true))
    }
}

/// Everything the `complex` command prints.
#[derive(Debug, Serialize)]
pub struct Config {
    pub verbose: bool,
    pub training: ComplexTraining,
    pub optimizer: OptimizerConfig,
    pub loss: LossConfig,
}

/// Settings of the `complex-types` command, a fake container runner.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunConfig {
    pub image: String,
    pub mounts: Vec<(String, PathBuf, PathBuf)>,
    pub ports: BTreeMap<u16, u16>,
}

impl Model for RunConfig {
    fn schema() -> Schema {
        let mount = FieldShape::list(FieldShape::string());
        Schema::new("RunConfig")
            .with_doc(
                "Configure how to run your container.

Attributes:
    image: image name
    mounts: how to mount data on your container, as triples `(mount_type, src, dst)`
    ports: port binding
",
            )
            .field(FieldInfo::new("image", FieldShape::string()))
            .field(
                FieldInfo::new("mounts", FieldShape::list(mount)).with_factory(|| json!([])),
            )
            .field(
                FieldInfo::new("ports", FieldShape::map(FieldShape::integer()))
                    .with_factory(|| json!({})),
            )
    }
}

/// A string never printed back.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let masked = if self.0.is_empty() { "" } else { "**********" };
        serializer.serialize_str(masked)
    }
}

/// Settings of the `known-types` command.
#[derive(Debug, Serialize, Deserialize)]
pub struct KnownTypes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<Secret>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iface: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Model for KnownTypes {
    fn schema() -> Schema {
        let optional = |name: &str, tag: &str| {
            FieldInfo::new(name, FieldShape::optional(FieldShape::known(tag)))
                .with_default(Value::Null)
        };
        Schema::new("KnownTypes")
            .field(optional("secret", "secret"))
            .field(optional("url", "url"))
            .field(optional("email", "email"))
            .field(optional("name_email", "email"))
            .field(optional("ip", "ip"))
            .field(optional("net", "network"))
            .field(optional("iface", "interface"))
            .field(optional("id", "uuid"))
    }
}

/// Settings shared by the `reuse-models` subcommands.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: i64,
    pub filename: String,
    pub record_format: String,
}

impl Model for LoggingConfig {
    fn schema() -> Schema {
        Schema::new("LoggingConfig")
            .with_doc(
                "Logging configuration.

Attributes:
    level: logging level
    filename: name of log file
    record_format: logging format
",
            )
            .with_config(CliConfig::default().with_prefix("log").with_shorten("level", "-l"))
            .field(FieldInfo::new("level", FieldShape::integer()).with_default(20))
            .field(FieldInfo::new("filename", FieldShape::string()).with_default("app.log"))
            .field(
                FieldInfo::new("record_format", FieldShape::string()).with_default("%(message)s"),
            )
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub retries: i64,
    pub parallel: bool,
}

/// Settings of the `unpack` command: steps given as repeated options.
#[derive(Debug, Serialize, Deserialize)]
pub struct Pipeline {
    pub name: String,
    pub steps: Vec<Step>,
}

impl Model for Pipeline {
    fn schema() -> Schema {
        let step = Schema::new("Step")
            .with_doc(
                "One pipeline step.

Attributes:
    name: step name
    retries: attempts after a failure
    parallel: run alongside the previous step
",
            )
            .field(FieldInfo::new("name", FieldShape::string()))
            .field(
                FieldInfo::new("retries", FieldShape::integer())
                    .with_default(0)
                    .with_constraint(Constraint::Ge(0.0)),
            )
            .field(FieldInfo::new("parallel", FieldShape::boolean()).with_default(false));
        Schema::new("Pipeline")
            .field(FieldInfo::new("name", FieldShape::string()).with_default("pipeline"))
            .field(
                FieldInfo::new("steps", FieldShape::list(FieldShape::nested(step)))
                    .with_constraint(Constraint::MinItems(1)),
            )
    }
}
