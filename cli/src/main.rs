mod models;

use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, Subcommand};
use schemaclap::{Kwargs, ModelOptions, from_model};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use models::{
    ComplexTraining, Config, KnownTypes, LoggingConfig, LossConfig, Obj, OptimizerConfig,
    Pipeline, RunConfig, TrainingConfig,
};

#[derive(Debug, Parser)]
#[command(name = "schemaclap-demo", version)]
#[command(about = "Commands whose options are generated from model schemas")]
struct Cli {
    /// Print JSON on a single line.
    #[arg(long, global = true)]
    compact: bool,
    #[command(subcommand)]
    command: DemoCommand,
}

#[derive(Debug, Subcommand)]
enum DemoCommand {
    /// A simple example with a few parameters and default behavior.
    Simple,
    /// Nested models flattened into dotted options.
    Nested,
    /// Several models with prefixes, renames and short names on one command.
    Complex {
        /// Verbose output.
        #[arg(long)]
        verbose: bool,
    },
    /// Lists and mappings given as JSON.
    ComplexTypes,
    /// Domain types such as URLs, e-mail and IP addresses.
    KnownTypes,
    /// One model reused by two commands with different settings.
    ReuseModels {
        #[command(subcommand)]
        command: ReuseCommand,
    },
    /// A list of models given as repeated options.
    Unpack,
}

#[derive(Debug, Subcommand)]
enum ReuseCommand {
    /// Logging options with the prefix embedded in the model.
    Foo,
    /// Logging options with a call-site prefix.
    Bar,
}

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error(transparent)]
    Options(#[from] schemaclap::Error),
    #[error("failed to render output: {0}")]
    Output(#[from] serde_json::Error),
    #[error("handler did not receive '{0}'")]
    MissingModel(&'static str),
    #[error("no subcommand given")]
    NoSubcommand,
}

type Result<T> = std::result::Result<T, DemoError>;

/// Built options of every demo command.
struct Demos {
    simple: ModelOptions<TrainingConfig>,
    nested: ModelOptions<Obj>,
    training: ModelOptions<ComplexTraining>,
    optimizer: ModelOptions<OptimizerConfig>,
    loss: ModelOptions<LossConfig>,
    run: ModelOptions<RunConfig>,
    known: ModelOptions<KnownTypes>,
    logging_foo: ModelOptions<LoggingConfig>,
    logging_bar: ModelOptions<LoggingConfig>,
    pipeline: ModelOptions<Pipeline>,
}

impl Demos {
    fn build() -> schemaclap::Result<Self> {
        Ok(Self {
            simple: from_model::<TrainingConfig>().env_prefix("DEMO_").build()?,
            nested: from_model::<Obj>().var("obj").rename("bar.baz", "baz").build()?,
            training: from_model::<ComplexTraining>()
                .extra_options(
                    "batch_size",
                    schemaclap_core::ExtraOptions {
                        default: Some(serde_json::Value::from(12)),
                        ..Default::default()
                    },
                )
                .build()?,
            optimizer: from_model::<OptimizerConfig>()
                .prefix("opt")
                .rename("optimizer", "--opt")
                .shorten("optimizer", "-o")
                .shorten("learning_rate", "-r")
                .build()?,
            loss: from_model::<LossConfig>()
                .prefix("loss")
                .rename("func", "--loss")
                .shorten("func", "-l")
                .parse_docstring(false)
                .build()?,
            run: from_model::<RunConfig>().var("config").build()?,
            known: from_model::<KnownTypes>().build()?,
            logging_foo: from_model::<LoggingConfig>().build()?,
            logging_bar: from_model::<LoggingConfig>()
                .prefix("logging")
                .parse_docstring(false)
                .build()?,
            pipeline: from_model::<Pipeline>().unpack_list(true).build()?,
        })
    }

    fn command(&self) -> clap::Command {
        Cli::command()
            .mut_subcommand("simple", |cmd| self.simple.augment(cmd))
            .mut_subcommand("nested", |cmd| self.nested.augment(cmd))
            .mut_subcommand("complex", |cmd| {
                let cmd = self.training.augment(cmd);
                let cmd = self.optimizer.augment(cmd);
                self.loss.augment(cmd)
            })
            .mut_subcommand("complex-types", |cmd| self.run.augment(cmd))
            .mut_subcommand("known-types", |cmd| self.known.augment(cmd))
            .mut_subcommand("reuse-models", |group| {
                group
                    .mut_subcommand("foo", |cmd| self.logging_foo.augment(cmd))
                    .mut_subcommand("bar", |cmd| self.logging_bar.augment(cmd))
            })
            .mut_subcommand("unpack", |cmd| self.pipeline.augment(cmd))
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();

    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let demos = Demos::build()?;
    let matches = demos.command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());
    let sub = subcommand_matches(&matches)?;
    debug!(command = ?cli.command, "Running demo command");

    let output = match cli.command {
        DemoCommand::Simple => render(&demos.simple.parse(sub)?, cli.compact)?,
        DemoCommand::Nested => render(&demos.nested.parse(sub)?, cli.compact)?,
        DemoCommand::Complex { verbose } => render(&run_complex(&demos, sub, verbose)?, cli.compact)?,
        DemoCommand::ComplexTypes => render(&demos.run.parse(sub)?, cli.compact)?,
        DemoCommand::KnownTypes => render(&demos.known.parse(sub)?, cli.compact)?,
        DemoCommand::ReuseModels { command } => {
            let sub = subcommand_matches(sub)?;
            let logging = match command {
                ReuseCommand::Foo => &demos.logging_foo,
                ReuseCommand::Bar => &demos.logging_bar,
            };
            render(&logging.parse(sub)?, cli.compact)?
        }
        DemoCommand::Unpack => render(&demos.pipeline.parse(sub)?, cli.compact)?,
    };
    println!("{output}");
    Ok(())
}

fn subcommand_matches(matches: &ArgMatches) -> Result<&ArgMatches> {
    matches
        .subcommand()
        .map(|(_, sub)| sub)
        .ok_or(DemoError::NoSubcommand)
}

/// Runs the `complex` handler decorated with all three models.
fn run_complex(demos: &Demos, matches: &ArgMatches, verbose: bool) -> Result<Config> {
    let mut kwargs = Kwargs::new();
    demos.training.collect(matches, &mut kwargs)?;
    demos.optimizer.collect(matches, &mut kwargs)?;
    demos.loss.collect(matches, &mut kwargs)?;

    let handler = move |mut kwargs: Kwargs| -> Result<Config> {
        Ok(Config {
            verbose,
            training: take(&mut kwargs, "training_config")?,
            optimizer: take(&mut kwargs, "optimizer_config")?,
            loss: take(&mut kwargs, "loss_config")?,
        })
    };
    let handler = demos.loss.clone().wrap(handler);
    let handler = demos.optimizer.clone().wrap(handler);
    let handler = demos.training.clone().wrap(handler);
    handler(kwargs)
}

fn take<T: 'static>(kwargs: &mut Kwargs, name: &'static str) -> Result<T> {
    kwargs
        .take_model::<T>(name)
        .ok_or(DemoError::MissingModel(name))
}

fn render<T: Serialize>(value: &T, compact: bool) -> Result<String> {
    let text = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    Ok(text)
}
