use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use logicgrid::config::{DEFAULT_MAX_ITERATIONS, DEFAULT_SETTLE_STEPS};
use logicgrid::{
    levels, AutoTestError, Circuit, CircuitDocument, DocumentError, EvalConfig,
    EvalConfigBuilderError, EvalError, LevelError, Registry, Signal,
};

#[derive(Parser, Debug)]
#[clap(
    name = "logicgrid",
    version,
    about = "Evaluate logic circuits and check them against levels"
)]
struct Args {
    /// Passes allowed for the combinational part of a circuit to settle.
    #[clap(long, global = true, default_value_t = DEFAULT_MAX_ITERATIONS)]
    max_iterations: usize,

    /// Rounds of (settle, clock step) allowed before sequential logic counts
    /// as unstable.
    #[clap(long, global = true, default_value_t = DEFAULT_SETTLE_STEPS)]
    settle_steps: usize,

    /// Directory of custom element documents (*.json), registered by file name.
    #[clap(long, global = true)]
    elements: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the built-in levels.
    Levels,
    /// Check a circuit document against a level.
    Check {
        circuit: PathBuf,
        /// Level number (from `levels`) or full name.
        #[clap(long, short)]
        level: String,
    },
    /// Evaluate a circuit document once.
    Eval {
        circuit: PathBuf,
        /// Input assignment such as `A=1`; may be repeated.
        #[clap(long = "set", short, value_parser = parse_assignment)]
        set: Vec<(String, Signal)>,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid configuration: {0}")]
    Config(#[from] EvalConfigBuilderError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Level(#[from] LevelError),
    #[error(transparent)]
    AutoTest(#[from] AutoTestError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error("no level matches {0:?}")]
    UnknownLevel(String),
    #[error("no input element named {0:?}")]
    UnknownInput(String),
}

fn parse_assignment(arg: &str) -> Result<(String, Signal), String> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {arg:?}"))?;
    let value = match value.trim() {
        "0" => Signal::Low,
        "1" => Signal::High,
        other => return Err(format!("value must be 0 or 1, got {other:?}")),
    };
    Ok((name.trim().to_string(), value))
}

fn registry(args: &Args) -> Result<Registry, CliError> {
    let config = EvalConfig::builder()
        .max_iterations(args.max_iterations)
        .settle_steps(args.settle_steps)
        .build()?;
    let mut registry = Registry::with_builtins().with_config(config);
    if let Some(dir) = &args.elements {
        let count = registry.load_dir(dir)?;
        info!(count, dir = %dir.display(), "loaded custom elements");
    }
    Ok(registry)
}

fn load(path: &Path, registry: &Registry) -> Result<Circuit, CliError> {
    let document = CircuitDocument::from_path(path)?;
    let circuit = Circuit::from_document(&document, registry)?;
    if circuit.len() < document.elements.len() {
        warn!(
            loaded = circuit.len(),
            listed = document.elements.len(),
            "circuit only partially loaded"
        );
    }
    Ok(circuit)
}

fn run(args: &Args) -> Result<bool, CliError> {
    match &args.command {
        Command::Levels => {
            for (number, level) in levels::catalog()?.iter().enumerate() {
                let lock = if level.is_unlocked() { "" } else { " (locked)" };
                println!(
                    "{:>2}. {}{}  [{}] -> [{}]",
                    number + 1,
                    level.name(),
                    lock,
                    level.inputs().join(", "),
                    level.outputs().join(", ")
                );
            }
            Ok(true)
        }
        Command::Check { circuit, level } => {
            let registry = registry(args)?;
            let mut circuit = load(circuit, &registry)?;
            let found = levels::find(level)?.ok_or_else(|| CliError::UnknownLevel(level.clone()))?;
            println!("{}", found.name());
            circuit.set_level(Arc::new(found));

            let report = circuit.check_level()?;
            if !report.valid {
                println!("not every output is reachable from an input");
            }
            for mismatch in &report.mismatches {
                println!("  {mismatch}");
            }
            println!("{}", if report.passed() { "passed" } else { "failed" });
            Ok(report.passed())
        }
        Command::Eval { circuit, set } => {
            let registry = registry(args)?;
            let mut circuit = load(circuit, &registry)?;
            let inputs = circuit.inputs();
            let assignment = set
                .iter()
                .map(|(name, value)| {
                    inputs
                        .iter()
                        .copied()
                        .find(|id| {
                            circuit.element(*id).map(|element| element.name())
                                == Some(name.as_str())
                        })
                        .map(|id| (id, *value))
                        .ok_or_else(|| CliError::UnknownInput(name.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?;

            match circuit.evaluate(&assignment) {
                Ok(outputs) => {
                    for (id, value) in outputs {
                        if let Some(element) = circuit.element(id) {
                            println!("{} = {}", element.name(), value);
                        }
                    }
                    Ok(true)
                }
                Err(err) if err.is_cycle() => {
                    println!("no result: {err}");
                    Ok(false)
                }
                Err(err) => Err(err.into()),
            }
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            error!(%err, "logicgrid failed");
            ExitCode::from(2)
        }
    }
}
