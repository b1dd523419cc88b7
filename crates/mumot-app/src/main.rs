use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use mumot_app::{
    ProgressObserver, load_config, load_model_text, parse_bindings, parse_initial_state,
    write_counts_csv, write_field_csv,
};
use mumot_core::{
    ContinuationRequest, FieldSampler, InitialState, Model, NetworkType, NullObserver,
    SimulationObserver, Symbol, simulate_with_observer,
};
use owo_colors::OwoColorize;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "mumot",
    version,
    about = "Parse reaction rules, derive mean-field ODEs, and simulate agents on networks"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print reactants, rates, rules, and the derived ODEs.
    Show {
        /// Rule file, or `-` for stdin.
        model: PathBuf,
        /// Comma-separated assignments such as `A = N - B`.
        #[arg(long)]
        substitute: Option<String>,
    },
    /// Print the interaction diagram as Graphviz DOT.
    Dot {
        model: PathBuf,
    },
    /// Run an agent simulation.
    Simulate {
        model: PathBuf,
        /// Rate value, repeatable (`k=0.5`).
        #[arg(long = "rate", value_name = "NAME=VALUE")]
        rates: Vec<String>,
        /// Initial agents per reactant, repeatable (`A=50`).
        #[arg(long = "init", value_name = "REACTANT=COUNT")]
        init: Vec<String>,
        /// JSON file with a simulation config; flags override its values.
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        max_time: Option<u64>,
        #[arg(long)]
        network: Option<NetworkType>,
        #[arg(long)]
        net_param: Option<f64>,
        #[arg(long, env = "MUMOT_SEED")]
        seed: Option<u64>,
        #[arg(long)]
        speed: Option<f64>,
        #[arg(long)]
        correlatedness: Option<f64>,
        #[arg(long)]
        scaling: Option<f64>,
        /// Record agent positions (dynamic networks only).
        #[arg(long)]
        trace: bool,
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
        /// Write results here instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Suppress progress lines on stderr.
        #[arg(long, short)]
        quiet: bool,
    },
    /// Sample the vector field of two or three state variables on a regular mesh.
    Field {
        model: PathBuf,
        x: String,
        y: String,
        /// Optional third state variable.
        #[arg(long)]
        z: Option<String>,
        #[arg(long = "rate", value_name = "NAME=VALUE")]
        rates: Vec<String>,
        /// Values for reactants that are not state variables (`C=0.2`).
        #[arg(long = "fix", value_name = "REACTANT=VALUE")]
        fixed: Vec<String>,
        #[arg(long)]
        substitute: Option<String>,
        #[arg(long, default_value_t = 20)]
        mesh: usize,
        #[arg(long, value_enum, default_value_t = Format::Csv)]
        format: Format,
    },
    /// Emit a continuation request for an external bifurcation tool as JSON.
    Continuation {
        model: PathBuf,
        /// Free rate parameter.
        parameter: String,
        /// State variable plotted against the parameter.
        state: String,
        #[arg(long = "rate", value_name = "NAME=VALUE")]
        rates: Vec<String>,
        #[arg(long)]
        substitute: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Csv,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Show { model, substitute } => {
            let model = load(&model, substitute.as_deref())?;
            print_model(&model);
        }
        Command::Dot { model } => {
            let model = load(&model, None)?;
            print!("{}", model.to_dot());
        }
        Command::Simulate {
            model,
            rates,
            init,
            config,
            max_time,
            network,
            net_param,
            seed,
            speed,
            correlatedness,
            scaling,
            trace,
            format,
            output,
            quiet,
        } => {
            let model = load(&model, None)?;
            let mut config = load_config(config.as_deref())?;
            config.max_time = max_time.unwrap_or(config.max_time);
            config.network = network.unwrap_or(config.network);
            config.net_param = net_param.or(config.net_param);
            config.rng_seed = seed.or(config.rng_seed);
            config.speed = speed.unwrap_or(config.speed);
            config.correlatedness = correlatedness.unwrap_or(config.correlatedness);
            config.scaling = scaling.unwrap_or(config.scaling);
            config.record_trace |= trace;

            let rates = parse_bindings(&rates)?;
            let initial = if init.is_empty() {
                InitialState::auto(&model)
            } else {
                parse_initial_state(&init)?
            };
            let observer: Box<dyn SimulationObserver> = if quiet {
                Box::new(NullObserver)
            } else {
                Box::new(ProgressObserver::new((config.max_time / 20).max(1)))
            };
            let outcome = simulate_with_observer(&model, &rates, &initial, config, observer)
                .context("simulation failed")?;
            info!(seed = outcome.seed, "simulation finished");

            let mut out = open_output(output.as_deref())?;
            match format {
                Format::Json => {
                    serde_json::to_writer_pretty(&mut out, &outcome)
                        .context("failed to write simulation JSON")?;
                    writeln!(out)?;
                }
                Format::Csv => write_counts_csv(&outcome, &mut out)?,
            }
            out.flush()?;
        }
        Command::Field {
            model,
            x,
            y,
            z,
            rates,
            fixed,
            substitute,
            mesh,
            format,
        } => {
            let model = load(&model, substitute.as_deref())?;
            let mut bindings = model
                .rate_values(&parse_bindings(&rates)?)
                .context("invalid rate values")?;
            bindings.extend(parse_bindings(&fixed)?);
            let mut variables = vec![Symbol::new(x), Symbol::new(y)];
            variables.extend(z.map(Symbol::new));
            let field = FieldSampler::new(&model, &variables, &bindings, mesh)?.sample()?;
            let stdout = io::stdout();
            let mut out = stdout.lock();
            match format {
                Format::Json => {
                    serde_json::to_writer_pretty(&mut out, &field)?;
                    writeln!(out)?;
                }
                Format::Csv => write_field_csv(&field, &mut out)?,
            }
        }
        Command::Continuation {
            model,
            parameter,
            state,
            rates,
            substitute,
        } => {
            let model = load(&model, substitute.as_deref())?;
            let request = ContinuationRequest::new(
                &model,
                &Symbol::new(parameter),
                &Symbol::new(state),
                &parse_bindings(&rates)?,
            )?;
            println!("{}", serde_json::to_string_pretty(&request)?);
        }
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init();
}

fn load(path: &Path, substitute: Option<&str>) -> Result<Model> {
    let text = load_model_text(path)?;
    let model = Model::parse(&text)
        .with_context(|| format!("failed to parse model {}", path.display()))?;
    match substitute {
        Some(assignments) => model
            .substitute(assignments)
            .with_context(|| format!("failed to apply substitution '{assignments}'")),
        None => Ok(model),
    }
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            if path.is_dir() {
                bail!("output path {} is a directory", path.display());
            }
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout()))),
    }
}

fn print_model(model: &Model) {
    println!("{}", "Model".bold().cyan());
    print!("{}", model.describe());
}
