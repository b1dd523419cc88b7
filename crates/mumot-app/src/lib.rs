//! Shared helpers for the `mumot` binary: model loading, argument parsing, and exports.

use std::collections::BTreeMap;
use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use mumot_core::{
    InitialState, SimulationConfig, SimulationObserver, SimulationOutcome, StepReport, Symbol,
    VectorField,
};
use owo_colors::OwoColorize;

/// Read rule text from `path`, or from stdin when `path` is `-`.
pub fn load_model_text(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("failed to read model from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read model file {}", path.display()))
}

/// Load a JSON simulation config, or the defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> Result<SimulationConfig> {
    let Some(path) = path else {
        return Ok(SimulationConfig::default());
    };
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("config file {} did not contain valid JSON", path.display()))
}

fn split_pair(raw: &str) -> Result<(Symbol, &str)> {
    let Some((name, value)) = raw.split_once('=') else {
        bail!("expected NAME=VALUE, got '{raw}'");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("missing name in '{raw}'");
    }
    Ok((Symbol::new(name), value.trim()))
}

/// Parse repeated `name=value` arguments into numeric bindings.
pub fn parse_bindings(pairs: &[String]) -> Result<BTreeMap<Symbol, f64>> {
    pairs
        .iter()
        .map(|raw| {
            let (name, value) = split_pair(raw)?;
            let value: f64 = value
                .parse()
                .with_context(|| format!("'{value}' is not a number (in '{raw}')"))?;
            Ok((name, value))
        })
        .collect()
}

/// Parse repeated `reactant=count` arguments.
pub fn parse_initial_state(pairs: &[String]) -> Result<InitialState> {
    let mut state = InitialState::default();
    for raw in pairs {
        let (name, value) = split_pair(raw)?;
        let count: usize = value
            .parse()
            .with_context(|| format!("'{value}' is not an agent count (in '{raw}')"))?;
        state.set(name, count);
    }
    Ok(state)
}

/// Time-evolution table: one row per timestep, one column per reactant.
pub fn write_counts_csv(outcome: &SimulationOutcome, out: &mut impl Write) -> Result<()> {
    let header: Vec<String> = outcome.reactants.iter().map(ToString::to_string).collect();
    writeln!(out, "t,{}", header.join(","))?;
    for (t, row) in outcome.counts.iter().enumerate() {
        let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
        writeln!(out, "{t},{}", cells.join(","))?;
    }
    Ok(())
}

/// Sampled field as CSV: coordinates, derivatives, log-speed, and the simplex mask.
pub fn write_field_csv(field: &VectorField, out: &mut impl Write) -> Result<()> {
    let names: Vec<String> = field.state_variables.iter().map(ToString::to_string).collect();
    let derivatives: Vec<String> = names.iter().map(|n| format!("d{n}")).collect();
    writeln!(out, "{},{},log_speed,masked", names.join(","), derivatives.join(","))?;
    for sample in &field.samples {
        let point: Vec<String> = sample.point.iter().map(ToString::to_string).collect();
        let derivative: Vec<String> = sample.derivative.iter().map(ToString::to_string).collect();
        let speed = sample.log_speed.map(|s| s.to_string()).unwrap_or_default();
        writeln!(
            out,
            "{},{},{speed},{}",
            point.join(","),
            derivative.join(","),
            sample.masked
        )?;
    }
    Ok(())
}

/// Prints a progress line to stderr every `every` timesteps and on the last one.
#[derive(Debug)]
pub struct ProgressObserver {
    every: u64,
}

impl ProgressObserver {
    #[must_use]
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
        }
    }
}

impl SimulationObserver for ProgressObserver {
    fn on_step(&mut self, report: &StepReport<'_>) {
        let tick = report.tick.0;
        if tick % self.every != 0 && tick != report.max_time {
            return;
        }
        let counts: Vec<String> = report
            .reactants
            .iter()
            .zip(report.counts)
            .map(|(reactant, count)| format!("{reactant}={count}"))
            .collect();
        eprintln!(
            "{} {tick}/{} {}",
            "step".cyan().bold(),
            report.max_time,
            counts.join(" ").dimmed()
        );
    }
}
