//! Core types for multi-agent reaction models: rule parsing, mean-field ODEs, and networked
//! agent simulation.

use serde::{Deserialize, Serialize};

mod error;
pub mod expr;
mod grammar;
mod lexer;
pub mod model;
pub mod ode;
pub mod parser;
pub mod probability;
pub mod simulation;

pub use error::{ErrorKind, MumotError, Result};
pub use expr::{Expr, Func, Symbol};
pub use model::{Model, Motif, MotifEdge, Rule, derive_odes};
pub use ode::{
    BifurcationCurve, BifurcationPoint, ContinuationBackend, ContinuationRequest, Direction,
    FieldSample, FieldSampler, OdeSystem, VectorField, bifurcation,
};
pub use parser::{ParsedRules, parse_rule, parse_rules};
pub use probability::{
    ProbabilitySet, ProbabilityTable, TransitionOption, Trigger, compute_scaling_factor,
    convert_rates_into_probabilities, generate_probability_map,
};
pub use simulation::{
    AgentSimulation, InitialState, NullObserver, SimulationConfig, SimulationObserver,
    SimulationOutcome, StepReport, simulate, simulate_with_observer,
};

pub use mumot_index::{IndexError, NetworkType, Pose};

/// Initial value of every rate when nothing else is given.
pub const DEFAULT_RATE_VALUE: f64 = 2.0;
/// System size used by field views and when a substituted model gets no explicit value.
pub const DEFAULT_SYSTEM_SIZE: f64 = 1.0;
/// Population placed in the first reactant by [`InitialState::auto`].
pub const DEFAULT_AGENTS: usize = 100;
/// Timesteps simulated when the configuration does not say otherwise.
pub const DEFAULT_MAX_TIME: u64 = 10;
/// Upper bound for seeds drawn from entropy, so recorded seeds stay portable.
pub const MAX_RANDOM_SEED: u64 = u32::MAX as u64;

/// Simulation clock (timesteps processed since the run started).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Resets the tick counter back to zero.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}
