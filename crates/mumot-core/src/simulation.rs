//! Synchronous agent simulation on static graphs or mobile particles.

use std::collections::BTreeMap;
use std::f64::consts::TAU;

use mumot_index::{
    NeighborhoodIndex, NetworkType, Pose, Topology, TopologyRequest, TorusGridIndex,
    generate_topology,
};
use rand::{Rng, SeedableRng, rngs::SmallRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use tracing::{info, trace};

use crate::error::{MumotError, Result};
use crate::expr::Symbol;
use crate::model::Model;
use crate::probability::{TransitionTable, choose_transition, convert_rates_into_probabilities};
use crate::{DEFAULT_AGENTS, DEFAULT_MAX_TIME, MAX_RANDOM_SEED, Tick};

/// Run parameters for an [`AgentSimulation`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of timesteps to simulate.
    pub max_time: u64,
    pub network: NetworkType,
    /// Edge probability, edges per new node, or communication range depending on `network`.
    pub net_param: Option<f64>,
    /// Seed for the run's random stream; drawn from entropy when `None`.
    pub rng_seed: Option<u64>,
    /// Distance moved per timestep by mobile agents.
    pub speed: f64,
    /// Weight of the previous heading in the correlated random walk, in `[0, 1]`.
    pub correlatedness: f64,
    /// Requested time scaling of rates into probabilities; clamped to keep them below one.
    pub scaling: f64,
    /// Record each mobile agent's pose at the start of every timestep.
    pub record_trace: bool,
    /// Resampling budget for random graphs that come out disconnected.
    pub max_connect_attempts: u32,
    pub arena_width: f64,
    pub arena_height: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_time: DEFAULT_MAX_TIME,
            network: NetworkType::FullyConnected,
            net_param: None,
            rng_seed: None,
            speed: 0.01,
            correlatedness: 0.5,
            scaling: 1.0,
            record_trace: false,
            max_connect_attempts: 1_000,
            arena_width: 1.0,
            arena_height: 1.0,
        }
    }
}

impl SimulationConfig {
    /// Reject parameters no run could use. Topology parameters are checked by the generator.
    pub fn validate(&self) -> Result<()> {
        if self.max_time == 0 {
            return Err(MumotError::config("max_time must be a positive number of timesteps"));
        }
        if !(self.scaling > 0.0) || !self.scaling.is_finite() {
            return Err(MumotError::config(format!(
                "scaling must be a positive number; got {}",
                self.scaling
            )));
        }
        if !(self.speed >= 0.0) || !self.speed.is_finite() {
            return Err(MumotError::config(format!(
                "speed must be non-negative; got {}",
                self.speed
            )));
        }
        if !(0.0..=1.0).contains(&self.correlatedness) {
            return Err(MumotError::config(format!(
                "correlatedness must lie in [0, 1]; got {}",
                self.correlatedness
            )));
        }
        if !(self.arena_width > 0.0 && self.arena_height > 0.0)
            || !(self.arena_width.is_finite() && self.arena_height.is_finite())
        {
            return Err(MumotError::config("arena dimensions must be positive"));
        }
        if self.max_connect_attempts == 0 {
            return Err(MumotError::config("max_connect_attempts must be non-zero"));
        }
        Ok(())
    }

    /// The configured seed, or a fresh one no larger than [`MAX_RANDOM_SEED`].
    #[must_use]
    pub fn resolve_seed(&self) -> u64 {
        self.rng_seed
            .unwrap_or_else(|| u64::from(rand::random::<u32>()) % (MAX_RANDOM_SEED + 1))
    }

    #[must_use]
    pub fn topology_request(&self, population: usize) -> TopologyRequest {
        TopologyRequest {
            network: self.network,
            population,
            param: self.net_param,
            max_connect_attempts: self.max_connect_attempts,
            arena: (self.arena_width, self.arena_height),
        }
    }
}

/// Number of agents starting in each reactant.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct InitialState {
    counts: BTreeMap<Symbol, usize>,
}

impl InitialState {
    #[must_use]
    pub fn new(counts: BTreeMap<Symbol, usize>) -> Self {
        Self { counts }
    }

    /// [`DEFAULT_AGENTS`] agents in the first reactant, none elsewhere.
    #[must_use]
    pub fn auto(model: &Model) -> Self {
        let counts: BTreeMap<Symbol, usize> = model
            .reactants()
            .iter()
            .enumerate()
            .map(|(i, reactant)| (reactant.clone(), if i == 0 { DEFAULT_AGENTS } else { 0 }))
            .collect();
        info!(?counts, "no initial state given; using automatic initial state");
        Self { counts }
    }

    #[must_use]
    pub fn get(&self, reactant: &Symbol) -> usize {
        self.counts.get(reactant).copied().unwrap_or(0)
    }

    pub fn set(&mut self, reactant: Symbol, count: usize) {
        self.counts.insert(reactant, count);
    }

    #[must_use]
    pub fn population(&self) -> usize {
        self.counts.values().sum()
    }

    /// Every key must be a reactant of `model` and at least one agent must exist.
    pub fn validate(&self, model: &Model) -> Result<()> {
        if let Some(unknown) = self.counts.keys().find(|r| !model.reactants().contains(*r)) {
            return Err(MumotError::config(format!(
                "initial state names '{unknown}', which is not a reactant of the model"
            )));
        }
        if self.population() == 0 {
            return Err(MumotError::config("initial state must contain at least one agent"));
        }
        Ok(())
    }
}

/// Progress notification emitted after every timestep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport<'a> {
    pub tick: Tick,
    pub max_time: u64,
    pub reactants: &'a [Symbol],
    pub counts: &'a [usize],
}

/// Receives per-step progress from a running simulation.
pub trait SimulationObserver: Send {
    fn on_step(&mut self, report: &StepReport<'_>);
}

/// Observer that ignores every report.
#[derive(Debug, Default)]
pub struct NullObserver;

impl SimulationObserver for NullObserver {
    fn on_step(&mut self, _report: &StepReport<'_>) {}
}

/// Completed run: the full per-timestep history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationOutcome {
    pub reactants: Vec<Symbol>,
    /// Row `t` holds the population of each reactant after `t` timesteps; row 0 is the
    /// initial state.
    pub counts: Vec<Vec<usize>>,
    /// Per agent, the pose at the start of each timestep (mobile runs with tracing only).
    pub trace: Option<Vec<Vec<Pose>>>,
    pub seed: u64,
    /// Effective rate-to-probability scaling.
    pub scaling: f64,
    pub network: NetworkType,
    /// Interaction graph edges of static topologies.
    pub edges: Vec<(usize, usize)>,
}

impl SimulationOutcome {
    /// Population per reactant at every timestep.
    #[must_use]
    pub fn distributions(&self) -> Vec<BTreeMap<Symbol, usize>> {
        self.counts
            .iter()
            .map(|row| self.reactants.iter().cloned().zip(row.iter().copied()).collect())
            .collect()
    }

    /// Time series of one reactant's population.
    #[must_use]
    pub fn evolution(&self, reactant: &Symbol) -> Option<Vec<usize>> {
        let column = self.reactants.iter().position(|r| r == reactant)?;
        Some(self.counts.iter().map(|row| row[column]).collect())
    }

    #[must_use]
    pub fn final_counts(&self) -> BTreeMap<Symbol, usize> {
        self.distributions().pop().unwrap_or_default()
    }

    #[must_use]
    pub fn max_time(&self) -> usize {
        self.counts.len().saturating_sub(1)
    }
}

enum Neighborhood {
    Static {
        adjacency: Vec<Vec<usize>>,
        edges: Vec<(usize, usize)>,
    },
    Mobile {
        poses: Vec<Pose>,
        next_poses: Vec<Pose>,
        range: f64,
        index: TorusGridIndex,
        trace: Option<Vec<Vec<Pose>>>,
    },
}

/// Stateful run over a fixed population.
///
/// Every timestep reads one frozen snapshot of states (and poses) and writes the next one
/// into a separate buffer; the buffers are swapped when all agents have been processed.
///
/// Random draws come from a single stream in this order: the shuffle of the initial
/// population, topology generation, then per timestep and per agent in index order a
/// heading draw (mobile runs only) followed by the transition draw.
pub struct AgentSimulation {
    config: SimulationConfig,
    reactants: Vec<Symbol>,
    table: TransitionTable,
    scaling: f64,
    seed: u64,
    rng: SmallRng,
    tick: Tick,
    states: Vec<usize>,
    next_states: Vec<usize>,
    neighborhood: Neighborhood,
    neighbor_counts: Vec<usize>,
    history: Vec<Vec<usize>>,
    observer: Box<dyn SimulationObserver>,
}

impl std::fmt::Debug for AgentSimulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSimulation")
            .field("reactants", &self.reactants)
            .field("seed", &self.seed)
            .field("tick", &self.tick)
            .field("population", &self.states.len())
            .finish_non_exhaustive()
    }
}

impl AgentSimulation {
    /// Prepare a run with a no-op observer.
    pub fn new(
        model: &Model,
        rate_values: &BTreeMap<Symbol, f64>,
        initial: &InitialState,
        config: SimulationConfig,
    ) -> Result<Self> {
        Self::with_observer(model, rate_values, initial, config, Box::new(NullObserver))
    }

    /// Prepare a run reporting progress to `observer`.
    pub fn with_observer(
        model: &Model,
        rate_values: &BTreeMap<Symbol, f64>,
        initial: &InitialState,
        config: SimulationConfig,
        observer: Box<dyn SimulationObserver>,
    ) -> Result<Self> {
        config.validate()?;
        initial.validate(model)?;
        let values = model.rate_values(rate_values)?;
        let probabilities = convert_rates_into_probabilities(
            model.reactants(),
            model.rules(),
            &values,
            config.scaling,
        )?;
        let reactants: Vec<Symbol> = model.reactants().iter().cloned().collect();
        let table = probabilities.compile(&reactants)?;

        let seed = config.resolve_seed();
        let mut rng = SmallRng::seed_from_u64(seed);

        let mut states: Vec<usize> = reactants
            .iter()
            .enumerate()
            .flat_map(|(index, reactant)| std::iter::repeat_n(index, initial.get(reactant)))
            .collect();
        states.shuffle(&mut rng);
        let population = states.len();

        let topology = generate_topology(&config.topology_request(population), &mut rng)?;
        let neighborhood = match topology {
            Topology::Static(graph) => Neighborhood::Static {
                adjacency: graph.adjacency(),
                edges: graph.edges(),
            },
            Topology::Mobile {
                poses,
                communication_range,
            } => {
                let cell_size = if communication_range > 0.0 {
                    communication_range
                } else {
                    config.arena_width
                };
                let mut index =
                    TorusGridIndex::new(cell_size, config.arena_width, config.arena_height);
                let points: Vec<(f64, f64)> = poses.iter().map(Pose::point).collect();
                index.rebuild(&points)?;
                Neighborhood::Mobile {
                    next_poses: poses.clone(),
                    poses,
                    range: communication_range,
                    index,
                    trace: config
                        .record_trace
                        .then(|| vec![Vec::with_capacity(config.max_time as usize); population]),
                }
            }
        };

        info!(
            seed,
            network = %config.network,
            population,
            max_time = config.max_time,
            scaling = probabilities.scaling(),
            "starting agent simulation"
        );

        let mut simulation = Self {
            reactants,
            table,
            scaling: probabilities.scaling(),
            seed,
            rng,
            tick: Tick::zero(),
            next_states: states.clone(),
            states,
            neighborhood,
            neighbor_counts: Vec::new(),
            history: Vec::with_capacity(config.max_time as usize + 1),
            observer,
            config,
        };
        simulation.neighbor_counts = vec![0; simulation.reactants.len()];
        let initial_counts = simulation.counts();
        simulation.history.push(initial_counts);
        Ok(simulation)
    }

    /// Advance every agent by one synchronous timestep.
    pub fn step(&mut self) -> Result<()> {
        if self.is_finished() {
            return Err(MumotError::config(format!(
                "simulation already ran its {} timesteps",
                self.config.max_time
            )));
        }
        let Self {
            config,
            table,
            rng,
            states,
            next_states,
            neighborhood,
            neighbor_counts,
            ..
        } = self;

        match neighborhood {
            Neighborhood::Static { adjacency, .. } => {
                for (agent, neighbors) in adjacency.iter().enumerate() {
                    let total = tally(states, neighbors.iter().copied(), neighbor_counts);
                    let r = rng.random::<f64>();
                    next_states[agent] =
                        choose_transition(table.options(states[agent]), neighbor_counts, total, r)
                            .unwrap_or(states[agent]);
                }
            }
            Neighborhood::Mobile {
                poses,
                next_poses,
                range,
                index,
                trace,
            } => {
                let mut neighbors = Vec::new();
                for agent in 0..states.len() {
                    neighbors.clear();
                    index.neighbors_within(agent, *range, &mut |other, _| neighbors.push(other));
                    let total = tally(states, neighbors.iter().copied(), neighbor_counts);
                    if let Some(trace) = trace.as_mut() {
                        trace[agent].push(poses[agent]);
                    }
                    let heading = rng.random::<f64>() * TAU;
                    next_poses[agent] = poses[agent].advance(
                        heading,
                        config.speed,
                        config.correlatedness,
                        config.arena_width,
                        config.arena_height,
                    );
                    let r = rng.random::<f64>();
                    next_states[agent] =
                        choose_transition(table.options(states[agent]), neighbor_counts, total, r)
                            .unwrap_or(states[agent]);
                }
                std::mem::swap(poses, next_poses);
                let points: Vec<(f64, f64)> = poses.iter().map(Pose::point).collect();
                index.rebuild(&points)?;
            }
        }
        std::mem::swap(states, next_states);

        self.tick = self.tick.next();
        let counts = self.counts();
        trace!(tick = self.tick.0, ?counts, "timestep complete");
        self.observer.on_step(&StepReport {
            tick: self.tick,
            max_time: self.config.max_time,
            reactants: &self.reactants,
            counts: &counts,
        });
        self.history.push(counts);
        Ok(())
    }

    /// Step until `max_time` and return the recorded history.
    pub fn run(mut self) -> Result<SimulationOutcome> {
        while !self.is_finished() {
            self.step()?;
        }
        Ok(self.into_outcome())
    }

    #[must_use]
    pub fn into_outcome(self) -> SimulationOutcome {
        let (trace, edges) = match self.neighborhood {
            Neighborhood::Static { edges, .. } => (None, edges),
            Neighborhood::Mobile { trace, .. } => (trace, Vec::new()),
        };
        SimulationOutcome {
            reactants: self.reactants,
            counts: self.history,
            trace,
            seed: self.seed,
            scaling: self.scaling,
            network: self.config.network,
            edges,
        }
    }

    /// Current population per reactant, in [`AgentSimulation::reactants`] order.
    #[must_use]
    pub fn counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.reactants.len()];
        for &state in &self.states {
            counts[state] += 1;
        }
        counts
    }

    #[must_use]
    pub fn reactants(&self) -> &[Symbol] {
        &self.reactants
    }

    /// Current reactant of every agent.
    pub fn agent_states(&self) -> impl Iterator<Item = &Symbol> + '_ {
        self.states.iter().map(|&state| &self.reactants[state])
    }

    /// Current poses of mobile agents; empty for static topologies.
    #[must_use]
    pub fn poses(&self) -> &[Pose] {
        match &self.neighborhood {
            Neighborhood::Static { .. } => &[],
            Neighborhood::Mobile { poses, .. } => poses,
        }
    }

    /// Pairs of agents that can currently interact, each listed once with the lower index
    /// first.
    #[must_use]
    pub fn interaction_links(&self) -> Vec<(usize, usize)> {
        match &self.neighborhood {
            Neighborhood::Static { edges, .. } => edges.clone(),
            Neighborhood::Mobile { range, index, .. } => {
                let mut links = Vec::new();
                for agent in 0..self.states.len() {
                    index.neighbors_within(agent, *range, &mut |other, _| {
                        if agent < other {
                            links.push((agent, other));
                        }
                    });
                }
                links.sort_unstable();
                links
            }
        }
    }

    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub const fn scaling(&self) -> f64 {
        self.scaling
    }

    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.tick.0 >= self.config.max_time
    }
}

/// Count neighbour states into `counts`; returns the neighbour total.
fn tally(states: &[usize], neighbors: impl Iterator<Item = usize>, counts: &mut [usize]) -> usize {
    counts.fill(0);
    let mut total = 0;
    for neighbor in neighbors {
        counts[states[neighbor]] += 1;
        total += 1;
    }
    total
}

/// Run `model` to completion without progress reporting.
pub fn simulate(
    model: &Model,
    rate_values: &BTreeMap<Symbol, f64>,
    initial: &InitialState,
    config: SimulationConfig,
) -> Result<SimulationOutcome> {
    AgentSimulation::new(model, rate_values, initial, config)?.run()
}

/// Run `model` to completion, reporting every timestep to `observer`.
pub fn simulate_with_observer(
    model: &Model,
    rate_values: &BTreeMap<Symbol, f64>,
    initial: &InitialState,
    config: SimulationConfig,
    observer: Box<dyn SimulationObserver>,
) -> Result<SimulationOutcome> {
    AgentSimulation::with_observer(model, rate_values, initial, config, observer)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn sym(name: &str) -> Symbol {
        Symbol::from(name)
    }

    fn initial(pairs: &[(&str, usize)]) -> InitialState {
        InitialState::new(pairs.iter().map(|&(k, v)| (sym(k), v)).collect())
    }

    fn seeded(max_time: u64, seed: u64) -> SimulationConfig {
        SimulationConfig {
            max_time,
            rng_seed: Some(seed),
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn config_validation_rejects_unusable_values() {
        assert!(SimulationConfig::default().validate().is_ok());
        let bad = [
            SimulationConfig { max_time: 0, ..SimulationConfig::default() },
            SimulationConfig { scaling: 0.0, ..SimulationConfig::default() },
            SimulationConfig { speed: -1.0, ..SimulationConfig::default() },
            SimulationConfig { correlatedness: 1.5, ..SimulationConfig::default() },
            SimulationConfig { arena_width: 0.0, ..SimulationConfig::default() },
            SimulationConfig { max_connect_attempts: 0, ..SimulationConfig::default() },
        ];
        for config in bad {
            assert!(config.validate().unwrap_err().is_configuration(), "{config:?}");
        }
    }

    #[test]
    fn config_deserialises_with_defaults() {
        let config: SimulationConfig =
            serde_json::from_str(r#"{"max_time": 25, "network": "erdos-renyi"}"#).expect("json");
        assert_eq!(config.max_time, 25);
        assert_eq!(config.network, NetworkType::ErdosRenyi);
        assert_eq!(config.speed, 0.01);
        assert!(config.rng_seed.is_none());
    }

    #[test]
    fn entropy_seeds_stay_in_range() {
        for _ in 0..32 {
            assert!(SimulationConfig::default().resolve_seed() <= MAX_RANDOM_SEED);
        }
    }

    #[test]
    fn auto_initial_state_fills_first_reactant() {
        let model = Model::parse("A -> B : k\nB -> C : k").expect("model");
        let state = InitialState::auto(&model);
        assert_eq!(state.get(&sym("A")), DEFAULT_AGENTS);
        assert_eq!(state.get(&sym("B")), 0);
        assert_eq!(state.population(), DEFAULT_AGENTS);
    }

    #[test]
    fn initial_state_must_name_reactants() {
        let model = Model::parse("A -> B : k").expect("model");
        assert!(initial(&[("Z", 3)]).validate(&model).unwrap_err().is_configuration());
        assert!(initial(&[("A", 0)]).validate(&model).unwrap_err().is_configuration());
    }

    #[test]
    fn history_has_initial_row_and_one_row_per_step() {
        let model = Model::parse("A -> B : k").expect("model");
        let outcome = simulate(
            &model,
            &BTreeMap::from([(sym("k"), 0.1)]),
            &initial(&[("A", 20)]),
            seeded(7, 3),
        )
        .expect("run");
        assert_eq!(outcome.counts.len(), 8);
        assert_eq!(outcome.counts[0], vec![20, 0]);
        assert!(outcome.counts.iter().all(|row| row.iter().sum::<usize>() == 20));
        assert_eq!(outcome.max_time(), 7);
        assert_eq!(outcome.seed, 3);
        // Decay only: A never increases.
        let a = outcome.evolution(&sym("A")).expect("A");
        assert!(a.windows(2).all(|w| w[1] <= w[0]));
        assert_eq!(outcome.edges.len(), 20 * 19 / 2);
    }

    #[test]
    fn saturated_decay_converts_everyone_in_one_step() {
        // Weight 2 is clamped to probability one.
        let model = Model::parse("A -> B : k").expect("model");
        let mut simulation =
            AgentSimulation::new(&model, &BTreeMap::new(), &initial(&[("A", 5)]), seeded(3, 1))
                .expect("simulation");
        assert_eq!(simulation.scaling(), 0.5);
        simulation.step().expect("step");
        assert_eq!(simulation.counts(), vec![0, 5]);
        assert_eq!(simulation.tick(), Tick(1));
    }

    #[test]
    fn stepping_past_max_time_is_an_error() {
        let model = Model::parse("A -> B : k").expect("model");
        let mut simulation =
            AgentSimulation::new(&model, &BTreeMap::new(), &initial(&[("A", 2)]), seeded(1, 1))
                .expect("simulation");
        simulation.step().expect("step");
        assert!(simulation.is_finished());
        assert!(simulation.step().unwrap_err().is_configuration());
    }

    struct Recorder(Arc<Mutex<Vec<(u64, Vec<usize>)>>>);

    impl SimulationObserver for Recorder {
        fn on_step(&mut self, report: &StepReport<'_>) {
            if let Ok(mut seen) = self.0.lock() {
                seen.push((report.tick.0, report.counts.to_vec()));
            }
        }
    }

    #[test]
    fn observer_sees_every_step() {
        let model = Model::parse("A -> B : k\nB -> A : k").expect("model");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let outcome = simulate_with_observer(
            &model,
            &BTreeMap::new(),
            &initial(&[("A", 10), ("B", 10)]),
            seeded(4, 9),
            Box::new(Recorder(Arc::clone(&seen))),
        )
        .expect("run");
        let seen = seen.lock().expect("lock");
        assert_eq!(seen.len(), 4);
        for (i, (tick, counts)) in seen.iter().enumerate() {
            assert_eq!(*tick, i as u64 + 1);
            assert_eq!(*counts, outcome.counts[i + 1]);
        }
    }

    #[test]
    fn mobile_runs_record_start_poses() {
        let model = Model::parse("A + B -> B + B : k").expect("model");
        let config = SimulationConfig {
            network: NetworkType::Dynamic,
            net_param: Some(0.2),
            record_trace: true,
            speed: 0.05,
            ..seeded(5, 11)
        };
        let mut simulation = AgentSimulation::new(
            &model,
            &BTreeMap::new(),
            &initial(&[("A", 6), ("B", 4)]),
            config,
        )
        .expect("simulation");
        let start = simulation.poses().to_vec();
        assert_eq!(start.len(), 10);
        simulation.step().expect("step");
        assert_ne!(simulation.poses(), start.as_slice());
        for pose in simulation.poses() {
            assert!((0.0..1.0).contains(&pose.x) && (0.0..1.0).contains(&pose.y));
        }
        for (i, j) in simulation.interaction_links() {
            assert!(i < j);
            let a = simulation.poses()[i].point();
            let b = simulation.poses()[j].point();
            assert!(mumot_index::torus_distance(a, b, 1.0, 1.0) < 0.2);
        }
        let outcome = simulation.run().expect("run");
        let trace = outcome.trace.expect("trace");
        assert_eq!(trace.len(), 10);
        assert!(trace.iter().all(|agent| agent.len() == 5));
        assert_eq!(trace[0][0], start[0]);
        assert!(outcome.edges.is_empty());
    }

    #[test]
    fn zero_range_isolates_mobile_agents() {
        // Without neighbours, recruitment can never fire.
        let model = Model::parse("A + B -> B + B : k").expect("model");
        let config = SimulationConfig {
            network: NetworkType::Dynamic,
            net_param: Some(0.0),
            ..seeded(10, 2)
        };
        let outcome = simulate(
            &model,
            &BTreeMap::new(),
            &initial(&[("A", 8), ("B", 8)]),
            config,
        )
        .expect("run");
        assert!(outcome.counts.iter().all(|row| *row == vec![8, 8]));
    }

    #[test]
    fn spatial_topology_is_refused() {
        let model = Model::parse("A -> B : k").expect("model");
        let config = SimulationConfig {
            network: NetworkType::Spatial,
            ..seeded(1, 1)
        };
        let err = simulate(&model, &BTreeMap::new(), &initial(&[("A", 3)]), config).unwrap_err();
        assert!(matches!(err, MumotError::Index(_)));
    }
}
