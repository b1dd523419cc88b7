//! Topology selection: which interaction structure a simulation run uses.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{IndexError, InteractionGraph, Pose};

/// Interaction structure connecting agents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkType {
    /// Complete graph.
    #[default]
    FullyConnected,
    /// Connected G(n, p) graph; parameter is the link probability.
    ErdosRenyi,
    /// Preferential attachment; parameter is the number of edges per new node.
    BarabasiAlbert,
    /// Static graph from points with a communication range. Not implemented.
    Spatial,
    /// Moving particles on a torus; parameter is the communication range.
    Dynamic,
}

impl NetworkType {
    /// Parameter used when the caller does not supply one.
    #[must_use]
    pub fn default_param(self, population: usize) -> Option<f64> {
        match self {
            Self::FullyConnected | Self::Spatial => None,
            Self::ErdosRenyi => Some(0.5),
            Self::BarabasiAlbert => Some(population.saturating_sub(1).min(3) as f64),
            Self::Dynamic => Some(0.1),
        }
    }

    #[must_use]
    pub const fn is_dynamic(self) -> bool {
        matches!(self, Self::Dynamic)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FullyConnected => "fully-connected",
            Self::ErdosRenyi => "erdos-renyi",
            Self::BarabasiAlbert => "barabasi-albert",
            Self::Spatial => "spatial",
            Self::Dynamic => "dynamic",
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkType {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "full" | "fully-connected" | "complete" => Ok(Self::FullyConnected),
            "erdos-renyi" | "er" | "random" => Ok(Self::ErdosRenyi),
            "barabasi-albert" | "ba" | "scale-free" => Ok(Self::BarabasiAlbert),
            "spatial" | "space" => Ok(Self::Spatial),
            "dynamic" | "moving-particles" | "particles" => Ok(Self::Dynamic),
            other => Err(IndexError::InvalidParameter(format!(
                "unknown network type '{other}'"
            ))),
        }
    }
}

/// Everything a generator needs besides the random stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TopologyRequest {
    pub network: NetworkType,
    pub population: usize,
    /// Falls back to [`NetworkType::default_param`] when `None`.
    pub param: Option<f64>,
    pub max_connect_attempts: u32,
    pub arena: (f64, f64),
}

/// Interaction structure for one run: exactly one representation is active.
#[derive(Debug, Clone)]
pub enum Topology {
    Static(InteractionGraph),
    Mobile {
        poses: Vec<Pose>,
        communication_range: f64,
    },
}

impl Topology {
    #[must_use]
    pub fn population(&self) -> usize {
        match self {
            Self::Static(graph) => graph.node_count(),
            Self::Mobile { poses, .. } => poses.len(),
        }
    }
}

/// Uniform random poses on a `width × height` arena; draws x, y, heading per agent.
pub fn random_poses<R: Rng + ?Sized>(count: usize, arena: (f64, f64), rng: &mut R) -> Vec<Pose> {
    (0..count)
        .map(|_| {
            let x = rng.random::<f64>() * arena.0;
            let y = rng.random::<f64>() * arena.1;
            let heading = rng.random::<f64>() * std::f64::consts::TAU;
            Pose::new(x, y, heading)
        })
        .collect()
}

/// Build the topology described by `request`.
pub fn generate_topology<R: Rng + ?Sized>(
    request: &TopologyRequest,
    rng: &mut R,
) -> Result<Topology, IndexError> {
    let population = request.population;
    let param = request
        .param
        .or_else(|| request.network.default_param(population));
    match request.network {
        NetworkType::FullyConnected => Ok(Topology::Static(InteractionGraph::complete(population))),
        NetworkType::ErdosRenyi => {
            let probability = param.unwrap_or(f64::NAN);
            InteractionGraph::erdos_renyi(
                population,
                probability,
                request.max_connect_attempts,
                rng,
            )
            .map(Topology::Static)
        }
        NetworkType::BarabasiAlbert => {
            let raw = param.unwrap_or(0.0);
            if raw.fract() != 0.0 || raw < 0.0 || !raw.is_finite() {
                return Err(IndexError::InvalidParameter(format!(
                    "edges per new node for Barabasi-Albert networks must be an integer; input is {raw}"
                )));
            }
            InteractionGraph::barabasi_albert(population, raw as usize, rng).map(Topology::Static)
        }
        NetworkType::Spatial => Err(IndexError::Unsupported(
            "spatial-range graphs are not implemented; use the dynamic topology instead",
        )),
        NetworkType::Dynamic => {
            let range = param.unwrap_or(f64::NAN);
            if !(range >= 0.0) || !range.is_finite() {
                return Err(IndexError::InvalidParameter(format!(
                    "communication range must be a non-negative number; input is {range}"
                )));
            }
            Ok(Topology::Mobile {
                poses: random_poses(population, request.arena, rng),
                communication_range: range,
            })
        }
    }
}
