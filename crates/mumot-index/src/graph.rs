//! Static interaction graphs over agent indices.

use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};
use rand::Rng;
use tracing::warn;

use crate::IndexError;

/// Undirected graph whose node `i` is agent `i`.
#[derive(Debug, Clone)]
pub struct InteractionGraph {
    graph: UnGraph<(), ()>,
}

impl InteractionGraph {
    fn with_nodes(nodes: usize) -> Self {
        let mut graph = UnGraph::with_capacity(nodes, 0);
        for _ in 0..nodes {
            graph.add_node(());
        }
        Self { graph }
    }

    fn connect(&mut self, a: usize, b: usize) {
        self.graph
            .add_edge(NodeIndex::new(a), NodeIndex::new(b), ());
    }

    /// Complete graph: every agent interacts with every other agent.
    #[must_use]
    pub fn complete(nodes: usize) -> Self {
        let mut graph = Self::with_nodes(nodes);
        for a in 0..nodes {
            for b in (a + 1)..nodes {
                graph.connect(a, b);
            }
        }
        graph
    }

    /// Single G(n, p) draw; may be disconnected.
    pub fn erdos_renyi_sample<R: Rng + ?Sized>(nodes: usize, probability: f64, rng: &mut R) -> Self {
        let mut graph = Self::with_nodes(nodes);
        for a in 0..nodes {
            for b in (a + 1)..nodes {
                if rng.random::<f64>() < probability {
                    graph.connect(a, b);
                }
            }
        }
        graph
    }

    /// Connected Erdős–Rényi graph, resampled from the same stream until connected.
    ///
    /// `probability` must lie in `(0, 1]`. Gives up after `max_attempts` draws.
    pub fn erdos_renyi<R: Rng + ?Sized>(
        nodes: usize,
        probability: f64,
        max_attempts: u32,
        rng: &mut R,
    ) -> Result<Self, IndexError> {
        if !(probability > 0.0 && probability <= 1.0) {
            return Err(IndexError::InvalidParameter(format!(
                "link probability for Erdos-Renyi networks must be in (0, 1]; input is {probability}"
            )));
        }
        if max_attempts == 0 {
            return Err(IndexError::InvalidConfig("max_connect_attempts must be non-zero"));
        }
        for attempt in 1..=max_attempts {
            let graph = Self::erdos_renyi_sample(nodes, probability, rng);
            if graph.is_connected() {
                return Ok(graph);
            }
            warn!(attempt, nodes, probability, "graph was not connected; resampling");
        }
        Err(IndexError::Disconnected {
            attempts: max_attempts,
            nodes,
            probability,
        })
    }

    /// Barabási–Albert preferential attachment with `edges_per_node` links per new node.
    ///
    /// Starts from `edges_per_node` isolated nodes; every subsequent node attaches to
    /// distinct targets drawn proportionally to degree. Requires `1 <= m <= n - 1`.
    pub fn barabasi_albert<R: Rng + ?Sized>(
        nodes: usize,
        edges_per_node: usize,
        rng: &mut R,
    ) -> Result<Self, IndexError> {
        if edges_per_node < 1 || edges_per_node >= nodes {
            return Err(IndexError::InvalidParameter(format!(
                "edges per new node for Barabasi-Albert networks must be an integer between 1 and {}; input is {edges_per_node}",
                nodes.saturating_sub(1)
            )));
        }
        let mut graph = Self::with_nodes(nodes);
        let mut targets: Vec<usize> = (0..edges_per_node).collect();
        let mut repeated: Vec<usize> = Vec::with_capacity(2 * nodes * edges_per_node);
        for source in edges_per_node..nodes {
            for &target in &targets {
                graph.connect(source, target);
            }
            repeated.extend_from_slice(&targets);
            repeated.extend(std::iter::repeat_n(source, edges_per_node));
            targets = distinct_sample(&repeated, edges_per_node, rng);
        }
        Ok(graph)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Neighbors of agent `node`.
    pub fn neighbors(&self, node: usize) -> impl Iterator<Item = usize> + '_ {
        self.graph
            .neighbors(NodeIndex::new(node))
            .map(NodeIndex::index)
    }

    #[must_use]
    pub fn degree(&self, node: usize) -> usize {
        self.neighbors(node).count()
    }

    /// Edge list as `(a, b)` index pairs in insertion order.
    #[must_use]
    pub fn edges(&self) -> Vec<(usize, usize)> {
        self.graph
            .raw_edges()
            .iter()
            .map(|edge| (edge.source().index(), edge.target().index()))
            .collect()
    }

    /// Adjacency lists, one per agent.
    #[must_use]
    pub fn adjacency(&self) -> Vec<Vec<usize>> {
        (0..self.node_count())
            .map(|node| {
                let mut neighbors: Vec<usize> = self.neighbors(node).collect();
                neighbors.sort_unstable();
                neighbors
            })
            .collect()
    }

    /// Graphs with at most one node count as connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.node_count() <= 1 || connected_components(&self.graph) == 1
    }
}

/// Draw `count` distinct values from `pool` (with multiplicity weighting), in draw order.
fn distinct_sample<R: Rng + ?Sized>(pool: &[usize], count: usize, rng: &mut R) -> Vec<usize> {
    let mut picked: Vec<usize> = Vec::with_capacity(count);
    while picked.len() < count {
        let candidate = pool[rng.random_range(0..pool.len())];
        if !picked.contains(&candidate) {
            picked.push(candidate);
        }
    }
    picked
}
