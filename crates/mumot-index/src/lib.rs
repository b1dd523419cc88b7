//! Interaction topologies and neighborhood indices for networked agent simulations.
//!
//! Static topologies are undirected graphs over agent indices ([`InteractionGraph`]).
//! Mobile agents instead live on a toroidal arena; their neighbors are recomputed every
//! timestep through a [`NeighborhoodIndex`].

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod graph;
mod topology;

pub use graph::InteractionGraph;
pub use topology::{NetworkType, Topology, TopologyRequest, generate_topology, random_poses};

/// Errors emitted by topology generators and spatial index implementations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndexError {
    /// Torus grid or graph generator settings that cannot be used: a non-positive interaction
    /// radius or arena side, or a zero resampling budget.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// A topology parameter outside its admissible range.
    #[error("invalid network parameter: {0}")]
    InvalidParameter(String),
    /// The requested topology kind exists but has no generator.
    #[error("unsupported topology: {0}")]
    Unsupported(&'static str),
    /// Resampling a random graph never produced a connected one.
    #[error("no connected graph after {attempts} attempts (n = {nodes}, p = {probability})")]
    Disconnected {
        attempts: u32,
        nodes: usize,
        probability: f64,
    },
}

/// Wrap `value` into `[0, extent)` (periodic boundary).
#[must_use]
pub fn wrap_coordinate(value: f64, extent: f64) -> f64 {
    if extent <= 0.0 || !value.is_finite() {
        return 0.0;
    }
    let wrapped = value.rem_euclid(extent);
    // rem_euclid can round up to exactly `extent` for tiny negative inputs.
    if wrapped >= extent { 0.0 } else { wrapped }
}

/// Shortest separation between two coordinates on a circle of circumference `extent`.
#[must_use]
pub fn torus_delta(a: f64, b: f64, extent: f64) -> f64 {
    let direct = (a - b).abs();
    direct.min(extent - direct).max(0.0)
}

/// Euclidean distance on a `width × height` torus.
#[must_use]
pub fn torus_distance(a: (f64, f64), b: (f64, f64), width: f64, height: f64) -> f64 {
    let dx = torus_delta(a.0, b.0, width);
    let dy = torus_delta(a.1, b.1, height);
    dx.hypot(dy)
}

/// Position and orientation of a mobile agent.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    /// Heading in radians.
    pub heading: f64,
}

impl Pose {
    #[must_use]
    pub const fn new(x: f64, y: f64, heading: f64) -> Self {
        Self { x, y, heading }
    }

    /// Coordinates as a tuple, the layout consumed by [`NeighborhoodIndex::rebuild`].
    #[must_use]
    pub const fn point(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// Correlated random walk step.
    ///
    /// The displacement blends a uniformly drawn heading (weight `1 - correlatedness`)
    /// with the current heading (weight `correlatedness`), moves by `speed`, and wraps
    /// both coordinates onto the arena. The new heading is the direction actually moved.
    #[must_use]
    pub fn advance(
        &self,
        random_heading: f64,
        speed: f64,
        correlatedness: f64,
        width: f64,
        height: f64,
    ) -> Self {
        let random_weight = speed * (1.0 - correlatedness);
        let persistent_weight = speed * correlatedness;
        let move_x = random_weight * random_heading.cos() + persistent_weight * self.heading.cos();
        let move_y = random_weight * random_heading.sin() + persistent_weight * self.heading.sin();
        Self {
            x: wrap_coordinate(self.x + move_x, width),
            y: wrap_coordinate(self.y + move_y, height),
            heading: move_y.atan2(move_x),
        }
    }
}

/// Common behaviour exposed by neighborhood indices.
pub trait NeighborhoodIndex {
    /// Rebuild internal structures from agent positions.
    fn rebuild(&mut self, positions: &[(f64, f64)]) -> Result<(), IndexError>;

    /// Visit neighbors of `agent_idx` strictly closer than `radius`, excluding the agent itself.
    fn neighbors_within(
        &self,
        agent_idx: usize,
        radius: f64,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f64>),
    );
}

/// Upper bound on grid cells per axis; finer ranges fall back to larger buckets.
const MAX_CELLS_PER_AXIS: usize = 1024;

/// Uniform bucket grid over a toroidal arena.
///
/// Buckets are at least `cell_size` wide, so with `cell_size >= radius` every neighbor lies in
/// the 3×3 block of buckets around the agent (wrapping at the edges). Grids with fewer than
/// three buckets along an axis, or queries wider than a bucket, degrade to a linear scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorusGridIndex {
    /// Requested minimum edge length of each bucket.
    pub cell_size: f64,
    pub width: f64,
    pub height: f64,
    #[serde(skip)]
    cols: usize,
    #[serde(skip)]
    rows: usize,
    #[serde(skip)]
    buckets: Vec<Vec<usize>>,
    #[serde(skip)]
    positions: Vec<(f64, f64)>,
}

impl TorusGridIndex {
    /// Create a new grid over a `width × height` torus.
    #[must_use]
    pub fn new(cell_size: f64, width: f64, height: f64) -> Self {
        Self {
            cell_size,
            width,
            height,
            cols: 1,
            rows: 1,
            buckets: Vec::new(),
            positions: Vec::new(),
        }
    }

    /// Number of buckets along each axis after the last rebuild.
    #[must_use]
    pub const fn dimensions(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    fn bucket_of(&self, point: (f64, f64)) -> (usize, usize) {
        let cx = ((point.0 / self.width) * self.cols as f64) as usize;
        let cy = ((point.1 / self.height) * self.rows as f64) as usize;
        (cx.min(self.cols - 1), cy.min(self.rows - 1))
    }

    fn scan_all(
        &self,
        agent_idx: usize,
        radius: f64,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f64>),
    ) {
        let origin = self.positions[agent_idx];
        for (other, &point) in self.positions.iter().enumerate() {
            if other == agent_idx {
                continue;
            }
            let dist = torus_distance(origin, point, self.width, self.height);
            if dist < radius {
                visitor(other, OrderedFloat(dist));
            }
        }
    }
}

impl Default for TorusGridIndex {
    fn default() -> Self {
        Self::new(0.1, 1.0, 1.0)
    }
}

impl NeighborhoodIndex for TorusGridIndex {
    fn rebuild(&mut self, positions: &[(f64, f64)]) -> Result<(), IndexError> {
        if !(self.cell_size > 0.0) || !self.cell_size.is_finite() {
            return Err(IndexError::InvalidConfig("cell_size must be positive"));
        }
        if !(self.width > 0.0) || !(self.height > 0.0) {
            return Err(IndexError::InvalidConfig("arena dimensions must be positive"));
        }
        self.cols = ((self.width / self.cell_size).floor() as usize).clamp(1, MAX_CELLS_PER_AXIS);
        self.rows = ((self.height / self.cell_size).floor() as usize).clamp(1, MAX_CELLS_PER_AXIS);

        self.positions.clear();
        self.positions.extend(
            positions
                .iter()
                .map(|&(x, y)| (wrap_coordinate(x, self.width), wrap_coordinate(y, self.height))),
        );

        let bucket_count = self.cols * self.rows;
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.buckets.resize_with(bucket_count, Vec::new);
        for (idx, &point) in self.positions.iter().enumerate() {
            let (cx, cy) = self.bucket_of(point);
            self.buckets[cy * self.cols + cx].push(idx);
        }
        Ok(())
    }

    fn neighbors_within(
        &self,
        agent_idx: usize,
        radius: f64,
        visitor: &mut dyn FnMut(usize, OrderedFloat<f64>),
    ) {
        if agent_idx >= self.positions.len() || !(radius > 0.0) {
            return;
        }
        let bucket_w = self.width / self.cols as f64;
        let bucket_h = self.height / self.rows as f64;
        if self.cols < 3 || self.rows < 3 || radius > bucket_w || radius > bucket_h {
            self.scan_all(agent_idx, radius, visitor);
            return;
        }

        let origin = self.positions[agent_idx];
        let (cx, cy) = self.bucket_of(origin);
        for dy in [self.rows - 1, 0, 1] {
            let row = (cy + dy) % self.rows;
            for dx in [self.cols - 1, 0, 1] {
                let col = (cx + dx) % self.cols;
                for &other in &self.buckets[row * self.cols + col] {
                    if other == agent_idx {
                        continue;
                    }
                    let dist =
                        torus_distance(origin, self.positions[other], self.width, self.height);
                    if dist < radius {
                        visitor(other, OrderedFloat(dist));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::SmallRng};

    fn collect(index: &TorusGridIndex, agent: usize, radius: f64) -> Vec<usize> {
        let mut found = Vec::new();
        index.neighbors_within(agent, radius, &mut |other, _| found.push(other));
        found.sort_unstable();
        found
    }

    #[test]
    fn wrap_coordinate_handles_both_directions() {
        assert!((wrap_coordinate(1.25, 1.0) - 0.25).abs() < 1e-12);
        assert!((wrap_coordinate(-0.25, 1.0) - 0.75).abs() < 1e-12);
        assert_eq!(wrap_coordinate(1.0, 1.0), 0.0);
        assert!(wrap_coordinate(-1e-18, 1.0) < 1.0);
    }

    #[test]
    fn torus_distance_prefers_wraparound() {
        let d = torus_distance((0.95, 0.5), (0.05, 0.5), 1.0, 1.0);
        assert!((d - 0.1).abs() < 1e-12, "distance was {d}");
        let diagonal = torus_distance((0.98, 0.98), (0.02, 0.02), 1.0, 1.0);
        assert!((diagonal - (0.04f64.hypot(0.04))).abs() < 1e-12);
    }

    #[test]
    fn advance_wraps_past_the_boundary() {
        let pose = Pose::new(0.99, 0.5, 0.0);
        let moved = pose.advance(0.0, 0.05, 1.0, 1.0, 1.0);
        assert!((moved.x - 0.04).abs() < 1e-12, "x was {}", moved.x);
        assert!((moved.y - 0.5).abs() < 1e-12);
        assert!(moved.heading.abs() < 1e-12);
    }

    #[test]
    fn advance_with_zero_correlation_follows_random_heading() {
        let pose = Pose::new(0.5, 0.5, 0.0);
        let heading = std::f64::consts::FRAC_PI_2;
        let moved = pose.advance(heading, 0.1, 0.0, 1.0, 1.0);
        assert!((moved.x - 0.5).abs() < 1e-12);
        assert!((moved.y - 0.6).abs() < 1e-12);
        assert!((moved.heading - heading).abs() < 1e-12);
    }

    #[test]
    fn rejects_non_positive_cell_size() {
        let mut index = TorusGridIndex::new(0.0, 1.0, 1.0);
        assert_eq!(
            index.rebuild(&[(0.1, 0.1)]),
            Err(IndexError::InvalidConfig("cell_size must be positive"))
        );
    }

    #[test]
    fn rejects_degenerate_arena() {
        let mut index = TorusGridIndex::new(0.1, 0.0, 1.0);
        assert_eq!(
            index.rebuild(&[(0.1, 0.1)]),
            Err(IndexError::InvalidConfig("arena dimensions must be positive"))
        );
    }

    #[test]
    fn grid_finds_neighbors_across_the_seam() {
        let mut index = TorusGridIndex::new(0.1, 1.0, 1.0);
        index
            .rebuild(&[(0.01, 0.5), (0.97, 0.5), (0.5, 0.5), (0.01, 0.58)])
            .expect("rebuild");
        assert_eq!(index.dimensions(), (10, 10));
        assert_eq!(collect(&index, 0, 0.1), vec![1, 3]);
        assert!(collect(&index, 2, 0.1).is_empty());
    }

    #[test]
    fn grid_matches_linear_scan() {
        let mut rng = SmallRng::seed_from_u64(0x5EED);
        let points: Vec<(f64, f64)> = (0..300)
            .map(|_| (rng.random::<f64>(), rng.random::<f64>()))
            .collect();
        let radius = 0.07;
        let mut grid = TorusGridIndex::new(radius, 1.0, 1.0);
        grid.rebuild(&points).expect("grid rebuild");
        let mut coarse = TorusGridIndex::new(1.0, 1.0, 1.0);
        coarse.rebuild(&points).expect("coarse rebuild");
        for agent in 0..points.len() {
            assert_eq!(collect(&grid, agent, radius), collect(&coarse, agent, radius));
        }
    }
}
