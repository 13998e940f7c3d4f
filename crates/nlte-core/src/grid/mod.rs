//! Grid point store.
//!
//! All points live in one contiguous vector owned by [`Grid`]; neighbour links
//! are indices into that vector, so any worker may read any point while the
//! driver keeps sole write access between sweeps.

mod checkpoint;
mod physics;
mod populations;

pub use checkpoint::{CheckpointPoint, PopulationCheckpoint, read_checkpoint, write_checkpoint};
pub use physics::{DustOpacityTable, PhysicalModel};
pub use populations::{PartnerRates, PopulationState, max_fractional_change};

use crate::common::constants::DEFAULT_GAS_TO_DUST;
use crate::domain::{NlteError, NlteResult};
use crate::numerics::{distance3, normalize3, sub3};

/// Convergence flag of a grid point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PointStatus {
    #[default]
    Unconverged,
    Converged,
    /// Sweep budget ran out before the convergence window was met.
    Exhausted,
    /// The point's balance equations could not be solved.
    Failed,
}

impl PointStatus {
    pub const fn is_settled(self) -> bool {
        !matches!(self, Self::Unconverged)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    /// Path length to the neighbour [m].
    pub distance: f64,
    /// Unit vector pointing at the neighbour.
    pub direction: [f64; 3],
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridPoint {
    pub id: usize,
    pub position: [f64; 3],
    pub velocity: [f64; 3],
    /// Number density per collision partner [m^-3].
    pub densities: Vec<f64>,
    pub gas_temperature: f64,
    pub dust_temperature: f64,
    /// Abundance per species relative to the first density component.
    pub abundances: Vec<f64>,
    /// Turbulent Doppler b parameter [m s^-1].
    pub doppler: f64,
    pub gas_to_dust: f64,
    pub neighbors: Vec<Neighbor>,
    pub sink: bool,
    pub status: PointStatus,
    pub ray_budget: usize,
    pub populations: Vec<PopulationState>,
}

impl GridPoint {
    pub fn new(id: usize, position: [f64; 3]) -> Self {
        Self {
            id,
            position,
            velocity: [0.0; 3],
            densities: Vec::new(),
            gas_temperature: 0.0,
            dust_temperature: 0.0,
            abundances: Vec::new(),
            doppler: 0.0,
            gas_to_dust: DEFAULT_GAS_TO_DUST,
            neighbors: Vec::new(),
            sink: false,
            status: PointStatus::Unconverged,
            ray_budget: 0,
            populations: Vec::new(),
        }
    }

    pub fn sink(id: usize, position: [f64; 3]) -> Self {
        Self {
            sink: true,
            ..Self::new(id, position)
        }
    }

    /// Neighbour whose direction is best aligned with `direction`, if any is
    /// strictly in front.
    pub fn forward_neighbor(&self, direction: [f64; 3]) -> Option<&Neighbor> {
        let mut best: Option<(&Neighbor, f64)> = None;
        for neighbor in &self.neighbors {
            let alignment = crate::numerics::dot3(neighbor.direction, direction);
            if alignment <= 0.0 {
                continue;
            }
            if best.is_none_or(|(_, current)| alignment > current) {
                best = Some((neighbor, alignment));
            }
        }
        best.map(|(neighbor, _)| neighbor)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Grid {
    points: Vec<GridPoint>,
}

impl Grid {
    /// Wraps a finished point array after checking its neighbour graph.
    pub fn new(points: Vec<GridPoint>) -> NlteResult<Self> {
        let grid = Self { points };
        grid.validate_structure()?;
        Ok(grid)
    }

    /// Builds a grid without neighbour links; use [`Grid::connect`] to add them.
    pub fn from_points(points: Vec<GridPoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[GridPoint] {
        &self.points
    }

    pub fn points_mut(&mut self) -> &mut [GridPoint] {
        &mut self.points
    }

    pub fn point(&self, index: usize) -> &GridPoint {
        &self.points[index]
    }

    pub fn point_mut(&mut self, index: usize) -> &mut GridPoint {
        &mut self.points[index]
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Adds a symmetric link between two points, deriving distance and
    /// direction from their positions.
    pub fn connect(&mut self, first: usize, second: usize) -> NlteResult<()> {
        if first >= self.points.len() || second >= self.points.len() || first == second {
            return Err(NlteError::input_validation(
                "GRID.NEIGHBOR_INDEX",
                format!(
                    "cannot link points {first} and {second} in a grid of {} points",
                    self.points.len()
                ),
            ));
        }

        let from = self.points[first].position;
        let to = self.points[second].position;
        let distance = distance3(from, to);
        let direction = normalize3(sub3(to, from)).ok_or_else(|| {
            NlteError::input_validation(
                "GRID.COINCIDENT_POINTS",
                format!("points {first} and {second} share a position"),
            )
        })?;

        self.points[first].neighbors.push(Neighbor {
            index: second,
            distance,
            direction,
        });
        self.points[second].neighbors.push(Neighbor {
            index: first,
            distance,
            direction: [-direction[0], -direction[1], -direction[2]],
        });
        Ok(())
    }

    /// Fills every point's physical fields from `model`.
    pub fn evaluate_physics(&mut self, model: &impl PhysicalModel) {
        for point in &mut self.points {
            let position = point.position;
            point.densities = model.densities(position);
            point.gas_temperature = model.gas_temperature(position);
            point.dust_temperature = model.dust_temperature(position);
            point.abundances = model.abundances(position);
            point.doppler = model.doppler(position);
            point.velocity = model.velocity(position);
            point.gas_to_dust = model.gas_to_dust(position);
        }
    }

    pub fn validate_structure(&self) -> NlteResult<()> {
        if self.points.is_empty() {
            return Err(NlteError::input_validation(
                "GRID.EMPTY",
                "grid contains no points",
            ));
        }

        for (index, point) in self.points.iter().enumerate() {
            for neighbor in &point.neighbors {
                if neighbor.index >= self.points.len() || neighbor.index == index {
                    return Err(NlteError::input_validation(
                        "GRID.NEIGHBOR_INDEX",
                        format!(
                            "point {index} links to invalid neighbour index {}",
                            neighbor.index
                        ),
                    ));
                }
                if !(neighbor.distance.is_finite() && neighbor.distance > 0.0) {
                    return Err(NlteError::input_validation(
                        "GRID.NEIGHBOR_DISTANCE",
                        format!(
                            "point {index} has non-positive distance {} to neighbour {}",
                            neighbor.distance, neighbor.index
                        ),
                    ));
                }
            }
        }

        Ok(())
    }
}
