//! Non-LTE molecular level-population engine.
//!
//! Populations are solved at every point of an unstructured grid by accelerated
//! lambda iteration: Monte Carlo photon transport estimates the mean line
//! intensity, a per-point statistical-equilibrium system is solved for the
//! normalised populations, and the driver sweeps the grid until every non-sink
//! point has converged or exhausted its sweep budget.

pub mod common;
pub mod domain;
pub mod grid;
pub mod molecule;
pub mod numerics;
pub mod solver;

pub use common::config::{SingularPolicy, SolverConfig};
pub use domain::{NlteError, NlteErrorCategory, NlteResult};
pub use grid::{Grid, GridPoint, Neighbor, PhysicalModel, PointStatus, PopulationState};
pub use molecule::MolecularSpecies;
pub use solver::{PointIssue, PopulationSolver, RunReport};
