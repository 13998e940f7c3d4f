//! Accelerated lambda iteration over the grid.

pub mod blend;
mod driver;
pub mod lte;
pub mod radiation;
pub mod rates;
mod report;
pub mod scratch;
pub mod setup;
pub mod stateq;
pub mod transport;

#[cfg(test)]
mod fixtures;

pub use blend::{BlendPartner, BlendSet};
pub use driver::PopulationSolver;
pub use report::{NumericDomainKind, PointIssue, PointOutcome, RunReport};
pub use stateq::SolveError;
