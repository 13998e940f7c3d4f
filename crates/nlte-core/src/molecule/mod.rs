mod model;
mod parser;

pub use model::{
    CollisionPartner, CollisionalTransition, EnergyLevel, LineSpec, MolecularSpecies,
    RadiativeTransition,
};
pub use parser::{LamdaParseError, load_lamda, parse_lamda};

#[cfg(test)]
pub(crate) use model::fixtures;
