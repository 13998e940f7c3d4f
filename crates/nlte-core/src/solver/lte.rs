use crate::common::constants::HCKB;
use crate::molecule::MolecularSpecies;
use crate::numerics::normalize_in_place;

/// Boltzmann populations `g exp(-E/kT)`, normalised to unit sum. A
/// non-positive temperature puts everything in the lowest level.
pub fn boltzmann_populations(species: &MolecularSpecies, temperature: f64) -> Vec<f64> {
    let levels = species.levels();
    if !(temperature > 0.0 && temperature.is_finite()) {
        return ground_state(levels.len());
    }

    let reference = levels
        .iter()
        .map(|level| level.energy)
        .fold(f64::INFINITY, f64::min);
    let mut pops: Vec<f64> = levels
        .iter()
        .map(|level| level.weight * (-HCKB * (level.energy - reference) / temperature).exp())
        .collect();
    normalize_in_place(&mut pops);
    pops
}

pub fn ground_state(level_count: usize) -> Vec<f64> {
    let mut pops = vec![0.0; level_count];
    if let Some(first) = pops.first_mut() {
        *first = 1.0;
    }
    pops
}
