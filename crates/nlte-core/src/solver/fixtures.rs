use super::lte::boltzmann_populations;
use super::setup::prepare_point;
use crate::common::config::SolverConfig;
use crate::grid::{Grid, GridPoint};
use crate::molecule::MolecularSpecies;
use crate::molecule::fixtures::two_level_species;

/// Fills uniform physics on `points`, links them, prepares every species and
/// seeds LTE populations.
pub(crate) fn prepared_grid(
    points: Vec<GridPoint>,
    links: &[(usize, usize)],
    species: &[MolecularSpecies],
    abundance: f64,
) -> Grid {
    let mut grid = Grid::from_points(points);
    for &(first, second) in links {
        grid.connect(first, second).expect("fixture link should be valid");
    }
    for point in grid.points_mut() {
        point.densities = vec![1.0e9];
        point.gas_temperature = 20.0;
        point.dust_temperature = 20.0;
        point.abundances = vec![abundance; species.len()];
        point.doppler = 200.0;
        point.populations = prepare_point(point, species, None, &SolverConfig::default());
        for (state, molecule) in point.populations.iter_mut().zip(species) {
            state.pops = boltzmann_populations(molecule, point.gas_temperature);
        }
    }
    grid
}

/// Source point at the origin with a single sink `distance` away along x.
pub(crate) fn thin_pair(abundance: f64, distance: f64) -> (Grid, Vec<MolecularSpecies>) {
    let species = vec![two_level_species()];
    let grid = prepared_grid(
        vec![
            GridPoint::new(0, [0.0; 3]),
            GridPoint::sink(1, [distance, 0.0, 0.0]),
        ],
        &[(0, 1)],
        &species,
        abundance,
    );
    (grid, species)
}
