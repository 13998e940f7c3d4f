//! Per-point quantities that depend only on the physical model: line widths,
//! molecular density, collision rates at the gas temperature and the dust
//! continuum.

use super::radiation::planck;
use crate::common::config::SolverConfig;
use crate::common::constants::{
    AMU, KBOLTZ, MEAN_PARTICLE_MASS_AMU, ORTHO_H2_ID, ORTHO_PARA_GAP_K, ORTHO_PARA_MAX, PARA_H2_ID,
};
use crate::grid::{DustOpacityTable, GridPoint, PartnerRates, PopulationState};
use crate::molecule::MolecularSpecies;
use crate::numerics::interpolate_log_linear;

/// Builds the population states of `point`, carrying over existing population
/// vectors whose length still matches the species.
pub fn prepare_point(
    point: &GridPoint,
    species: &[MolecularSpecies],
    dust_table: Option<&DustOpacityTable>,
    config: &SolverConfig,
) -> Vec<PopulationState> {
    let reference_density = point.densities.first().copied().unwrap_or(0.0);

    species
        .iter()
        .enumerate()
        .map(|(index, molecule)| {
            let thermal =
                2.0 * KBOLTZ * point.gas_temperature / (AMU * molecule.molecular_weight());
            let dopb = (point.doppler * point.doppler + thermal).sqrt();
            let binv = if dopb > 0.0 { 1.0 / dopb } else { 0.0 };
            let nmol = point.abundances.get(index).copied().unwrap_or(0.0) * reference_density;

            let densities =
                partner_densities(molecule, &point.densities, point.gas_temperature, config);
            let partner_rates = molecule
                .partners()
                .iter()
                .zip(densities)
                .map(|(partner, density)| {
                    let down: Vec<f64> = partner
                        .transitions
                        .iter()
                        .map(|transition| {
                            interpolate_log_linear(
                                &partner.temperatures,
                                &transition.rates,
                                point.gas_temperature,
                            )
                        })
                        .collect();
                    let up = partner
                        .transitions
                        .iter()
                        .zip(&down)
                        .map(|(transition, rate)| {
                            molecule.upward_rate(
                                transition.upper,
                                transition.lower,
                                *rate,
                                point.gas_temperature,
                            )
                        })
                        .collect();
                    PartnerRates { down, up, density }
                })
                .collect();

            let knu = molecule
                .transitions()
                .iter()
                .map(|transition| match dust_table {
                    Some(table) if point.gas_to_dust > 0.0 => {
                        table.opacity(transition.frequency) * MEAN_PARTICLE_MASS_AMU * AMU
                            / point.gas_to_dust
                            * reference_density
                    }
                    _ => 0.0,
                })
                .collect();
            let dust = molecule
                .transitions()
                .iter()
                .map(|transition| planck(transition.frequency, point.dust_temperature))
                .collect();

            let pops = match point.populations.get(index) {
                Some(existing) if existing.pops.len() == molecule.level_count() => {
                    existing.pops.clone()
                }
                _ => vec![0.0; molecule.level_count()],
            };

            PopulationState {
                pops,
                knu,
                dust,
                dopb,
                binv,
                nmol,
                partner_rates,
            }
        })
        .collect()
}

/// Thermal ortho/para H2 ratio at `temperature`, capped at `ORTHO_PARA_MAX`.
pub fn ortho_para_ratio(temperature: f64) -> f64 {
    if temperature <= 0.0 {
        return 0.0;
    }
    (9.0 * (-ORTHO_PARA_GAP_K / temperature).exp()).min(ORTHO_PARA_MAX)
}

/// `true` when a single supplied density is total H2 that has to be shared
/// between separate para- and ortho-H2 rate tables.
pub fn splits_ortho_para(
    molecule: &MolecularSpecies,
    available_densities: usize,
    config: &SolverConfig,
) -> bool {
    let has = |id| molecule.partners().iter().any(|partner| partner.partner_id == id);
    config.collision_partners.is_none()
        && available_densities == 1
        && has(PARA_H2_ID)
        && has(ORTHO_H2_ID)
}

/// Density seen by each collision partner of `molecule`, in partner order.
/// Partners without a supplied density get zero.
pub fn partner_densities(
    molecule: &MolecularSpecies,
    densities: &[f64],
    temperature: f64,
    config: &SolverConfig,
) -> Vec<f64> {
    let split = splits_ortho_para(molecule, densities.len(), config);
    let ratio = ortho_para_ratio(temperature);

    molecule
        .partners()
        .iter()
        .enumerate()
        .map(|(index, partner)| match partner.partner_id {
            PARA_H2_ID if split => densities[0] / (1.0 + ratio),
            ORTHO_H2_ID if split => densities[0] * ratio / (1.0 + ratio),
            _ => densities
                .get(config.partner_density_index(index))
                .copied()
                .unwrap_or(0.0),
        })
        .collect()
}

/// `(species, partner, density index)` triples whose density index lies past
/// the densities supplied by at least one point. Partners fed by an
/// ortho/para split are never missing.
pub fn missing_partner_densities(
    species: &[MolecularSpecies],
    config: &SolverConfig,
    points: &[GridPoint],
) -> Vec<(usize, usize, usize)> {
    let available = points
        .iter()
        .map(|point| point.densities.len())
        .min()
        .unwrap_or(0);

    let mut missing = Vec::new();
    for (species_index, molecule) in species.iter().enumerate() {
        let split = splits_ortho_para(molecule, available, config);
        for (partner_index, partner) in molecule.partners().iter().enumerate() {
            if split && matches!(partner.partner_id, PARA_H2_ID | ORTHO_H2_ID) {
                continue;
            }
            let density_index = config.partner_density_index(partner_index);
            if density_index >= available {
                missing.push((species_index, partner_index, density_index));
            }
        }
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::{missing_partner_densities, ortho_para_ratio, partner_densities, prepare_point};
    use crate::common::config::SolverConfig;
    use crate::common::constants::{AMU, KBOLTZ};
    use crate::grid::{DustOpacityTable, GridPoint};
    use crate::molecule::fixtures::{CO_DOWN_RATE, three_level_species, two_level_species};

    fn point() -> GridPoint {
        let mut point = GridPoint::new(0, [0.0; 3]);
        point.densities = vec![1.0e9];
        point.gas_temperature = 20.0;
        point.dust_temperature = 20.0;
        point.abundances = vec![1.0e-4];
        point.doppler = 200.0;
        point
    }

    #[test]
    fn prepared_state_carries_width_density_and_detailed_balance() {
        let species = vec![two_level_species()];
        let states = prepare_point(&point(), &species, None, &SolverConfig::default());
        let state = &states[0];

        let expected_dopb = (200.0_f64.powi(2) + 2.0 * KBOLTZ * 20.0 / (AMU * 28.0)).sqrt();
        assert!((state.dopb - expected_dopb).abs() <= 1.0e-9);
        assert!((state.binv * state.dopb - 1.0).abs() <= 1.0e-12);
        assert!((state.nmol - 1.0e5).abs() <= 1.0e-6);
        assert_eq!(state.pops, vec![0.0, 0.0]);
        assert_eq!(state.knu, vec![0.0]);
        assert!(state.dust[0] > 0.0);

        let rates = &state.partner_rates[0];
        assert!((rates.down[0] - CO_DOWN_RATE).abs() <= 1.0e-12 * CO_DOWN_RATE);
        let expected_up = species[0].upward_rate(1, 0, rates.down[0], 20.0);
        assert_eq!(rates.up[0], expected_up);
    }

    #[test]
    fn dust_table_adds_continuum_opacity() {
        let species = vec![two_level_species()];
        let table = DustOpacityTable::new(vec![1.0, 1.0e4], vec![1.0e3, 1.0])
            .expect("table should validate");
        let states = prepare_point(&point(), &species, Some(&table), &SolverConfig::default());
        assert!(states[0].knu[0] > 0.0);
    }

    #[test]
    fn existing_populations_survive_preparation() {
        let species = vec![two_level_species()];
        let mut seeded = point();
        seeded.populations = prepare_point(&seeded, &species, None, &SolverConfig::default());
        seeded.populations[0].pops = vec![0.6, 0.4];
        let states = prepare_point(&seeded, &species, None, &SolverConfig::default());
        assert_eq!(states[0].pops, vec![0.6, 0.4]);
    }

    #[test]
    fn missing_densities_are_listed_per_partner() {
        let species = vec![three_level_species()];
        let split = missing_partner_densities(&species, &SolverConfig::default(), &[point()]);
        assert!(split.is_empty());

        let explicit = SolverConfig {
            collision_partners: Some(vec![0, 1]),
            ..SolverConfig::default()
        };
        let missing = missing_partner_densities(&species, &explicit, &[point()]);
        assert_eq!(missing, vec![(0, 1, 1)]);
    }

    #[test]
    fn total_h2_is_split_by_thermal_ortho_para_ratio() {
        let species = three_level_species();
        let config = SolverConfig::default();

        let warm = partner_densities(&species, &[1.0e9], 300.0, &config);
        assert_eq!(ortho_para_ratio(300.0), 3.0);
        assert!((warm[0] - 0.25e9).abs() <= 1.0e-3);
        assert!((warm[1] - 0.75e9).abs() <= 1.0e-3);

        let ratio = 9.0 * (-170.6_f64 / 20.0).exp();
        let cold = partner_densities(&species, &[1.0e9], 20.0, &config);
        assert!((cold[0] - 1.0e9 / (1.0 + ratio)).abs() <= 1.0e-3);
        assert!((cold[0] + cold[1] - 1.0e9).abs() <= 1.0e-3);
        assert!(cold[1] < cold[0]);

        let separate = partner_densities(&species, &[6.0e8, 4.0e8], 20.0, &config);
        assert_eq!(separate, vec![6.0e8, 4.0e8]);

        let explicit = SolverConfig {
            collision_partners: Some(vec![0, 1]),
            ..SolverConfig::default()
        };
        assert_eq!(
            partner_densities(&species, &[1.0e9], 20.0, &explicit),
            vec![1.0e9, 0.0]
        );

        let mut cold_point = point();
        cold_point.abundances = vec![1.0e-4];
        let states = prepare_point(&cold_point, &[species], None, &config);
        assert_eq!(states[0].partner_rates[1].density, cold[1]);
    }
}
