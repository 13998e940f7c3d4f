//! Line-blend detection.
//!
//! Two lines blend when their rest frequencies lie within a velocity
//! separation threshold. Pairs are kept in both orientations so the sampler
//! can look up the partners of any line directly.

use crate::common::constants::CLIGHT;
use crate::molecule::MolecularSpecies;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlendPartner {
    pub species: usize,
    pub line: usize,
    /// Velocity separation of the partner relative to the owning line [m s^-1].
    pub delta_v: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlendSet {
    /// Partners indexed by `[species][line]`.
    partners: Vec<Vec<Vec<BlendPartner>>>,
    pair_count: usize,
}

impl BlendSet {
    pub fn empty(species: &[MolecularSpecies]) -> Self {
        Self {
            partners: species
                .iter()
                .map(|molecule| vec![Vec::new(); molecule.line_count()])
                .collect(),
            pair_count: 0,
        }
    }

    /// Scans every ordered pair of distinct lines across all species.
    pub fn detect(species: &[MolecularSpecies], threshold: f64) -> Self {
        let mut set = Self::empty(species);

        for (first_species, first) in species.iter().enumerate() {
            for (first_line, first_transition) in first.transitions().iter().enumerate() {
                for (second_species, second) in species.iter().enumerate() {
                    for (second_line, second_transition) in second.transitions().iter().enumerate()
                    {
                        if first_species == second_species && first_line == second_line {
                            continue;
                        }
                        let delta_v = velocity_separation(
                            first_transition.frequency,
                            second_transition.frequency,
                        );
                        if delta_v.abs() <= threshold {
                            set.partners[first_species][first_line].push(BlendPartner {
                                species: second_species,
                                line: second_line,
                                delta_v,
                            });
                            set.pair_count += 1;
                        }
                    }
                }
            }
        }

        set
    }

    pub fn partners_of(&self, species: usize, line: usize) -> &[BlendPartner] {
        self.partners
            .get(species)
            .and_then(|lines| lines.get(line))
            .map_or(&[], Vec::as_slice)
    }

    /// Number of ordered pairs; each blend counts twice.
    pub fn len(&self) -> usize {
        self.pair_count
    }

    pub fn is_empty(&self) -> bool {
        self.pair_count == 0
    }
}

/// `c (nu2 - nu1) / mean(nu1, nu2)`, antisymmetric in its arguments.
pub fn velocity_separation(first_frequency: f64, second_frequency: f64) -> f64 {
    CLIGHT * (second_frequency - first_frequency) / (0.5 * (first_frequency + second_frequency))
}

#[cfg(test)]
mod tests {
    use super::{BlendSet, velocity_separation};
    use crate::common::constants::CLIGHT;
    use crate::molecule::{EnergyLevel, LineSpec, MolecularSpecies};

    fn species_with_lines(name: &str, frequencies: &[f64]) -> MolecularSpecies {
        let levels = (0..=frequencies.len())
            .map(|index| EnergyLevel::new(1.0, index as f64))
            .collect();
        let lines = frequencies
            .iter()
            .enumerate()
            .map(|(index, frequency)| LineSpec {
                upper: index + 1,
                lower: index,
                einstein_a: 1.0e-6,
                frequency: *frequency,
            })
            .collect();
        MolecularSpecies::new(name, 30.0, levels, lines, Vec::new())
            .expect("species should validate")
    }

    #[test]
    fn detection_is_symmetric_across_species() {
        let nu = 100.0e9;
        let first = species_with_lines("a", &[nu, 2.0 * nu]);
        let second = species_with_lines("b", &[nu * (1.0 + 1.0e-6)]);
        let set = BlendSet::detect(&[first, second], 1.0e4);

        assert_eq!(set.len(), 2);
        let forward = set.partners_of(0, 0);
        let backward = set.partners_of(1, 0);
        assert_eq!(forward.len(), 1);
        assert_eq!(backward.len(), 1);
        assert_eq!((forward[0].species, forward[0].line), (1, 0));
        assert_eq!((backward[0].species, backward[0].line), (0, 0));
        assert_eq!(forward[0].delta_v, -backward[0].delta_v);
        assert!(forward[0].delta_v > 0.0);
        assert!(set.partners_of(0, 1).is_empty());
        assert!(set.partners_of(5, 0).is_empty());
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let first = 100.0e9;
        let second = 100.01e9;
        let separation = velocity_separation(first, second);
        assert!((separation - CLIGHT * 0.01e9 / 100.005e9).abs() <= 1.0e-6);

        let species = species_with_lines("pair", &[first, second]);
        let exact = BlendSet::detect(std::slice::from_ref(&species), separation.abs());
        assert_eq!(exact.len(), 2);

        let just_below = BlendSet::detect(&[species], separation.abs() * (1.0 - 1.0e-12));
        assert!(just_below.is_empty());
    }
}
