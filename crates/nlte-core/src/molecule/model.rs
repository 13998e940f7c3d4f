use crate::common::constants::{CLIGHT, HCKB, HPLANCK};
use crate::domain::{NlteError, NlteResult};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyLevel {
    /// Statistical weight g.
    pub weight: f64,
    /// Energy term [cm^-1].
    pub energy: f64,
}

impl EnergyLevel {
    pub const fn new(weight: f64, energy: f64) -> Self {
        Self { weight, energy }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiativeTransition {
    pub upper: usize,
    pub lower: usize,
    /// Einstein A [s^-1].
    pub einstein_a: f64,
    /// Rest frequency [Hz].
    pub frequency: f64,
    /// Stimulated emission coefficient B_ul, intensity units.
    pub einstein_b_upper: f64,
    /// Absorption coefficient B_lu, intensity units.
    pub einstein_b_lower: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollisionalTransition {
    pub upper: usize,
    pub lower: usize,
    /// Downward rate coefficients [m^3 s^-1], one per partner temperature.
    pub rates: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollisionPartner {
    /// Catalogue partner code (1 = H2, 2 = p-H2, 3 = o-H2, 4 = e, 5 = H, 6 = He, 7 = H+).
    pub partner_id: u32,
    pub label: String,
    pub temperatures: Vec<f64>,
    pub transitions: Vec<CollisionalTransition>,
}

/// Spectroscopic and collisional data for one species. Immutable once built;
/// `new` is the only constructor and validates every index and rate.
#[derive(Debug, Clone, PartialEq)]
pub struct MolecularSpecies {
    name: String,
    molecular_weight: f64,
    levels: Vec<EnergyLevel>,
    transitions: Vec<RadiativeTransition>,
    partners: Vec<CollisionPartner>,
}

/// Radiative transition as listed in a catalogue, before the Einstein B
/// coefficients are derived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSpec {
    pub upper: usize,
    pub lower: usize,
    pub einstein_a: f64,
    pub frequency: f64,
}

impl MolecularSpecies {
    pub fn new(
        name: impl Into<String>,
        molecular_weight: f64,
        levels: Vec<EnergyLevel>,
        lines: Vec<LineSpec>,
        partners: Vec<CollisionPartner>,
    ) -> NlteResult<Self> {
        let name = name.into();
        if !(molecular_weight.is_finite() && molecular_weight > 0.0) {
            return Err(NlteError::input_validation(
                "CONFIG.MOLECULAR_WEIGHT",
                format!("species '{name}' has invalid molecular weight {molecular_weight}"),
            ));
        }
        validate_levels(&name, &levels)?;

        let mut transitions = Vec::with_capacity(lines.len());
        for (index, line) in lines.iter().enumerate() {
            validate_level_pair(&name, "transition", index, line.upper, line.lower, &levels)?;
            if !(line.einstein_a.is_finite() && line.einstein_a >= 0.0) {
                return Err(NlteError::input_validation(
                    "CONFIG.NEGATIVE_RATE",
                    format!(
                        "species '{name}' transition {index} has invalid Einstein A {}",
                        line.einstein_a
                    ),
                ));
            }
            if !(line.frequency.is_finite() && line.frequency > 0.0) {
                return Err(NlteError::input_validation(
                    "CONFIG.TRANSITION_FREQUENCY",
                    format!(
                        "species '{name}' transition {index} has invalid frequency {}",
                        line.frequency
                    ),
                ));
            }

            let einstein_b_upper = line.einstein_a * CLIGHT * CLIGHT
                / (2.0 * HPLANCK * line.frequency.powi(3));
            let einstein_b_lower =
                levels[line.upper].weight / levels[line.lower].weight * einstein_b_upper;
            transitions.push(RadiativeTransition {
                upper: line.upper,
                lower: line.lower,
                einstein_a: line.einstein_a,
                frequency: line.frequency,
                einstein_b_upper,
                einstein_b_lower,
            });
        }

        for partner in &partners {
            validate_partner(&name, partner, &levels)?;
        }

        Ok(Self {
            name,
            molecular_weight,
            levels,
            transitions,
            partners,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn molecular_weight(&self) -> f64 {
        self.molecular_weight
    }

    pub fn levels(&self) -> &[EnergyLevel] {
        &self.levels
    }

    pub fn transitions(&self) -> &[RadiativeTransition] {
        &self.transitions
    }

    pub fn partners(&self) -> &[CollisionPartner] {
        &self.partners
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn line_count(&self) -> usize {
        self.transitions.len()
    }

    pub fn partner_count(&self) -> usize {
        self.partners.len()
    }

    /// Upward collisional rate from a downward one by detailed balance.
    pub fn upward_rate(&self, upper: usize, lower: usize, down: f64, temperature: f64) -> f64 {
        if temperature <= 0.0 {
            return 0.0;
        }
        let upper_level = self.levels[upper];
        let lower_level = self.levels[lower];
        down * upper_level.weight / lower_level.weight
            * (-HCKB * (upper_level.energy - lower_level.energy) / temperature).exp()
    }
}

fn validate_levels(name: &str, levels: &[EnergyLevel]) -> NlteResult<()> {
    if levels.is_empty() {
        return Err(NlteError::input_validation(
            "CONFIG.NO_LEVELS",
            format!("species '{name}' has no energy levels"),
        ));
    }
    for (index, level) in levels.iter().enumerate() {
        if !(level.weight.is_finite() && level.weight > 0.0) {
            return Err(NlteError::input_validation(
                "CONFIG.LEVEL_WEIGHT",
                format!(
                    "species '{name}' level {index} has invalid statistical weight {}",
                    level.weight
                ),
            ));
        }
        if !level.energy.is_finite() {
            return Err(NlteError::input_validation(
                "CONFIG.LEVEL_ENERGY",
                format!("species '{name}' level {index} has non-finite energy"),
            ));
        }
    }
    Ok(())
}

fn validate_level_pair(
    name: &str,
    kind: &str,
    index: usize,
    upper: usize,
    lower: usize,
    levels: &[EnergyLevel],
) -> NlteResult<()> {
    for level in [upper, lower] {
        if level >= levels.len() {
            return Err(NlteError::input_validation(
                "CONFIG.TRANSITION_LEVEL",
                format!(
                    "species '{name}' {kind} {index} references level {level} but species has {} levels",
                    levels.len()
                ),
            ));
        }
    }
    if upper == lower {
        return Err(NlteError::input_validation(
            "CONFIG.TRANSITION_LEVEL",
            format!("species '{name}' {kind} {index} connects level {upper} to itself"),
        ));
    }
    if levels[upper].energy < levels[lower].energy {
        return Err(NlteError::input_validation(
            "CONFIG.TRANSITION_ORDER",
            format!(
                "species '{name}' {kind} {index} has upper level {upper} below lower level {lower}"
            ),
        ));
    }
    Ok(())
}

fn validate_partner(
    name: &str,
    partner: &CollisionPartner,
    levels: &[EnergyLevel],
) -> NlteResult<()> {
    if partner.temperatures.is_empty() {
        return Err(NlteError::input_validation(
            "CONFIG.PARTNER_TEMPERATURES",
            format!(
                "species '{name}' partner '{}' has no temperature grid",
                partner.label
            ),
        ));
    }
    let increasing = partner
        .temperatures
        .windows(2)
        .all(|pair| pair[1] > pair[0]);
    if !increasing || partner.temperatures.iter().any(|t| !(t.is_finite() && *t > 0.0)) {
        return Err(NlteError::input_validation(
            "CONFIG.PARTNER_TEMPERATURES",
            format!(
                "species '{name}' partner '{}' temperatures must be positive and strictly increasing",
                partner.label
            ),
        ));
    }

    for (index, transition) in partner.transitions.iter().enumerate() {
        validate_level_pair(
            name,
            "collisional transition",
            index,
            transition.upper,
            transition.lower,
            levels,
        )?;
        if transition.rates.len() != partner.temperatures.len() {
            return Err(NlteError::input_validation(
                "CONFIG.PARTNER_RATES",
                format!(
                    "species '{name}' partner '{}' transition {index} has {} rates for {} temperatures",
                    partner.label,
                    transition.rates.len(),
                    partner.temperatures.len()
                ),
            ));
        }
        if let Some(rate) = transition
            .rates
            .iter()
            .find(|rate| !(rate.is_finite() && **rate >= 0.0))
        {
            return Err(NlteError::input_validation(
                "CONFIG.NEGATIVE_RATE",
                format!(
                    "species '{name}' partner '{}' transition {index} has invalid rate {rate}",
                    partner.label
                ),
            ));
        }
    }
    Ok(())
}
