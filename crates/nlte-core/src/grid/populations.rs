/// Collision rate coefficients of one partner at a point's gas temperature,
/// indexed like the partner's collisional transitions [m^3 s^-1].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PartnerRates {
    pub down: Vec<f64>,
    pub up: Vec<f64>,
    /// Number density of the partner at the point [m^-3].
    pub density: f64,
}

/// Per-species state held by a grid point.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PopulationState {
    /// Fractional level populations, summing to one.
    pub pops: Vec<f64>,
    /// Continuum opacity per line [m^-1].
    pub knu: Vec<f64>,
    /// Dust emission per line [W m^-2 Hz^-1 sr^-1].
    pub dust: Vec<f64>,
    /// Line-of-sight velocity width [m s^-1].
    pub dopb: f64,
    pub binv: f64,
    /// Molecular number density [m^-3].
    pub nmol: f64,
    pub partner_rates: Vec<PartnerRates>,
}

impl PopulationState {
    pub fn population_sum(&self) -> f64 {
        crate::numerics::stable_sum(&self.pops)
    }
}

/// Largest fractional change against `previous`, ignoring levels where
/// either value is at or below `floor`.
pub fn max_fractional_change(current: &[f64], previous: &[f64], floor: f64) -> f64 {
    current
        .iter()
        .zip(previous)
        .filter(|(current, old)| current.min(**old) > floor)
        .map(|(current, old)| (current - old).abs() / current)
        .fold(0.0, f64::max)
}
