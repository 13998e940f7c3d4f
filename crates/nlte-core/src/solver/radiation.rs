use crate::common::constants::{CLIGHT, HPIP, HPLANCK, KBOLTZ};
use crate::molecule::{MolecularSpecies, RadiativeTransition};
use crate::numerics::FastExp;

/// Planck specific intensity B_nu(T) [W m^-2 Hz^-1 sr^-1].
pub fn planck(frequency: f64, temperature: f64) -> f64 {
    if temperature <= 0.0 || frequency <= 0.0 {
        return 0.0;
    }
    let x = HPLANCK * frequency / (KBOLTZ * temperature);
    2.0 * HPLANCK * frequency.powi(3) / (CLIGHT * CLIGHT) / x.exp_m1()
}

/// Blackbody background per `[species][line]` at temperature `tcmb`.
pub fn background_intensities(species: &[MolecularSpecies], tcmb: f64) -> Vec<Vec<f64>> {
    species
        .iter()
        .map(|molecule| {
            molecule
                .transitions()
                .iter()
                .map(|transition| planck(transition.frequency, tcmb))
                .collect()
        })
        .collect()
}

/// Unnormalised Gaussian line profile at velocity offset `velocity`.
pub fn gaussline(velocity: f64, binv: f64) -> f64 {
    let scaled = velocity * binv;
    (-scaled * scaled).exp()
}

/// Emissivity and opacity accumulated for one line along one segment.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EmissionTerms {
    pub jnu: f64,
    pub alpha: f64,
}

impl EmissionTerms {
    pub fn add_line(
        &mut self,
        transition: &RadiativeTransition,
        pops: &[f64],
        binv: f64,
        nmol: f64,
        vfac: f64,
    ) {
        let factor = vfac * HPIP * binv * nmol;
        self.jnu += factor * pops[transition.upper] * transition.einstein_a;
        self.alpha += factor
            * (pops[transition.lower] * transition.einstein_b_lower
                - pops[transition.upper] * transition.einstein_b_upper);
    }

    pub fn add_continuum(&mut self, knu: f64, dust: f64) {
        self.jnu += dust * knu;
        self.alpha += knu;
    }
}

/// Attenuation and source weighting of one segment of optical depth `dtau`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceStep {
    /// (1 - e^-dtau) / dtau; multiply by `jnu * ds` for the emitted intensity.
    pub remnant: f64,
    pub exp_dtau: f64,
}

/// Series expansion below `taylor_cutoff` keeps thin segments accurate.
pub fn calc_source_fn(dtau: f64, taylor_cutoff: f64, fast_exp: &FastExp) -> SourceStep {
    if dtau.abs() < taylor_cutoff {
        let remnant = 1.0 - dtau * (1.0 - dtau * (1.0 / 3.0)) * 0.5;
        SourceStep {
            remnant,
            exp_dtau: 1.0 - dtau * remnant,
        }
    } else {
        let exp_dtau = fast_exp.exp_neg(dtau);
        SourceStep {
            remnant: (1.0 - exp_dtau) / dtau,
            exp_dtau,
        }
    }
}
