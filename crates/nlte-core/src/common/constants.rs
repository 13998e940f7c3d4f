//! Physical constants (SI) and solver tuning constants.
//!
//! Physical values follow NIST (2015) and IAU 2009; tuning values are the
//! defaults the solver configuration falls back to.

pub const PI: f64 = std::f64::consts::PI;
/// sqrt(pi)
pub const SPI: f64 = 1.772_453_850_905_516_f64;

/// Atomic mass unit [kg].
pub const AMU: f64 = 1.660_539_04e-27;
/// Speed of light in vacuum [m s^-1].
pub const CLIGHT: f64 = 2.997_924_58e8;
/// Planck constant [J s].
pub const HPLANCK: f64 = 6.626_070_040e-34;
/// Boltzmann constant [J K^-1].
pub const KBOLTZ: f64 = 1.380_648_52e-23;
/// h c / (4 pi sqrt(pi)) [J m].
pub const HPIP: f64 = HPLANCK * CLIGHT / (4.0 * PI * SPI);
/// 100 h c / k [cm K], converts level energies in cm^-1 to kelvin.
pub const HCKB: f64 = 100.0 * HPLANCK * CLIGHT / KBOLTZ;

/// Cosmic microwave background temperature [K].
pub const DEFAULT_TCMB: f64 = 2.725;

pub const MAX_PHOT: usize = 10_000;
pub const ININPHOT: usize = 9;
/// Populations below this do not take part in convergence comparisons.
pub const MINPOP: f64 = 1.0e-6;
/// Floor applied to solved populations.
pub const EPS: f64 = 1.0e-30;
pub const TOL: f64 = 1.0e-6;
pub const MAXITER: usize = 50;
pub const MIN_STATEQ_ITERATIONS: usize = 5;
/// Consecutive sub-tolerance sweeps before a point counts as converged.
pub const DEFAULT_GOAL_RUN: usize = 3;
/// Velocity separation [m s^-1] below which two lines are blended.
pub const BLENDMASK: f64 = 1.0e4;
pub const MAX_NSPECIES: usize = 100;
pub const N_RAN_PER_SEGMENT: usize = 3;
pub const FAST_EXP_MAX_TAYLOR: usize = 3;
pub const FAST_EXP_NUM_BITS: u32 = 8;
pub const DEFAULT_TAYLOR_CUTOFF: f64 = 0.66;
/// Rays stop once every line is optically thicker than this.
pub const MAX_RAY_OPTICAL_DEPTH: f64 = 50.0;
/// Maser floor for a single segment's optical depth.
pub const MIN_SEGMENT_TAU: f64 = -30.0;
pub const MAX_DIRECTION_DRAWS: usize = 16;
/// Half-width of the sampled velocity window, in Doppler widths.
pub const LINE_WINDOW_HALF_WIDTH: f64 = 2.15;
pub const POPULATION_SUM_TOLERANCE: f64 = 1.0e-10;
pub const DEFAULT_GAS_TO_DUST: f64 = 100.0;
/// Mean mass per gas particle in units of amu, used for dust column density.
pub const MEAN_PARTICLE_MASS_AMU: f64 = 2.4;

/// LAMDA collision partner ids for para- and ortho-H2.
pub const PARA_H2_ID: u32 = 2;
pub const ORTHO_H2_ID: u32 = 3;
/// Ceiling of the thermal ortho/para H2 ratio.
pub const ORTHO_PARA_MAX: f64 = 3.0;
/// Energy of the lowest ortho-H2 level above para-H2 ground [K].
pub const ORTHO_PARA_GAP_K: f64 = 170.6;

#[cfg(test)]
mod tests {
    use super::{AMU, CLIGHT, HCKB, HPIP, HPLANCK, KBOLTZ, PI, SPI};

    #[test]
    fn derived_constants_match_reference_values() {
        assert!((SPI * SPI - PI).abs() <= 1.0e-14);
        assert!((HPIP - 8.918_502_221e-27).abs() / 8.918_502_221e-27 <= 1.0e-9);
        assert!((HCKB - 1.438_777_35).abs() <= 1.0e-8);
    }

    #[test]
    fn physics_constants_remain_finite_and_positive() {
        for value in [AMU, CLIGHT, HPLANCK, KBOLTZ, HPIP, HCKB] {
            assert!(value.is_finite());
            assert!(value > 0.0);
        }
    }
}
