//! Statistical equilibrium at one point.

use super::rates::{build_rate_matrix, has_degenerate_densities, local_mean_intensity};
use super::report::NumericDomainKind;
use super::scratch::GridPointScratch;
use super::transport::RadiationContext;
use crate::common::config::SolverConfig;
use crate::common::constants::{EPS, MIN_STATEQ_ITERATIONS, MINPOP, TOL};
use crate::grid::max_fractional_change;
use crate::numerics::{DenseMatrix, LuError, lu_solve, normalize_in_place, stable_sum};

const NEGATIVE_POPULATION_TOLERANCE: f64 = 1.0e-10;
const RAW_SUM_TOLERANCE: f64 = 1.0e-6;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolveError {
    #[error("every collision partner density is zero")]
    DegenerateDensity,
    #[error(transparent)]
    Factorization(#[from] LuError),
    #[error("solution is not finite at level {level}")]
    NonFinite { level: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct BalanceSolution {
    pub pops: Vec<f64>,
    /// First domain problem found before clamping, if any.
    pub domain: Option<NumericDomainKind>,
}

/// Solves `A^T x = 0` with the last equation replaced by `sum(x) = 1`, then
/// clamps entries below `EPS` and renormalises.
pub fn solve_balance(rate_matrix: &DenseMatrix) -> Result<BalanceSolution, SolveError> {
    let levels = rate_matrix.nrows();
    let last = levels.saturating_sub(1);
    let system = DenseMatrix::from_fn(levels, levels, |row, col| {
        if row == last { 1.0 } else { rate_matrix[(col, row)] }
    });
    let mut rhs = vec![0.0; levels];
    if let Some(value) = rhs.last_mut() {
        *value = 1.0;
    }

    let mut pops = lu_solve(&system, &rhs)?;
    if let Some(level) = pops.iter().position(|value| !value.is_finite()) {
        return Err(SolveError::NonFinite { level });
    }

    let raw_sum = stable_sum(&pops);
    let mut domain = pops
        .iter()
        .position(|value| *value < -NEGATIVE_POPULATION_TOLERANCE)
        .map(|level| NumericDomainKind::NegativePopulation {
            level,
            value: pops[level],
        });
    if domain.is_none() && (raw_sum - 1.0).abs() > RAW_SUM_TOLERANCE {
        domain = Some(NumericDomainKind::UnitySum { sum: raw_sum });
    }

    for value in &mut pops {
        if *value < EPS {
            *value = EPS;
        }
    }
    normalize_in_place(&mut pops);

    Ok(BalanceSolution { pops, domain })
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesSolution {
    pub pops: Vec<f64>,
    pub domain: Option<NumericDomainKind>,
    pub iterations: usize,
}

/// Inner ALI loop for one species at `origin`, using the rays already stored
/// in `scratch`. The mean intensity is re-evaluated with each new population
/// estimate until the largest fractional change drops below `TOL`.
pub fn solve_species(
    context: &RadiationContext<'_>,
    config: &SolverConfig,
    origin: usize,
    species_index: usize,
    scratch: &mut GridPointScratch,
) -> Result<SpeciesSolution, SolveError> {
    let point = context.grid.point(origin);
    let molecule = &context.species[species_index];
    let state = &point.populations[species_index];
    if has_degenerate_densities(molecule, state) {
        return Err(SolveError::DegenerateDensity);
    }

    let mut pops = state.pops.clone();
    let mut domain = None;
    let mut iterations = 0;
    while iterations < config.max_stateq_iterations {
        iterations += 1;
        local_mean_intensity(context, origin, species_index, &pops, scratch);
        let matrix = build_rate_matrix(molecule, state, &scratch.species[species_index].jbar);
        let solution = solve_balance(&matrix)?;
        domain = domain.or(solution.domain);

        let change = max_fractional_change(&solution.pops, &pops, MINPOP);
        pops = solution.pops;
        if iterations >= MIN_STATEQ_ITERATIONS && change < TOL {
            break;
        }
    }

    Ok(SpeciesSolution {
        pops,
        domain,
        iterations,
    })
}
