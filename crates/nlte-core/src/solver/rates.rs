use super::radiation::{EmissionTerms, calc_source_fn, gaussline};
use super::scratch::GridPointScratch;
use super::transport::RadiationContext;
use crate::common::constants::MIN_SEGMENT_TAU;
use crate::grid::PopulationState;
use crate::molecule::MolecularSpecies;
use crate::numerics::DenseMatrix;

/// Profile-weighted mean intensity per line at `origin`, written to
/// `scratch.species[species_index].jbar`.
///
/// Each stored ray is attenuated across the origin's half first step and
/// topped up with the origin's own emission, both evaluated with `pops` so the
/// inner iteration sees its own local contribution. Returns `false` when no
/// ray is stored.
pub fn local_mean_intensity(
    context: &RadiationContext<'_>,
    origin: usize,
    species_index: usize,
    pops: &[f64],
    scratch: &mut GridPointScratch,
) -> bool {
    let rays = scratch.rays();
    let point = context.grid.point(origin);
    let molecule = &context.species[species_index];
    let state = &point.populations[species_index];
    let buffers = &mut scratch.species[species_index];
    buffers.jbar.fill(0.0);
    if rays == 0 {
        return false;
    }

    let mut weight = 0.0;
    for ray in 0..rays {
        let vfac = buffers.vfac[ray];
        let offset = buffers.offset[ray];
        let half = scratch.half_first_ds[ray];
        weight += vfac;

        for (line, transition) in molecule.transitions().iter().enumerate() {
            let mut terms = EmissionTerms::default();
            terms.add_line(transition, pops, state.binv, state.nmol, vfac);
            for partner in context.blends.partners_of(species_index, line) {
                let partner_state = &point.populations[partner.species];
                let partner_pops = if partner.species == species_index {
                    pops
                } else {
                    &partner_state.pops
                };
                terms.add_line(
                    &context.species[partner.species].transitions()[partner.line],
                    partner_pops,
                    partner_state.binv,
                    partner_state.nmol,
                    gaussline(offset + partner.delta_v, partner_state.binv),
                );
            }
            terms.add_continuum(state.knu[line], state.dust[line]);

            let dtau = (terms.alpha * half).max(MIN_SEGMENT_TAU);
            let step = calc_source_fn(dtau, context.taylor_cutoff, context.fast_exp);
            let incoming = buffers.phot[ray * buffers.line_count() + line];
            buffers.jbar[line] +=
                vfac * (step.exp_dtau * incoming + step.remnant * terms.jnu * half);
        }
    }

    if weight > 0.0 {
        for jbar in &mut buffers.jbar {
            *jbar /= weight;
        }
    }
    true
}

/// `true` when the species has collision partners but every partner density
/// at the point is zero.
pub fn has_degenerate_densities(molecule: &MolecularSpecies, state: &PopulationState) -> bool {
    molecule.partner_count() > 0 && state.partner_rates.iter().all(|rates| rates.density <= 0.0)
}

/// Transition rate matrix: `A[i][j]` is the total rate from level `i` to
/// level `j` and each diagonal entry is minus its row's off-diagonal sum.
pub fn build_rate_matrix(
    molecule: &MolecularSpecies,
    state: &PopulationState,
    jbar: &[f64],
) -> DenseMatrix {
    let levels = molecule.level_count();
    let mut matrix = DenseMatrix::zeros(levels, levels);

    for (transition, intensity) in molecule.transitions().iter().zip(jbar) {
        let (upper, lower) = (transition.upper, transition.lower);
        matrix[(upper, lower)] += transition.einstein_a + transition.einstein_b_upper * intensity;
        matrix[(lower, upper)] += transition.einstein_b_lower * intensity;
    }

    for (partner, rates) in molecule.partners().iter().zip(&state.partner_rates) {
        for ((transition, down), up) in partner.transitions.iter().zip(&rates.down).zip(&rates.up)
        {
            matrix[(transition.upper, transition.lower)] += down * rates.density;
            matrix[(transition.lower, transition.upper)] += up * rates.density;
        }
    }

    for row in 0..levels {
        let mut outflow = 0.0;
        for col in 0..levels {
            if col != row {
                outflow += matrix[(row, col)];
            }
        }
        matrix[(row, row)] = -outflow;
    }

    matrix
}
