//! Monte Carlo photon transport through the neighbour graph.
//!
//! Rays start at the edge of the origin's half first step and walk outwards
//! point by point, accumulating line and continuum emission until they reach
//! a sink or every line saturates. The origin's own half step is left to the
//! local term in [`super::rates::local_mean_intensity`], which is what makes
//! the iteration accelerated.

use super::blend::BlendSet;
use super::radiation::{EmissionTerms, calc_source_fn, gaussline};
use super::scratch::GridPointScratch;
use crate::common::constants::{
    LINE_WINDOW_HALF_WIDTH, MAX_DIRECTION_DRAWS, MAX_RAY_OPTICAL_DEPTH, MIN_SEGMENT_TAU,
    N_RAN_PER_SEGMENT, PI,
};
use crate::grid::{Grid, GridPoint, Neighbor};
use crate::molecule::MolecularSpecies;
use crate::numerics::{FastExp, dot3, lerp3};
use rand::Rng;

/// Read-only state shared by every worker during a sweep.
#[derive(Debug, Clone, Copy)]
pub struct RadiationContext<'a> {
    pub grid: &'a Grid,
    pub species: &'a [MolecularSpecies],
    pub blends: &'a BlendSet,
    /// Background intensity per `[species][line]`.
    pub background: &'a [Vec<f64>],
    pub fast_exp: &'a FastExp,
    pub taylor_cutoff: f64,
}

/// Traces up to `budget` rays from `origin` into `scratch` and returns the
/// number that survived.
pub fn sample_rays<R: Rng + ?Sized>(
    context: &RadiationContext<'_>,
    origin: usize,
    budget: usize,
    rng: &mut R,
    scratch: &mut GridPointScratch,
) -> usize {
    scratch.reset(budget);
    let source = context.grid.point(origin);
    let mut line_of_sight = vec![0.0; context.species.len()];

    for ray in 0..budget {
        let Some((direction, first)) = draw_direction(source, rng) else {
            continue;
        };
        let slot = scratch.rays();
        scratch.half_first_ds[slot] = 0.5 * first.distance;

        let projected = dot3(source.velocity, direction);
        for (species_index, buffers) in scratch.species.iter_mut().enumerate() {
            let state = &source.populations[species_index];
            let stratum = (ray as f64 + rng.random::<f64>()) / budget as f64;
            let offset = (2.0 * stratum - 1.0) * LINE_WINDOW_HALF_WIDTH * state.dopb;
            buffers.offset[slot] = offset;
            buffers.vfac[slot] = gaussline(offset, state.binv);
            buffers.ray_phot_mut(slot).fill(0.0);
            line_of_sight[species_index] = projected + offset;
        }
        scratch.clear_tau();

        if walk_ray(
            context,
            origin,
            direction,
            first,
            &line_of_sight,
            rng,
            scratch,
            slot,
        ) {
            scratch.commit_ray();
        }
    }

    scratch.rays()
}

fn isotropic_direction<R: Rng + ?Sized>(rng: &mut R) -> [f64; 3] {
    let cos_theta = 2.0 * rng.random::<f64>() - 1.0;
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let phi = 2.0 * PI * rng.random::<f64>();
    [sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta]
}

fn draw_direction<'p, R: Rng + ?Sized>(
    source: &'p GridPoint,
    rng: &mut R,
) -> Option<([f64; 3], &'p Neighbor)> {
    (0..MAX_DIRECTION_DRAWS).find_map(|_| {
        let direction = isotropic_direction(rng);
        source
            .forward_neighbor(direction)
            .map(|neighbor| (direction, neighbor))
    })
}

/// Returns `true` when the ray reached a sink or saturated.
#[allow(clippy::too_many_arguments)]
fn walk_ray<R: Rng + ?Sized>(
    context: &RadiationContext<'_>,
    origin: usize,
    direction: [f64; 3],
    first: &Neighbor,
    line_of_sight: &[f64],
    rng: &mut R,
    scratch: &mut GridPointScratch,
    slot: usize,
) -> bool {
    let grid = context.grid;
    let mut previous = origin;
    let mut current = first.index;
    let mut incoming = first.distance;
    let mut samples = [0.0; N_RAN_PER_SEGMENT];

    for _ in 0..grid.len() {
        let point = grid.point(current);
        if point.sink {
            add_background(context, scratch, slot);
            return true;
        }
        let Some(next) = point.forward_neighbor(direction) else {
            return false;
        };

        let ds = 0.5 * (incoming + next.distance);
        let entry_velocity = grid.point(previous).velocity;
        let exit_velocity = grid.point(next.index).velocity;
        for sample in &mut samples {
            let depth = rng.random::<f64>() * ds;
            let velocity = if depth < 0.5 * incoming {
                lerp3(entry_velocity, point.velocity, 0.5 + depth / incoming)
            } else {
                lerp3(
                    point.velocity,
                    exit_velocity,
                    (depth - 0.5 * incoming) / next.distance,
                )
            };
            *sample = dot3(velocity, direction);
        }

        accumulate_segment(context, point, &samples, line_of_sight, ds, scratch, slot);

        let saturated = scratch
            .tau
            .iter()
            .flatten()
            .all(|tau| *tau > MAX_RAY_OPTICAL_DEPTH);
        if saturated {
            return true;
        }

        previous = current;
        current = next.index;
        incoming = next.distance;
    }

    false
}

fn mean_profile(samples: &[f64], line_of_sight: f64, binv: f64) -> f64 {
    samples
        .iter()
        .map(|velocity| gaussline(line_of_sight - velocity, binv))
        .sum::<f64>()
        / samples.len() as f64
}

fn accumulate_segment(
    context: &RadiationContext<'_>,
    point: &GridPoint,
    samples: &[f64],
    line_of_sight: &[f64],
    ds: f64,
    scratch: &mut GridPointScratch,
    slot: usize,
) {
    for (species_index, molecule) in context.species.iter().enumerate() {
        let state = &point.populations[species_index];
        let velocity = line_of_sight[species_index];

        for (line, transition) in molecule.transitions().iter().enumerate() {
            let mut terms = EmissionTerms::default();
            let vfac = mean_profile(samples, velocity, state.binv);
            terms.add_line(transition, &state.pops, state.binv, state.nmol, vfac);

            for partner in context.blends.partners_of(species_index, line) {
                let partner_state = &point.populations[partner.species];
                let partner_vfac =
                    mean_profile(samples, velocity + partner.delta_v, partner_state.binv);
                terms.add_line(
                    &context.species[partner.species].transitions()[partner.line],
                    &partner_state.pops,
                    partner_state.binv,
                    partner_state.nmol,
                    partner_vfac,
                );
            }
            terms.add_continuum(state.knu[line], state.dust[line]);

            let dtau = (terms.alpha * ds).max(MIN_SEGMENT_TAU);
            let step = calc_source_fn(dtau, context.taylor_cutoff, context.fast_exp);
            let tau = scratch.tau[species_index][line];
            scratch.species[species_index].ray_phot_mut(slot)[line] +=
                context.fast_exp.exp_neg(tau) * step.remnant * terms.jnu * ds;
            scratch.tau[species_index][line] = tau + dtau;
        }
    }
}

fn add_background(context: &RadiationContext<'_>, scratch: &mut GridPointScratch, slot: usize) {
    for (species_index, background) in context.background.iter().enumerate() {
        for (line, intensity) in background.iter().enumerate() {
            let attenuation = context.fast_exp.exp_neg(scratch.tau[species_index][line]);
            scratch.species[species_index].ray_phot_mut(slot)[line] += attenuation * intensity;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RadiationContext, isotropic_direction, sample_rays};
    use crate::grid::GridPoint;
    use crate::numerics::{FastExp, dot3};
    use crate::solver::blend::BlendSet;
    use crate::solver::fixtures::{prepared_grid, thin_pair};
    use crate::solver::radiation::background_intensities;
    use crate::solver::scratch::GridPointScratch;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn isotropic_directions_are_unit_vectors() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut mean_z = 0.0;
        for _ in 0..2000 {
            let direction = isotropic_direction(&mut rng);
            assert!((dot3(direction, direction) - 1.0).abs() <= 1.0e-12);
            mean_z += direction[2];
        }
        assert!((mean_z / 2000.0).abs() <= 0.1);
    }

    #[test]
    fn thin_rays_carry_background_to_the_origin() {
        let (grid, species) = thin_pair(1.0e-20, 1.0e10);
        let background = background_intensities(&species, 2.725);
        let blends = BlendSet::empty(&species);
        let fast_exp = FastExp::new();
        let context = RadiationContext {
            grid: &grid,
            species: &species,
            blends: &blends,
            background: &background,
            fast_exp: &fast_exp,
            taylor_cutoff: 0.66,
        };
        let mut scratch = GridPointScratch::new(&species);
        let mut rng = StdRng::seed_from_u64(3);

        let rays = sample_rays(&context, 0, 64, &mut rng, &mut scratch);
        assert!(rays >= 60, "only {rays} rays survived");
        for ray in 0..rays {
            let phot = scratch.species[0].ray_phot(ray)[0];
            assert!(((phot - background[0][0]) / background[0][0]).abs() <= 1.0e-12);
            assert_eq!(scratch.half_first_ds[ray], 0.5e10);
            let offset = scratch.species[0].offset[ray];
            assert!(offset.abs() <= 2.15 * grid.point(0).populations[0].dopb);
        }
    }

    #[test]
    fn isolated_and_dead_end_points_yield_no_rays() {
        let species = vec![crate::molecule::fixtures::two_level_species()];
        let isolated = prepared_grid(vec![GridPoint::new(0, [0.0; 3])], &[], &species, 1.0e-4);
        let background = background_intensities(&species, 2.725);
        let blends = BlendSet::empty(&species);
        let fast_exp = FastExp::new();
        let mut scratch = GridPointScratch::new(&species);
        let mut rng = StdRng::seed_from_u64(5);

        let context = RadiationContext {
            grid: &isolated,
            species: &species,
            blends: &blends,
            background: &background,
            fast_exp: &fast_exp,
            taylor_cutoff: 0.66,
        };
        assert_eq!(sample_rays(&context, 0, 16, &mut rng, &mut scratch), 0);

        // the neighbour is not a sink and has nowhere further to go
        let dead_end = prepared_grid(
            vec![
                GridPoint::new(0, [0.0; 3]),
                GridPoint::new(1, [1.0e10, 0.0, 0.0]),
            ],
            &[(0, 1)],
            &species,
            1.0e-4,
        );
        let context = RadiationContext {
            grid: &dead_end,
            ..context
        };
        assert_eq!(sample_rays(&context, 0, 16, &mut rng, &mut scratch), 0);
    }
}
