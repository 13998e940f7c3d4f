//! Sweep driver.
//!
//! Every sweep partitions the active points into contiguous chunks, one per
//! worker, and runs them on a rayon pool built once per solve. Workers read
//! the grid as it stood at the end of the previous sweep and hand their new
//! populations back; the driver applies them only after every chunk is done.

use super::blend::BlendSet;
use super::lte::{boltzmann_populations, ground_state};
use super::radiation::background_intensities;
use super::report::{NumericDomainKind, PointIssue, PointOutcome, RunReport};
use super::scratch::GridPointScratch;
use super::setup::{missing_partner_densities, prepare_point, splits_ortho_para};
use super::stateq::solve_species;
use super::transport::{RadiationContext, sample_rays};
use crate::common::config::{SingularPolicy, SolverConfig};
use crate::common::constants::{MAX_NSPECIES, MINPOP};
use crate::domain::{NlteError, NlteResult};
use crate::grid::{
    DustOpacityTable, Grid, PointStatus, PopulationCheckpoint, max_fractional_change,
    read_checkpoint, write_checkpoint,
};
use crate::molecule::MolecularSpecies;
use crate::numerics::FastExp;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::ThreadPool;
use rayon::prelude::*;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Default)]
struct ConvergenceTracker {
    metrics: Vec<f64>,
    moving_averages: Vec<f64>,
    streak: usize,
    sweeps: usize,
}

impl ConvergenceTracker {
    /// Records one comparison and reports whether the last `goal_run`
    /// comparisons were all below `tolerance`.
    fn record(&mut self, metric: f64, goal_run: usize, tolerance: f64) -> bool {
        self.metrics.push(metric);
        let window = &self.metrics[self.metrics.len().saturating_sub(goal_run)..];
        self.moving_averages
            .push(window.iter().sum::<f64>() / window.len() as f64);
        if metric < tolerance {
            self.streak += 1;
        } else {
            self.streak = 0;
        }
        self.streak >= goal_run
    }

    fn reset_streak(&mut self) {
        self.streak = 0;
    }
}

struct WorkerState {
    scratch: GridPointScratch,
    rng: StdRng,
}

enum PointUpdate {
    Solved {
        index: usize,
        pops: Vec<Vec<f64>>,
        domain: Vec<(usize, NumericDomainKind)>,
        rays: usize,
    },
    Singular {
        index: usize,
        species: usize,
        detail: String,
    },
    NoRadiation {
        index: usize,
    },
}

pub struct PopulationSolver {
    config: SolverConfig,
    species: Vec<MolecularSpecies>,
    dust: Option<DustOpacityTable>,
    abort: Arc<AtomicBool>,
}

impl PopulationSolver {
    pub fn new(config: SolverConfig, species: Vec<MolecularSpecies>) -> NlteResult<Self> {
        config.validate()?;
        if species.is_empty() || species.len() > MAX_NSPECIES {
            return Err(NlteError::input_validation(
                "CONFIG.SPECIES_COUNT",
                format!(
                    "expected between 1 and {MAX_NSPECIES} species, got {}",
                    species.len()
                ),
            ));
        }

        Ok(Self {
            config,
            species,
            dust: None,
            abort: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn with_dust(mut self, table: DustOpacityTable) -> Self {
        self.dust = Some(table);
        self
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn species(&self) -> &[MolecularSpecies] {
        &self.species
    }

    /// Flag polled between points; storing `true` stops the run with a
    /// `ComputationError`.
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    /// Solves populations on `grid` in place, restarting from the configured
    /// checkpoint when `restart` is set.
    pub fn solve(&self, grid: &mut Grid) -> NlteResult<RunReport> {
        let checkpoint = match &self.config.restart {
            Some(path) => Some(read_checkpoint(path)?),
            None => None,
        };
        self.run(grid, checkpoint.as_ref())
    }

    pub fn solve_from_checkpoint(
        &self,
        grid: &mut Grid,
        checkpoint: &PopulationCheckpoint,
    ) -> NlteResult<RunReport> {
        self.run(grid, Some(checkpoint))
    }

    fn run(
        &self,
        grid: &mut Grid,
        checkpoint: Option<&PopulationCheckpoint>,
    ) -> NlteResult<RunReport> {
        self.validate_grid(grid)?;
        self.abort.store(false, Ordering::SeqCst);
        info!(
            points = grid.len(),
            species = self.species.len(),
            threads = self.config.threads,
            "starting population solve"
        );

        for (species, partner, density) in
            missing_partner_densities(&self.species, &self.config, grid.points())
        {
            warn!(
                species = self.species[species].name(),
                partner,
                density,
                "collision partner has no density component; its rates are ignored"
            );
        }
        let available = grid
            .points()
            .iter()
            .map(|point| point.densities.len())
            .min()
            .unwrap_or(0);
        for molecule in &self.species {
            if splits_ortho_para(molecule, available, &self.config) {
                info!(
                    species = molecule.name(),
                    "splitting total H2 density into para and ortho by thermal ratio"
                );
            }
        }

        for point in grid.points_mut() {
            point.populations = prepare_point(point, &self.species, self.dust.as_ref(), &self.config);
        }
        let restored: HashSet<usize> = match checkpoint {
            Some(checkpoint) => checkpoint.restore(grid)?.into_iter().collect(),
            None => HashSet::new(),
        };
        if !restored.is_empty() {
            info!(restored = restored.len(), "restored populations from checkpoint");
        }
        self.seed(grid, &restored);

        let mut trackers = vec![ConvergenceTracker::default(); grid.len()];
        let mut issues = Vec::new();
        let sweeps = if self.config.lte_only {
            for point in grid.points_mut().iter_mut().filter(|point| !point.sink) {
                point.status = PointStatus::Converged;
            }
            0
        } else {
            self.iterate(grid, &mut trackers, &mut issues)?
        };

        for (index, point) in grid.points_mut().iter_mut().enumerate() {
            if point.sink || point.status.is_settled() {
                continue;
            }
            point.status = PointStatus::Exhausted;
            let last_metric = trackers[index].metrics.last().copied().unwrap_or(f64::INFINITY);
            warn!(point = index, sweeps, last_metric, "point did not converge");
            issues.push(PointIssue::NonConvergence {
                point: index,
                sweeps,
                last_metric,
            });
        }

        if let Some(path) = &self.config.checkpoint {
            write_checkpoint(path, &PopulationCheckpoint::capture(grid))?;
            info!(path = %path.display(), "wrote population checkpoint");
        }

        let outcomes = grid
            .points()
            .iter()
            .zip(trackers)
            .enumerate()
            .map(|(index, (point, tracker))| PointOutcome {
                index,
                id: point.id,
                status: point.status,
                sink: point.sink,
                sweeps: tracker.sweeps,
                ray_budget: point.ray_budget,
                metrics: tracker.metrics,
                moving_averages: tracker.moving_averages,
            })
            .collect();
        let report = RunReport {
            sweeps,
            outcomes,
            issues,
        };
        info!(summary = %report.summary_line(), "population solve finished");
        Ok(report)
    }

    fn validate_grid(&self, grid: &Grid) -> NlteResult<()> {
        grid.validate_structure()?;

        for (index, point) in grid.points().iter().enumerate() {
            if point.densities.iter().any(|value| !(value.is_finite() && *value >= 0.0)) {
                return Err(NlteError::input_validation(
                    "GRID.DENSITIES",
                    format!("point {index} has a negative or non-finite density"),
                ));
            }
            if !(point.gas_temperature.is_finite() && point.gas_temperature >= 0.0)
                || !(point.dust_temperature.is_finite() && point.dust_temperature >= 0.0)
            {
                return Err(NlteError::input_validation(
                    "GRID.TEMPERATURE",
                    format!("point {index} has a negative or non-finite temperature"),
                ));
            }
            if !(point.doppler.is_finite() && point.doppler >= 0.0) {
                return Err(NlteError::input_validation(
                    "GRID.DOPPLER",
                    format!("point {index} has invalid Doppler width {}", point.doppler),
                ));
            }
            if point.sink {
                continue;
            }
            if point.densities.is_empty() {
                return Err(NlteError::input_validation(
                    "GRID.DENSITIES",
                    format!("point {index} has no density components"),
                ));
            }
            if point.abundances.len() < self.species.len() {
                return Err(NlteError::input_validation(
                    "GRID.ABUNDANCES",
                    format!(
                        "point {index} has {} abundances for {} species",
                        point.abundances.len(),
                        self.species.len()
                    ),
                ));
            }
        }

        Ok(())
    }

    fn initial_ray_budget(&self, neighbours: usize) -> usize {
        self.config
            .min_rays
            .saturating_mul(neighbours.max(1))
            .clamp(self.config.min_rays, self.config.max_rays)
    }

    fn seed(&self, grid: &mut Grid, restored: &HashSet<usize>) {
        let start_in_lte = self.config.init_lte || self.config.lte_only;
        for (index, point) in grid.points_mut().iter_mut().enumerate() {
            point.ray_budget = self.initial_ray_budget(point.neighbors.len());
            let keep_restored =
                !point.sink && !self.config.lte_only && restored.contains(&index);
            if keep_restored {
                continue;
            }
            if !point.sink {
                point.status = PointStatus::Unconverged;
            }
            let temperature = point.gas_temperature;
            for (state, molecule) in point.populations.iter_mut().zip(&self.species) {
                state.pops = if point.sink || start_in_lte {
                    boltzmann_populations(molecule, temperature)
                } else {
                    ground_state(molecule.level_count())
                };
            }
        }
    }

    fn iterate(
        &self,
        grid: &mut Grid,
        trackers: &mut [ConvergenceTracker],
        issues: &mut Vec<PointIssue>,
    ) -> NlteResult<usize> {
        let blends = if self.config.blend {
            BlendSet::detect(&self.species, self.config.blend_threshold)
        } else {
            BlendSet::empty(&self.species)
        };
        if !blends.is_empty() {
            info!(pairs = blends.len() / 2, "line blends detected");
        }
        let background = background_intensities(&self.species, self.config.tcmb);
        let fast_exp = FastExp::new();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.threads)
            .build()
            .map_err(|source| {
                NlteError::internal(
                    "RUN.THREAD_POOL",
                    format!("failed to build worker pool: {source}"),
                )
            })?;
        let mut workers: Vec<WorkerState> = (0..self.config.threads)
            .map(|worker| WorkerState {
                scratch: GridPointScratch::new(&self.species),
                rng: StdRng::seed_from_u64(self.config.seed.wrapping_add(worker as u64)),
            })
            .collect();

        let mut sweeps = 0;
        for sweep in 1..=self.config.max_sweeps {
            let active: Vec<usize> = grid
                .points()
                .iter()
                .enumerate()
                .filter(|(_, point)| !point.sink && point.status == PointStatus::Unconverged)
                .map(|(index, _)| index)
                .collect();
            if active.is_empty() {
                break;
            }
            sweeps = sweep;

            let updates = {
                let context = RadiationContext {
                    grid: &*grid,
                    species: &self.species,
                    blends: &blends,
                    background: &background,
                    fast_exp: &fast_exp,
                    taylor_cutoff: self.config.taylor_cutoff,
                };
                self.run_sweep(&pool, &context, &active, &mut workers)?
            };

            let mut fatal = None;
            for update in updates {
                if let Some(error) = self.apply_update(grid, trackers, issues, sweep, update) {
                    fatal.get_or_insert(error);
                }
            }
            if let Some(error) = fatal {
                return Err(error);
            }
            if self.abort.load(Ordering::SeqCst) {
                return Err(NlteError::computation(
                    "RUN.ABORTED",
                    format!("run aborted during sweep {sweep}"),
                ));
            }

            let converged = grid
                .points()
                .iter()
                .filter(|point| !point.sink && point.status == PointStatus::Converged)
                .count();
            info!(sweep, active = active.len(), converged, "sweep complete");
        }

        Ok(sweeps)
    }

    fn run_sweep(
        &self,
        pool: &ThreadPool,
        context: &RadiationContext<'_>,
        active: &[usize],
        workers: &mut [WorkerState],
    ) -> NlteResult<Vec<PointUpdate>> {
        let chunk_size = active.len().div_ceil(workers.len()).max(1);
        let config = &self.config;
        let abort = &*self.abort;

        let batches = panic::catch_unwind(AssertUnwindSafe(|| {
            pool.install(|| {
                active
                    .par_chunks(chunk_size)
                    .zip(workers.par_iter_mut())
                    .map(|(chunk, worker)| run_worker(context, config, chunk, worker, abort))
                    .collect::<Vec<_>>()
            })
        }))
        .map_err(|_| {
            NlteError::internal("RUN.WORKER_PANIC", "a population worker thread panicked")
        })?;

        Ok(batches.into_iter().flatten().collect())
    }

    /// Applies one worker result; returns the run-fatal error, if any.
    fn apply_update(
        &self,
        grid: &mut Grid,
        trackers: &mut [ConvergenceTracker],
        issues: &mut Vec<PointIssue>,
        sweep: usize,
        update: PointUpdate,
    ) -> Option<NlteError> {
        let max_rays = self.config.max_rays;
        match update {
            PointUpdate::Solved {
                index,
                pops,
                domain,
                rays,
            } => {
                let point = grid.point_mut(index);
                let metric = point
                    .populations
                    .iter()
                    .zip(&pops)
                    .map(|(state, new)| max_fractional_change(new, &state.pops, MINPOP))
                    .fold(0.0, f64::max);
                for (state, new) in point.populations.iter_mut().zip(pops) {
                    state.pops = new;
                }
                for (species, kind) in domain {
                    warn!(point = index, species, sweep, %kind, "population clamped");
                    issues.push(PointIssue::NumericDomain {
                        point: index,
                        species,
                        sweep,
                        kind,
                    });
                }

                let tracker = &mut trackers[index];
                tracker.sweeps += 1;
                let converged =
                    tracker.record(metric, self.config.goal_run, self.config.tolerance);
                debug!(point = index, sweep, metric, rays, converged, "point updated");
                if converged {
                    point.status = PointStatus::Converged;
                } else {
                    point.ray_budget = point.ray_budget.saturating_mul(2).min(max_rays);
                }
                None
            }
            PointUpdate::Singular {
                index,
                species,
                detail,
            } => {
                error!(point = index, species, sweep, %detail, "singular balance system");
                trackers[index].sweeps += 1;
                let message = format!("point {index} species {species}: {detail}");
                issues.push(PointIssue::SingularSystem {
                    point: index,
                    species,
                    detail,
                });
                match self.config.singular_policy {
                    SingularPolicy::Skip => {
                        grid.point_mut(index).status = PointStatus::Failed;
                        None
                    }
                    SingularPolicy::Abort => {
                        Some(NlteError::computation("RUN.SINGULAR_SYSTEM", message))
                    }
                }
            }
            PointUpdate::NoRadiation { index } => {
                warn!(point = index, sweep, "no ray reached a sink");
                issues.push(PointIssue::NoRadiationEstimate {
                    point: index,
                    sweep,
                });
                let tracker = &mut trackers[index];
                tracker.sweeps += 1;
                tracker.reset_streak();
                let point = grid.point_mut(index);
                point.ray_budget = point.ray_budget.saturating_mul(2).min(max_rays);
                None
            }
        }
    }
}

fn run_worker(
    context: &RadiationContext<'_>,
    config: &SolverConfig,
    indices: &[usize],
    worker: &mut WorkerState,
    abort: &AtomicBool,
) -> Vec<PointUpdate> {
    let mut updates = Vec::with_capacity(indices.len());
    for &index in indices {
        if abort.load(Ordering::SeqCst) {
            break;
        }
        let update = solve_point(context, config, index, worker);
        if matches!(update, PointUpdate::Singular { .. })
            && config.singular_policy == SingularPolicy::Abort
        {
            abort.store(true, Ordering::SeqCst);
        }
        updates.push(update);
    }
    updates
}

fn solve_point(
    context: &RadiationContext<'_>,
    config: &SolverConfig,
    index: usize,
    worker: &mut WorkerState,
) -> PointUpdate {
    let budget = context.grid.point(index).ray_budget;
    let rays = sample_rays(context, index, budget, &mut worker.rng, &mut worker.scratch);
    if rays == 0 {
        return PointUpdate::NoRadiation { index };
    }

    let mut pops = Vec::with_capacity(context.species.len());
    let mut domain = Vec::new();
    for species in 0..context.species.len() {
        match solve_species(context, config, index, species, &mut worker.scratch) {
            Ok(solution) => {
                if let Some(kind) = solution.domain {
                    domain.push((species, kind));
                }
                pops.push(solution.pops);
            }
            Err(error) => {
                return PointUpdate::Singular {
                    index,
                    species,
                    detail: error.to_string(),
                };
            }
        }
    }

    PointUpdate::Solved {
        index,
        pops,
        domain,
        rays,
    }
}

#[cfg(test)]
mod tests {
    use super::{ConvergenceTracker, PointUpdate, PopulationSolver};
    use crate::common::config::SolverConfig;
    use crate::solver::fixtures::thin_pair;

    #[test]
    fn tracker_requires_consecutive_passes() {
        let mut tracker = ConvergenceTracker::default();
        assert!(!tracker.record(1.0e-3, 3, 1.0e-6));
        assert!(!tracker.record(1.0e-7, 3, 1.0e-6));
        assert!(!tracker.record(1.0e-7, 3, 1.0e-6));
        assert!(!tracker.record(1.0e-5, 3, 1.0e-6));
        assert!(!tracker.record(1.0e-8, 3, 1.0e-6));
        assert!(!tracker.record(1.0e-8, 3, 1.0e-6));
        assert!(tracker.record(1.0e-8, 3, 1.0e-6));
    }

    #[test]
    fn moving_average_uses_trailing_window() {
        let mut tracker = ConvergenceTracker::default();
        for metric in [6.0, 3.0, 0.0, 0.0] {
            tracker.record(metric, 2, 1.0e-6);
        }
        assert_eq!(tracker.moving_averages, vec![6.0, 4.5, 1.5, 0.0]);
    }

    #[test]
    fn ray_budgets_saturate_at_max_rays() {
        let (mut grid, species) = thin_pair(1.0e-20, 1.0e10);
        let config = SolverConfig {
            min_rays: usize::MAX / 2,
            max_rays: usize::MAX,
            ..SolverConfig::default()
        };
        let solver = PopulationSolver::new(config, species).expect("solver");
        assert_eq!(solver.initial_ray_budget(3), usize::MAX);
        assert_eq!(solver.initial_ray_budget(0), usize::MAX / 2);

        grid.point_mut(0).ray_budget = usize::MAX - 1;
        let mut trackers = vec![ConvergenceTracker::default(); grid.len()];
        let mut issues = Vec::new();
        let fatal = solver.apply_update(
            &mut grid,
            &mut trackers,
            &mut issues,
            1,
            PointUpdate::NoRadiation { index: 0 },
        );
        assert!(fatal.is_none());
        assert_eq!(grid.point(0).ray_budget, usize::MAX);
        assert_eq!(issues.len(), 1);
    }
}
