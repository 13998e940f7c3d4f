//! Solver configuration surface.
//!
//! Every option has a default so a partial JSON document is a valid
//! configuration; `validate` rejects combinations the driver cannot honour.

use super::constants::{
    BLENDMASK, DEFAULT_GOAL_RUN, DEFAULT_TAYLOR_CUTOFF, DEFAULT_TCMB, ININPHOT, MAX_PHOT, MAXITER,
    MIN_STATEQ_ITERATIONS, TOL,
};
use crate::domain::{NlteError, NlteResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_SEED: u64 = 0x5eed_1ee7_0000_0001;

/// What the driver does when a point's rate matrix cannot be solved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SingularPolicy {
    /// Mark the point failed, keep its last populations and carry on.
    #[default]
    Skip,
    /// Stop the run at the next point boundary.
    Abort,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SolverConfig {
    pub min_rays: usize,
    pub max_rays: usize,
    pub tolerance: f64,
    pub goal_run: usize,
    pub max_sweeps: usize,
    pub max_stateq_iterations: usize,
    pub lte_only: bool,
    pub init_lte: bool,
    pub threads: usize,
    pub seed: u64,
    /// Density index used by each collision partner, in partner order.
    /// `None` maps partner `i` to density `i`.
    pub collision_partners: Option<Vec<usize>>,
    pub blend: bool,
    /// Blend threshold as a velocity separation [m s^-1].
    pub blend_threshold: f64,
    pub singular_policy: SingularPolicy,
    pub tcmb: f64,
    pub taylor_cutoff: f64,
    pub restart: Option<PathBuf>,
    pub checkpoint: Option<PathBuf>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            min_rays: ININPHOT,
            max_rays: MAX_PHOT,
            tolerance: TOL,
            goal_run: DEFAULT_GOAL_RUN,
            max_sweeps: MAXITER,
            max_stateq_iterations: MAXITER,
            lte_only: false,
            init_lte: true,
            threads: 1,
            seed: DEFAULT_SEED,
            collision_partners: None,
            blend: false,
            blend_threshold: BLENDMASK,
            singular_policy: SingularPolicy::Skip,
            tcmb: DEFAULT_TCMB,
            taylor_cutoff: DEFAULT_TAYLOR_CUTOFF,
            restart: None,
            checkpoint: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read solver configuration '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse solver configuration: {source}")]
    Parse { source: serde_json::Error },
}

impl SolverConfig {
    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(source).map_err(|source| ConfigError::Parse { source })
    }

    /// Density index feeding collision partner `partner`.
    pub fn partner_density_index(&self, partner: usize) -> usize {
        self.collision_partners
            .as_ref()
            .and_then(|mapping| mapping.get(partner).copied())
            .unwrap_or(partner)
    }

    pub fn validate(&self) -> NlteResult<()> {
        if self.min_rays == 0 {
            return Err(NlteError::input_validation(
                "CONFIG.RAY_BUDGET",
                "minRays must be at least 1",
            ));
        }
        if self.min_rays > self.max_rays {
            return Err(NlteError::input_validation(
                "CONFIG.RAY_BUDGET",
                format!(
                    "minRays ({}) exceeds maxRays ({})",
                    self.min_rays, self.max_rays
                ),
            ));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(NlteError::input_validation(
                "CONFIG.TOLERANCE",
                format!("tolerance must be positive and finite, got {}", self.tolerance),
            ));
        }
        if self.goal_run == 0 {
            return Err(NlteError::input_validation(
                "CONFIG.GOAL_RUN",
                "goalRun must be at least 1",
            ));
        }
        if self.max_stateq_iterations < MIN_STATEQ_ITERATIONS {
            return Err(NlteError::input_validation(
                "CONFIG.STATEQ_ITERATIONS",
                format!(
                    "maxStateqIterations must be at least {}, got {}",
                    MIN_STATEQ_ITERATIONS, self.max_stateq_iterations
                ),
            ));
        }
        if self.threads == 0 {
            return Err(NlteError::input_validation(
                "CONFIG.THREADS",
                "threads must be at least 1",
            ));
        }
        if !(self.blend_threshold.is_finite() && self.blend_threshold >= 0.0) {
            return Err(NlteError::input_validation(
                "CONFIG.BLEND_THRESHOLD",
                format!(
                    "blendThreshold must be non-negative and finite, got {}",
                    self.blend_threshold
                ),
            ));
        }
        if !(self.tcmb.is_finite() && self.tcmb >= 0.0) {
            return Err(NlteError::input_validation(
                "CONFIG.TCMB",
                format!("tcmb must be non-negative and finite, got {}", self.tcmb),
            ));
        }
        if !(self.taylor_cutoff.is_finite() && self.taylor_cutoff > 0.0) {
            return Err(NlteError::input_validation(
                "CONFIG.TAYLOR_CUTOFF",
                format!("taylorCutoff must be positive, got {}", self.taylor_cutoff),
            ));
        }

        Ok(())
    }
}

pub fn load_solver_config(config_path: impl AsRef<Path>) -> Result<SolverConfig, ConfigError> {
    let config_path = config_path.as_ref();
    let source = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
        path: config_path.to_path_buf(),
        source,
    })?;
    SolverConfig::from_json_str(&source)
}
