//! Population snapshots for restarting a run.

use super::{Grid, PointStatus};
use crate::common::constants::POPULATION_SUM_TOLERANCE;
use crate::domain::{NlteError, NlteResult};
use crate::numerics::{normalize_in_place, stable_sum};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointPoint {
    pub id: usize,
    pub converged: bool,
    /// One population vector per species.
    pub populations: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopulationCheckpoint {
    pub points: Vec<CheckpointPoint>,
}

impl PopulationCheckpoint {
    /// Snapshot of every non-sink point that has populations.
    pub fn capture(grid: &Grid) -> Self {
        let points = grid
            .points()
            .iter()
            .filter(|point| !point.sink && !point.populations.is_empty())
            .map(|point| CheckpointPoint {
                id: point.id,
                converged: point.status == PointStatus::Converged,
                populations: point
                    .populations
                    .iter()
                    .map(|state| state.pops.clone())
                    .collect(),
            })
            .collect();
        Self { points }
    }

    /// Copies stored populations onto matching point ids and returns the
    /// indices of the points that were restored. Points must already carry
    /// prepared population states of the right shape.
    pub fn restore(&self, grid: &mut Grid) -> NlteResult<Vec<usize>> {
        let by_id: HashMap<usize, usize> = grid
            .points()
            .iter()
            .enumerate()
            .map(|(index, point)| (point.id, index))
            .collect();

        let mut restored = Vec::with_capacity(self.points.len());
        for stored in &self.points {
            let Some(&index) = by_id.get(&stored.id) else {
                return Err(NlteError::input_validation(
                    "CHECKPOINT.UNKNOWN_POINT",
                    format!("checkpoint refers to unknown point id {}", stored.id),
                ));
            };
            let point = grid.point_mut(index);
            if point.sink {
                continue;
            }
            if stored.populations.len() != point.populations.len() {
                return Err(NlteError::input_validation(
                    "CHECKPOINT.SPECIES_COUNT",
                    format!(
                        "checkpoint point {} has {} species but the run has {}",
                        stored.id,
                        stored.populations.len(),
                        point.populations.len()
                    ),
                ));
            }
            let mut accepted = Vec::with_capacity(stored.populations.len());
            for (species, (state, pops)) in point
                .populations
                .iter()
                .zip(&stored.populations)
                .enumerate()
            {
                if state.pops.len() != pops.len() {
                    return Err(NlteError::input_validation(
                        "CHECKPOINT.LEVEL_COUNT",
                        format!(
                            "checkpoint point {} species {species} has {} levels, expected {}",
                            stored.id,
                            pops.len(),
                            state.pops.len()
                        ),
                    ));
                }
                accepted.push(checked_populations(stored.id, species, pops)?);
            }

            for (state, pops) in point.populations.iter_mut().zip(accepted) {
                state.pops = pops;
            }
            point.status = if stored.converged {
                PointStatus::Converged
            } else {
                PointStatus::Unconverged
            };
            restored.push(index);
        }

        Ok(restored)
    }
}

/// Stored populations must be finite and non-negative with a positive sum;
/// a sum off unity by more than `POPULATION_SUM_TOLERANCE` is renormalised.
fn checked_populations(id: usize, species: usize, pops: &[f64]) -> NlteResult<Vec<f64>> {
    if let Some(level) = pops
        .iter()
        .position(|value| !(value.is_finite() && *value >= 0.0))
    {
        return Err(NlteError::input_validation(
            "CHECKPOINT.POPULATIONS",
            format!(
                "checkpoint point {id} species {species} has population {} at level {level}",
                pops[level]
            ),
        ));
    }

    let mut pops = pops.to_vec();
    let total = stable_sum(&pops);
    if !(total > 0.0 && total.is_finite()) {
        return Err(NlteError::input_validation(
            "CHECKPOINT.POPULATIONS",
            format!("checkpoint point {id} species {species} has population sum {total}"),
        ));
    }
    if (total - 1.0).abs() > POPULATION_SUM_TOLERANCE {
        warn!(point = id, species, sum = total, "renormalising checkpoint populations");
        normalize_in_place(&mut pops);
    }
    Ok(pops)
}

pub fn write_checkpoint(
    path: impl AsRef<Path>,
    checkpoint: &PopulationCheckpoint,
) -> NlteResult<()> {
    let path = path.as_ref();
    let encoded = serde_json::to_string_pretty(checkpoint).map_err(|source| {
        NlteError::internal(
            "CHECKPOINT.ENCODE",
            format!("failed to encode checkpoint: {source}"),
        )
    })?;
    fs::write(path, encoded).map_err(|source| {
        NlteError::io_system(
            "IO.CHECKPOINT_WRITE",
            format!("failed to write checkpoint '{}': {source}", path.display()),
        )
    })
}

pub fn read_checkpoint(path: impl AsRef<Path>) -> NlteResult<PopulationCheckpoint> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|source| {
        NlteError::io_system(
            "IO.CHECKPOINT_READ",
            format!("failed to read checkpoint '{}': {source}", path.display()),
        )
    })?;
    serde_json::from_str(&source).map_err(|source| {
        NlteError::input_validation(
            "CHECKPOINT.PARSE",
            format!("failed to parse checkpoint '{}': {source}", path.display()),
        )
    })
}
