use crate::grid::PointStatus;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericDomainKind {
    /// A solved population came out negative before clamping.
    NegativePopulation { level: usize, value: f64 },
    /// The raw solution missed the unit-sum constraint.
    UnitySum { sum: f64 },
}

impl Display for NumericDomainKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NegativePopulation { level, value } => {
                write!(f, "negative population {value:e} at level {level}")
            }
            Self::UnitySum { sum } => write!(f, "population sum {sum} differs from one"),
        }
    }
}

/// Per-point problem collected during a run. None of these stop the run on
/// their own.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PointIssue {
    #[error("point {point} species {species}: singular balance system ({detail})")]
    SingularSystem {
        point: usize,
        species: usize,
        detail: String,
    },
    #[error("point {point}: not converged after {sweeps} sweeps (last change {last_metric:e})")]
    NonConvergence {
        point: usize,
        sweeps: usize,
        last_metric: f64,
    },
    #[error("point {point} species {species} sweep {sweep}: {kind}")]
    NumericDomain {
        point: usize,
        species: usize,
        sweep: usize,
        kind: NumericDomainKind,
    },
    #[error("point {point} sweep {sweep}: no ray reached a sink")]
    NoRadiationEstimate { point: usize, sweep: usize },
}

impl PointIssue {
    pub fn point(&self) -> usize {
        match self {
            Self::SingularSystem { point, .. }
            | Self::NonConvergence { point, .. }
            | Self::NumericDomain { point, .. }
            | Self::NoRadiationEstimate { point, .. } => *point,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointOutcome {
    pub index: usize,
    pub id: usize,
    pub status: PointStatus,
    pub sink: bool,
    /// Sweeps in which this point was solved.
    pub sweeps: usize,
    /// Ray budget in effect when the point settled.
    pub ray_budget: usize,
    /// Convergence metric of every completed comparison, in sweep order.
    pub metrics: Vec<f64>,
    /// Trailing moving average of `metrics` after each comparison.
    pub moving_averages: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunReport {
    pub sweeps: usize,
    pub outcomes: Vec<PointOutcome>,
    pub issues: Vec<PointIssue>,
}

impl RunReport {
    pub fn outcome(&self, index: usize) -> Option<&PointOutcome> {
        self.outcomes.get(index)
    }

    fn count_status(&self, status: PointStatus) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| !outcome.sink && outcome.status == status)
            .count()
    }

    pub fn converged_count(&self) -> usize {
        self.count_status(PointStatus::Converged)
    }

    pub fn exhausted_count(&self) -> usize {
        self.count_status(PointStatus::Exhausted)
    }

    pub fn failed_count(&self) -> usize {
        self.count_status(PointStatus::Failed)
    }

    pub fn sink_count(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.sink).count()
    }

    pub fn issues_for(&self, point: usize) -> impl Iterator<Item = &PointIssue> {
        self.issues.iter().filter(move |issue| issue.point() == point)
    }

    pub fn summary_line(&self) -> String {
        format!(
            "sweeps={} converged={} non-converged={} errored={} sinks={} issues={}",
            self.sweeps,
            self.converged_count(),
            self.exhausted_count(),
            self.failed_count(),
            self.sink_count(),
            self.issues.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{NumericDomainKind, PointIssue, PointOutcome, RunReport};
    use crate::grid::PointStatus;

    fn outcome(index: usize, status: PointStatus, sink: bool) -> PointOutcome {
        PointOutcome {
            index,
            id: index,
            status,
            sink,
            sweeps: 0,
            ray_budget: 0,
            metrics: Vec::new(),
            moving_averages: Vec::new(),
        }
    }

    #[test]
    fn summary_counts_each_status() {
        let report = RunReport {
            sweeps: 4,
            outcomes: vec![
                outcome(0, PointStatus::Converged, false),
                outcome(1, PointStatus::Exhausted, false),
                outcome(2, PointStatus::Failed, false),
                outcome(3, PointStatus::Unconverged, true),
            ],
            issues: vec![PointIssue::SingularSystem {
                point: 2,
                species: 0,
                detail: "zero density".to_string(),
            }],
        };

        assert_eq!(
            report.summary_line(),
            "sweeps=4 converged=1 non-converged=1 errored=1 sinks=1 issues=1"
        );
        assert_eq!(report.issues_for(2).count(), 1);
        assert_eq!(report.issues_for(0).count(), 0);
    }

    #[test]
    fn issues_render_readable_messages() {
        let issue = PointIssue::NumericDomain {
            point: 3,
            species: 1,
            sweep: 2,
            kind: NumericDomainKind::NegativePopulation {
                level: 4,
                value: -1.0e-3,
            },
        };
        assert_eq!(
            issue.to_string(),
            "point 3 species 1 sweep 2: negative population -1e-3 at level 4"
        );
        assert_eq!(issue.point(), 3);
    }
}
