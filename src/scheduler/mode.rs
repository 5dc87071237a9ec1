//! Fleet-wide choice between extracting and replenishing.
//!
//! Once jobs of one kind are in flight the mode is locked to that kind until
//! the fleet drains to idle. Mixed in-flight kinds corrupt the predictions the
//! rest of the cycle depends on, so when both are observed the engine forces
//! extraction and lets the replenish jobs run out.

use serde::Serialize;

use crate::scheduler::inventory::JobCensus;
use crate::scheduler::predictor::TargetState;
use crate::scheduler::JobKind;

pub const MIXED_ACTIVITY: &str = "mixed activity detected";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Extract,
    Replenish,
}

impl Mode {
    /// Job kind that does this mode's work.
    pub fn job_kind(self) -> JobKind {
        match self {
            Mode::Extract => JobKind::Extract,
            Mode::Replenish => JobKind::Replenish,
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Extract => write!(f, "extract"),
            Mode::Replenish => write!(f, "replenish"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModeDecision {
    pub mode: Mode,
    pub locked: bool,
    pub reason: String,
}

impl ModeDecision {
    fn locked(mode: Mode, reason: impl Into<String>) -> Self {
        Self {
            mode,
            locked: true,
            reason: reason.into(),
        }
    }

    fn unlocked(mode: Mode, reason: impl Into<String>) -> Self {
        Self {
            mode,
            locked: false,
            reason: reason.into(),
        }
    }
}

/// Decide this cycle's mode from the raw job census and the top-ranked target.
pub fn decide_mode(
    census: &JobCensus,
    top_target: Option<&TargetState>,
    grow_threshold: f64,
) -> ModeDecision {
    match (census.extract > 0, census.replenish > 0) {
        (true, true) => ModeDecision::locked(Mode::Extract, MIXED_ACTIVITY),
        (true, false) => ModeDecision::locked(
            Mode::Extract,
            format!("{} extract threads in flight", census.extract),
        ),
        (false, true) => ModeDecision::locked(
            Mode::Replenish,
            format!("{} replenish threads in flight", census.replenish),
        ),
        (false, false) => match top_target {
            Some(target) => {
                let fraction = target.predicted_fraction();
                let percent = fraction * 100.0;
                if fraction >= grow_threshold {
                    ModeDecision::unlocked(
                        Mode::Extract,
                        format!("{} at {:.1}% of ceiling", target.hostname, percent),
                    )
                } else {
                    ModeDecision::unlocked(
                        Mode::Replenish,
                        format!(
                            "{} at {:.1}%, below {:.0}% threshold",
                            target.hostname,
                            percent,
                            grow_threshold * 100.0
                        ),
                    )
                }
            }
            None => ModeDecision::unlocked(Mode::Replenish, "no schedulable targets"),
        },
    }
}
