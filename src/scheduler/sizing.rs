//! Thread counts needed to move a target to where the current mode wants it.
//!
//! Every function returns a non-negative count and short-circuits to zero on
//! degenerate input (no ceiling, no per-thread effect) before the model is
//! consulted.

use crate::config::{SchedulerConfig, SecurityDeltas};
use crate::fleet::TargetTelemetry;
use crate::scheduler::estimator::Estimator;
use crate::scheduler::predictor::TargetState;

/// Subtracted before rounding up so exact quotients stay exact.
const THREAD_EPSILON: f64 = 1e-9;
/// Upper bound for the doubling search.
pub const MAX_SEARCH_THREADS: u64 = 1 << 32;

fn ceil_threads(value: f64) -> u64 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    (value - THREAD_EPSILON).ceil().max(0.0) as u64
}

/// Threads that take `resource` down to `ceiling * floor_fraction` when each
/// thread removes `per_thread` of the current resource.
pub fn extract_threads(resource: f64, ceiling: f64, floor_fraction: f64, per_thread: f64) -> u64 {
    if ceiling <= 0.0 || resource <= ceiling * floor_fraction || per_thread <= 0.0 {
        return 0;
    }
    ceil_threads((resource - ceiling * floor_fraction) / (resource * per_thread))
}

/// Minimal thread count whose growth multiplier reaches `needed`.
///
/// Doubles an upper bound until it suffices, then binary searches between
/// the last insufficient bound and that one.
pub fn search_growth_threads(
    needed: f64,
    estimator: &dyn Estimator,
    telemetry: &TargetTelemetry,
) -> u64 {
    if needed <= 1.0 || estimator.growth_multiplier(1, telemetry) <= 1.0 {
        return 0;
    }

    let mut low = 0u64;
    let mut high = 1u64;
    while estimator.growth_multiplier(high, telemetry) < needed {
        if high >= MAX_SEARCH_THREADS {
            return MAX_SEARCH_THREADS;
        }
        low = high;
        high *= 2;
    }

    while high - low > 1 {
        let mid = low + (high - low) / 2;
        if estimator.growth_multiplier(mid, telemetry) >= needed {
            high = mid;
        } else {
            low = mid;
        }
    }
    high
}

/// Threads that grow `resource` back to `ceiling`, overbooked.
///
/// `telemetry` is the state the model evaluates growth at.
pub fn replenish_threads(
    resource: f64,
    ceiling: f64,
    overbook: f64,
    estimator: &dyn Estimator,
    telemetry: &TargetTelemetry,
) -> u64 {
    let resource = resource.max(1.0);
    if ceiling <= 0.0 || resource >= ceiling {
        return 0;
    }
    let needed = ceiling / resource;
    let raw = if estimator.is_analytic() {
        search_growth_threads(needed, estimator, telemetry) as f64
    } else {
        estimator.threads_for_growth(needed, telemetry)
    };
    ceil_threads(raw * overbook)
}

/// Threads that cancel security above the minimum, including the security
/// `pending` threads placed this cycle will add.
pub fn suppress_threads(security: f64, min_security: f64, pending: f64, per_thread: f64) -> u64 {
    if per_thread <= 0.0 {
        return 0;
    }
    let excess = (security + pending - min_security).max(0.0);
    ceil_threads(excess / per_thread)
}

/// Applies the sizing rules to predicted target states with one cycle's
/// configuration and estimator.
pub struct SizingEngine<'a> {
    pub extract_floor: f64,
    pub overbook: f64,
    pub security: SecurityDeltas,
    pub estimator: &'a dyn Estimator,
}

impl<'a> SizingEngine<'a> {
    pub fn new(config: &SchedulerConfig, estimator: &'a dyn Estimator) -> Self {
        Self {
            extract_floor: config.extract_floor,
            overbook: config.overbook,
            security: config.security,
            estimator,
        }
    }

    pub fn extract_for(&self, target: &TargetState) -> u64 {
        let ceiling = target.telemetry.max_resource;
        if ceiling <= 0.0 || target.predicted_resource <= ceiling * self.extract_floor {
            return 0;
        }
        let per_thread = self
            .estimator
            .extract_fraction(&target.predicted_telemetry());
        extract_threads(
            target.predicted_resource,
            ceiling,
            self.extract_floor,
            per_thread,
        )
    }

    pub fn replenish_for(&self, target: &TargetState) -> u64 {
        replenish_threads(
            target.predicted_resource,
            target.telemetry.max_resource,
            self.overbook,
            self.estimator,
            &target.predicted_telemetry(),
        )
    }

    /// Suppress threads needed once this cycle's extract and replenish
    /// placements on `target` land.
    pub fn suppress_for(&self, target: &TargetState, extract: u64, replenish: u64) -> u64 {
        suppress_threads(
            target.predicted_security,
            target.telemetry.min_security,
            self.security.pending(extract, replenish),
            self.security.suppress,
        )
    }
}
