//! Yield and growth models used by prediction and sizing.
//!
//! Two strategies share the [`Estimator`] interface:
//!
//! - [`AnalyticEstimator`] computes yield and growth from the target's
//!   security, growth rate and the operator's skill. Growth is exponential in
//!   thread count, so sizing searches for the minimal thread count.
//! - [`ApproximateEstimator`] uses the live per-thread estimates reported in
//!   telemetry and treats growth as linear, which gives a direct inverse.
//!
//! The strategy is chosen once per cycle with [`select_estimator`].

use crate::fleet::TargetTelemetry;

/// Divisor converting difficulty and skill into a per-thread extract fraction.
const EXTRACT_DIVISOR: f64 = 240.0;
/// Base growth per thread before the security adjustment.
const GROWTH_BASE: f64 = 0.03;
/// Upper bound on the per-thread growth rate.
const GROWTH_RATE_CAP: f64 = 1.0035;

pub trait Estimator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether `growth_multiplier` is exact enough to search over.
    fn is_analytic(&self) -> bool;

    /// Fraction of the current resource one extract thread removes.
    fn extract_fraction(&self, target: &TargetTelemetry) -> f64;

    /// Factor by which `threads` replenish threads multiply the resource.
    fn growth_multiplier(&self, threads: u64, target: &TargetTelemetry) -> f64;

    /// Threads needed to reach `multiplier`, possibly fractional.
    fn threads_for_growth(&self, multiplier: f64, target: &TargetTelemetry) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyticEstimator;

impl AnalyticEstimator {
    /// Per-thread growth rate at the target's security level.
    fn growth_rate(target: &TargetTelemetry) -> f64 {
        if target.security <= 0.0 {
            return GROWTH_RATE_CAP;
        }
        (1.0 + GROWTH_BASE / target.security).min(GROWTH_RATE_CAP)
    }

    fn exponent_per_thread(target: &TargetTelemetry) -> f64 {
        Self::growth_rate(target).ln() * target.growth_rate.max(0.0) / 100.0
    }
}

impl Estimator for AnalyticEstimator {
    fn name(&self) -> &'static str {
        "analytic"
    }

    fn is_analytic(&self) -> bool {
        true
    }

    fn extract_fraction(&self, target: &TargetTelemetry) -> f64 {
        if target.operator_skill == 0 {
            return 0.0;
        }
        let operator = target.operator_skill as f64;
        let difficulty = (100.0 - target.security) / 100.0;
        let skill = (operator - (target.required_skill as f64 - 1.0)) / operator;
        (difficulty * skill / EXTRACT_DIVISOR).clamp(0.0, 1.0)
    }

    fn growth_multiplier(&self, threads: u64, target: &TargetTelemetry) -> f64 {
        if threads == 0 {
            return 1.0;
        }
        (Self::exponent_per_thread(target) * threads as f64).exp()
    }

    fn threads_for_growth(&self, multiplier: f64, target: &TargetTelemetry) -> f64 {
        let per_thread = Self::exponent_per_thread(target);
        if multiplier <= 1.0 || per_thread <= 0.0 {
            return 0.0;
        }
        multiplier.ln() / per_thread
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ApproximateEstimator;

impl Estimator for ApproximateEstimator {
    fn name(&self) -> &'static str {
        "approximate"
    }

    fn is_analytic(&self) -> bool {
        false
    }

    fn extract_fraction(&self, target: &TargetTelemetry) -> f64 {
        target.live_extract_fraction.clamp(0.0, 1.0)
    }

    fn growth_multiplier(&self, threads: u64, target: &TargetTelemetry) -> f64 {
        1.0 + threads as f64 * target.live_growth_per_thread.max(0.0)
    }

    fn threads_for_growth(&self, multiplier: f64, target: &TargetTelemetry) -> f64 {
        let per_thread = target.live_growth_per_thread;
        if multiplier <= 1.0 || per_thread <= 0.0 {
            return 0.0;
        }
        (multiplier - 1.0) / per_thread
    }
}

/// Pick the strategy for this cycle.
pub fn select_estimator(use_analytic: bool, analytic_available: bool) -> Box<dyn Estimator> {
    if use_analytic && analytic_available {
        Box::new(AnalyticEstimator)
    } else {
        Box::new(ApproximateEstimator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telemetry(security: f64) -> TargetTelemetry {
        TargetTelemetry {
            max_resource: 1_000_000.0,
            resource: 500_000.0,
            min_security: 5.0,
            security,
            success_chance: 0.8,
            growth_rate: 50.0,
            required_skill: 10,
            operator_skill: 100,
            live_extract_fraction: 0.003,
            live_growth_per_thread: 0.002,
        }
    }

    #[test]
    fn analytic_extract_fraction_drops_with_security() {
        let est = AnalyticEstimator;
        let low = est.extract_fraction(&telemetry(5.0));
        let high = est.extract_fraction(&telemetry(50.0));
        assert!(low > high);
        assert!(high > 0.0);
    }

    #[test]
    fn analytic_extract_fraction_zero_without_skill() {
        let mut t = telemetry(5.0);
        t.operator_skill = 0;
        assert_eq!(AnalyticEstimator.extract_fraction(&t), 0.0);
    }

    #[test]
    fn analytic_growth_inverse_matches_multiplier() {
        let est = AnalyticEstimator;
        let t = telemetry(5.0);
        let threads = est.threads_for_growth(2.0, &t);
        let reached = est.growth_multiplier(threads.ceil() as u64, &t);
        assert!(reached >= 2.0);
        let below = est.growth_multiplier(threads.floor() as u64 - 1, &t);
        assert!(below < 2.0);
    }

    #[test]
    fn analytic_growth_is_identity_for_zero_threads() {
        assert_eq!(AnalyticEstimator.growth_multiplier(0, &telemetry(5.0)), 1.0);
    }

    #[test]
    fn approximate_uses_live_estimates() {
        let est = ApproximateEstimator;
        let t = telemetry(5.0);
        assert_eq!(est.extract_fraction(&t), 0.003);
        assert!((est.growth_multiplier(500, &t) - 2.0).abs() < 1e-9);
        assert!((est.threads_for_growth(2.0, &t) - 500.0).abs() < 1e-9);
    }

    #[test]
    fn approximate_degenerate_growth() {
        let mut t = telemetry(5.0);
        t.live_growth_per_thread = 0.0;
        assert_eq!(ApproximateEstimator.threads_for_growth(3.0, &t), 0.0);
    }

    #[test]
    fn selection_respects_flag_and_availability() {
        assert!(select_estimator(true, true).is_analytic());
        assert!(!select_estimator(true, false).is_analytic());
        assert!(!select_estimator(false, true).is_analytic());
    }
}
