//! Target assessment: what each target will look like once the work already
//! in flight lands, and which targets are worth the most.

use serde::Serialize;

use crate::config::{SchedulerConfig, SecurityDeltas};
use crate::fleet::TargetTelemetry;
use crate::scheduler::directory::{Node, Topology};
use crate::scheduler::estimator::Estimator;
use crate::scheduler::inventory::{InFlightThreads, Inventory};

/// A schedulable target with its predicted post-flight state.
#[derive(Debug, Clone, Serialize)]
pub struct TargetState {
    pub hostname: String,
    pub telemetry: TargetTelemetry,
    pub in_flight: InFlightThreads,
    pub predicted_resource: f64,
    pub predicted_security: f64,
    pub score: f64,
}

impl TargetState {
    pub fn predicted_fraction(&self) -> f64 {
        if self.telemetry.max_resource <= 0.0 {
            return 0.0;
        }
        self.predicted_resource / self.telemetry.max_resource
    }

    /// Predicted security above the target's minimum.
    pub fn security_delta(&self) -> f64 {
        self.predicted_security - self.telemetry.min_security
    }

    /// Telemetry as it is expected to read after in-flight work completes.
    pub fn predicted_telemetry(&self) -> TargetTelemetry {
        TargetTelemetry {
            resource: self.predicted_resource,
            security: self.predicted_security,
            ..self.telemetry
        }
    }
}

/// Ceiling above zero, root access and the skill gate satisfied.
pub fn is_schedulable(node: &Node) -> bool {
    match node.telemetry {
        Some(t) => t.max_resource > 0.0 && node.root_access && t.skill_gate(),
        None => false,
    }
}

pub fn predict_security(
    telemetry: &TargetTelemetry,
    in_flight: &InFlightThreads,
    deltas: &SecurityDeltas,
) -> f64 {
    let predicted = telemetry.security - in_flight.suppress as f64 * deltas.suppress
        + in_flight.extract as f64 * deltas.extract
        + in_flight.replenish as f64 * deltas.replenish;
    predicted.max(telemetry.min_security)
}

/// Extract drain is applied before replenish growth.
pub fn predict_resource(
    telemetry: &TargetTelemetry,
    in_flight: &InFlightThreads,
    estimator: &dyn Estimator,
) -> f64 {
    let mut resource = telemetry.resource;
    if in_flight.extract > 0 {
        let drained = (in_flight.extract as f64 * estimator.extract_fraction(telemetry)).min(1.0);
        resource *= 1.0 - drained;
    }
    if in_flight.replenish > 0 {
        let multiplier = estimator.growth_multiplier(in_flight.replenish, telemetry);
        resource = (resource * multiplier).min(telemetry.max_resource);
    }
    resource.max(0.0)
}

/// Ceiling times success chance, optionally scaled down by security overshoot.
pub fn score(telemetry: &TargetTelemetry, predicted_security: f64, penalize: bool) -> f64 {
    let base = telemetry.max_resource * telemetry.success_chance;
    if penalize && predicted_security > telemetry.min_security && telemetry.min_security > 0.0 {
        base * telemetry.min_security / predicted_security
    } else {
        base
    }
}

pub fn assess(
    node: &Node,
    inventory: &Inventory,
    estimator: &dyn Estimator,
    config: &SchedulerConfig,
) -> Option<TargetState> {
    if !is_schedulable(node) {
        tracing::trace!(host = %node.hostname, "Target not schedulable");
        return None;
    }
    let telemetry = node.telemetry?;
    let in_flight = inventory.threads_for(&node.hostname);
    let predicted_security = predict_security(&telemetry, &in_flight, &config.security);
    let predicted_resource = predict_resource(&telemetry, &in_flight, estimator);

    Some(TargetState {
        hostname: node.hostname.clone(),
        score: score(&telemetry, predicted_security, config.penalize_security),
        telemetry,
        in_flight,
        predicted_resource,
        predicted_security,
    })
}

/// Schedulable targets, best score first. Ties go to hostname order.
pub fn rank(
    topology: &Topology,
    inventory: &Inventory,
    estimator: &dyn Estimator,
    config: &SchedulerConfig,
) -> Vec<TargetState> {
    let mut ranked: Vec<TargetState> = topology
        .targets()
        .into_iter()
        .filter_map(|node| assess(node, inventory, estimator, config))
        .collect();
    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.hostname.cmp(&b.hostname))
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::estimator::ApproximateEstimator;

    fn telemetry() -> TargetTelemetry {
        TargetTelemetry {
            max_resource: 1000.0,
            resource: 800.0,
            min_security: 2.0,
            security: 3.0,
            success_chance: 0.5,
            growth_rate: 30.0,
            required_skill: 1,
            operator_skill: 10,
            live_extract_fraction: 0.01,
            live_growth_per_thread: 0.01,
        }
    }

    #[test]
    fn security_prediction_is_floored_at_minimum() {
        let deltas = SecurityDeltas::default();
        let in_flight = InFlightThreads {
            extract: 0,
            replenish: 0,
            suppress: 1000,
        };
        assert_eq!(predict_security(&telemetry(), &in_flight, &deltas), 2.0);
    }

    #[test]
    fn security_prediction_adds_extract_and_replenish() {
        let deltas = SecurityDeltas::default();
        let in_flight = InFlightThreads {
            extract: 100,
            replenish: 50,
            suppress: 4,
        };
        // 3 - 0.2 + 0.2 + 0.2
        let predicted = predict_security(&telemetry(), &in_flight, &deltas);
        assert!((predicted - 3.2).abs() < 1e-9);
    }

    #[test]
    fn resource_prediction_drains_then_grows() {
        let in_flight = InFlightThreads {
            extract: 50,
            replenish: 20,
            suppress: 0,
        };
        // 800 * 0.5 = 400, then * 1.2 = 480
        let predicted = predict_resource(&telemetry(), &in_flight, &ApproximateEstimator);
        assert!((predicted - 480.0).abs() < 1e-9);
    }

    #[test]
    fn resource_prediction_caps_at_ceiling() {
        let in_flight = InFlightThreads {
            extract: 0,
            replenish: 1000,
            suppress: 0,
        };
        let predicted = predict_resource(&telemetry(), &in_flight, &ApproximateEstimator);
        assert_eq!(predicted, 1000.0);
    }

    #[test]
    fn extract_drain_never_goes_negative() {
        let in_flight = InFlightThreads {
            extract: 500,
            replenish: 0,
            suppress: 0,
        };
        assert_eq!(predict_resource(&telemetry(), &in_flight, &ApproximateEstimator), 0.0);
    }

    #[test]
    fn score_penalizes_overshoot_only_when_enabled() {
        let t = telemetry();
        assert_eq!(score(&t, 2.0, true), 500.0);
        assert_eq!(score(&t, 4.0, true), 250.0);
        assert_eq!(score(&t, 4.0, false), 500.0);
    }
}
