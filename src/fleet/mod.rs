//! Boundary between the scheduler and the environment it drives.
//!
//! The scheduler never talks to nodes directly. Every observation (topology,
//! privileges, running jobs, target telemetry) and every action (escalation,
//! deployment, dispatch, termination) goes through the [`Fleet`] trait.
//!
//! # Implementations
//!
//! - [`SimulatedFleet`]: in-memory fleet loaded from a JSON description, used
//!   by the CLI and the test suite

pub mod sim;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::scheduler::{JobHandle, JobKind, RunningJob};

pub use sim::{FleetSpec, SimulatedFleet};

/// Static facts about a node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Total execution capacity in slots
    pub max_capacity: f64,
    /// Owned by the operator; donates capacity and is never harvested
    pub owned: bool,
}

/// Live readings for a resource-bearing node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetTelemetry {
    pub max_resource: f64,
    pub resource: f64,
    pub min_security: f64,
    pub security: f64,
    /// Probability that an extract job succeeds
    pub success_chance: f64,
    /// Growth parameter of the target, used by the analytic model
    pub growth_rate: f64,
    pub required_skill: u32,
    pub operator_skill: u32,
    /// Fraction of resource one extract thread takes at current security
    pub live_extract_fraction: f64,
    /// Linear estimate of the growth one replenish thread adds
    pub live_growth_per_thread: f64,
}

impl TargetTelemetry {
    /// Whether the operator is currently able to act on this target.
    pub fn skill_gate(&self) -> bool {
        self.operator_skill >= self.required_skill
    }

    pub fn resource_fraction(&self) -> f64 {
        if self.max_resource <= 0.0 {
            0.0
        } else {
            self.resource / self.max_resource
        }
    }
}

/// Everything the scheduler needs from the outside world.
///
/// Calls are synchronous; implementations backed by remote nodes are expected
/// to answer from a local view refreshed in [`Fleet::refresh`].
pub trait Fleet {
    /// Advance the fleet's view of the world before a cycle starts.
    fn refresh(&mut self) {}

    /// Hostnames adjacent to `host`.
    fn neighbors(&self, host: &str) -> Result<Vec<String>>;

    fn node_info(&self, host: &str) -> Result<NodeInfo>;

    fn has_root(&self, host: &str) -> bool;

    /// Attempt to gain root access. Returns true when access was gained.
    fn try_escalate(&mut self, host: &str) -> bool;

    /// Copy job binaries to a runner.
    fn deploy(&mut self, host: &str) -> Result<()>;

    fn running_jobs(&self, host: &str) -> Result<Vec<RunningJob>>;

    /// Capacity consumed by everything running on `host`.
    fn used_capacity(&self, host: &str) -> Result<f64>;

    /// Capacity one thread of `kind` consumes.
    fn unit_cost(&self, kind: JobKind) -> f64;

    fn dispatch(
        &mut self,
        kind: JobKind,
        host: &str,
        threads: u64,
        target: Option<&str>,
    ) -> Result<JobHandle>;

    /// Kill every job of `kind` on `host`. Returns how many were killed.
    fn terminate(&mut self, host: &str, kind: JobKind) -> Result<usize>;

    /// `None` for nodes that hold no harvestable resource or cannot be read.
    fn telemetry(&self, host: &str) -> Result<Option<TargetTelemetry>>;

    fn analytic_model_available(&self) -> bool;
}
