use std::collections::{HashMap, HashSet};
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::SecurityDeltas;
use crate::error::{HarvestError, Result};
use crate::fleet::{Fleet, NodeInfo, TargetTelemetry};
use crate::scheduler::estimator::{AnalyticEstimator, Estimator};
use crate::scheduler::{JobHandle, JobKind, RunningJob};

/// Slack allowed when comparing requested capacity against free capacity.
const CAPACITY_EPSILON: f64 = 1e-9;

/// Resource-bearing part of a simulated node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetProfile {
    pub max_resource: f64,
    pub resource: f64,
    pub min_security: f64,
    pub security: f64,
    pub success_chance: f64,
    pub growth_rate: f64,
    #[serde(default)]
    pub required_skill: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub hostname: String,
    #[serde(default)]
    pub max_capacity: f64,
    /// Capacity held by processes the scheduler does not know about
    #[serde(default)]
    pub reserved_capacity: f64,
    #[serde(default)]
    pub root_access: bool,
    #[serde(default)]
    pub owned: bool,
    /// Port openers needed before escalation succeeds
    #[serde(default)]
    pub ports_required: u32,
    #[serde(default)]
    pub neighbors: Vec<String>,
    #[serde(default)]
    pub target: Option<TargetProfile>,
}

/// A job already running when the simulation starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub host: String,
    pub kind: JobKind,
    pub threads: u64,
    #[serde(default)]
    pub target: Option<String>,
    /// Cycles until completion; omitted for jobs that never finish
    #[serde(default)]
    pub remaining_cycles: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitCosts {
    pub extract: f64,
    pub replenish: f64,
    pub suppress: f64,
    pub filler: f64,
}

impl Default for UnitCosts {
    fn default() -> Self {
        Self {
            extract: 1.70,
            replenish: 1.75,
            suppress: 1.75,
            filler: 4.0,
        }
    }
}

impl UnitCosts {
    pub fn uniform(cost: f64) -> Self {
        Self {
            extract: cost,
            replenish: cost,
            suppress: cost,
            filler: cost,
        }
    }

    pub fn get(&self, kind: JobKind) -> f64 {
        match kind {
            JobKind::Extract => self.extract,
            JobKind::Replenish => self.replenish,
            JobKind::Suppress => self.suppress,
            JobKind::Filler => self.filler,
        }
    }
}

/// JSON description of a simulated fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetSpec {
    #[serde(default = "default_operator_skill")]
    pub operator_skill: u32,
    #[serde(default)]
    pub port_openers: u32,
    #[serde(default = "default_true")]
    pub analytic_model: bool,
    #[serde(default)]
    pub unit_costs: UnitCosts,
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub jobs: Vec<JobSpec>,
}

fn default_operator_skill() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone)]
struct SimJob {
    host: String,
    kind: JobKind,
    threads: u64,
    target: Option<String>,
    remaining_cycles: Option<u32>,
}

impl SimJob {
    fn as_running(&self) -> RunningJob {
        RunningJob::new(self.kind, self.threads, self.target.as_deref())
    }
}

/// In-memory fleet that follows the same yield and growth rules the
/// analytic estimator models.
///
/// Each [`Fleet::refresh`] advances the simulation by one cycle: jobs whose
/// duration has elapsed apply their effect and disappear. Filler jobs never
/// finish on their own.
#[derive(Debug)]
pub struct SimulatedFleet {
    nodes: HashMap<String, NodeSpec>,
    jobs: Vec<SimJob>,
    deployed: HashSet<String>,
    rejecting: HashSet<String>,
    operator_skill: u32,
    port_openers: u32,
    analytic_model: bool,
    unit_costs: UnitCosts,
    deltas: SecurityDeltas,
    durations: HashMap<JobKind, u32>,
}

impl SimulatedFleet {
    pub fn from_spec(spec: FleetSpec) -> Result<Self> {
        let mut nodes: HashMap<String, NodeSpec> = HashMap::new();
        for node in &spec.nodes {
            if nodes.contains_key(&node.hostname) {
                return Err(HarvestError::InvalidFleet(format!(
                    "duplicate hostname {}",
                    node.hostname
                )));
            }
            nodes.insert(node.hostname.clone(), node.clone());
        }

        // Links are declared once but traversable both ways. Back-links are
        // appended in declaration order so discovery order is reproducible.
        let mut links: Vec<(String, String)> = Vec::new();
        for node in &spec.nodes {
            for neighbor in &node.neighbors {
                if !nodes.contains_key(neighbor) {
                    return Err(HarvestError::InvalidFleet(format!(
                        "{} links to unknown node {}",
                        node.hostname, neighbor
                    )));
                }
                links.push((neighbor.clone(), node.hostname.clone()));
            }
        }
        for (from, to) in links {
            if let Some(node) = nodes.get_mut(&from) {
                if !node.neighbors.contains(&to) {
                    node.neighbors.push(to);
                }
            }
        }

        let mut fleet = Self {
            nodes,
            jobs: Vec::new(),
            deployed: HashSet::new(),
            rejecting: HashSet::new(),
            operator_skill: spec.operator_skill,
            port_openers: spec.port_openers,
            analytic_model: spec.analytic_model,
            unit_costs: spec.unit_costs,
            deltas: SecurityDeltas::default(),
            durations: HashMap::from([
                (JobKind::Extract, 1),
                (JobKind::Replenish, 2),
                (JobKind::Suppress, 2),
            ]),
        };

        for job in spec.jobs {
            if !fleet.nodes.contains_key(&job.host) {
                return Err(HarvestError::InvalidFleet(format!(
                    "job placed on unknown node {}",
                    job.host
                )));
            }
            fleet.jobs.push(SimJob {
                host: job.host,
                kind: job.kind,
                threads: job.threads,
                target: job.target,
                remaining_cycles: job.remaining_cycles,
            });
        }

        Ok(fleet)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let spec: FleetSpec = serde_json::from_str(json)?;
        Self::from_spec(spec)
    }

    /// Load a fleet description from a JSON file.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        Self::from_json(&contents)
    }

    /// Make every dispatch to `host` fail, as if the runner refused to launch.
    pub fn reject_dispatches_on(&mut self, host: &str) {
        self.rejecting.insert(host.to_string());
    }

    /// Current resource and security of a target, for inspection.
    pub fn target_profile(&self, host: &str) -> Option<&TargetProfile> {
        self.nodes.get(host).and_then(|n| n.target.as_ref())
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    fn node(&self, host: &str) -> Result<&NodeSpec> {
        self.nodes
            .get(host)
            .ok_or_else(|| HarvestError::UnknownNode(host.to_string()))
    }

    fn telemetry_for(&self, profile: &TargetProfile) -> TargetTelemetry {
        let mut telemetry = snapshot(profile, self.operator_skill);
        let model = AnalyticEstimator;
        telemetry.live_extract_fraction = model.extract_fraction(&telemetry);
        telemetry.live_growth_per_thread = model.growth_multiplier(1, &telemetry) - 1.0;
        telemetry
    }

    fn apply(&mut self, job: &SimJob) {
        let Some(target_host) = job.target.as_deref() else {
            return;
        };
        let operator_skill = self.operator_skill;
        let deltas = self.deltas;
        let Some(profile) = self
            .nodes
            .get_mut(target_host)
            .and_then(|n| n.target.as_mut())
        else {
            return;
        };

        let model = AnalyticEstimator;
        let threads = job.threads as f64;
        match job.kind {
            JobKind::Extract => {
                let chance = profile.success_chance.clamp(0.0, 1.0);
                if rand::thread_rng().gen_bool(chance) {
                    let snapshot = snapshot(profile, operator_skill);
                    let fraction = (model.extract_fraction(&snapshot) * threads).min(1.0);
                    profile.resource *= 1.0 - fraction;
                }
                profile.security += threads * deltas.extract;
            }
            JobKind::Replenish => {
                let snapshot = snapshot(profile, operator_skill);
                let multiplier = model.growth_multiplier(job.threads, &snapshot);
                let grown = profile.resource.max(1.0) * multiplier;
                profile.resource = grown.min(profile.max_resource);
                profile.security += threads * deltas.replenish;
            }
            JobKind::Suppress => {
                profile.security =
                    (profile.security - threads * deltas.suppress).max(profile.min_security);
            }
            JobKind::Filler => {}
        }
    }
}

/// Telemetry without the live estimates filled in.
fn snapshot(profile: &TargetProfile, operator_skill: u32) -> TargetTelemetry {
    TargetTelemetry {
        max_resource: profile.max_resource,
        resource: profile.resource,
        min_security: profile.min_security,
        security: profile.security,
        success_chance: profile.success_chance,
        growth_rate: profile.growth_rate,
        required_skill: profile.required_skill,
        operator_skill,
        live_extract_fraction: 0.0,
        live_growth_per_thread: 0.0,
    }
}

impl Fleet for SimulatedFleet {
    fn refresh(&mut self) {
        let mut finished = Vec::new();
        self.jobs.retain_mut(|job| match job.remaining_cycles.as_mut() {
            Some(remaining) if *remaining <= 1 => {
                finished.push(job.clone());
                false
            }
            Some(remaining) => {
                *remaining -= 1;
                true
            }
            None => true,
        });
        for job in &finished {
            self.apply(job);
        }
        if !finished.is_empty() {
            tracing::debug!(finished = finished.len(), "Simulated jobs completed");
        }
    }

    fn neighbors(&self, host: &str) -> Result<Vec<String>> {
        Ok(self.node(host)?.neighbors.clone())
    }

    fn node_info(&self, host: &str) -> Result<NodeInfo> {
        let node = self.node(host)?;
        Ok(NodeInfo {
            max_capacity: node.max_capacity,
            owned: node.owned,
        })
    }

    fn has_root(&self, host: &str) -> bool {
        self.nodes.get(host).is_some_and(|n| n.root_access)
    }

    fn try_escalate(&mut self, host: &str) -> bool {
        let openers = self.port_openers;
        match self.nodes.get_mut(host) {
            Some(node) if node.root_access => true,
            Some(node) if node.ports_required <= openers => {
                node.root_access = true;
                true
            }
            _ => false,
        }
    }

    fn deploy(&mut self, host: &str) -> Result<()> {
        let node = self.node(host)?;
        if !node.root_access {
            return Err(HarvestError::Fleet(format!(
                "cannot deploy to {} without root access",
                host
            )));
        }
        self.deployed.insert(host.to_string());
        Ok(())
    }

    fn running_jobs(&self, host: &str) -> Result<Vec<RunningJob>> {
        self.node(host)?;
        Ok(self
            .jobs
            .iter()
            .filter(|j| j.host == host)
            .map(SimJob::as_running)
            .collect())
    }

    fn used_capacity(&self, host: &str) -> Result<f64> {
        let node = self.node(host)?;
        let jobs: f64 = self
            .jobs
            .iter()
            .filter(|j| j.host == host)
            .map(|j| j.threads as f64 * self.unit_costs.get(j.kind))
            .sum();
        Ok((node.reserved_capacity + jobs).min(node.max_capacity))
    }

    fn unit_cost(&self, kind: JobKind) -> f64 {
        self.unit_costs.get(kind)
    }

    fn dispatch(
        &mut self,
        kind: JobKind,
        host: &str,
        threads: u64,
        target: Option<&str>,
    ) -> Result<JobHandle> {
        let reject = |reason: &str| HarvestError::Dispatch {
            kind,
            host: host.to_string(),
            threads,
            reason: reason.to_string(),
        };

        let node = self.node(host)?;
        if threads == 0 {
            return Err(reject("zero threads requested"));
        }
        if !node.root_access {
            return Err(reject("no root access"));
        }
        if !self.deployed.contains(host) {
            return Err(reject("job binary not deployed"));
        }
        if self.rejecting.contains(host) {
            return Err(reject("launch refused"));
        }
        let free = node.max_capacity - self.used_capacity(host)?;
        if threads as f64 * self.unit_costs.get(kind) > free + CAPACITY_EPSILON {
            return Err(reject("insufficient capacity"));
        }

        self.jobs.push(SimJob {
            host: host.to_string(),
            kind,
            threads,
            target: target.map(str::to_string),
            remaining_cycles: self.durations.get(&kind).copied(),
        });
        Ok(Uuid::new_v4())
    }

    fn terminate(&mut self, host: &str, kind: JobKind) -> Result<usize> {
        self.node(host)?;
        let before = self.jobs.len();
        self.jobs.retain(|j| !(j.host == host && j.kind == kind));
        Ok(before - self.jobs.len())
    }

    fn telemetry(&self, host: &str) -> Result<Option<TargetTelemetry>> {
        let node = self.node(host)?;
        Ok(node.target.as_ref().map(|p| self.telemetry_for(p)))
    }

    fn analytic_model_available(&self) -> bool {
        self.analytic_model
    }
}
