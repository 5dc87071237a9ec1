//! Per-cycle status report, rendered as a text table or serialized as JSON.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::scheduler::activity::{ActivityEntry, ActivityLog};
use crate::scheduler::{Allocation, JobCensus, JobKind, ModeDecision, TargetState};

/// What one cycle asked for and got on a single target.
#[derive(Debug, Clone, Serialize)]
pub struct TargetPlan {
    pub target: TargetState,
    pub main: Allocation,
    pub suppress: Allocation,
}

impl TargetPlan {
    pub fn unmet(&self) -> u64 {
        self.main.unmet() + self.suppress.unmet()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetLine {
    pub hostname: String,
    pub predicted_resource_pct: f64,
    pub security_delta: f64,
    pub score: f64,
    pub main_kind: JobKind,
    pub main_required: u64,
    pub main_placed: u64,
    pub suppress_required: u64,
    pub suppress_placed: u64,
}

impl From<&TargetPlan> for TargetLine {
    fn from(plan: &TargetPlan) -> Self {
        Self {
            hostname: plan.target.hostname.clone(),
            predicted_resource_pct: plan.target.predicted_fraction() * 100.0,
            security_delta: plan.target.security_delta(),
            score: plan.target.score,
            main_kind: plan.main.kind,
            main_required: plan.main.requested,
            main_placed: plan.main.placed,
            suppress_required: plan.suppress.requested,
            suppress_placed: plan.suppress.placed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub cycle: u64,
    pub generated_at: DateTime<Utc>,
    pub decision: ModeDecision,
    pub estimator: String,
    pub runners: usize,
    pub free_capacity: f64,
    pub running: JobCensus,
    pub dispatched: JobCensus,
    pub required: u64,
    pub placed: u64,
    pub unmet: u64,
    pub targets: Vec<TargetLine>,
    pub activity: Vec<ActivityEntry>,
}

/// Inputs gathered by the cycle driver for one report.
pub struct ReportInput<'a> {
    pub cycle: u64,
    pub decision: &'a ModeDecision,
    pub estimator: &'a str,
    pub runners: usize,
    pub free_capacity: f64,
    pub running: JobCensus,
    pub plans: &'a [TargetPlan],
    pub filler: &'a Allocation,
    pub depth: usize,
}

impl StatusReport {
    pub fn build(input: ReportInput<'_>, activity: &ActivityLog) -> Self {
        let mut dispatched = JobCensus::default();
        let mut required = 0;
        let mut placed = 0;
        for plan in input.plans {
            for allocation in [&plan.main, &plan.suppress] {
                dispatched.add(allocation.kind, allocation.placed);
                required += allocation.requested;
                placed += allocation.placed;
            }
        }
        dispatched.add(JobKind::Filler, input.filler.placed);

        Self {
            cycle: input.cycle,
            generated_at: Utc::now(),
            decision: input.decision.clone(),
            estimator: input.estimator.to_string(),
            runners: input.runners,
            free_capacity: input.free_capacity,
            running: input.running,
            dispatched,
            required,
            placed,
            unmet: required.saturating_sub(placed),
            targets: input
                .plans
                .iter()
                .take(input.depth)
                .map(TargetLine::from)
                .collect(),
            activity: activity.entries().cloned().collect(),
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let lock = if self.decision.locked {
            "locked"
        } else {
            "unlocked"
        };
        out.push_str(&format!(
            "Cycle {}  mode: {} ({})  reason: {}\n",
            self.cycle, self.decision.mode, lock, self.decision.reason
        ));
        out.push_str(&format!(
            "Estimator: {}  Runners: {}  Free capacity: {:.2}\n",
            self.estimator, self.runners, self.free_capacity
        ));
        out.push('\n');

        out.push_str(&format!("{:<12} {:>10} {:>12}\n", "KIND", "RUNNING", "DISPATCHED"));
        out.push_str(&format!("{}\n", "-".repeat(36)));
        for kind in JobKind::ALL {
            out.push_str(&format!(
                "{:<12} {:>10} {:>12}\n",
                kind.to_string(),
                self.running.get(kind),
                self.dispatched.get(kind)
            ));
        }
        out.push_str(&format!(
            "Placed {} of {} required threads",
            self.placed, self.required
        ));
        if self.unmet > 0 {
            out.push_str(&format!(" ({} unmet)", self.unmet));
        }
        out.push_str("\n\n");

        if self.targets.is_empty() {
            out.push_str("No schedulable targets.\n");
        } else {
            out.push_str(&format!(
                "{:<20} {:>9} {:>8} {:>14} {:>13} {:>13}\n",
                "TARGET", "RESOURCE", "SEC+", "SCORE", "MAIN", "SUPPRESS"
            ));
            out.push_str(&format!("{}\n", "-".repeat(82)));
            for line in &self.targets {
                out.push_str(&format!(
                    "{:<20} {:>8.1}% {:>8.2} {:>14.0} {:>13} {:>13}\n",
                    line.hostname,
                    line.predicted_resource_pct,
                    line.security_delta,
                    line.score,
                    format!("{}/{}", line.main_placed, line.main_required),
                    format!("{}/{}", line.suppress_placed, line.suppress_required),
                ));
            }
        }

        if !self.activity.is_empty() {
            out.push_str("\nRecent activity:\n");
            for entry in &self.activity {
                out.push_str(&format!("  {}\n", entry));
            }
        }
        out
    }
}

impl std::fmt::Display for StatusReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render_text())
    }
}
