use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::fleet::Fleet;
use crate::report::{ReportInput, StatusReport, TargetPlan};
use crate::scheduler::estimator::select_estimator;
use crate::scheduler::predictor;
use crate::scheduler::{
    allocate, allocate_filler, decide_mode, ActivityLog, Allocation, Inventory, JobKind, Mode,
    ModeDecision, RunnerPool, SizingEngine, Topology,
};

/// Latest report, shared with the dashboard.
pub type SharedReport = Arc<RwLock<Option<StatusReport>>>;

/// Everything one cycle decided and placed.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub decision: ModeDecision,
    pub plans: Vec<TargetPlan>,
    pub filler: Allocation,
    pub report: StatusReport,
}

/// Owns the control loop and the only state that outlives a cycle: the
/// activity log, the cycle counter and the last published report.
pub struct CycleDriver {
    config: SchedulerConfig,
    activity: ActivityLog,
    cycle: u64,
    last_mode: Option<Mode>,
    latest: SharedReport,
    echo_reports: bool,
}

impl CycleDriver {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            activity: ActivityLog::new(config.activity_depth),
            config,
            cycle: 0,
            last_mode: None,
            latest: Arc::new(RwLock::new(None)),
            echo_reports: false,
        }
    }

    /// Print each cycle's report to stdout.
    pub fn with_report_echo(mut self, echo: bool) -> Self {
        self.echo_reports = echo;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    pub fn latest_report(&self) -> SharedReport {
        self.latest.clone()
    }

    /// Run one full pass: discover, predict, decide, size, allocate, report.
    ///
    /// Nothing from earlier cycles feeds into the decision except what the
    /// fleet reports as still running.
    pub fn run_cycle<F: Fleet + ?Sized>(&mut self, fleet: &mut F) -> Result<CycleOutcome> {
        self.cycle += 1;
        fleet.refresh();

        let mut topology = Topology::discover(fleet, &self.config.root)?;
        self.escalate(fleet, &mut topology)?;

        let runner_hosts: Vec<String> = topology
            .runners(self.config.exclude_root_runner)
            .iter()
            .map(|n| n.hostname.clone())
            .collect();
        for host in &runner_hosts {
            if let Err(e) = fleet.deploy(host) {
                tracing::warn!(host = %host, error = %e, "Failed to deploy job binaries");
            }
            match fleet.terminate(host, JobKind::Filler) {
                Ok(0) => {}
                Ok(killed) => tracing::debug!(host = %host, killed, "Filler jobs terminated"),
                Err(e) => tracing::warn!(host = %host, error = %e, "Failed to terminate filler"),
            }
        }

        let inventory = Inventory::collect(fleet, &topology.nodes)?;
        let runners = topology.runners(self.config.exclude_root_runner);
        let mut pool = RunnerPool::probe(fleet, &runners)?;
        let runner_count = pool.len();
        let free_capacity = pool.total_free();

        let estimator = select_estimator(
            self.config.use_analytic_model,
            fleet.analytic_model_available(),
        );
        let ranked = predictor::rank(&topology, &inventory, estimator.as_ref(), &self.config);
        let decision = decide_mode(&inventory.census(), ranked.first(), self.config.grow_threshold);
        if self.last_mode != Some(decision.mode) {
            self.activity
                .record(format!("mode {} ({})", decision.mode, decision.reason));
            self.last_mode = Some(decision.mode);
        }

        let sizing = SizingEngine::new(&self.config, estimator.as_ref());
        let main_kind = decision.mode.job_kind();
        let mut plans = Vec::with_capacity(ranked.len());
        for target in ranked {
            let required = match decision.mode {
                Mode::Extract => sizing.extract_for(&target),
                Mode::Replenish => sizing.replenish_for(&target),
            };
            let main = allocate(fleet, &mut pool, main_kind, Some(&target.hostname), required);

            let (extract, replenish) = match decision.mode {
                Mode::Extract => (main.placed, 0),
                Mode::Replenish => (0, main.placed),
            };
            let suppress_required = sizing.suppress_for(&target, extract, replenish);
            let suppress = allocate(
                fleet,
                &mut pool,
                JobKind::Suppress,
                Some(&target.hostname),
                suppress_required,
            );

            plans.push(TargetPlan {
                target,
                main,
                suppress,
            });
        }

        let filler = allocate_filler(fleet, &mut pool);

        let report = StatusReport::build(
            ReportInput {
                cycle: self.cycle,
                decision: &decision,
                estimator: estimator.name(),
                runners: runner_count,
                free_capacity,
                running: inventory.census(),
                plans: &plans,
                filler: &filler,
                depth: self.config.report_depth,
            },
            &self.activity,
        );

        if report.required > 0 && runner_count == 0 {
            tracing::warn!(
                cycle = self.cycle,
                required = report.required,
                "No runner capacity available"
            );
        }
        if report.unmet > 0 {
            self.activity.record(format!(
                "{} of {} threads unmet",
                report.unmet, report.required
            ));
        }

        tracing::info!(
            cycle = self.cycle,
            mode = %decision.mode,
            locked = decision.locked,
            targets = plans.len(),
            placed = report.placed,
            unmet = report.unmet,
            filler = filler.placed,
            "Cycle complete"
        );

        Ok(CycleOutcome {
            decision,
            plans,
            filler,
            report,
        })
    }

    /// Try to gain root on every reachable node that lacks it.
    fn escalate<F: Fleet + ?Sized>(
        &mut self,
        fleet: &mut F,
        topology: &mut Topology,
    ) -> Result<()> {
        let locked: Vec<String> = topology
            .locked_nodes()
            .iter()
            .map(|n| n.hostname.clone())
            .collect();
        for host in locked {
            if fleet.try_escalate(&host) {
                topology.grant_root(&host)?;
                tracing::info!(host = %host, "Root access gained");
                self.activity.record(format!("root access on {}", host));
            }
        }
        Ok(())
    }

    /// Repeat cycles until `shutdown` is cancelled.
    ///
    /// A failed cycle is logged and the loop carries on; the next cycle starts
    /// from fresh state after the configured delay.
    pub async fn run<F: Fleet + ?Sized>(&mut self, fleet: &mut F, shutdown: CancellationToken) {
        tracing::info!(
            root = %self.config.root,
            delay_ms = self.config.cycle_delay.as_millis() as u64,
            "Starting scheduler loop"
        );

        loop {
            match self.run_cycle(fleet) {
                Ok(outcome) => {
                    if self.echo_reports {
                        println!("{}", outcome.report);
                    }
                    *self.latest.write().await = Some(outcome.report);
                }
                Err(e) => {
                    tracing::warn!(cycle = self.cycle, error = %e, "Cycle failed");
                    self.activity
                        .record(format!("cycle {} failed: {}", self.cycle, e));
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(cycles = self.cycle, "Scheduler loop stopped");
                    break;
                }
                _ = tokio::time::sleep(self.config.cycle_delay) => {}
            }
        }
    }
}
