
use std::time::Duration;

use harvest_lite::config::SchedulerConfig;
use harvest_lite::driver::CycleDriver;
use harvest_lite::error::{HarvestError, Result};
use harvest_lite::fleet::{Fleet, NodeInfo, SimulatedFleet, TargetTelemetry};
use harvest_lite::scheduler::mode::MIXED_ACTIVITY;
use harvest_lite::scheduler::{JobHandle, JobKind, Mode, RunningJob};
use test_harness::{target, FleetBuilder, ROOT};
use tokio_util::sync::CancellationToken;

fn driver() -> CycleDriver {
    CycleDriver::new(SchedulerConfig::new(ROOT))
}

fn activity_messages(driver: &CycleDriver) -> Vec<String> {
    driver
        .activity()
        .entries()
        .map(|e| e.message.clone())
        .collect()
}

#[test]
fn test_full_target_is_extracted_up_to_capacity() {
    let mut fleet = FleetBuilder::new()
        .runner("r1", 20.0)
        .target("alpha", target(1_000_000.0, 1_000_000.0, 1.0, 1.0))
        .build();
    let mut driver = driver();

    let outcome = driver.run_cycle(&mut fleet).unwrap();

    assert_eq!(outcome.decision.mode, Mode::Extract);
    assert!(!outcome.decision.locked);
    assert_eq!(outcome.plans.len(), 1);
    let main = &outcome.plans[0].main;
    assert_eq!(main.kind, JobKind::Extract);
    assert!(main.requested > 10);
    assert_eq!(main.placed, 10);
    assert!(outcome.report.unmet > 0);
    assert_eq!(fleet.used_capacity("r1").unwrap(), 20.0);
}

#[test]
fn test_depleted_target_is_replenished() {
    let mut fleet = FleetBuilder::new()
        .runner("r1", 64.0)
        .target("alpha", target(1_000_000.0, 100_000.0, 1.0, 1.0))
        .build();
    let mut driver = driver();

    let outcome = driver.run_cycle(&mut fleet).unwrap();

    assert_eq!(outcome.decision.mode, Mode::Replenish);
    assert!(!outcome.decision.locked);
    let plan = &outcome.plans[0];
    assert_eq!(plan.main.kind, JobKind::Replenish);
    assert!(plan.main.placed > 0);
    assert_eq!(plan.suppress.kind, JobKind::Suppress);
    assert!(activity_messages(&driver)
        .iter()
        .any(|m| m.starts_with("mode replenish")));
}

#[test]
fn test_mixed_activity_locks_extract_mode() {
    let mut fleet = FleetBuilder::new()
        .runner("r1", 100.0)
        .target("alpha", target(1_000_000.0, 100_000.0, 1.0, 1.0))
        .job("r1", JobKind::Extract, 5, Some("alpha"))
        .job("r1", JobKind::Replenish, 3, Some("alpha"))
        .build();
    let mut driver = driver();

    let outcome = driver.run_cycle(&mut fleet).unwrap();

    assert_eq!(outcome.decision.mode, Mode::Extract);
    assert!(outcome.decision.locked);
    assert_eq!(outcome.decision.reason, MIXED_ACTIVITY);
    assert_eq!(outcome.report.running.extract, 5);
    assert_eq!(outcome.report.running.replenish, 3);
    assert!(outcome
        .plans
        .iter()
        .all(|p| p.main.kind == JobKind::Extract));
}

#[test]
fn test_replenish_in_flight_keeps_replenish_mode() {
    let mut fleet = FleetBuilder::new()
        .runner("r1", 100.0)
        .target("alpha", target(1_000_000.0, 1_000_000.0, 1.0, 1.0))
        .job("r1", JobKind::Replenish, 4, Some("alpha"))
        .build();
    let mut driver = driver();

    let outcome = driver.run_cycle(&mut fleet).unwrap();

    assert_eq!(outcome.decision.mode, Mode::Replenish);
    assert!(outcome.decision.locked);
}

#[test]
fn test_no_capacity_cycle_is_repeatable() {
    let mut fleet = FleetBuilder::new()
        .runner("r1", 0.0)
        .target("alpha", target(1_000_000.0, 1_000_000.0, 1.0, 5.0))
        .build();
    let mut driver = driver();

    for cycle in 1..=3 {
        let outcome = driver.run_cycle(&mut fleet).unwrap();
        assert_eq!(outcome.report.cycle, cycle);
        assert_eq!(outcome.report.runners, 0);
        assert_eq!(outcome.report.placed, 0);
        assert!(outcome.report.unmet > 0);
        assert!(outcome
            .plans
            .iter()
            .all(|p| p.main.assignments.is_empty() && p.suppress.assignments.is_empty()));
        assert_eq!(fleet.job_count(), 0);
    }
}

#[test]
fn test_root_is_not_a_runner_by_default() {
    let mut fleet = FleetBuilder::new()
        .home_capacity(64.0)
        .target("alpha", target(1_000_000.0, 1_000_000.0, 1.0, 1.0))
        .build();

    let outcome = driver().run_cycle(&mut fleet).unwrap();
    assert_eq!(outcome.report.runners, 0);
    assert_eq!(fleet.used_capacity(ROOT).unwrap(), 0.0);

    let mut with_root = CycleDriver::new(SchedulerConfig::new(ROOT).with_root_runner(true));
    let outcome = with_root.run_cycle(&mut fleet).unwrap();
    assert_eq!(outcome.report.runners, 1);
    assert!(outcome.report.placed > 0);
}

#[test]
fn test_locked_targets_are_escalated_when_possible() {
    let mut fleet = FleetBuilder::new()
        .runner("r1", 40.0)
        .locked_target("alpha", target(1_000_000.0, 1_000_000.0, 1.0, 1.0), 3)
        .locked_target("beta", target(1_000_000.0, 1_000_000.0, 1.0, 1.0), 9)
        .build();
    let mut driver = driver();

    let outcome = driver.run_cycle(&mut fleet).unwrap();

    assert!(fleet.has_root("alpha"));
    assert!(!fleet.has_root("beta"));
    let planned: Vec<&str> = outcome
        .plans
        .iter()
        .map(|p| p.target.hostname.as_str())
        .collect();
    assert_eq!(planned, vec!["alpha"]);
    assert!(activity_messages(&driver).contains(&"root access on alpha".to_string()));
}

#[test]
fn test_filler_is_replaced_each_cycle() {
    let mut fleet = FleetBuilder::new().runner("r1", 20.0).build();
    let mut driver = driver();

    for _ in 0..3 {
        let outcome = driver.run_cycle(&mut fleet).unwrap();
        assert!(outcome.plans.is_empty());
        assert_eq!(outcome.decision.mode, Mode::Replenish);
        assert_eq!(outcome.filler.placed, 10);
        assert_eq!(fleet.job_count(), 1);
        assert_eq!(fleet.used_capacity("r1").unwrap(), 20.0);
    }
}

#[test]
fn test_report_lists_ranked_targets() {
    let mut fleet = FleetBuilder::new()
        .runner("r1", 400.0)
        .target("small", target(10_000.0, 10_000.0, 1.0, 1.0))
        .target("large", target(5_000_000.0, 5_000_000.0, 1.0, 1.0))
        .build();

    let outcome = driver().run_cycle(&mut fleet).unwrap();

    let hosts: Vec<&str> = outcome
        .report
        .targets
        .iter()
        .map(|t| t.hostname.as_str())
        .collect();
    assert_eq!(hosts, vec!["large", "small"]);
    assert!(outcome.report.render_text().contains("large"));
}

/// Wraps a simulated fleet and fails discovery on chosen cycles.
struct FlakyFleet {
    inner: SimulatedFleet,
    cycle: u32,
    failing: Vec<u32>,
}

impl FlakyFleet {
    fn is_failing_cycle(&self) -> bool {
        self.failing.contains(&self.cycle)
    }
}

impl Fleet for FlakyFleet {
    fn refresh(&mut self) {
        self.cycle += 1;
        self.inner.refresh();
    }

    fn neighbors(&self, host: &str) -> Result<Vec<String>> {
        self.inner.neighbors(host)
    }

    fn node_info(&self, host: &str) -> Result<NodeInfo> {
        if self.is_failing_cycle() {
            return Err(HarvestError::Fleet("directory unavailable".to_string()));
        }
        self.inner.node_info(host)
    }

    fn has_root(&self, host: &str) -> bool {
        self.inner.has_root(host)
    }

    fn try_escalate(&mut self, host: &str) -> bool {
        self.inner.try_escalate(host)
    }

    fn deploy(&mut self, host: &str) -> Result<()> {
        self.inner.deploy(host)
    }

    fn running_jobs(&self, host: &str) -> Result<Vec<RunningJob>> {
        self.inner.running_jobs(host)
    }

    fn used_capacity(&self, host: &str) -> Result<f64> {
        self.inner.used_capacity(host)
    }

    fn unit_cost(&self, kind: JobKind) -> f64 {
        self.inner.unit_cost(kind)
    }

    fn dispatch(
        &mut self,
        kind: JobKind,
        host: &str,
        threads: u64,
        target: Option<&str>,
    ) -> Result<JobHandle> {
        self.inner.dispatch(kind, host, threads, target)
    }

    fn terminate(&mut self, host: &str, kind: JobKind) -> Result<usize> {
        self.inner.terminate(host, kind)
    }

    fn telemetry(&self, host: &str) -> Result<Option<TargetTelemetry>> {
        self.inner.telemetry(host)
    }

    fn analytic_model_available(&self) -> bool {
        self.inner.analytic_model_available()
    }
}

fn flaky_fleet(failing: Vec<u32>) -> FlakyFleet {
    FlakyFleet {
        inner: FleetBuilder::new()
            .runner("r1", 20.0)
            .target("alpha", target(1_000_000.0, 1_000_000.0, 1.0, 1.0))
            .build(),
        cycle: 0,
        failing,
    }
}

#[test]
fn test_failed_cycle_does_not_poison_the_next() {
    let mut fleet = flaky_fleet(vec![1]);
    let mut driver = driver();

    assert!(matches!(
        driver.run_cycle(&mut fleet),
        Err(HarvestError::Fleet(_))
    ));
    let outcome = driver.run_cycle(&mut fleet).unwrap();
    assert_eq!(outcome.report.cycle, 2);
    assert_eq!(outcome.plans[0].main.placed, 10);
}

#[tokio::test]
async fn test_run_loop_publishes_reports_until_cancelled() {
    let mut fleet = flaky_fleet(vec![1]);
    let config = SchedulerConfig::new(ROOT)
        .with_cycle_delay(Duration::from_millis(5))
        .with_activity_depth(1024);
    let mut driver = CycleDriver::new(config);
    let latest = driver.latest_report();

    let shutdown = CancellationToken::new();
    let canceller = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    tokio::time::timeout(Duration::from_secs(5), driver.run(&mut fleet, shutdown))
        .await
        .expect("loop should stop once cancelled");

    let report = latest.read().await.clone().expect("a report was published");
    assert!(report.cycle >= 2);
    assert!(activity_messages(&driver)
        .iter()
        .any(|m| m.starts_with("cycle 1 failed")));
}
