use std::time::Duration;

/// Per-thread security contribution of each job kind.
///
/// Suppress lowers security by `suppress` per thread; extract and replenish
/// raise it by `extract` and `replenish` per thread respectively.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SecurityDeltas {
    pub suppress: f64,
    pub extract: f64,
    pub replenish: f64,
}

impl Default for SecurityDeltas {
    fn default() -> Self {
        Self {
            suppress: 0.05,
            extract: 0.002,
            replenish: 0.004,
        }
    }
}

impl SecurityDeltas {
    /// Security added by threads that are about to land on a target.
    pub fn pending(&self, extract_threads: u64, replenish_threads: u64) -> f64 {
        extract_threads as f64 * self.extract + replenish_threads as f64 * self.replenish
    }
}

/// Scheduler tuning, fixed for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Node the directory traversal starts from
    pub root: String,
    /// Predicted resource fraction at or above which an idle fleet extracts
    pub grow_threshold: f64,
    /// Resource fraction extraction drives a target down to
    pub extract_floor: f64,
    /// Multiplier applied to replenish thread counts
    pub overbook: f64,
    /// Sleep between cycles
    pub cycle_delay: Duration,
    /// Number of entries kept in the activity log
    pub activity_depth: usize,
    /// Number of ranked targets shown in the status report
    pub report_depth: usize,
    /// Keep the root node out of the runner pool
    pub exclude_root_runner: bool,
    /// Use the analytic model when the fleet provides one
    pub use_analytic_model: bool,
    /// Scale target scores down by predicted security overshoot
    pub penalize_security: bool,
    pub security: SecurityDeltas,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            root: "home".to_string(),
            grow_threshold: 0.75,
            extract_floor: 0.05,
            overbook: 1.15,
            cycle_delay: Duration::from_secs(10),
            activity_depth: 8,
            report_depth: 5,
            exclude_root_runner: true,
            use_analytic_model: true,
            penalize_security: true,
            security: SecurityDeltas::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    pub fn with_cycle_delay(mut self, delay: Duration) -> Self {
        self.cycle_delay = delay;
        self
    }

    pub fn with_root_runner(mut self, include: bool) -> Self {
        self.exclude_root_runner = !include;
        self
    }

    pub fn with_analytic_model(mut self, enabled: bool) -> Self {
        self.use_analytic_model = enabled;
        self
    }

    pub fn with_activity_depth(mut self, depth: usize) -> Self {
        self.activity_depth = depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_config_default() {
        let cfg = SchedulerConfig::default();
        assert_eq!(cfg.root, "home");
        assert_eq!(cfg.grow_threshold, 0.75);
        assert_eq!(cfg.extract_floor, 0.05);
        assert_eq!(cfg.overbook, 1.15);
        assert_eq!(cfg.cycle_delay, Duration::from_secs(10));
        assert_eq!(cfg.activity_depth, 8);
        assert!(cfg.exclude_root_runner);
        assert!(cfg.use_analytic_model);
    }

    #[test]
    fn security_deltas_default() {
        let deltas = SecurityDeltas::default();
        assert_eq!(deltas.suppress, 0.05);
        assert_eq!(deltas.extract, 0.002);
        assert_eq!(deltas.replenish, 0.004);
    }

    #[test]
    fn security_deltas_pending() {
        let deltas = SecurityDeltas::default();
        assert_eq!(deltas.pending(0, 0), 0.0);
        assert!((deltas.pending(100, 50) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn scheduler_config_new() {
        let cfg = SchedulerConfig::new("base");
        assert_eq!(cfg.root, "base");
        assert_eq!(cfg.overbook, 1.15);
    }

    #[test]
    fn scheduler_config_builders() {
        let cfg = SchedulerConfig::default()
            .with_cycle_delay(Duration::from_millis(20))
            .with_root_runner(true)
            .with_analytic_model(false)
            .with_activity_depth(6);
        assert_eq!(cfg.cycle_delay, Duration::from_millis(20));
        assert!(!cfg.exclude_root_runner);
        assert!(!cfg.use_analytic_model);
        assert_eq!(cfg.activity_depth, 6);
    }
}
