use std::collections::HashMap;

use serde::Serialize;

use crate::error::Result;
use crate::fleet::Fleet;
use crate::scheduler::directory::Node;
use crate::scheduler::{JobKind, RunningJob};

/// Threads currently working on one target, by kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InFlightThreads {
    pub extract: u64,
    pub replenish: u64,
    pub suppress: u64,
}

impl InFlightThreads {
    fn add(&mut self, kind: JobKind, threads: u64) {
        match kind {
            JobKind::Extract => self.extract += threads,
            JobKind::Replenish => self.replenish += threads,
            JobKind::Suppress => self.suppress += threads,
            JobKind::Filler => {}
        }
    }

    pub fn is_idle(&self) -> bool {
        self.extract == 0 && self.replenish == 0 && self.suppress == 0
    }
}

/// Fleet-wide thread totals by kind, straight from the job listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCensus {
    pub extract: u64,
    pub replenish: u64,
    pub suppress: u64,
    pub filler: u64,
}

impl JobCensus {
    pub fn add(&mut self, kind: JobKind, threads: u64) {
        match kind {
            JobKind::Extract => self.extract += threads,
            JobKind::Replenish => self.replenish += threads,
            JobKind::Suppress => self.suppress += threads,
            JobKind::Filler => self.filler += threads,
        }
    }

    pub fn get(&self, kind: JobKind) -> u64 {
        match kind {
            JobKind::Extract => self.extract,
            JobKind::Replenish => self.replenish,
            JobKind::Suppress => self.suppress,
            JobKind::Filler => self.filler,
        }
    }

    pub fn from_jobs<'a>(jobs: impl IntoIterator<Item = &'a RunningJob>) -> Self {
        let mut census = Self::default();
        for job in jobs {
            if let Some(kind) = job.kind() {
                census.add(kind, job.threads);
            }
        }
        census
    }
}

/// Everything running across the fleet, rebuilt from live listings each cycle.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    per_target: HashMap<String, InFlightThreads>,
    census: JobCensus,
}

impl Inventory {
    /// List jobs on every node, including ones excluded from the runner pool.
    pub fn collect<F: Fleet + ?Sized>(fleet: &F, nodes: &[Node]) -> Result<Self> {
        let mut jobs = Vec::new();
        for node in nodes {
            jobs.extend(fleet.running_jobs(&node.hostname)?);
        }
        Ok(Self::from_jobs(&jobs))
    }

    pub fn from_jobs(jobs: &[RunningJob]) -> Self {
        let mut per_target: HashMap<String, InFlightThreads> = HashMap::new();
        for job in jobs {
            let (Some(kind), Some(target)) = (job.kind(), job.target()) else {
                continue;
            };
            if kind.is_targeted() {
                per_target
                    .entry(target.to_string())
                    .or_default()
                    .add(kind, job.threads);
            }
        }

        Self {
            per_target,
            census: JobCensus::from_jobs(jobs),
        }
    }

    /// In-flight threads for `target`; zero when nothing is running against it.
    pub fn threads_for(&self, target: &str) -> InFlightThreads {
        self.per_target.get(target).copied().unwrap_or_default()
    }

    pub fn census(&self) -> JobCensus {
        self.census
    }
}
