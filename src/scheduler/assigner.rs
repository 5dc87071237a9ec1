use serde::Serialize;

use crate::fleet::Fleet;
use crate::scheduler::capacity::{threads_that_fit, RunnerPool};
use crate::scheduler::{JobAssignment, JobKind};

/// Outcome of packing one requirement onto the runner pool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Allocation {
    pub kind: JobKind,
    pub target: Option<String>,
    pub requested: u64,
    pub placed: u64,
    pub assignments: Vec<JobAssignment>,
}

impl Allocation {
    fn empty(kind: JobKind, target: Option<&str>, requested: u64) -> Self {
        Self {
            kind,
            target: target.map(str::to_string),
            requested,
            placed: 0,
            assignments: Vec::new(),
        }
    }

    /// Threads that could not be placed this cycle.
    pub fn unmet(&self) -> u64 {
        self.requested.saturating_sub(self.placed)
    }
}

/// Greedily pack `required` threads of `kind` onto the pool in directory order.
///
/// Each runner takes as many threads as fit in its free capacity. A rejected
/// dispatch places nothing and drops that runner for the rest of the cycle;
/// whatever remains unplaced is left for the next cycle.
pub fn allocate<F: Fleet + ?Sized>(
    fleet: &mut F,
    pool: &mut RunnerPool,
    kind: JobKind,
    target: Option<&str>,
    required: u64,
) -> Allocation {
    let mut allocation = Allocation::empty(kind, target, required);
    let unit_cost = fleet.unit_cost(kind);
    if required == 0 {
        return allocation;
    }
    if unit_cost <= 0.0 {
        tracing::debug!(kind = %kind, "Skipping job kind with no unit cost");
        return allocation;
    }

    let mut remaining = required;
    let mut index = 0;
    while remaining > 0 && index < pool.len() {
        let slot = &pool.slots()[index];
        let threads = threads_that_fit(slot.free, unit_cost).min(remaining);
        if threads == 0 {
            index += 1;
            continue;
        }
        let runner = slot.hostname.clone();

        match fleet.dispatch(kind, &runner, threads, target) {
            Ok(handle) => {
                tracing::debug!(
                    kind = %kind,
                    runner = %runner,
                    threads,
                    target = ?target,
                    handle = %handle,
                    "Job dispatched"
                );
                remaining -= threads;
                allocation.placed += threads;
                allocation.assignments.push(JobAssignment {
                    kind,
                    runner,
                    threads,
                    target: target.map(str::to_string),
                });
                if !pool.consume(index, threads as f64 * unit_cost) {
                    index += 1;
                }
            }
            Err(e) => {
                tracing::warn!(
                    kind = %kind,
                    runner = %runner,
                    threads,
                    error = %e,
                    "Dispatch rejected, dropping runner for this cycle"
                );
                pool.evict(index);
            }
        }
    }

    allocation
}

/// Hand every runner's leftover capacity to filler jobs.
pub fn allocate_filler<F: Fleet + ?Sized>(fleet: &mut F, pool: &mut RunnerPool) -> Allocation {
    let unit_cost = fleet.unit_cost(JobKind::Filler);
    let capacity: u64 = pool
        .slots()
        .iter()
        .map(|slot| threads_that_fit(slot.free, unit_cost))
        .sum();
    allocate(fleet, pool, JobKind::Filler, None, capacity)
}
