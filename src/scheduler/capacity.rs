use serde::Serialize;

use crate::error::Result;
use crate::fleet::Fleet;
use crate::scheduler::directory::Node;
use crate::scheduler::JobKind;

/// Absorbs floating-point noise when dividing capacity by unit cost.
const CAPACITY_EPSILON: f64 = 1e-9;

/// Free capacity on a runner: total minus what running jobs consume.
pub fn free_capacity<F: Fleet + ?Sized>(fleet: &F, node: &Node) -> Result<f64> {
    let used = fleet.used_capacity(&node.hostname)?;
    Ok((node.max_capacity - used).max(0.0))
}

/// Whole threads of `unit_cost` that fit in `free`.
pub fn threads_that_fit(free: f64, unit_cost: f64) -> u64 {
    if unit_cost <= 0.0 || free <= 0.0 {
        return 0;
    }
    ((free + CAPACITY_EPSILON) / unit_cost).floor() as u64
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunnerSlot {
    pub hostname: String,
    pub free: f64,
}

/// Free capacity of every usable runner for the current cycle.
///
/// Slots keep directory order. A slot is dropped once its free capacity
/// falls below the cheapest unit cost, or when a dispatch to it fails.
#[derive(Debug, Clone)]
pub struct RunnerPool {
    slots: Vec<RunnerSlot>,
    min_unit_cost: f64,
}

impl RunnerPool {
    pub fn new(slots: Vec<RunnerSlot>, min_unit_cost: f64) -> Self {
        let mut pool = Self {
            slots,
            min_unit_cost,
        };
        pool.slots.retain(|s| s.free > 0.0 && s.free + CAPACITY_EPSILON >= min_unit_cost);
        pool
    }

    /// Probe each runner's free capacity.
    pub fn probe<F: Fleet + ?Sized>(fleet: &F, runners: &[&Node]) -> Result<Self> {
        let mut slots = Vec::with_capacity(runners.len());
        for runner in runners {
            let free = free_capacity(fleet, runner)?;
            tracing::trace!(host = %runner.hostname, free, "Runner probed");
            slots.push(RunnerSlot {
                hostname: runner.hostname.clone(),
                free,
            });
        }
        Ok(Self::new(slots, cheapest_unit_cost(fleet)))
    }

    pub fn slots(&self) -> &[RunnerSlot] {
        &self.slots
    }

    pub fn total_free(&self) -> f64 {
        self.slots.iter().map(|s| s.free).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Charge `amount` to the slot at `index`. Returns true if the slot was
    /// dropped because it can no longer fit a thread.
    pub(crate) fn consume(&mut self, index: usize, amount: f64) -> bool {
        let slot = &mut self.slots[index];
        slot.free = (slot.free - amount).max(0.0);
        if slot.free + CAPACITY_EPSILON < self.min_unit_cost || slot.free <= 0.0 {
            self.slots.remove(index);
            true
        } else {
            false
        }
    }

    pub(crate) fn evict(&mut self, index: usize) -> RunnerSlot {
        self.slots.remove(index)
    }
}

/// Smallest positive unit cost across job kinds; zero-cost kinds are ignored.
fn cheapest_unit_cost<F: Fleet + ?Sized>(fleet: &F) -> f64 {
    JobKind::ALL
        .into_iter()
        .map(|kind| fleet.unit_cost(kind))
        .filter(|cost| *cost > 0.0)
        .fold(f64::INFINITY, f64::min)
}
