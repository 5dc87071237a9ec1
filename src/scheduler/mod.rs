pub mod activity;
pub mod assigner;
pub mod capacity;
pub mod directory;
pub mod estimator;
pub mod inventory;
pub mod job;
pub mod mode;
pub mod predictor;
pub mod sizing;

pub use activity::ActivityLog;
pub use assigner::{allocate, allocate_filler, Allocation};
pub use capacity::RunnerPool;
pub use directory::{Node, Topology};
pub use inventory::{InFlightThreads, Inventory, JobCensus};
pub use job::{JobAssignment, JobHandle, JobKind, RunningJob};
pub use mode::{decide_mode, Mode, ModeDecision};
pub use predictor::TargetState;
pub use sizing::SizingEngine;
