pub mod config;
pub mod dashboard;
pub mod driver;
pub mod error;
pub mod fleet;
pub mod report;
pub mod scheduler;
pub mod shutdown;
