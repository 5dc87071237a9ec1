use thiserror::Error;

use crate::scheduler::JobKind;

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Dispatch of {threads} {kind} threads on {host} rejected: {reason}")]
    Dispatch {
        kind: JobKind,
        host: String,
        threads: u64,
        reason: String,
    },

    #[error("Fleet error: {0}")]
    Fleet(String),

    #[error("Invalid fleet description: {0}")]
    InvalidFleet(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HarvestError>;
