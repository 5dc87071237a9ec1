use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of work a dispatched job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Extract,
    Replenish,
    Suppress,
    Filler,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [
        JobKind::Extract,
        JobKind::Replenish,
        JobKind::Suppress,
        JobKind::Filler,
    ];

    /// Job binary deployed to runners for this kind.
    pub fn binary(self) -> &'static str {
        match self {
            JobKind::Extract => "extract.job",
            JobKind::Replenish => "replenish.job",
            JobKind::Suppress => "suppress.job",
            JobKind::Filler => "filler.job",
        }
    }

    /// Reverse of [`JobKind::binary`]. Jobs started by anything else are not ours.
    pub fn from_binary(binary: &str) -> Option<JobKind> {
        Self::ALL.into_iter().find(|kind| kind.binary() == binary)
    }

    /// Whether jobs of this kind act on a single target.
    pub fn is_targeted(self) -> bool {
        !matches!(self, JobKind::Filler)
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::Extract => write!(f, "extract"),
            JobKind::Replenish => write!(f, "replenish"),
            JobKind::Suppress => write!(f, "suppress"),
            JobKind::Filler => write!(f, "filler"),
        }
    }
}

/// A job observed running on a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningJob {
    pub binary: String,
    pub args: Vec<String>,
    pub threads: u64,
}

impl RunningJob {
    pub fn new(kind: JobKind, threads: u64, target: Option<&str>) -> Self {
        Self {
            binary: kind.binary().to_string(),
            args: target.map(|t| vec![t.to_string()]).unwrap_or_default(),
            threads,
        }
    }

    pub fn kind(&self) -> Option<JobKind> {
        JobKind::from_binary(&self.binary)
    }

    /// The first argument names the target for targeted kinds.
    pub fn target(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }
}

/// Handle returned by an acknowledged dispatch.
pub type JobHandle = Uuid;

/// Placement made by the allocator during one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobAssignment {
    pub kind: JobKind,
    pub runner: String,
    pub threads: u64,
    pub target: Option<String>,
}
