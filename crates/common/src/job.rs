//! Job kinds tracked by the lifecycle ledger

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of CI job a ledger entry tracks.
///
/// Each `(deployment, kind)` pair forms a lane; at most one entry per lane
/// may be active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Build,
    Deploy,
    Update,
    Terminate,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [
        JobKind::Build,
        JobKind::Deploy,
        JobKind::Update,
        JobKind::Terminate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Build => "build",
            JobKind::Deploy => "deploy",
            JobKind::Update => "update",
            JobKind::Terminate => "terminate",
        }
    }

    /// Status written to the ledger once the CI server accepts the job.
    pub fn in_progress_label(&self) -> &'static str {
        match self {
            JobKind::Build => crate::status::RUNNING,
            JobKind::Deploy => crate::status::DEPLOYING,
            JobKind::Update => crate::status::UPDATING,
            JobKind::Terminate => crate::status::TERMINATING,
        }
    }

    /// Whether jobs of this kind promote an earlier Build.
    pub fn requires_parent(&self) -> bool {
        !matches!(self, JobKind::Build)
    }

    /// Promotion target on the CI server, `None` for plain builds.
    pub fn promote_target(&self) -> Option<&'static str> {
        match self {
            JobKind::Build => None,
            JobKind::Deploy => Some("live"),
            JobKind::Update => Some("live-update"),
            JobKind::Terminate => Some("live-terminate"),
        }
    }

    /// Whether an operator may start a job of this kind.
    pub fn is_triggerable(&self) -> bool {
        !matches!(self, JobKind::Update)
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "build" => Ok(JobKind::Build),
            "deploy" => Ok(JobKind::Deploy),
            "update" => Ok(JobKind::Update),
            "terminate" => Ok(JobKind::Terminate),
            other => Err(Error::UnknownJobKind(other.to_string())),
        }
    }
}
