//! CI status vocabulary and the deployment display status
//!
//! Ledger entries carry the CI server's own free-text status strings. The
//! sets below decide which of those keep a lane busy.

use crate::error::Error;
use crate::job::JobKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const CREATED: &str = "created";
pub const PENDING: &str = "pending";
pub const RUNNING: &str = "running";
pub const SUCCESS: &str = "success";
pub const FAILURE: &str = "failure";
pub const ERROR: &str = "error";
pub const KILLED: &str = "killed";
pub const DEPLOYING: &str = "deploying";
pub const UPDATING: &str = "updating";
pub const TERMINATING: &str = "terminating";

/// Remote statuses that mean a job is still live on the CI server.
/// A trigger is refused while the lane's current job reports one of these.
pub const LIVE_REMOTE: [&str; 3] = [SUCCESS, RUNNING, PENDING];

/// True iff the entry status keeps the lane busy for `kind`.
pub fn is_active(kind: JobKind, status: &str) -> bool {
    matches!(status, CREATED | PENDING | RUNNING) || status == kind.in_progress_label()
}

/// True iff a new trigger should target the existing entry instead of
/// creating a fresh placeholder.
pub fn is_reusable(kind: JobKind, status: &str) -> bool {
    status == SUCCESS || is_active(kind, status)
}

/// True iff the remote status reported by the CI server blocks a new trigger.
pub fn blocks_trigger(remote_status: &str) -> bool {
    LIVE_REMOTE.contains(&remote_status)
}

/// Display status of a deployment configuration.
///
/// Set by operators; the ledger never writes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    #[default]
    Created,
    Deploying,
    Deployed,
    Pending,
    Suspended,
    Error,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Created => "created",
            DeploymentStatus::Deploying => "deploying",
            DeploymentStatus::Deployed => "deployed",
            DeploymentStatus::Pending => "pending",
            DeploymentStatus::Suspended => "suspended",
            DeploymentStatus::Error => "error",
        }
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" => Ok(DeploymentStatus::Created),
            "deploying" => Ok(DeploymentStatus::Deploying),
            "deployed" => Ok(DeploymentStatus::Deployed),
            "pending" => Ok(DeploymentStatus::Pending),
            "suspended" => Ok(DeploymentStatus::Suspended),
            "error" => Ok(DeploymentStatus::Error),
            other => Err(Error::UnknownDeploymentStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_set_is_kind_dependent() {
        assert!(is_active(JobKind::Build, "running"));
        assert!(is_active(JobKind::Deploy, "deploying"));
        assert!(is_active(JobKind::Terminate, "created"));
        assert!(!is_active(JobKind::Build, "deploying"));
        assert!(!is_active(JobKind::Deploy, "terminating"));
        assert!(!is_active(JobKind::Build, "success"));
        assert!(!is_active(JobKind::Build, "failure"));
    }

    #[test]
    fn test_reusable_includes_success_but_not_failure() {
        assert!(is_reusable(JobKind::Build, "success"));
        assert!(is_reusable(JobKind::Terminate, "terminating"));
        assert!(!is_reusable(JobKind::Build, "failure"));
        assert!(!is_reusable(JobKind::Deploy, "killed"));
    }

    #[test]
    fn test_blocks_trigger() {
        assert!(blocks_trigger("running"));
        assert!(blocks_trigger("pending"));
        assert!(blocks_trigger("success"));
        assert!(!blocks_trigger("failure"));
        assert!(!blocks_trigger("error"));
    }

    #[test]
    fn test_deployment_status_round_trip_text() {
        assert_eq!(
            "Suspended".parse::<DeploymentStatus>().unwrap(),
            DeploymentStatus::Suspended
        );
        assert!("gone".parse::<DeploymentStatus>().is_err());
    }
}
