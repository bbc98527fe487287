//! Drone CI endpoints and response shapes

use crate::client::{CiRequest, RemoteResponse};
use panel_common::JobKind;
use serde::{Deserialize, Serialize};

/// URL builder for one Drone repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroneEndpoints {
    server: String,
    org: String,
    repo: String,
    branch: String,
}

impl DroneEndpoints {
    pub fn new(
        server: impl Into<String>,
        org: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into().trim_end_matches('/').to_string(),
            org: org.into(),
            repo: repo.into(),
            branch: branch.into(),
        }
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    fn builds_url(&self) -> String {
        format!("{}/api/repos/{}/{}/builds", self.server, self.org, self.repo)
    }

    /// `GET .../builds/{build_no}`
    pub fn build_info(&self, build_no: u64) -> CiRequest {
        CiRequest::get(format!("{}/{}", self.builds_url(), build_no))
    }

    /// `POST .../builds?branch={branch}&{params}`
    pub fn trigger_build(&self, params: Vec<(String, String)>) -> CiRequest {
        CiRequest::post(self.builds_url())
            .with_query([("branch", self.branch.as_str())])
            .with_query(params)
    }

    /// `POST .../builds/{parent}/promote?target={target}&{params}`
    pub fn promote(
        &self,
        parent_build_no: u64,
        target: &str,
        params: Vec<(String, String)>,
    ) -> CiRequest {
        CiRequest::post(format!("{}/{}/promote", self.builds_url(), parent_build_no))
            .with_query([("target", target)])
            .with_query(params)
    }

    /// Trigger request for `kind`; promotions need the parent build number.
    pub fn trigger(
        &self,
        kind: JobKind,
        parent_build_no: Option<u64>,
        params: Vec<(String, String)>,
    ) -> Option<CiRequest> {
        match (kind.promote_target(), parent_build_no) {
            (None, _) => Some(self.trigger_build(params)),
            (Some(target), Some(parent)) => Some(self.promote(parent, target, params)),
            (Some(_), None) => None,
        }
    }
}

/// The fields the orchestrator reads from a Drone build object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteBuild {
    pub id: u64,
    pub number: u64,
    #[serde(default)]
    pub status: Option<String>,
}

impl RemoteBuild {
    /// Parse a build object; `None` when `id` or `number` is missing.
    pub fn from_response(response: &RemoteResponse) -> Option<Self> {
        serde_json::from_value(response.body.clone()).ok()
    }
}

/// Status string of a build object, if present
pub fn remote_status(response: &RemoteResponse) -> Option<&str> {
    response.body.get("status").and_then(|s| s.as_str())
}
