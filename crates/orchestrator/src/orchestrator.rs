//! Lifecycle orchestrator
//!
//! Decides, per `(blockchain, kind)` lane, whether a new CI job may start,
//! creates or reuses the ledger entry for it, fires the trigger through the
//! CI gateway and reconciles the response into the ledger.
//!
//! Lane states: no entry, `created` placeholder, active
//! (`running`/`pending`/`deploying`/`terminating`) and terminal
//! (`success`/`failure`). Pipelines report terminal statuses back through
//! [`Orchestrator::report_status`]. A terminal lane only moves back to
//! `created` via a new trigger once the CI server no longer reports its job
//! as live.

use crate::auth::{require_admin, Principal};
use crate::error::OrchestratorError;
use crate::locks::LaneLocks;
use crate::models::{BlockChain, JobEntry, LaneHead, LifecycleView};
use crate::params::ParameterEncoder;
use crate::storage::Store;
use ci_gateway::drone::remote_status;
use ci_gateway::{CiGateway, DroneEndpoints, RemoteBuild, RemoteResponse};
use panel_common::{status, JobKind};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Non-fatal result of [`Orchestrator::trigger`]
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TriggerOutcome {
    /// The CI server accepted the job; the entry carries its remote ids
    Triggered { entry: JobEntry },

    /// The lane's current job is still live on the CI server
    Conflict {
        entry: JobEntry,
        current_status: String,
    },

    /// The CI server answered without a usable build object; the entry is
    /// left as it was so the trigger can be retried
    RemoteAnomaly { entry: JobEntry, detail: String },
}

impl TriggerOutcome {
    pub fn entry(&self) -> &JobEntry {
        match self {
            TriggerOutcome::Triggered { entry }
            | TriggerOutcome::Conflict { entry, .. }
            | TriggerOutcome::RemoteAnomaly { entry, .. } => entry,
        }
    }
}

pub struct Orchestrator {
    store: Arc<dyn Store>,
    gateway: Arc<dyn CiGateway>,
    endpoints: DroneEndpoints,
    encoder: ParameterEncoder,
    locks: LaneLocks,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn CiGateway>,
        endpoints: DroneEndpoints,
        encoder: ParameterEncoder,
    ) -> Self {
        Self {
            store,
            gateway,
            endpoints,
            encoder,
            locks: LaneLocks::new(),
        }
    }

    /// Start (or re-fire) a `kind` job for `blockchain_id` on behalf of `actor`
    pub async fn trigger(
        &self,
        blockchain_id: u64,
        kind: JobKind,
        actor: &Principal,
    ) -> Result<TriggerOutcome> {
        require_admin(actor)?;
        if !kind.is_triggerable() {
            return Err(OrchestratorError::UnsupportedKind(kind));
        }

        let _lane = self.locks.acquire(blockchain_id, kind).await;

        let chain = self.load_blockchain(blockchain_id).await?;
        let parent = if kind.requires_parent() {
            Some(self.load_parent(&chain).await?)
        } else {
            None
        };

        let latest = self.store.most_recent(blockchain_id, kind).await?;
        let reused = match latest {
            Some(entry) if status::is_reusable(kind, &entry.status) => {
                if let Some(current) = self.probe(&entry).await? {
                    if status::blocks_trigger(&current) {
                        info!(
                            "Refusing {} for {}: build #{} is {}",
                            kind,
                            chain.abbreviation(),
                            entry.build_no,
                            current
                        );
                        return Ok(TriggerOutcome::Conflict {
                            entry,
                            current_status: current,
                        });
                    }
                }
                Some(entry)
            }
            _ => None,
        };

        let entry_id = match &reused {
            Some(entry) => entry.id,
            None => self.store.next_entry_id().await?,
        };
        let params = self.encoder.encode(kind, &chain, entry_id)?;
        let request = self
            .endpoints
            .trigger(kind, parent.as_ref().map(|p| p.build_no), params)
            .ok_or_else(|| {
                OrchestratorError::PreconditionFailed(format!("{} requires a parent build", kind))
            })?;

        let mut entry = match reused {
            Some(mut entry) => {
                // The promotion targets the newest Build, which may have moved
                if let Some(parent) = &parent {
                    entry.link_parent(parent);
                }
                info!("Reusing ledger entry {} for {} {}", entry.id, kind, chain.abbreviation());
                entry
            }
            None => {
                let entry =
                    JobEntry::placeholder(entry_id, &chain, kind, parent.as_ref(), &actor.email);
                self.store.insert_entry(&entry).await?;
                info!(
                    "Created placeholder entry {} for {} {}",
                    entry.id,
                    kind,
                    chain.abbreviation()
                );
                entry
            }
        };

        let response = self.gateway.send(request).await.map_err(|e| {
            error!("CI trigger for entry {} failed: {}", entry.id, e);
            e
        })?;

        match RemoteBuild::from_response(&response) {
            Some(remote) => {
                entry.mark_started(remote.id, remote.number);
                self.store.update_entry(&entry).await?;
                info!(
                    "{} {} started as build #{} (id {})",
                    kind,
                    chain.abbreviation(),
                    remote.number,
                    remote.id
                );
                Ok(TriggerOutcome::Triggered { entry })
            }
            None => {
                let detail = format!("CI response without build id/number: {}", response.body);
                warn!("Ledger entry {}: {}", entry.id, detail);
                Ok(TriggerOutcome::RemoteAnomaly { entry, detail })
            }
        }
    }

    /// Fetch the CI server's view of a ledger entry's build
    pub async fn status(&self, entry_id: u64) -> Result<(JobEntry, RemoteResponse)> {
        let entry = self.load_entry(entry_id).await?;

        if entry.is_placeholder() {
            return Err(OrchestratorError::PreconditionFailed(format!(
                "ledger entry {} has no remote build yet",
                entry_id
            )));
        }

        let response = self
            .gateway
            .send(self.endpoints.build_info(entry.build_no))
            .await?;
        Ok((entry, response))
    }

    /// Write the status a pipeline reported for its job into the ledger.
    ///
    /// `entry_id` is the correlation token the pipeline was started with.
    pub async fn report_status(
        &self,
        entry_id: u64,
        reported: &str,
        actor: &Principal,
    ) -> Result<JobEntry> {
        require_admin(actor)?;

        let reported = reported.trim().to_ascii_lowercase();
        if reported.is_empty() {
            return Err(OrchestratorError::PreconditionFailed(
                "reported status must not be empty".to_string(),
            ));
        }

        let located = self.load_entry(entry_id).await?;
        let _lane = self.locks.acquire(located.blockchain_id, located.kind).await;

        // Re-read under the lane lock so a concurrent trigger is not overwritten
        let mut entry = self.load_entry(entry_id).await?;
        let previous = std::mem::take(&mut entry.status);
        entry.record_status(&reported);
        self.store.update_entry(&entry).await?;

        info!(
            "Ledger entry {} ({} build #{}): {} -> {}",
            entry.id, entry.kind, entry.build_no, previous, entry.status
        );
        Ok(entry)
    }

    /// All entries of one lane, newest last
    pub async fn list(&self, blockchain_id: u64, kind: JobKind) -> Result<Vec<JobEntry>> {
        self.load_blockchain(blockchain_id).await?;
        Ok(self.store.list_entries(blockchain_id, kind).await?)
    }

    /// Display status next to the newest entry of every lane
    pub async fn lifecycle(&self, blockchain_id: u64) -> Result<LifecycleView> {
        let chain = self.load_blockchain(blockchain_id).await?;

        let mut lanes = Vec::with_capacity(JobKind::ALL.len());
        for kind in JobKind::ALL {
            let latest = self.store.most_recent(blockchain_id, kind).await?;
            lanes.push(LaneHead {
                kind,
                active: latest.as_ref().is_some_and(JobEntry::is_active),
                latest,
            });
        }

        Ok(LifecycleView {
            blockchain_id,
            abbreviation: chain.abbreviation().to_string(),
            status: chain.status,
            lanes,
        })
    }

    async fn load_blockchain(&self, blockchain_id: u64) -> Result<BlockChain> {
        match self.store.get_blockchain(blockchain_id).await? {
            Some(chain) if !chain.deleted => Ok(chain),
            _ => Err(OrchestratorError::NotFound(format!(
                "blockchain {}",
                blockchain_id
            ))),
        }
    }

    async fn load_entry(&self, entry_id: u64) -> Result<JobEntry> {
        self.store
            .get_entry(entry_id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("ledger entry {}", entry_id)))
    }

    /// Newest Build entry; promotions need one the CI server knows about
    async fn load_parent(&self, chain: &BlockChain) -> Result<JobEntry> {
        let parent = self
            .store
            .most_recent(chain.id, JobKind::Build)
            .await?
            .ok_or_else(|| {
                OrchestratorError::PreconditionFailed(format!(
                    "{} has no build to promote",
                    chain.abbreviation()
                ))
            })?;

        if parent.is_placeholder() {
            return Err(OrchestratorError::PreconditionFailed(format!(
                "build entry {} of {} has no remote build yet",
                parent.id,
                chain.abbreviation()
            )));
        }
        Ok(parent)
    }

    /// Remote status of the entry's build, `None` for placeholders
    async fn probe(&self, entry: &JobEntry) -> Result<Option<String>> {
        if entry.is_placeholder() {
            return Ok(None);
        }

        let response = self
            .gateway
            .send(self.endpoints.build_info(entry.build_no))
            .await
            .map_err(|e| {
                error!("Status probe of build #{} failed: {}", entry.build_no, e);
                e
            })?;

        let current = remote_status(&response).map(str::to_string);
        debug!("Build #{} remote status: {:?}", entry.build_no, current);
        Ok(current)
    }
}
