//! Data models for the deployment orchestrator

use chrono::{DateTime, Utc};
use panel_common::{status, DeploymentStatus, JobKind};
use serde::{Deserialize, Serialize};

/// Maximum number of pre-configured representatives per network
pub const MAX_REPRESENTATIVES: usize = 8;

/// Genesis block material for one network variant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisBlock {
    pub public_key: String,

    /// Only the dev network ships its genesis private key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,

    pub account: String,
    pub work: String,
    pub signature: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisBlocks {
    pub dev: GenesisBlock,
    pub beta: GenesisBlock,
    pub live: GenesisBlock,
    pub test: GenesisBlock,
}

/// Canary block public keys
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanaryKeys {
    pub beta: String,
    pub live: String,
    pub test: String,
}

/// Key pair of a pre-configured representative node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepresentativeKey {
    pub public_key: String,
    pub private_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Representatives {
    pub beta: Vec<RepresentativeKey>,
    pub live: Vec<RepresentativeKey>,
}

/// Peering and RPC ports of one network variant; 0 means unset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodePorts {
    pub peering: u16,
    pub rpc: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkPorts {
    pub live: NodePorts,
    pub beta: NodePorts,
    pub test: NodePorts,
}

/// Software version pins
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionPins {
    pub node: String,
    pub proxy: String,
    pub tools: String,
}

/// Operator-supplied configuration of a blockchain deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainSettings {
    /// Unique ticker-style identifier, at most 4 characters
    pub abbreviation: String,
    pub name: String,
    pub description: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<u64>,

    pub genesis: GenesisBlocks,
    pub canary: CanaryKeys,
    pub faucet_public_key: String,
    pub landing_public_key: String,
    pub representatives: Representatives,
    pub ports: NetworkPorts,
    pub versions: VersionPins,

    pub debug: String,
    pub logging: String,
    pub custom_domain: String,
    pub domain_svc: String,
    pub enable_custom_domain: bool,
    pub binary_public: bool,
    pub number_of_peers: u32,

    /// Explicit bucket name; unset or `"None"` falls back to the prefix scheme
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_bucket_name: Option<String>,

    pub total_supply: String,
    pub denomination: String,
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            abbreviation: String::new(),
            name: String::new(),
            description: String::new(),
            organization: None,
            genesis: GenesisBlocks::default(),
            canary: CanaryKeys::default(),
            faucet_public_key: String::new(),
            landing_public_key: String::new(),
            representatives: Representatives::default(),
            ports: NetworkPorts::default(),
            versions: VersionPins::default(),
            debug: "INFO".to_string(),
            logging: "INFO".to_string(),
            custom_domain: String::new(),
            domain_svc: "verigasvc.com".to_string(),
            enable_custom_domain: false,
            binary_public: false,
            number_of_peers: 2,
            s3_bucket_name: None,
            total_supply: u128::MAX.to_string(),
            denomination: "raw".to_string(),
        }
    }
}

impl ChainSettings {
    /// Check the fields the store relies on; key material is checked at
    /// encode time.
    pub fn validate(&self) -> Result<(), String> {
        let abbr = self.abbreviation.trim();
        if abbr.is_empty() || abbr.len() > 4 {
            return Err("abbreviation must be 1 to 4 characters".to_string());
        }
        if !abbr.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err("abbreviation must be ASCII alphanumeric".to_string());
        }
        if self.representatives.beta.len() > MAX_REPRESENTATIVES
            || self.representatives.live.len() > MAX_REPRESENTATIVES
        {
            return Err(format!(
                "at most {} representatives per network",
                MAX_REPRESENTATIVES
            ));
        }
        Ok(())
    }
}

/// A provisioned blockchain deployment ("BlockChain")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockChain {
    pub id: u64,

    #[serde(flatten)]
    pub settings: ChainSettings,

    /// Display status, set by operators. The ledger is the source of truth
    /// for job progress.
    #[serde(default)]
    pub status: DeploymentStatus,

    pub owner: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub deleted: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<String>,
}

impl BlockChain {
    /// Create a new deployment owned by `actor`
    pub fn new(id: u64, mut settings: ChainSettings, actor: &str) -> Self {
        settings.abbreviation = settings.abbreviation.trim().to_string();
        Self {
            id,
            settings,
            status: DeploymentStatus::Created,
            owner: actor.to_string(),
            created_by: actor.to_string(),
            created_at: Utc::now(),
            deleted: false,
            deleted_at: None,
            deleted_by: None,
        }
    }

    pub fn abbreviation(&self) -> &str {
        &self.settings.abbreviation
    }

    /// Soft delete; the record and its abbreviation stay reserved
    pub fn mark_deleted(&mut self, actor: &str) {
        self.deleted = true;
        self.deleted_at = Some(Utc::now());
        self.deleted_by = Some(actor.to_string());
    }
}

/// One build/deploy/terminate attempt ("BlockChainBuildDeploy")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEntry {
    /// Local id, also sent to the CI server as the correlation token
    pub id: u64,

    pub blockchain_id: u64,

    pub kind: JobKind,

    /// Remote build id, 0 until the CI server assigns one
    pub build_id: u64,

    /// Remote build number, 0 until the CI server assigns one
    pub build_no: u64,

    /// Status in the CI server's vocabulary
    pub status: String,

    /// Ledger id of the Build entry this job promotes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_build_id: Option<u64>,

    /// Remote build number of the promoted Build
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_build_number: Option<u64>,

    pub created_by: String,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobEntry {
    /// Create a placeholder entry for a job the CI server has not seen yet
    pub fn placeholder(
        id: u64,
        chain: &BlockChain,
        kind: JobKind,
        parent: Option<&JobEntry>,
        actor: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            blockchain_id: chain.id,
            kind,
            build_id: 0,
            build_no: 0,
            status: status::CREATED.to_string(),
            parent_build_id: parent.map(|p| p.id),
            parent_build_number: parent.map(|p| p.build_no),
            created_by: actor.to_string(),
            owner: chain.owner.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.build_no == 0
    }

    pub fn is_active(&self) -> bool {
        status::is_active(self.kind, &self.status)
    }

    /// Point the entry at the Build it promotes
    pub fn link_parent(&mut self, parent: &JobEntry) {
        self.parent_build_id = Some(parent.id);
        self.parent_build_number = Some(parent.build_no);
    }

    /// Record the remote identifiers once the CI server accepted the job
    pub fn mark_started(&mut self, build_id: u64, build_no: u64) {
        self.build_id = build_id;
        self.build_no = build_no;
        self.status = self.kind.in_progress_label().to_string();
        self.updated_at = Utc::now();
    }

    /// Record a status reported for the remote job
    pub fn record_status(&mut self, status: &str) {
        self.status = status.to_string();
        self.updated_at = Utc::now();
    }
}

/// Latest entry of one lane
#[derive(Debug, Clone, Serialize)]
pub struct LaneHead {
    pub kind: JobKind,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<JobEntry>,
}

/// Display status and ledger heads side by side; neither is derived from
/// the other.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleView {
    pub blockchain_id: u64,
    pub abbreviation: String,
    pub status: DeploymentStatus,
    pub lanes: Vec<LaneHead>,
}

/// Request to change the display status
#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: DeploymentStatus,
}

/// Status of a job as reported by its pipeline, in the CI server's vocabulary
#[derive(Debug, Deserialize)]
pub struct ReportStatusRequest {
    pub status: String,
}

/// List of deployments
#[derive(Debug, Serialize)]
pub struct BlockChainListResponse {
    pub blockchains: Vec<BlockChain>,
    pub total: usize,
}

/// List of ledger entries for one lane, oldest first
#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub blockchain_id: u64,
    pub kind: JobKind,
    pub jobs: Vec<JobEntry>,
    pub total: usize,
}

/// Remote status pass-through
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub entry_id: u64,
    pub build_no: u64,
    pub remote: serde_json::Value,
}
