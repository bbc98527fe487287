//! Storage for deployment configurations and the job ledger

use crate::models::{BlockChain, JobEntry};
use anyhow::{Context, Result};
use async_trait::async_trait;
use panel_common::JobKind;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Persistence used by the orchestrator and the API.
///
/// Every ledger write is a single-record insert or update keyed by entry id.
#[async_trait]
pub trait Store: Send + Sync {
    async fn next_blockchain_id(&self) -> Result<u64>;

    /// Insert a new deployment.
    /// Returns Ok(false) if the abbreviation is already taken.
    async fn insert_blockchain(&self, chain: &BlockChain) -> Result<bool>;

    async fn update_blockchain(&self, chain: &BlockChain) -> Result<()>;

    async fn get_blockchain(&self, id: u64) -> Result<Option<BlockChain>>;

    async fn get_blockchain_by_abbreviation(&self, abbreviation: &str)
        -> Result<Option<BlockChain>>;

    /// All deployments, soft-deleted ones included, sorted by abbreviation
    async fn list_blockchains(&self) -> Result<Vec<BlockChain>>;

    /// Reserve the id of the next ledger entry
    async fn next_entry_id(&self) -> Result<u64>;

    async fn insert_entry(&self, entry: &JobEntry) -> Result<()>;

    async fn update_entry(&self, entry: &JobEntry) -> Result<()>;

    async fn get_entry(&self, id: u64) -> Result<Option<JobEntry>>;

    /// Entries of one lane in creation order, newest last
    async fn list_entries(&self, blockchain_id: u64, kind: JobKind) -> Result<Vec<JobEntry>>;

    /// Newest entry of one lane
    async fn most_recent(&self, blockchain_id: u64, kind: JobKind) -> Result<Option<JobEntry>> {
        Ok(self.list_entries(blockchain_id, kind).await?.pop())
    }
}

fn abbreviation_key(abbreviation: &str) -> String {
    format!("blockchain:abbr:{}", abbreviation.trim().to_ascii_uppercase())
}

fn blockchain_key(id: u64) -> String {
    format!("blockchain:{}", id)
}

fn entry_key(id: u64) -> String {
    format!("ledger:entry:{}", id)
}

fn lane_key(blockchain_id: u64, kind: JobKind) -> String {
    format!("ledger:lane:{}:{}", blockchain_id, kind)
}

/// Redis-backed store
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Create a new storage instance
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        info!("Connected to Redis at {}", redis_url);

        Ok(Self { conn })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.conn.clone();
        let json: Option<String> = conn.get(key).await?;

        match json {
            Some(data) => {
                let value = serde_json::from_str(&data)
                    .with_context(|| format!("Failed to deserialize {}", key))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Record and index entry of a freshly reserved deployment, in one transaction
    async fn write_new_blockchain(&self, chain: &BlockChain) -> Result<()> {
        let json = serde_json::to_string(chain)
            .with_context(|| format!("Failed to serialize blockchain {}", chain.id))?;
        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .set(blockchain_key(chain.id), json)
            .ignore()
            .sadd("blockchains:all", chain.id)
            .ignore()
            .query_async(&mut conn)
            .await
            .with_context(|| format!("Failed to store blockchain {}", chain.id))?;
        Ok(())
    }

    async fn set_json<T: serde::Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)
            .with_context(|| format!("Failed to serialize {}", key))?;
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, json).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn next_blockchain_id(&self) -> Result<u64> {
        let mut conn = self.conn.clone();
        let id: u64 = conn.incr("blockchain:next_id", 1).await?;
        Ok(id)
    }

    async fn insert_blockchain(&self, chain: &BlockChain) -> Result<bool> {
        let mut conn = self.conn.clone();

        // SETNX reserves the abbreviation atomically
        let reserved: bool = conn
            .set_nx(abbreviation_key(chain.abbreviation()), chain.id)
            .await?;
        if !reserved {
            debug!("Abbreviation already taken: {}", chain.abbreviation());
            return Ok(false);
        }

        if let Err(err) = self.write_new_blockchain(chain).await {
            warn!(
                "Releasing abbreviation {} after failed insert: {:#}",
                chain.abbreviation(),
                err
            );
            let _: () = conn
                .del(vec![
                    abbreviation_key(chain.abbreviation()),
                    blockchain_key(chain.id),
                ])
                .await
                .context("Failed to release abbreviation")?;
            return Err(err);
        }

        info!("Registered blockchain {} ({})", chain.id, chain.abbreviation());
        Ok(true)
    }

    async fn update_blockchain(&self, chain: &BlockChain) -> Result<()> {
        self.set_json(&blockchain_key(chain.id), chain).await?;
        debug!("Updated blockchain {}", chain.id);
        Ok(())
    }

    async fn get_blockchain(&self, id: u64) -> Result<Option<BlockChain>> {
        self.get_json(&blockchain_key(id)).await
    }

    async fn get_blockchain_by_abbreviation(
        &self,
        abbreviation: &str,
    ) -> Result<Option<BlockChain>> {
        let mut conn = self.conn.clone();
        let id: Option<u64> = conn.get(abbreviation_key(abbreviation)).await?;

        match id {
            Some(id) => self.get_blockchain(id).await,
            None => Ok(None),
        }
    }

    async fn list_blockchains(&self) -> Result<Vec<BlockChain>> {
        let mut conn = self.conn.clone();
        let ids: Vec<u64> = conn.smembers("blockchains:all").await?;

        let mut chains = Vec::new();
        for id in ids {
            if let Some(chain) = self.get_blockchain(id).await? {
                chains.push(chain);
            }
        }
        chains.sort_by(|a, b| a.abbreviation().cmp(b.abbreviation()));

        Ok(chains)
    }

    async fn next_entry_id(&self) -> Result<u64> {
        let mut conn = self.conn.clone();
        let id: u64 = conn.incr("ledger:next_id", 1).await?;
        Ok(id)
    }

    async fn insert_entry(&self, entry: &JobEntry) -> Result<()> {
        self.set_json(&entry_key(entry.id), entry).await?;

        let mut conn = self.conn.clone();
        let _: () = conn
            .rpush(lane_key(entry.blockchain_id, entry.kind), entry.id)
            .await?;

        debug!(
            "Inserted ledger entry {} for {}:{}",
            entry.id, entry.blockchain_id, entry.kind
        );
        Ok(())
    }

    async fn update_entry(&self, entry: &JobEntry) -> Result<()> {
        self.set_json(&entry_key(entry.id), entry).await?;
        debug!("Updated ledger entry {} status: {}", entry.id, entry.status);
        Ok(())
    }

    async fn get_entry(&self, id: u64) -> Result<Option<JobEntry>> {
        self.get_json(&entry_key(id)).await
    }

    async fn list_entries(&self, blockchain_id: u64, kind: JobKind) -> Result<Vec<JobEntry>> {
        let mut conn = self.conn.clone();
        let ids: Vec<u64> = conn.lrange(lane_key(blockchain_id, kind), 0, -1).await?;

        let mut entries = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entry) = self.get_entry(id).await? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    async fn most_recent(&self, blockchain_id: u64, kind: JobKind) -> Result<Option<JobEntry>> {
        let mut conn = self.conn.clone();
        let id: Option<u64> = conn.lindex(lane_key(blockchain_id, kind), -1).await?;

        match id {
            Some(id) => self.get_entry(id).await,
            None => Ok(None),
        }
    }
}

#[derive(Default)]
struct MemoryInner {
    next_blockchain_id: u64,
    next_entry_id: u64,
    blockchains: HashMap<u64, BlockChain>,
    abbreviations: HashMap<String, u64>,
    entries: HashMap<u64, JobEntry>,
    lanes: HashMap<(u64, JobKind), Vec<u64>>,
}

/// In-process store for tests and local runs
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of ledger entries across all lanes
    pub async fn entry_count(&self) -> usize {
        self.inner.read().await.entries.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn next_blockchain_id(&self) -> Result<u64> {
        let mut inner = self.inner.write().await;
        inner.next_blockchain_id += 1;
        Ok(inner.next_blockchain_id)
    }

    async fn insert_blockchain(&self, chain: &BlockChain) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let key = chain.abbreviation().to_ascii_uppercase();
        if inner.abbreviations.contains_key(&key) {
            return Ok(false);
        }
        inner.abbreviations.insert(key, chain.id);
        inner.blockchains.insert(chain.id, chain.clone());
        Ok(true)
    }

    async fn update_blockchain(&self, chain: &BlockChain) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.blockchains.insert(chain.id, chain.clone());
        Ok(())
    }

    async fn get_blockchain(&self, id: u64) -> Result<Option<BlockChain>> {
        Ok(self.inner.read().await.blockchains.get(&id).cloned())
    }

    async fn get_blockchain_by_abbreviation(
        &self,
        abbreviation: &str,
    ) -> Result<Option<BlockChain>> {
        let inner = self.inner.read().await;
        let key = abbreviation.trim().to_ascii_uppercase();
        Ok(inner
            .abbreviations
            .get(&key)
            .and_then(|id| inner.blockchains.get(id))
            .cloned())
    }

    async fn list_blockchains(&self) -> Result<Vec<BlockChain>> {
        let mut chains: Vec<BlockChain> =
            self.inner.read().await.blockchains.values().cloned().collect();
        chains.sort_by(|a, b| a.abbreviation().cmp(b.abbreviation()));
        Ok(chains)
    }

    async fn next_entry_id(&self) -> Result<u64> {
        let mut inner = self.inner.write().await;
        inner.next_entry_id += 1;
        Ok(inner.next_entry_id)
    }

    async fn insert_entry(&self, entry: &JobEntry) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.entries.insert(entry.id, entry.clone());
        inner
            .lanes
            .entry((entry.blockchain_id, entry.kind))
            .or_default()
            .push(entry.id);
        Ok(())
    }

    async fn update_entry(&self, entry: &JobEntry) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.entries.contains_key(&entry.id) {
            anyhow::bail!("Ledger entry not found: {}", entry.id);
        }
        inner.entries.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn get_entry(&self, id: u64) -> Result<Option<JobEntry>> {
        Ok(self.inner.read().await.entries.get(&id).cloned())
    }

    async fn list_entries(&self, blockchain_id: u64, kind: JobKind) -> Result<Vec<JobEntry>> {
        let inner = self.inner.read().await;
        Ok(inner
            .lanes
            .get(&(blockchain_id, kind))
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.entries.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }
}
