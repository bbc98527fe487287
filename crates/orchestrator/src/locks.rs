//! Per-lane mutual exclusion

use panel_common::JobKind;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per `(blockchain, kind)` lane.
///
/// Holding the guard serialises the read-decide-write sequence of a trigger,
/// so two requests on the same lane cannot both create a placeholder.
/// Scope is this process only. Lanes nobody holds or waits on are dropped
/// on the next acquire.
#[derive(Default)]
pub struct LaneLocks {
    lanes: Mutex<HashMap<(u64, JobKind), Arc<Mutex<()>>>>,
}

impl LaneLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, blockchain_id: u64, kind: JobKind) -> OwnedMutexGuard<()> {
        let lane = {
            let mut lanes = self.lanes.lock().await;
            // Every holder or waiter keeps its own clone of the lane
            lanes.retain(|_, lane| Arc::strong_count(lane) > 1);
            lanes.entry((blockchain_id, kind)).or_default().clone()
        };
        lane.lock_owned().await
    }

    #[cfg(test)]
    async fn lane_count(&self) -> usize {
        self.lanes.lock().await.len()
    }
}
