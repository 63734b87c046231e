use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use crate::db::SnapshotSource;
use crate::models::Snapshot;

struct Cached {
    epoch: u64,
    snapshot: Arc<Snapshot>,
}

/// Memoizes one snapshot per TTL window. The window a request falls in is its
/// epoch, `unix_seconds / ttl_seconds`; a snapshot is served only to requests
/// of the epoch it was loaded in.
pub struct SnapshotCache {
    source: Arc<dyn SnapshotSource>,
    ttl_secs: u64,
    slot: RwLock<Option<Cached>>,
    reload: Mutex<()>,
}

impl SnapshotCache {
    pub fn new(source: Arc<dyn SnapshotSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl_secs: ttl.as_secs().max(1),
            slot: RwLock::new(None),
            reload: Mutex::new(()),
        }
    }

    pub fn epoch(&self, now: DateTime<Utc>) -> u64 {
        now.timestamp().max(0) as u64 / self.ttl_secs
    }

    pub async fn get(&self) -> anyhow::Result<Arc<Snapshot>> {
        self.get_at(Utc::now()).await
    }

    pub async fn get_at(&self, now: DateTime<Utc>) -> anyhow::Result<Arc<Snapshot>> {
        let epoch = self.epoch(now);
        if let Some(snapshot) = self.lookup(epoch).await {
            return Ok(snapshot);
        }

        // One loader per epoch; whoever waited here finds the fresh snapshot.
        let _reload = self.reload.lock().await;
        if let Some(snapshot) = self.lookup(epoch).await {
            return Ok(snapshot);
        }

        let snapshot = match self.source.load().await {
            Ok(snapshot) => Arc::new(snapshot),
            Err(err) => {
                tracing::error!(error = %err, "snapshot load failed");
                return Err(err);
            }
        };
        tracing::info!(
            epoch,
            users = snapshot.users.len(),
            logs = snapshot.logs.len(),
            broadcasts = snapshot.broadcasts.len(),
            admins = snapshot.admins.len(),
            "snapshot reloaded"
        );

        *self.slot.write().await = Some(Cached {
            epoch,
            snapshot: Arc::clone(&snapshot),
        });
        Ok(snapshot)
    }

    async fn lookup(&self, epoch: u64) -> Option<Arc<Snapshot>> {
        let slot = self.slot.read().await;
        slot.as_ref()
            .filter(|cached| cached.epoch == epoch)
            .map(|cached| Arc::clone(&cached.snapshot))
    }
}
