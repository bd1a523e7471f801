//! # Snapshot Cache
//!
//! The current [`Snapshot`] shared between the health checker (sole writer)
//! and request-path readers (admission gate, health endpoints). Readers never
//! trigger probes; they only clone what the last tick produced.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use super::types::{HealthStatus, Snapshot};

#[derive(Debug, Clone, Default)]
pub struct SnapshotCache {
    snapshot: Arc<RwLock<Snapshot>>,
    last_evaluated: Arc<RwLock<Option<Instant>>>,
}

impl SnapshotCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Snapshot {
        self.snapshot.read().await.clone()
    }

    /// Replace the snapshot wholesale. Only the health checker calls this.
    pub async fn replace(&self, snapshot: Snapshot) {
        *self.snapshot.write().await = snapshot;
        *self.last_evaluated.write().await = Some(Instant::now());
    }

    /// Non-blocking status read for the request hot path.
    ///
    /// Lock contention reads as healthy so the gate never rejects on a race.
    pub fn try_status(&self) -> HealthStatus {
        match self.snapshot.try_read() {
            Ok(guard) => guard.status,
            Err(_) => HealthStatus::Healthy,
        }
    }

    /// Non-blocking memory percent read; `None` on contention
    pub fn try_memory_percent(&self) -> Option<f64> {
        self.snapshot.try_read().ok().map(|s| s.memory.percent)
    }

    pub async fn time_since_evaluation(&self) -> Option<std::time::Duration> {
        self.last_evaluated
            .read()
            .await
            .map(|instant| instant.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replace_is_visible_to_clones() {
        let cache = SnapshotCache::new();
        let reader = cache.clone();
        assert_eq!(reader.try_status(), HealthStatus::Healthy);
        assert!(reader.time_since_evaluation().await.is_none());

        let snapshot = Snapshot {
            status: HealthStatus::Error,
            ..Snapshot::default()
        };
        cache.replace(snapshot).await;

        assert_eq!(reader.try_status(), HealthStatus::Error);
        assert_eq!(reader.get().await.status, HealthStatus::Error);
        assert!(reader.time_since_evaluation().await.is_some());
    }
}
