//! Circuit breaker wrapper for snapshot storage operations

use std::sync::Arc;

use async_trait::async_trait;
use standings_domain::{Snapshot, SnapshotStorage};
use standings_errors::StandingsResult;

use crate::circuit_breaker::CircuitBreaker;

/// Circuit breaker wrapper for SnapshotStorage
pub struct CircuitBreakerSnapshotStorage {
    inner: Arc<dyn SnapshotStorage>,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl CircuitBreakerSnapshotStorage {
    pub fn new(inner: Arc<dyn SnapshotStorage>, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        Self {
            inner,
            circuit_breaker,
        }
    }
}

#[async_trait]
impl SnapshotStorage for CircuitBreakerSnapshotStorage {
    async fn save(&self, snapshot: &Snapshot) -> StandingsResult<String> {
        self.circuit_breaker
            .execute(|| {
                let inner = self.inner.clone();
                let snapshot = snapshot.clone();
                async move { inner.save(&snapshot).await }
            })
            .await
    }

    async fn load(&self, snapshot_id: &str) -> StandingsResult<Snapshot> {
        self.circuit_breaker
            .execute(|| {
                let inner = self.inner.clone();
                let snapshot_id = snapshot_id.to_string();
                async move { inner.load(&snapshot_id).await }
            })
            .await
    }

    async fn list(&self) -> StandingsResult<Vec<Snapshot>> {
        self.circuit_breaker
            .execute(|| {
                let inner = self.inner.clone();
                async move { inner.list().await }
            })
            .await
    }

    async fn delete(&self, snapshot_id: &str) -> StandingsResult<bool> {
        self.circuit_breaker
            .execute(|| {
                let inner = self.inner.clone();
                let snapshot_id = snapshot_id.to_string();
                async move { inner.delete(&snapshot_id).await }
            })
            .await
    }

    async fn ping(&self) -> StandingsResult<()> {
        // 健康检查直接访问存储，不受熔断影响
        self.inner.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::SNAPSHOT_STORAGE;
    use crate::file_snapshot_storage::FileSnapshotStorage;
    use standings_config::{CircuitBreakerConfig, CircuitState};
    use standings_errors::StandingsError;

    #[tokio::test]
    async fn test_not_found_passes_through_without_tripping() {
        let dir = tempfile::tempdir().unwrap();
        let breaker = Arc::new(CircuitBreaker::with_config(
            SNAPSHOT_STORAGE,
            CircuitBreakerConfig {
                failure_threshold: 1,
                ..Default::default()
            },
        ));
        let storage = CircuitBreakerSnapshotStorage::new(
            Arc::new(FileSnapshotStorage::new(dir.path())),
            Arc::clone(&breaker),
        );

        assert!(matches!(
            storage.load("snapshot_missing").await,
            Err(StandingsError::SnapshotNotFound { .. })
        ));
        assert_eq!(breaker.get_state().await, CircuitState::Closed);
        assert!(storage.list().await.unwrap().is_empty());
    }
}
