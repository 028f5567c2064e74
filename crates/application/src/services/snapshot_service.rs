use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use standings_config::SnapshotConfig;
use standings_domain::{
    ScopeKey, Snapshot, SnapshotStorage, SnapshotSummary, StandingsRow, StandingsStore,
};
use standings_errors::{StandingsError, StandingsResult};

/// 恢复结果
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RestoreOutcome {
    pub snapshot_id: String,
    pub liga_id: i64,
    pub saison_id: i64,
    pub rows_restored: usize,
    /// 恢复前自动创建的安全快照
    pub safety_snapshot_id: String,
}

/// 积分榜快照服务
pub struct SnapshotService {
    store: Arc<dyn StandingsStore>,
    storage: Arc<dyn SnapshotStorage>,
    config: SnapshotConfig,
}

/// 参与校验和计算的快照内容
#[derive(Serialize)]
struct ChecksumInput<'a> {
    id: &'a str,
    liga_id: i64,
    saison_id: i64,
    created_at: DateTime<Utc>,
    description: &'a str,
    data: &'a [StandingsRow],
}

/// 快照头部与积分榜数据的 SHA-256 校验和（十六进制），不含 `checksum` 字段本身
pub fn compute_checksum(snapshot: &Snapshot) -> StandingsResult<String> {
    let bytes = serde_json::to_vec(&ChecksumInput {
        id: &snapshot.id,
        liga_id: snapshot.liga_id,
        saison_id: snapshot.saison_id,
        created_at: snapshot.created_at,
        description: &snapshot.description,
        data: &snapshot.data,
    })?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

fn verify(snapshot: &Snapshot) -> StandingsResult<()> {
    let actual = compute_checksum(snapshot)?;
    if actual != snapshot.checksum {
        return Err(StandingsError::CorruptSnapshot {
            id: snapshot.id.clone(),
            expected: snapshot.checksum.clone(),
            actual,
        });
    }

    // 每一行都必须属于快照的作用域
    let scope = snapshot.scope();
    if let Some(row) = snapshot.data.iter().find(|row| row.scope() != scope) {
        return Err(StandingsError::CorruptSnapshot {
            id: snapshot.id.clone(),
            expected: scope.to_string(),
            actual: row.scope().to_string(),
        });
    }
    Ok(())
}

fn newest_first(snapshots: &mut [Snapshot]) {
    snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
}

impl SnapshotService {
    pub fn new(
        store: Arc<dyn StandingsStore>,
        storage: Arc<dyn SnapshotStorage>,
        config: SnapshotConfig,
    ) -> Self {
        Self {
            store,
            storage,
            config,
        }
    }

    /// 保存作用域当前的积分榜并执行保留策略
    pub async fn create_snapshot(
        &self,
        liga_id: i64,
        saison_id: i64,
        description: &str,
    ) -> StandingsResult<String> {
        let scope = ScopeKey::new(liga_id, saison_id)?;
        let snapshot_id = self.capture(scope, description).await?;

        if let Err(e) = self.prune_scope(scope, &[]).await {
            warn!(liga_id, saison_id, error = %e, "snapshot retention failed");
        }
        Ok(snapshot_id)
    }

    async fn capture(&self, scope: ScopeKey, description: &str) -> StandingsResult<String> {
        let data = self
            .store
            .find_standings(scope.liga_id, scope.saison_id)
            .await?;
        let mut snapshot = Snapshot {
            id: format!(
                "snapshot_{}_{}_{}",
                scope.liga_id,
                scope.saison_id,
                Uuid::new_v4().simple()
            ),
            liga_id: scope.liga_id,
            saison_id: scope.saison_id,
            data,
            created_at: Utc::now(),
            description: description.to_string(),
            checksum: String::new(),
            location: None,
        };
        snapshot.checksum = compute_checksum(&snapshot)?;

        let location = self.storage.save(&snapshot).await?;
        info!(
            snapshot_id = %snapshot.id,
            liga_id = scope.liga_id,
            saison_id = scope.saison_id,
            rows = snapshot.data.len(),
            location = %location,
            "snapshot created"
        );
        Ok(snapshot.id)
    }

    /// 读取并校验快照
    pub async fn get_snapshot(&self, snapshot_id: &str) -> StandingsResult<Snapshot> {
        let snapshot = self.storage.load(snapshot_id).await?;
        verify(&snapshot)?;
        Ok(snapshot)
    }

    /// 按时间倒序列出快照，任何一个校验失败都会返回错误
    pub async fn list_snapshots(
        &self,
        liga_id: Option<i64>,
        saison_id: Option<i64>,
    ) -> StandingsResult<Vec<SnapshotSummary>> {
        let mut snapshots: Vec<Snapshot> = self
            .storage
            .list()
            .await?
            .into_iter()
            .filter(|s| liga_id.map_or(true, |id| s.liga_id == id))
            .filter(|s| saison_id.map_or(true, |id| s.saison_id == id))
            .collect();

        for snapshot in &snapshots {
            verify(snapshot)?;
        }
        newest_first(&mut snapshots);
        Ok(snapshots.iter().map(Snapshot::summary).collect())
    }

    /// 用快照数据替换作用域的积分榜
    ///
    /// 替换前先保存当前积分榜作为安全快照，替换在单个事务内完成。
    pub async fn restore_snapshot(&self, snapshot_id: &str) -> StandingsResult<RestoreOutcome> {
        let snapshot = self.get_snapshot(snapshot_id).await?;
        let scope = snapshot.scope();

        let safety_snapshot_id = self
            .capture(scope, &format!("pre-restore {snapshot_id}"))
            .await?;

        let mut tx = self.store.begin().await?;
        let replaced = tx
            .replace_standings(scope.liga_id, scope.saison_id, &snapshot.data)
            .await;
        match replaced {
            Ok(()) => tx.commit().await?,
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(snapshot_id, error = %rollback_err, "rollback failed");
                }
                return Err(e);
            }
        }

        info!(
            snapshot_id,
            safety_snapshot_id = %safety_snapshot_id,
            liga_id = scope.liga_id,
            saison_id = scope.saison_id,
            rows = snapshot.data.len(),
            "snapshot restored"
        );

        // 刚恢复的快照与安全快照不会被本次清理删除
        if let Err(e) = self
            .prune_scope(scope, &[snapshot_id, safety_snapshot_id.as_str()])
            .await
        {
            warn!(snapshot_id, error = %e, "snapshot retention failed");
        }

        Ok(RestoreOutcome {
            snapshot_id: snapshot.id,
            liga_id: scope.liga_id,
            saison_id: scope.saison_id,
            rows_restored: snapshot.data.len(),
            safety_snapshot_id,
        })
    }

    pub async fn delete_snapshot(&self, snapshot_id: &str) -> StandingsResult<()> {
        if !self.storage.delete(snapshot_id).await? {
            return Err(StandingsError::SnapshotNotFound {
                id: snapshot_id.to_string(),
            });
        }
        info!(snapshot_id, "snapshot deleted");
        Ok(())
    }

    /// 对所有作用域执行保留策略，返回删除的快照数
    pub async fn cleanup_snapshots(&self) -> StandingsResult<usize> {
        let snapshots = self.storage.list().await?;
        let mut scopes: Vec<ScopeKey> = snapshots.iter().map(Snapshot::scope).collect();
        scopes.sort();
        scopes.dedup();

        let mut removed = 0;
        for scope in scopes {
            removed += self.prune(scope, &snapshots, &[]).await?;
        }
        if removed > 0 {
            info!(removed, "snapshot cleanup finished");
        }
        Ok(removed)
    }

    async fn prune_scope(&self, scope: ScopeKey, keep: &[&str]) -> StandingsResult<usize> {
        let snapshots = self.storage.list().await?;
        self.prune(scope, &snapshots, keep).await
    }

    /// 保留最新的 `max_snapshots` 个且未超过 `max_age` 的快照，`keep` 中的快照不删除
    async fn prune(
        &self,
        scope: ScopeKey,
        all: &[Snapshot],
        keep: &[&str],
    ) -> StandingsResult<usize> {
        let mut in_scope: Vec<Snapshot> = all
            .iter()
            .filter(|s| s.scope() == scope)
            .cloned()
            .collect();
        newest_first(&mut in_scope);

        let cutoff = Utc::now() - chrono::Duration::days(self.config.max_age_days as i64);
        let mut removed = 0;
        for (index, snapshot) in in_scope.iter().enumerate() {
            if keep.contains(&snapshot.id.as_str()) {
                continue;
            }
            if index >= self.config.max_snapshots || snapshot.created_at < cutoff {
                if self.storage.delete(&snapshot.id).await? {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use standings_infrastructure::{FileSnapshotStorage, InMemoryStandingsStore};
    use standings_testing_utils::{LeagueFixture, StandingsRowBuilder};

    struct Fixture {
        service: SnapshotService,
        store: InMemoryStandingsStore,
        storage: Arc<FileSnapshotStorage>,
        _dir: tempfile::TempDir,
    }

    async fn fixture(max_snapshots: usize) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = LeagueFixture::bundesliga().seed().await;
        store
            .put_standings(vec![
                StandingsRowBuilder::new(1, "Bayern").record(2, 0, 0, 5, 1).platz(1).build(),
                StandingsRowBuilder::new(2, "Dortmund").record(0, 1, 1, 2, 4).platz(2).build(),
            ])
            .await;
        let storage = Arc::new(FileSnapshotStorage::new(dir.path()));
        let config = SnapshotConfig {
            directory: dir.path().display().to_string(),
            max_snapshots,
            max_age_days: 30,
        };
        Fixture {
            service: SnapshotService::new(Arc::new(store.clone()), storage.clone(), config),
            store,
            storage,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip_reproduces_rows() {
        let f = fixture(10).await;
        let original = f.store.find_standings(1, 2024).await.unwrap();

        let id = f.service.create_snapshot(1, 2024, "Spieltag 2").await.unwrap();
        let snapshot = f.service.get_snapshot(&id).await.unwrap();
        assert_eq!(snapshot.data, original);
        assert_eq!(snapshot.checksum, compute_checksum(&snapshot).unwrap());

        // 修改积分榜后恢复
        f.store
            .put_standings(vec![StandingsRowBuilder::new(1, "Bayern").platz(2).build()])
            .await;
        let outcome = f.service.restore_snapshot(&id).await.unwrap();
        assert_eq!(outcome.rows_restored, 2);
        assert_eq!(f.store.find_standings(1, 2024).await.unwrap(), original);

        let safety = f.service.get_snapshot(&outcome.safety_snapshot_id).await.unwrap();
        assert!(safety.description.starts_with("pre-restore"));
        assert_eq!(safety.data[0].platz, 2);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_detected() {
        let f = fixture(10).await;
        let id = f.service.create_snapshot(1, 2024, "before").await.unwrap();

        let mut tampered = f.storage.load(&id).await.unwrap();
        tampered.data[0].punkte = 99;
        f.storage.save(&tampered).await.unwrap();

        assert!(matches!(
            f.service.get_snapshot(&id).await,
            Err(StandingsError::CorruptSnapshot { .. })
        ));
        assert!(matches!(
            f.service.restore_snapshot(&id).await,
            Err(StandingsError::CorruptSnapshot { .. })
        ));
        assert!(f.service.list_snapshots(Some(1), None).await.is_err());
    }

    #[tokio::test]
    async fn test_retention_keeps_newest_per_scope() {
        let f = fixture(2).await;
        let mut ids = Vec::new();
        for i in 0..4 {
            ids.push(f.service.create_snapshot(1, 2024, &format!("#{i}")).await.unwrap());
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        let other_scope = f.service.create_snapshot(1, 2023, "other").await.unwrap();

        let listed = f.service.list_snapshots(Some(1), Some(2024)).await.unwrap();
        let listed_ids: Vec<&str> = listed.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(listed_ids, vec![ids[3].as_str(), ids[2].as_str()]);

        let all = f.service.list_snapshots(Some(1), None).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().any(|s| s.id == other_scope));
    }

    #[tokio::test]
    async fn test_cleanup_removes_expired_snapshots() {
        let f = fixture(10).await;
        let id = f.service.create_snapshot(1, 2024, "old").await.unwrap();

        let mut old = f.storage.load(&id).await.unwrap();
        old.created_at = Utc::now() - chrono::Duration::days(31);
        old.checksum = compute_checksum(&old).unwrap();
        f.storage.save(&old).await.unwrap();
        f.service.create_snapshot(1, 2024, "fresh").await.unwrap();

        // 创建新快照时已按作用域清理过期快照
        assert_eq!(f.service.list_snapshots(None, None).await.unwrap().len(), 1);
        assert_eq!(f.service.cleanup_snapshots().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_missing_snapshot_is_not_found() {
        let f = fixture(10).await;
        assert!(matches!(
            f.service.delete_snapshot("snapshot_missing").await,
            Err(StandingsError::SnapshotNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_tampered_header_is_detected() {
        let f = fixture(10).await;
        let id = f.service.create_snapshot(1, 2024, "Spieltag 2").await.unwrap();

        let mut moved = f.storage.load(&id).await.unwrap();
        moved.saison_id = 2023;
        f.storage.save(&moved).await.unwrap();

        assert!(matches!(
            f.service.get_snapshot(&id).await,
            Err(StandingsError::CorruptSnapshot { .. })
        ));
        assert!(matches!(
            f.service.restore_snapshot(&id).await,
            Err(StandingsError::CorruptSnapshot { .. })
        ));
        // 2023 赛季的积分榜未被改写
        assert!(f.store.find_standings(1, 2023).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rows_from_another_scope_are_rejected() {
        let f = fixture(10).await;
        let id = f.service.create_snapshot(1, 2024, "Spieltag 2").await.unwrap();

        // 校验和有效，但数据行属于另一个赛季
        let mut mixed = f.storage.load(&id).await.unwrap();
        mixed.data[1].saison_id = 2023;
        mixed.checksum = compute_checksum(&mixed).unwrap();
        f.storage.save(&mixed).await.unwrap();

        let before = f.store.find_standings(1, 2024).await.unwrap();
        let result = f.service.restore_snapshot(&id).await;
        assert!(matches!(
            result,
            Err(StandingsError::CorruptSnapshot { ref actual, .. }) if actual.contains("2023")
        ));
        assert_eq!(f.store.find_standings(1, 2024).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_restore_keeps_restored_snapshot_under_retention() {
        let f = fixture(1).await;
        let id = f.service.create_snapshot(1, 2024, "Spieltag 2").await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let outcome = f.service.restore_snapshot(&id).await.unwrap();

        // 安全快照更新，但刚恢复的快照仍可再次使用
        assert!(f.service.get_snapshot(&id).await.is_ok());
        assert!(f.service.get_snapshot(&outcome.safety_snapshot_id).await.is_ok());
        assert!(f.service.restore_snapshot(&id).await.is_ok());
    }
}
