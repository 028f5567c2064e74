use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use standings_domain::{Snapshot, SnapshotStorage};
use standings_errors::{StandingsError, StandingsResult};

/// 文件快照存储，每个快照一个 `<id>.json` 文件
///
/// 写入先落到临时文件再原子重命名，读取方不会看到半写入的快照。
#[derive(Debug, Clone)]
pub struct FileSnapshotStorage {
    directory: PathBuf,
}

impl FileSnapshotStorage {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, snapshot_id: &str) -> StandingsResult<PathBuf> {
        let valid = !snapshot_id.is_empty()
            && snapshot_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StandingsError::validation_error(format!(
                "无效的快照ID: {snapshot_id}"
            )));
        }
        Ok(self.directory.join(format!("{snapshot_id}.json")))
    }

    async fn read_snapshot(path: &Path) -> StandingsResult<Snapshot> {
        let content = tokio::fs::read(path).await?;
        Self::parse(path, &content)
    }

    fn parse(path: &Path, content: &[u8]) -> StandingsResult<Snapshot> {
        let mut snapshot: Snapshot = serde_json::from_slice(content)?;
        snapshot.location = Some(path.display().to_string());
        Ok(snapshot)
    }
}

#[async_trait]
impl SnapshotStorage for FileSnapshotStorage {
    async fn save(&self, snapshot: &Snapshot) -> StandingsResult<String> {
        let path = self.path_for(&snapshot.id)?;
        tokio::fs::create_dir_all(&self.directory).await?;

        let content = serde_json::to_vec_pretty(snapshot)?;
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &content).await?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        debug!(snapshot_id = %snapshot.id, bytes = content.len(), "snapshot written");
        Ok(path.display().to_string())
    }

    async fn load(&self, snapshot_id: &str) -> StandingsResult<Snapshot> {
        let path = self.path_for(snapshot_id)?;
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StandingsError::SnapshotNotFound {
                    id: snapshot_id.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        Self::parse(&path, &content)
    }

    async fn list(&self) -> StandingsResult<Vec<Snapshot>> {
        let mut entries = match tokio::fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut snapshots = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match Self::read_snapshot(&path).await {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(StandingsError::Serialization(e)) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable snapshot file");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(snapshots)
    }

    async fn delete(&self, snapshot_id: &str) -> StandingsResult<bool> {
        let path = self.path_for(snapshot_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn ping(&self) -> StandingsResult<()> {
        tokio::fs::create_dir_all(&self.directory).await?;
        let metadata = tokio::fs::metadata(&self.directory).await?;
        if metadata.permissions().readonly() {
            return Err(StandingsError::snapshot(format!(
                "快照目录只读: {}",
                self.directory.display()
            )));
        }
        Ok(())
    }
}
