use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};

/// 快照保留策略
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// 快照文件目录
    pub directory: String,
    /// 每个联赛/赛季最多保留的快照数
    pub max_snapshots: usize,
    /// 快照最长保留天数
    pub max_age_days: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            directory: "data/snapshots".to_string(),
            max_snapshots: 50,
            max_age_days: 30,
        }
    }
}

impl SnapshotConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_days * 24 * 60 * 60)
    }
}

impl ConfigValidator for SnapshotConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_not_empty(&self.directory, "snapshots.directory")?;
        ValidationUtils::validate_count(self.max_snapshots, "snapshots.max_snapshots")?;
        if self.max_age_days == 0 {
            return Err(crate::ConfigError::Validation(
                "snapshots.max_age_days must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_config_max_age() {
        let config = SnapshotConfig {
            max_age_days: 2,
            ..Default::default()
        };
        assert_eq!(config.max_age(), Duration::from_secs(172_800));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_snapshot_config_rejects_empty_directory() {
        let config = SnapshotConfig {
            directory: " ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
