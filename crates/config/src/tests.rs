#[cfg(test)]
mod loading_tests {
    use crate::{AppConfig, ConfigValidator};

    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    const SAMPLE: &str = include_str!("../../../config/standings.toml");

    #[test]
    fn test_sample_config_is_valid() {
        let config = AppConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.queue.max_workers, 3);
        assert_eq!(config.snapshots.directory, "data/snapshots");
        assert_eq!(config.database.url, "sqlite:data/standings.db");
        assert_eq!(
            config.resilience.snapshot_storage.recovery_timeout,
            Duration::from_secs(15)
        );
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("standings.toml");
        fs::write(
            &path,
            r#"
[queue]
max_workers = 6
job_timeout_ms = 5000

[snapshots]
max_snapshots = 10
"#,
        )
        .unwrap();

        let config = AppConfig::load(path.to_str()).unwrap();
        assert_eq!(config.queue.max_workers, 6);
        assert_eq!(config.queue.job_timeout(), Duration::from_secs(5));
        assert_eq!(config.queue.max_retries, 3);
        assert_eq!(config.snapshots.max_snapshots, 10);
        assert_eq!(config.snapshots.max_age_days, 30);
        assert!(config.database.is_in_memory());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.toml");
        assert!(AppConfig::load(path.to_str()).is_err());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let result = AppConfig::from_toml(
            r#"
[queue]
max_workers = 0
"#,
        );
        assert!(result.is_err());

        let result = AppConfig::from_toml(
            r#"
[database]
url = "postgresql://localhost/standings"
max_connections = 5
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_toml_serialization_reloads() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());

        let text = config.to_toml().unwrap();
        let reloaded = AppConfig::from_toml(&text).unwrap();
        assert_eq!(reloaded.queue.max_queue_size, config.queue.max_queue_size);
        assert_eq!(
            reloaded.resilience.data_store.failure_threshold,
            config.resilience.data_store.failure_threshold
        );
    }
}
