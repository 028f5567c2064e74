use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{error, info, warn};

use standings_api::{create_app, AdminService, HealthState};
use standings_application::{RecalculationExecutor, SnapshotService, TableCalculationEngine};
use standings_config::AppConfig;
use standings_dispatcher::QueueManager;
use standings_domain::{LeagueRepository, SnapshotStorage, StandingsStore};
use standings_infrastructure::{
    CircuitBreakerRegistry, CircuitBreakerSnapshotStorage, FileSnapshotStorage,
    InMemoryStandingsStore, SqliteStandingsStore,
};

/// 主应用程序
pub struct Application {
    config: AppConfig,
    queue: QueueManager,
    snapshots: Arc<SnapshotService>,
    admin: Arc<AdminService>,
}

impl Application {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let (store, leagues) = create_store(&config).await?;
        let breakers = CircuitBreakerRegistry::new(&config.resilience);

        info!(directory = %config.snapshots.directory, "using file snapshot storage");
        let snapshot_storage: Arc<dyn SnapshotStorage> = Arc::new(CircuitBreakerSnapshotStorage::new(
            Arc::new(FileSnapshotStorage::new(&config.snapshots.directory)),
            breakers.snapshot_storage(),
        ));

        let engine = Arc::new(TableCalculationEngine::new(
            Arc::clone(&store),
            Arc::clone(&leagues),
        ));
        let snapshots = Arc::new(SnapshotService::new(
            Arc::clone(&store),
            Arc::clone(&snapshot_storage),
            config.snapshots.clone(),
        ));
        let executor = Arc::new(RecalculationExecutor::new(
            Arc::clone(&engine),
            Arc::clone(&snapshots),
            breakers.data_store(),
            config.queue.snapshot_before_calculation,
        ));

        let queue = QueueManager::new(&config.queue, executor, breakers);
        let admin = Arc::new(AdminService::new(
            queue.clone(),
            engine,
            Arc::clone(&snapshots),
            leagues,
            store,
            snapshot_storage,
            config.monitoring.clone(),
        ));

        Ok(Self {
            config,
            queue,
            snapshots,
            admin,
        })
    }

    /// 启动队列、HTTP 服务与健康检查，直到收到关闭信号
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        self.queue.start().await.context("启动计算队列失败")?;

        let mut handles = Vec::new();

        if self.config.api.enabled {
            let listener = TcpListener::bind(&self.config.api.bind_address)
                .await
                .with_context(|| format!("绑定地址失败: {}", self.config.api.bind_address))?;
            info!(address = %self.config.api.bind_address, "admin API listening");

            let app = create_app(Arc::clone(&self.admin));
            let mut server_shutdown = shutdown_rx.resubscribe();
            handles.push(tokio::spawn(async move {
                let result = axum::serve(listener, app)
                    .with_graceful_shutdown(async move {
                        let _ = server_shutdown.recv().await;
                    })
                    .await;
                if let Err(e) = result {
                    error!(error = %e, "admin API server failed");
                }
            }));
        }

        {
            let admin = Arc::clone(&self.admin);
            let snapshots = Arc::clone(&self.snapshots);
            let interval = self.config.monitoring.health_check_interval();
            let backlog_warning = self.config.monitoring.queue_backlog_warning;
            let shutdown_rx = shutdown_rx.resubscribe();
            handles.push(tokio::spawn(async move {
                run_health_check_loop(admin, snapshots, interval, backlog_warning, shutdown_rx)
                    .await;
            }));
        }

        let _ = shutdown_rx.recv().await;
        info!("shutting down calculation queue");
        self.queue.shutdown().await;

        for handle in handles {
            let _ = handle.await;
        }

        info!("all components stopped");
        Ok(())
    }
}

/// 未配置数据库 URL 时使用内存存储
async fn create_store(
    config: &AppConfig,
) -> Result<(Arc<dyn StandingsStore>, Arc<dyn LeagueRepository>)> {
    if config.database.is_in_memory() {
        warn!("database.url is empty, standings are kept in memory only");
        let store = Arc::new(InMemoryStandingsStore::new());
        let standings: Arc<dyn StandingsStore> = store.clone();
        let leagues: Arc<dyn LeagueRepository> = store;
        return Ok((standings, leagues));
    }

    info!(url = %config.database.url, "connecting to SQLite standings store");
    let store = Arc::new(
        SqliteStandingsStore::connect(&config.database.url, config.database.max_connections)
            .await
            .context("连接数据库失败")?,
    );
    let standings: Arc<dyn StandingsStore> = store.clone();
    let leagues: Arc<dyn LeagueRepository> = store;
    Ok((standings, leagues))
}

/// 周期性检查组件健康、队列积压，并清理过期快照
async fn run_health_check_loop(
    admin: Arc<AdminService>,
    snapshots: Arc<SnapshotService>,
    period: std::time::Duration,
    backlog_warning: usize,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let health = admin.system_health().await;
                if health.status != HealthState::Healthy {
                    warn!(status = ?health.status, "system health degraded");
                }

                let status = admin.queue_status().await;
                if status.pending >= backlog_warning {
                    warn!(pending = status.pending, threshold = backlog_warning, "calculation queue backlog");
                }
                if status.has_open_breaker() {
                    warn!("circuit breaker open");
                }

                if let Err(e) = snapshots.cleanup_snapshots().await {
                    warn!(error = %e, "snapshot cleanup failed");
                }
            }
            _ = shutdown_rx.recv() => {
                info!("health check loop stopped");
                break;
            }
        }
    }
}
