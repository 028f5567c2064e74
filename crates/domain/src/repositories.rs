//! 领域仓储抽象
//!
//! 定义积分榜数据访问的抽象接口，基础设施层提供内存、SQLite 与文件实现

use async_trait::async_trait;
use standings_errors::StandingsResult;

use crate::entities::{Liga, Match, Saison, Snapshot, StandingsRow};

/// 联赛与赛季查询
#[async_trait]
pub trait LeagueRepository: Send + Sync {
    async fn find_liga(&self, liga_id: i64) -> StandingsResult<Option<Liga>>;
    async fn find_saison(&self, liga_id: i64, saison_id: i64) -> StandingsResult<Option<Saison>>;
    async fn list_ligen(&self) -> StandingsResult<Vec<Liga>>;
}

/// 积分榜存储，所有写操作都在事务中完成
#[async_trait]
pub trait StandingsStore: Send + Sync {
    async fn begin(&self) -> StandingsResult<Box<dyn StandingsTransaction>>;

    /// 读取已提交的积分榜，按 platz 排序
    async fn find_standings(&self, liga_id: i64, saison_id: i64)
        -> StandingsResult<Vec<StandingsRow>>;

    /// 健康检查
    async fn ping(&self) -> StandingsResult<()>;
}

/// 积分榜事务，未提交即丢弃视为回滚
#[async_trait]
pub trait StandingsTransaction: Send {
    async fn completed_matches(&mut self, liga_id: i64, saison_id: i64)
        -> StandingsResult<Vec<Match>>;
    async fn standings(&mut self, liga_id: i64, saison_id: i64) -> StandingsResult<Vec<StandingsRow>>;
    /// 按 (ligaId, saisonId, teamId) 插入或更新
    async fn upsert_standings(&mut self, rows: &[StandingsRow]) -> StandingsResult<()>;
    /// 删除作用域内全部行后写入 `rows`
    async fn replace_standings(
        &mut self,
        liga_id: i64,
        saison_id: i64,
        rows: &[StandingsRow],
    ) -> StandingsResult<()>;
    async fn commit(self: Box<Self>) -> StandingsResult<()>;
    async fn rollback(self: Box<Self>) -> StandingsResult<()>;
}

/// 快照持久化
#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    /// 保存快照并返回存储位置
    async fn save(&self, snapshot: &Snapshot) -> StandingsResult<String>;
    /// 快照不存在时返回 `SnapshotNotFound`
    async fn load(&self, snapshot_id: &str) -> StandingsResult<Snapshot>;
    /// 列出全部快照，不做校验
    async fn list(&self) -> StandingsResult<Vec<Snapshot>>;
    async fn delete(&self, snapshot_id: &str) -> StandingsResult<bool>;
    async fn ping(&self) -> StandingsResult<()>;
}
