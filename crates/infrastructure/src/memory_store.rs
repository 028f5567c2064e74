use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

use standings_domain::{
    rank_standings, LeagueRepository, Liga, Match, Saison, ScopeKey, StandingsStore,
    StandingsTransaction, StandingsRow,
};
use standings_errors::StandingsResult;

type RowKey = (i64, i64, i64);

#[derive(Debug, Default)]
struct StoreData {
    ligen: BTreeMap<i64, Liga>,
    saisons: BTreeMap<(i64, i64), Saison>,
    matches: BTreeMap<i64, Match>,
    standings: BTreeMap<RowKey, StandingsRow>,
}

impl StoreData {
    fn scope_rows(&self, scope: ScopeKey) -> Vec<StandingsRow> {
        self.standings
            .range((scope.liga_id, scope.saison_id, i64::MIN)..=(scope.liga_id, scope.saison_id, i64::MAX))
            .map(|(_, row)| row.clone())
            .collect()
    }

    fn apply(&mut self, write: StagedWrite) {
        match write {
            StagedWrite::Upsert(rows) => {
                for row in rows {
                    self.standings
                        .insert((row.liga_id, row.saison_id, row.team_id), row);
                }
            }
            StagedWrite::Replace { scope, rows } => {
                self.standings
                    .retain(|(liga, saison, _), _| !(*liga == scope.liga_id && *saison == scope.saison_id));
                for row in rows {
                    self.standings
                        .insert((row.liga_id, row.saison_id, row.team_id), row);
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
enum StagedWrite {
    Upsert(Vec<StandingsRow>),
    Replace {
        scope: ScopeKey,
        rows: Vec<StandingsRow>,
    },
}

/// 内存积分榜存储
///
/// 未配置数据库时使用。事务将写操作暂存，提交时一次性应用；
/// 同一时间只允许一个写事务，与 SQLite 的单写者语义一致。
#[derive(Debug, Clone, Default)]
pub struct InMemoryStandingsStore {
    data: Arc<RwLock<StoreData>>,
    writer: Arc<Mutex<()>>,
}

impl InMemoryStandingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_liga(&self, liga: Liga) {
        self.data.write().await.ligen.insert(liga.id, liga);
    }

    pub async fn insert_saison(&self, saison: Saison) {
        self.data
            .write()
            .await
            .saisons
            .insert((saison.liga_id, saison.id), saison);
    }

    /// 插入或更新一场比赛（比赛生命周期的写入口）
    pub async fn upsert_match(&self, m: Match) {
        self.data.write().await.matches.insert(m.id, m);
    }

    pub async fn remove_match(&self, match_id: i64) -> bool {
        self.data.write().await.matches.remove(&match_id).is_some()
    }

    /// 直接写入积分榜行，绕过事务
    pub async fn put_standings(&self, rows: Vec<StandingsRow>) {
        self.data.write().await.apply(StagedWrite::Upsert(rows));
    }
}

#[async_trait]
impl LeagueRepository for InMemoryStandingsStore {
    async fn find_liga(&self, liga_id: i64) -> StandingsResult<Option<Liga>> {
        Ok(self.data.read().await.ligen.get(&liga_id).cloned())
    }

    async fn find_saison(&self, liga_id: i64, saison_id: i64) -> StandingsResult<Option<Saison>> {
        Ok(self
            .data
            .read()
            .await
            .saisons
            .get(&(liga_id, saison_id))
            .cloned())
    }

    async fn list_ligen(&self) -> StandingsResult<Vec<Liga>> {
        Ok(self.data.read().await.ligen.values().cloned().collect())
    }
}

#[async_trait]
impl StandingsStore for InMemoryStandingsStore {
    async fn begin(&self) -> StandingsResult<Box<dyn StandingsTransaction>> {
        let guard = Arc::clone(&self.writer).lock_owned().await;
        Ok(Box::new(InMemoryTransaction {
            data: Arc::clone(&self.data),
            staged: Vec::new(),
            _guard: guard,
        }))
    }

    async fn find_standings(
        &self,
        liga_id: i64,
        saison_id: i64,
    ) -> StandingsResult<Vec<StandingsRow>> {
        let mut rows = self.data.read().await.scope_rows(ScopeKey { liga_id, saison_id });
        rows.sort_by_key(|row| row.platz);
        Ok(rows)
    }

    async fn ping(&self) -> StandingsResult<()> {
        Ok(())
    }
}

pub struct InMemoryTransaction {
    data: Arc<RwLock<StoreData>>,
    staged: Vec<StagedWrite>,
    _guard: OwnedMutexGuard<()>,
}

impl InMemoryTransaction {
    /// 已提交数据叠加本事务暂存写入后的视图
    async fn view(&self, scope: ScopeKey) -> Vec<StandingsRow> {
        let data = self.data.read().await;
        let mut overlay = StoreData {
            standings: data
                .scope_rows(scope)
                .into_iter()
                .map(|row| ((row.liga_id, row.saison_id, row.team_id), row))
                .collect(),
            ..Default::default()
        };
        drop(data);

        for write in &self.staged {
            overlay.apply(write.clone());
        }
        overlay.scope_rows(scope)
    }
}

#[async_trait]
impl StandingsTransaction for InMemoryTransaction {
    async fn completed_matches(
        &mut self,
        liga_id: i64,
        saison_id: i64,
    ) -> StandingsResult<Vec<Match>> {
        let scope = ScopeKey { liga_id, saison_id };
        Ok(self
            .data
            .read()
            .await
            .matches
            .values()
            .filter(|m| m.scope() == scope && m.final_score().is_some())
            .cloned()
            .collect())
    }

    async fn standings(&mut self, liga_id: i64, saison_id: i64) -> StandingsResult<Vec<StandingsRow>> {
        let mut rows = self.view(ScopeKey { liga_id, saison_id }).await;
        rank_standings_by_platz(&mut rows);
        Ok(rows)
    }

    async fn upsert_standings(&mut self, rows: &[StandingsRow]) -> StandingsResult<()> {
        self.staged.push(StagedWrite::Upsert(rows.to_vec()));
        Ok(())
    }

    async fn replace_standings(
        &mut self,
        liga_id: i64,
        saison_id: i64,
        rows: &[StandingsRow],
    ) -> StandingsResult<()> {
        self.staged.push(StagedWrite::Replace {
            scope: ScopeKey { liga_id, saison_id },
            rows: rows.to_vec(),
        });
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StandingsResult<()> {
        let this = *self;
        let mut data = this.data.write().await;
        let writes = this.staged.len();
        for write in this.staged {
            data.apply(write);
        }
        debug!(writes, "in-memory transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StandingsResult<()> {
        debug!(discarded = self.staged.len(), "in-memory transaction rolled back");
        Ok(())
    }
}

fn rank_standings_by_platz(rows: &mut [StandingsRow]) {
    if rows.iter().all(|row| row.platz > 0) {
        rows.sort_by_key(|row| row.platz);
    } else {
        rank_standings(rows);
    }
}
