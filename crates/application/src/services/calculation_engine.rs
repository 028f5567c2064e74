use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use standings_domain::{
    compute_standings, JobId, LeagueRepository, ScopeKey, StandingsRow, StandingsStore,
    StandingsTransaction,
};
use standings_errors::{StandingsError, StandingsResult};

/// 积分榜计算引擎
///
/// 在一个事务内读取已完赛比赛与现有积分榜行，重新计算并写回。
/// 任何一步失败都会回滚并把错误交给调用方。
pub struct TableCalculationEngine {
    store: Arc<dyn StandingsStore>,
    leagues: Arc<dyn LeagueRepository>,
}

impl TableCalculationEngine {
    pub fn new(store: Arc<dyn StandingsStore>, leagues: Arc<dyn LeagueRepository>) -> Self {
        Self { store, leagues }
    }

    /// 确认联赛与赛季存在，`saison_id` 为空时使用联赛的当前赛季
    pub async fn resolve_scope(&self, liga_id: i64, saison_id: Option<i64>) -> StandingsResult<ScopeKey> {
        standings_domain::validate_liga_id(liga_id)?;
        let liga = self
            .leagues
            .find_liga(liga_id)
            .await?
            .ok_or_else(|| StandingsError::liga_not_found(liga_id))?;

        let saison_id = match saison_id.or(liga.aktive_saison_id) {
            Some(id) => id,
            None => {
                return Err(StandingsError::validation_error(format!(
                    "联赛 {liga_id} 没有当前赛季，需要指定 saisonId"
                )))
            }
        };

        let scope = ScopeKey::new(liga_id, saison_id)?;
        self.leagues
            .find_saison(liga_id, saison_id)
            .await?
            .ok_or_else(|| StandingsError::saison_not_found(liga_id, saison_id))?;
        Ok(scope)
    }

    pub async fn calculate_table_for_liga(
        &self,
        liga_id: i64,
        saison_id: i64,
    ) -> StandingsResult<Vec<StandingsRow>> {
        self.calculate(liga_id, saison_id, &CancellationToken::new(), Uuid::nil())
            .await
    }

    /// 可取消的重算，取消在每个存储访问前检查
    pub async fn calculate(
        &self,
        liga_id: i64,
        saison_id: i64,
        cancel: &CancellationToken,
        job_id: JobId,
    ) -> StandingsResult<Vec<StandingsRow>> {
        let scope = self.resolve_scope(liga_id, Some(saison_id)).await?;
        let started = Instant::now();

        let mut tx = self.store.begin().await?;
        match Self::recalculate_in(tx.as_mut(), scope, cancel, job_id).await {
            Ok(rows) => {
                check_cancelled(cancel, job_id)?;
                tx.commit().await?;
                info!(
                    liga_id,
                    saison_id,
                    teams = rows.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "standings recalculated"
                );
                Ok(rows)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(liga_id, saison_id, error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn recalculate_in(
        tx: &mut dyn StandingsTransaction,
        scope: ScopeKey,
        cancel: &CancellationToken,
        job_id: JobId,
    ) -> StandingsResult<Vec<StandingsRow>> {
        check_cancelled(cancel, job_id)?;
        let matches = tx.completed_matches(scope.liga_id, scope.saison_id).await?;

        check_cancelled(cancel, job_id)?;
        let existing = tx.standings(scope.liga_id, scope.saison_id).await?;

        let rows = compute_standings(scope, &matches, &existing);
        if let Some(broken) = rows.iter().find(|row| !row.invariants_hold()) {
            return Err(StandingsError::Internal(format!(
                "积分榜行不一致: 球队 {}",
                broken.team_id
            )));
        }
        debug!(
            liga_id = scope.liga_id,
            saison_id = scope.saison_id,
            matches = matches.len(),
            "computed standings"
        );

        check_cancelled(cancel, job_id)?;
        tx.upsert_standings(&rows).await?;
        Ok(rows)
    }
}

fn check_cancelled(cancel: &CancellationToken, job_id: JobId) -> StandingsResult<()> {
    if cancel.is_cancelled() {
        return Err(StandingsError::Cancelled { id: job_id });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use standings_infrastructure::InMemoryStandingsStore;
    use standings_testing_utils::{FlakyStandingsStore, LeagueFixture, MatchBuilder};

    async fn engine_with_fixture() -> (TableCalculationEngine, InMemoryStandingsStore) {
        let store = LeagueFixture::bundesliga().seed().await;
        let engine = TableCalculationEngine::new(Arc::new(store.clone()), Arc::new(store.clone()));
        (engine, store)
    }

    #[tokio::test]
    async fn test_calculates_and_persists_bundesliga_table() {
        let (engine, store) = engine_with_fixture().await;

        let rows = engine.calculate_table_for_liga(1, 2024).await.unwrap();
        assert_eq!(rows[0].team_name, "Bayern");
        assert_eq!(rows[0].punkte, 6);

        let stored = store.find_standings(1, 2024).await.unwrap();
        assert_eq!(stored, rows);
    }

    #[tokio::test]
    async fn test_recalculation_is_idempotent() {
        let (engine, store) = engine_with_fixture().await;
        let first = engine.calculate_table_for_liga(1, 2024).await.unwrap();
        let second = engine.calculate_table_for_liga(1, 2024).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.find_standings(1, 2024).await.unwrap(), second);
    }

    #[tokio::test]
    async fn test_amended_result_updates_table() {
        let (engine, store) = engine_with_fixture().await;
        engine.calculate_table_for_liga(1, 2024).await.unwrap();

        // 补赛：Dortmund 主场 4:0 胜 Bayern
        store
            .upsert_match(
                MatchBuilder::new(99, 1, 2024)
                    .home(2, "Dortmund")
                    .away(1, "Bayern")
                    .score(4, 0)
                    .build(),
            )
            .await;
        let rows = engine.calculate_table_for_liga(1, 2024).await.unwrap();
        let dortmund = rows.iter().find(|r| r.team_id == 2).unwrap();
        assert_eq!(dortmund.punkte, 4);
        assert_eq!(dortmund.tordifferenz, 2);
    }

    #[tokio::test]
    async fn test_unknown_scope_is_not_found() {
        let (engine, _) = engine_with_fixture().await;
        assert!(matches!(
            engine.calculate_table_for_liga(42, 2024).await,
            Err(StandingsError::LigaNotFound { liga_id: 42 })
        ));
        assert!(matches!(
            engine.calculate_table_for_liga(1, 1999).await,
            Err(StandingsError::SaisonNotFound { .. })
        ));
        assert!(matches!(
            engine.calculate_table_for_liga(0, 2024).await,
            Err(StandingsError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_scope_uses_active_season() {
        let (engine, _) = engine_with_fixture().await;
        let scope = engine.resolve_scope(1, None).await.unwrap();
        assert_eq!(scope, ScopeKey::new(1, 2024).unwrap());
    }

    #[tokio::test]
    async fn test_write_failure_rolls_back() {
        let store = LeagueFixture::bundesliga().seed().await;
        let flaky = FlakyStandingsStore::new(store.clone());
        flaky.fail_next_writes(1);
        let engine = TableCalculationEngine::new(Arc::new(flaky), Arc::new(store.clone()));

        let result = engine.calculate_table_for_liga(1, 2024).await;
        assert!(matches!(result, Err(StandingsError::Persistence(_))));
        assert!(store.find_standings(1, 2024).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_token_aborts_without_writing() {
        let (engine, store) = engine_with_fixture().await;
        let token = CancellationToken::new();
        token.cancel();
        let job_id = Uuid::new_v4();

        let result = engine.calculate(1, 2024, &token, job_id).await;
        assert!(matches!(result, Err(StandingsError::Cancelled { id }) if id == job_id));
        assert!(store.find_standings(1, 2024).await.unwrap().is_empty());
    }
}
