use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::{debug, instrument};

use standings_domain::{
    LeagueRepository, Liga, Match, MatchStatus, Saison, StandingsRow, StandingsStore,
    StandingsTransaction, TeamRef,
};
use standings_errors::{StandingsError, StandingsResult};

/// SQLite积分榜存储
pub struct SqliteStandingsStore {
    pool: SqlitePool,
}

impl SqliteStandingsStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 连接数据库并初始化表结构
    pub async fn connect(database_url: &str, max_connections: u32) -> StandingsResult<Self> {
        debug!("Opening SQLite standings store at: {}", database_url);

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .min_connections(1)
            .connect_with(connect_options)
            .await?;

        Self::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn run_migrations(pool: &SqlitePool) -> StandingsResult<()> {
        debug!("Running SQLite standings migrations");

        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS ligen (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                aktive_saison_id INTEGER
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS saisons (
                id INTEGER NOT NULL,
                liga_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                aktiv INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (liga_id, id),
                FOREIGN KEY (liga_id) REFERENCES ligen(id) ON DELETE CASCADE
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS teams (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS spiele (
                id INTEGER PRIMARY KEY,
                liga_id INTEGER NOT NULL,
                saison_id INTEGER NOT NULL,
                heim_team_id INTEGER NOT NULL REFERENCES teams(id),
                gast_team_id INTEGER NOT NULL REFERENCES teams(id),
                heim_tore INTEGER,
                gast_tore INTEGER,
                status TEXT NOT NULL DEFAULT 'SCHEDULED'
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS tabellen (
                liga_id INTEGER NOT NULL,
                saison_id INTEGER NOT NULL,
                team_id INTEGER NOT NULL,
                team_name TEXT NOT NULL,
                spiele INTEGER NOT NULL DEFAULT 0,
                siege INTEGER NOT NULL DEFAULT 0,
                unentschieden INTEGER NOT NULL DEFAULT 0,
                niederlagen INTEGER NOT NULL DEFAULT 0,
                tore_fuer INTEGER NOT NULL DEFAULT 0,
                tore_gegen INTEGER NOT NULL DEFAULT 0,
                tordifferenz INTEGER NOT NULL DEFAULT 0,
                punkte INTEGER NOT NULL DEFAULT 0,
                platz INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (liga_id, saison_id, team_id)
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_spiele_scope ON spiele(liga_id, saison_id, status)",
        ];

        for sql in statements {
            sqlx::query(sql).execute(pool).await?;
        }

        debug!("Successfully completed SQLite standings migrations");
        Ok(())
    }

    pub async fn insert_liga(&self, liga: &Liga) -> StandingsResult<()> {
        sqlx::query(
            "INSERT INTO ligen (id, name, aktive_saison_id) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, aktive_saison_id = excluded.aktive_saison_id",
        )
        .bind(liga.id)
        .bind(&liga.name)
        .bind(liga.aktive_saison_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_saison(&self, saison: &Saison) -> StandingsResult<()> {
        sqlx::query(
            "INSERT INTO saisons (id, liga_id, name, aktiv) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(liga_id, id) DO UPDATE SET name = excluded.name, aktiv = excluded.aktiv",
        )
        .bind(saison.id)
        .bind(saison.liga_id)
        .bind(&saison.name)
        .bind(saison.aktiv)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// 插入或更新比赛及其球队
    pub async fn upsert_match(&self, m: &Match) -> StandingsResult<()> {
        let mut tx = self.pool.begin().await?;
        for team in [&m.heim, &m.gast] {
            sqlx::query(
                "INSERT INTO teams (id, name) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name",
            )
            .bind(team.id)
            .bind(&team.name)
            .execute(&mut *tx)
            .await?;
        }
        sqlx::query(
            "INSERT INTO spiele (id, liga_id, saison_id, heim_team_id, gast_team_id, heim_tore, gast_tore, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                liga_id = excluded.liga_id, saison_id = excluded.saison_id,
                heim_team_id = excluded.heim_team_id, gast_team_id = excluded.gast_team_id,
                heim_tore = excluded.heim_tore, gast_tore = excluded.gast_tore,
                status = excluded.status",
        )
        .bind(m.id)
        .bind(m.liga_id)
        .bind(m.saison_id)
        .bind(m.heim.id)
        .bind(m.gast.id)
        .bind(m.heim_tore.map(i64::from))
        .bind(m.gast_tore.map(i64::from))
        .bind(m.status.as_str())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    fn row_to_liga(row: &SqliteRow) -> StandingsResult<Liga> {
        Ok(Liga {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            aktive_saison_id: row.try_get("aktive_saison_id")?,
        })
    }
}

fn count(row: &SqliteRow, column: &str) -> StandingsResult<u32> {
    let value: i64 = row.try_get(column)?;
    u32::try_from(value)
        .map_err(|_| StandingsError::persistence(format!("列 {column} 的值超出范围: {value}")))
}

fn row_to_standings(row: &SqliteRow) -> StandingsResult<StandingsRow> {
    Ok(StandingsRow {
        team_id: row.try_get("team_id")?,
        team_name: row.try_get("team_name")?,
        liga_id: row.try_get("liga_id")?,
        saison_id: row.try_get("saison_id")?,
        spiele: count(row, "spiele")?,
        siege: count(row, "siege")?,
        unentschieden: count(row, "unentschieden")?,
        niederlagen: count(row, "niederlagen")?,
        tore_fuer: count(row, "tore_fuer")?,
        tore_gegen: count(row, "tore_gegen")?,
        tordifferenz: row.try_get("tordifferenz")?,
        punkte: count(row, "punkte")?,
        platz: count(row, "platz")?,
    })
}

fn row_to_match(row: &SqliteRow) -> StandingsResult<Match> {
    let heim_tore: Option<i64> = row.try_get("heim_tore")?;
    let gast_tore: Option<i64> = row.try_get("gast_tore")?;
    let status: String = row.try_get("status")?;
    Ok(Match {
        id: row.try_get("id")?,
        liga_id: row.try_get("liga_id")?,
        saison_id: row.try_get("saison_id")?,
        heim: TeamRef::new(row.try_get("heim_team_id")?, row.try_get::<String, _>("heim_name")?),
        gast: TeamRef::new(row.try_get("gast_team_id")?, row.try_get::<String, _>("gast_name")?),
        heim_tore: heim_tore.and_then(|g| u32::try_from(g).ok()),
        gast_tore: gast_tore.and_then(|g| u32::try_from(g).ok()),
        status: MatchStatus::parse(&status)?,
    })
}

const STANDINGS_COLUMNS: &str = "liga_id, saison_id, team_id, team_name, spiele, siege, \
    unentschieden, niederlagen, tore_fuer, tore_gegen, tordifferenz, punkte, platz";

#[async_trait]
impl LeagueRepository for SqliteStandingsStore {
    #[instrument(skip(self))]
    async fn find_liga(&self, liga_id: i64) -> StandingsResult<Option<Liga>> {
        let row = sqlx::query("SELECT id, name, aktive_saison_id FROM ligen WHERE id = ?1")
            .bind(liga_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_liga).transpose()
    }

    #[instrument(skip(self))]
    async fn find_saison(&self, liga_id: i64, saison_id: i64) -> StandingsResult<Option<Saison>> {
        let row = sqlx::query(
            "SELECT id, liga_id, name, aktiv FROM saisons WHERE liga_id = ?1 AND id = ?2",
        )
        .bind(liga_id)
        .bind(saison_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(Saison {
                id: row.try_get("id")?,
                liga_id: row.try_get("liga_id")?,
                name: row.try_get("name")?,
                aktiv: row.try_get("aktiv")?,
            })
        })
        .transpose()
    }

    async fn list_ligen(&self) -> StandingsResult<Vec<Liga>> {
        let rows = sqlx::query("SELECT id, name, aktive_saison_id FROM ligen ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_liga).collect()
    }
}

#[async_trait]
impl StandingsStore for SqliteStandingsStore {
    async fn begin(&self) -> StandingsResult<Box<dyn StandingsTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteStandingsTransaction { tx }))
    }

    async fn find_standings(
        &self,
        liga_id: i64,
        saison_id: i64,
    ) -> StandingsResult<Vec<StandingsRow>> {
        let sql = format!(
            "SELECT {STANDINGS_COLUMNS} FROM tabellen WHERE liga_id = ?1 AND saison_id = ?2 ORDER BY platz, team_id"
        );
        let rows = sqlx::query(&sql)
            .bind(liga_id)
            .bind(saison_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_standings).collect()
    }

    async fn ping(&self) -> StandingsResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// SQLite事务，丢弃时由 sqlx 自动回滚
pub struct SqliteStandingsTransaction {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl StandingsTransaction for SqliteStandingsTransaction {
    async fn completed_matches(
        &mut self,
        liga_id: i64,
        saison_id: i64,
    ) -> StandingsResult<Vec<Match>> {
        let rows = sqlx::query(
            "SELECT s.id, s.liga_id, s.saison_id, s.heim_team_id, h.name AS heim_name,
                    s.gast_team_id, g.name AS gast_name, s.heim_tore, s.gast_tore, s.status
             FROM spiele s
             JOIN teams h ON h.id = s.heim_team_id
             JOIN teams g ON g.id = s.gast_team_id
             WHERE s.liga_id = ?1 AND s.saison_id = ?2 AND s.status = 'COMPLETED'
               AND s.heim_tore IS NOT NULL AND s.gast_tore IS NOT NULL
             ORDER BY s.id",
        )
        .bind(liga_id)
        .bind(saison_id)
        .fetch_all(&mut *self.tx)
        .await?;
        rows.iter().map(row_to_match).collect()
    }

    async fn standings(&mut self, liga_id: i64, saison_id: i64) -> StandingsResult<Vec<StandingsRow>> {
        let sql = format!(
            "SELECT {STANDINGS_COLUMNS} FROM tabellen WHERE liga_id = ?1 AND saison_id = ?2 ORDER BY platz, team_id"
        );
        let rows = sqlx::query(&sql)
            .bind(liga_id)
            .bind(saison_id)
            .fetch_all(&mut *self.tx)
            .await?;
        rows.iter().map(row_to_standings).collect()
    }

    async fn upsert_standings(&mut self, rows: &[StandingsRow]) -> StandingsResult<()> {
        for row in rows {
            sqlx::query(
                "INSERT INTO tabellen (liga_id, saison_id, team_id, team_name, spiele, siege,
                    unentschieden, niederlagen, tore_fuer, tore_gegen, tordifferenz, punkte, platz)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(liga_id, saison_id, team_id) DO UPDATE SET
                    team_name = excluded.team_name, spiele = excluded.spiele,
                    siege = excluded.siege, unentschieden = excluded.unentschieden,
                    niederlagen = excluded.niederlagen, tore_fuer = excluded.tore_fuer,
                    tore_gegen = excluded.tore_gegen, tordifferenz = excluded.tordifferenz,
                    punkte = excluded.punkte, platz = excluded.platz",
            )
            .bind(row.liga_id)
            .bind(row.saison_id)
            .bind(row.team_id)
            .bind(&row.team_name)
            .bind(i64::from(row.spiele))
            .bind(i64::from(row.siege))
            .bind(i64::from(row.unentschieden))
            .bind(i64::from(row.niederlagen))
            .bind(i64::from(row.tore_fuer))
            .bind(i64::from(row.tore_gegen))
            .bind(row.tordifferenz)
            .bind(i64::from(row.punkte))
            .bind(i64::from(row.platz))
            .execute(&mut *self.tx)
            .await?;
        }
        Ok(())
    }

    async fn replace_standings(
        &mut self,
        liga_id: i64,
        saison_id: i64,
        rows: &[StandingsRow],
    ) -> StandingsResult<()> {
        sqlx::query("DELETE FROM tabellen WHERE liga_id = ?1 AND saison_id = ?2")
            .bind(liga_id)
            .bind(saison_id)
            .execute(&mut *self.tx)
            .await?;
        self.upsert_standings(rows).await
    }

    async fn commit(self: Box<Self>) -> StandingsResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StandingsResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
