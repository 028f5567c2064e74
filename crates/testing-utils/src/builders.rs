//! Test data builders for creating test entities

use standings_domain::{Liga, Match, MatchStatus, Saison, StandingsRow, TeamRef};
use standings_infrastructure::InMemoryStandingsStore;

/// Builder for creating test Match entities
pub struct MatchBuilder {
    m: Match,
}

impl MatchBuilder {
    pub fn new(id: i64, liga_id: i64, saison_id: i64) -> Self {
        Self {
            m: Match {
                id,
                liga_id,
                saison_id,
                heim: TeamRef::new(1, "Heim"),
                gast: TeamRef::new(2, "Gast"),
                heim_tore: None,
                gast_tore: None,
                status: MatchStatus::Scheduled,
            },
        }
    }

    pub fn home(mut self, team_id: i64, name: &str) -> Self {
        self.m.heim = TeamRef::new(team_id, name);
        self
    }

    pub fn away(mut self, team_id: i64, name: &str) -> Self {
        self.m.gast = TeamRef::new(team_id, name);
        self
    }

    /// Sets the final score and marks the match completed
    pub fn score(mut self, heim_tore: u32, gast_tore: u32) -> Self {
        self.m.heim_tore = Some(heim_tore);
        self.m.gast_tore = Some(gast_tore);
        self.m.status = MatchStatus::Completed;
        self
    }

    pub fn status(mut self, status: MatchStatus) -> Self {
        self.m.status = status;
        self
    }

    pub fn build(self) -> Match {
        self.m
    }
}

/// Builder for creating test StandingsRow entities
pub struct StandingsRowBuilder {
    row: StandingsRow,
}

impl StandingsRowBuilder {
    pub fn new(team_id: i64, team_name: &str) -> Self {
        Self {
            row: StandingsRow {
                team_id,
                team_name: team_name.to_string(),
                liga_id: 1,
                saison_id: 2024,
                spiele: 0,
                siege: 0,
                unentschieden: 0,
                niederlagen: 0,
                tore_fuer: 0,
                tore_gegen: 0,
                tordifferenz: 0,
                punkte: 0,
                platz: 0,
            },
        }
    }

    pub fn scope(mut self, liga_id: i64, saison_id: i64) -> Self {
        self.row.liga_id = liga_id;
        self.row.saison_id = saison_id;
        self
    }

    /// Sets the raw results; derived columns follow the table rules
    pub fn record(
        mut self,
        siege: u32,
        unentschieden: u32,
        niederlagen: u32,
        tore_fuer: u32,
        tore_gegen: u32,
    ) -> Self {
        self.row.siege = siege;
        self.row.unentschieden = unentschieden;
        self.row.niederlagen = niederlagen;
        self.row.spiele = siege + unentschieden + niederlagen;
        self.row.tore_fuer = tore_fuer;
        self.row.tore_gegen = tore_gegen;
        self.row.tordifferenz = i64::from(tore_fuer) - i64::from(tore_gegen);
        self.row.punkte = siege * 3 + unentschieden;
        self
    }

    pub fn platz(mut self, platz: u32) -> Self {
        self.row.platz = platz;
        self
    }

    pub fn build(self) -> StandingsRow {
        self.row
    }
}

/// Seed data for an in-memory store
#[derive(Default)]
pub struct LeagueFixture {
    ligen: Vec<Liga>,
    saisons: Vec<Saison>,
    matches: Vec<Match>,
    standings: Vec<StandingsRow>,
}

impl LeagueFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Liga 1 (active season 2024, finished season 2023) with four completed
    /// matches and one scheduled match, plus Liga 2 with an empty active season.
    pub fn bundesliga() -> Self {
        Self::new()
            .with_liga(1, "Bundesliga", Some(2024))
            .with_saison(1, 2023, "2023/24", false)
            .with_saison(1, 2024, "2024/25", true)
            .with_liga(2, "2. Bundesliga", Some(2024))
            .with_saison(2, 2024, "2024/25", true)
            .with_match(
                MatchBuilder::new(1, 1, 2024)
                    .home(1, "Bayern")
                    .away(2, "Dortmund")
                    .score(3, 1)
                    .build(),
            )
            .with_match(
                MatchBuilder::new(2, 1, 2024)
                    .home(3, "Leipzig")
                    .away(4, "Leverkusen")
                    .score(2, 2)
                    .build(),
            )
            .with_match(
                MatchBuilder::new(3, 1, 2024)
                    .home(1, "Bayern")
                    .away(3, "Leipzig")
                    .score(2, 0)
                    .build(),
            )
            .with_match(
                MatchBuilder::new(4, 1, 2024)
                    .home(2, "Dortmund")
                    .away(4, "Leverkusen")
                    .score(1, 1)
                    .build(),
            )
            .with_match(
                MatchBuilder::new(5, 1, 2024)
                    .home(4, "Leverkusen")
                    .away(1, "Bayern")
                    .build(),
            )
    }

    pub fn with_liga(mut self, id: i64, name: &str, aktive_saison_id: Option<i64>) -> Self {
        self.ligen.push(Liga {
            id,
            name: name.to_string(),
            aktive_saison_id,
        });
        self
    }

    pub fn with_saison(mut self, liga_id: i64, id: i64, name: &str, aktiv: bool) -> Self {
        self.saisons.push(Saison {
            id,
            liga_id,
            name: name.to_string(),
            aktiv,
        });
        self
    }

    pub fn with_match(mut self, m: Match) -> Self {
        self.matches.push(m);
        self
    }

    pub fn with_standings(mut self, rows: Vec<StandingsRow>) -> Self {
        self.standings.extend(rows);
        self
    }

    pub async fn seed(self) -> InMemoryStandingsStore {
        let store = InMemoryStandingsStore::new();
        self.seed_into(&store).await;
        store
    }

    pub async fn seed_into(self, store: &InMemoryStandingsStore) {
        for liga in self.ligen {
            store.insert_liga(liga).await;
        }
        for saison in self.saisons {
            store.insert_saison(saison).await;
        }
        for m in self.matches {
            store.upsert_match(m).await;
        }
        if !self.standings.is_empty() {
            store.put_standings(self.standings).await;
        }
    }
}
