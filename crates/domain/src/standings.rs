//! 积分榜计算
//!
//! 纯函数：给定某联赛/赛季的比赛与现有积分榜行，得到新的有序积分榜。
//! 胜 3 分，平各 1 分，负 0 分。排序依次按积分、净胜球、进球数降序，
//! 再按队名（忽略大小写）与球队 ID 升序。

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::entities::{Match, StandingsRow};
use crate::value_objects::ScopeKey;

/// 计算作用域内的完整积分榜
///
/// 现有行会先清零，只出现在现有行中而没有已完赛比赛的球队保留在榜中。
/// 其他作用域的比赛与行会被忽略。
pub fn compute_standings(
    scope: ScopeKey,
    matches: &[Match],
    existing: &[StandingsRow],
) -> Vec<StandingsRow> {
    let mut rows: BTreeMap<i64, StandingsRow> = existing
        .iter()
        .filter(|row| row.scope() == scope)
        .map(|row| {
            let mut row = row.clone();
            row.reset();
            row.platz = 0;
            (row.team_id, row)
        })
        .collect();

    for m in matches.iter().filter(|m| m.scope() == scope) {
        let Some((heim_tore, gast_tore)) = m.final_score() else {
            continue;
        };

        let heim = rows
            .entry(m.heim.id)
            .or_insert_with(|| StandingsRow::empty(&m.heim, scope));
        heim.team_name.clone_from(&m.heim.name);
        heim.record(heim_tore, gast_tore);

        let gast = rows
            .entry(m.gast.id)
            .or_insert_with(|| StandingsRow::empty(&m.gast, scope));
        gast.team_name.clone_from(&m.gast.name);
        gast.record(gast_tore, heim_tore);
    }

    let mut rows: Vec<StandingsRow> = rows.into_values().collect();
    rank_standings(&mut rows);
    rows
}

/// 排序并写入 1 起始的名次
pub fn rank_standings(rows: &mut [StandingsRow]) {
    rows.sort_by(compare_rows);
    for (index, row) in rows.iter_mut().enumerate() {
        row.platz = index as u32 + 1;
    }
}

pub fn compare_rows(a: &StandingsRow, b: &StandingsRow) -> Ordering {
    b.punkte
        .cmp(&a.punkte)
        .then_with(|| b.tordifferenz.cmp(&a.tordifferenz))
        .then_with(|| b.tore_fuer.cmp(&a.tore_fuer))
        .then_with(|| {
            a.team_name
                .to_lowercase()
                .cmp(&b.team_name.to_lowercase())
        })
        .then_with(|| a.team_id.cmp(&b.team_id))
}

pub fn total_points(rows: &[StandingsRow]) -> u32 {
    rows.iter().map(|row| row.punkte).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{MatchStatus, TeamRef};
    use proptest::prelude::*;

    fn scope() -> ScopeKey {
        ScopeKey::new(1, 2024).unwrap()
    }

    fn completed(id: i64, heim: (i64, &str), gast: (i64, &str), score: (u32, u32)) -> Match {
        Match {
            id,
            liga_id: 1,
            saison_id: 2024,
            heim: TeamRef::new(heim.0, heim.1),
            gast: TeamRef::new(gast.0, gast.1),
            heim_tore: Some(score.0),
            gast_tore: Some(score.1),
            status: MatchStatus::Completed,
        }
    }

    const BAYERN: (i64, &str) = (1, "Bayern");
    const DORTMUND: (i64, &str) = (2, "Dortmund");
    const LEIPZIG: (i64, &str) = (3, "Leipzig");
    const LEVERKUSEN: (i64, &str) = (4, "Leverkusen");

    fn bundesliga_matches() -> Vec<Match> {
        vec![
            completed(1, BAYERN, DORTMUND, (3, 1)),
            completed(2, LEIPZIG, LEVERKUSEN, (2, 2)),
            completed(3, BAYERN, LEIPZIG, (2, 0)),
            completed(4, DORTMUND, LEVERKUSEN, (1, 1)),
        ]
    }

    fn row<'a>(rows: &'a [StandingsRow], team_id: i64) -> &'a StandingsRow {
        rows.iter().find(|r| r.team_id == team_id).unwrap()
    }

    #[test]
    fn test_bundesliga_scenario() {
        let rows = compute_standings(scope(), &bundesliga_matches(), &[]);
        assert_eq!(rows.len(), 4);

        let bayern = row(&rows, BAYERN.0);
        assert_eq!(
            (bayern.spiele, bayern.siege, bayern.unentschieden, bayern.niederlagen),
            (2, 2, 0, 0)
        );
        assert_eq!((bayern.tore_fuer, bayern.tore_gegen), (5, 1));
        assert_eq!(bayern.tordifferenz, 4);
        assert_eq!(bayern.punkte, 6);
        assert_eq!(bayern.platz, 1);

        let dortmund = row(&rows, DORTMUND.0);
        assert_eq!(
            (
                dortmund.spiele,
                dortmund.siege,
                dortmund.unentschieden,
                dortmund.niederlagen
            ),
            (2, 0, 1, 1)
        );
        assert_eq!((dortmund.tore_fuer, dortmund.tore_gegen), (2, 4));
        assert_eq!(dortmund.tordifferenz, -2);
        assert_eq!(dortmund.punkte, 1);

        // Dortmund 与 Leipzig 积分、净胜球、进球均相同，按队名排序
        let order: Vec<i64> = rows.iter().map(|r| r.team_id).collect();
        assert_eq!(order, vec![BAYERN.0, LEVERKUSEN.0, DORTMUND.0, LEIPZIG.0]);
    }

    fn table_line(row: &StandingsRow) -> (u32, u32, u32, u32, u32, u32, i64, u32) {
        (
            row.spiele,
            row.siege,
            row.unentschieden,
            row.niederlagen,
            row.tore_fuer,
            row.tore_gegen,
            row.tordifferenz,
            row.punkte,
        )
    }

    #[test]
    fn test_four_team_round_full_table() {
        let matches = vec![
            completed(1, BAYERN, DORTMUND, (3, 1)),
            completed(2, LEIPZIG, LEVERKUSEN, (2, 0)),
            completed(3, DORTMUND, LEIPZIG, (1, 1)),
            completed(4, LEVERKUSEN, BAYERN, (0, 2)),
        ];
        let rows = compute_standings(scope(), &matches, &[]);

        let order: Vec<(&str, u32)> = rows
            .iter()
            .map(|r| (r.team_name.as_str(), r.platz))
            .collect();
        assert_eq!(
            order,
            vec![("Bayern", 1), ("Leipzig", 2), ("Dortmund", 3), ("Leverkusen", 4)]
        );

        assert_eq!(table_line(row(&rows, BAYERN.0)), (2, 2, 0, 0, 5, 1, 4, 6));
        assert_eq!(table_line(row(&rows, LEIPZIG.0)), (2, 1, 1, 0, 3, 1, 2, 4));
        assert_eq!(table_line(row(&rows, DORTMUND.0)), (2, 0, 1, 1, 2, 4, -2, 1));
        assert_eq!(table_line(row(&rows, LEVERKUSEN.0)), (2, 0, 0, 2, 0, 4, -4, 0));
        assert_eq!(total_points(&rows), 11);
    }

    #[test]
    fn test_ignores_unfinished_and_foreign_matches() {
        let mut matches = bundesliga_matches();
        let mut scheduled = completed(5, BAYERN, LEVERKUSEN, (0, 0));
        scheduled.status = MatchStatus::Scheduled;
        scheduled.heim_tore = None;
        scheduled.gast_tore = None;
        matches.push(scheduled);

        let mut other_season = completed(6, BAYERN, DORTMUND, (0, 5));
        other_season.saison_id = 2023;
        matches.push(other_season);

        let rows = compute_standings(scope(), &matches, &[]);
        assert_eq!(row(&rows, BAYERN.0).spiele, 2);
        assert_eq!(row(&rows, BAYERN.0).punkte, 6);
    }

    #[test]
    fn test_existing_rows_without_matches_are_reset() {
        let mut stale = StandingsRow::empty(&TeamRef::new(9, "Absteiger"), scope());
        stale.record(4, 0);
        stale.platz = 1;

        let rows = compute_standings(scope(), &bundesliga_matches(), &[stale]);
        assert_eq!(rows.len(), 5);
        let absteiger = row(&rows, 9);
        assert_eq!(absteiger.spiele, 0);
        assert_eq!(absteiger.punkte, 0);
        assert_eq!(absteiger.platz, 5);
    }

    #[test]
    fn test_tie_break_by_name_case_insensitive_then_id() {
        let matches = vec![
            completed(1, (10, "zebra"), (11, "Alpha"), (1, 1)),
            completed(2, (12, "alpha"), (13, "Mitte"), (1, 1)),
        ];
        let rows = compute_standings(scope(), &matches, &[]);
        let order: Vec<i64> = rows.iter().map(|r| r.team_id).collect();
        assert_eq!(order, vec![11, 12, 13, 10]);
    }

    #[test]
    fn test_recalculation_is_idempotent() {
        let first = compute_standings(scope(), &bundesliga_matches(), &[]);
        let second = compute_standings(scope(), &bundesliga_matches(), &first);
        assert_eq!(first, second);
    }

    #[test]
    fn test_team_name_follows_latest_match() {
        let mut stale = StandingsRow::empty(&TeamRef::new(1, "FC Bayern München"), scope());
        stale.platz = 3;
        let rows = compute_standings(scope(), &bundesliga_matches(), &[stale]);
        assert_eq!(row(&rows, 1).team_name, "Bayern");
    }

    fn arb_match() -> impl Strategy<Value = (i64, i64, u32, u32)> {
        (1i64..8, 1i64..8, 0u32..6, 0u32..6).prop_filter("distinct teams", |(h, g, _, _)| h != g)
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            .. ProptestConfig::default()
        })]

        #[test]
        fn prop_total_points_and_invariants(games in prop::collection::vec(arb_match(), 0..40)) {
            let matches: Vec<Match> = games
                .iter()
                .enumerate()
                .map(|(i, (h, g, ht, gt))| {
                    let heim = format!("Team {h}");
                    let gast = format!("Team {g}");
                    completed(i as i64, (*h, heim.as_str()), (*g, gast.as_str()), (*ht, *gt))
                })
                .collect();

            let decisive = games.iter().filter(|(_, _, ht, gt)| ht != gt).count() as u32;
            let drawn = games.len() as u32 - decisive;

            let rows = compute_standings(scope(), &matches, &[]);
            prop_assert_eq!(total_points(&rows), 3 * decisive + 2 * drawn);
            prop_assert!(rows.iter().all(StandingsRow::invariants_hold));

            let platz: Vec<u32> = rows.iter().map(|r| r.platz).collect();
            let expected: Vec<u32> = (1..=rows.len() as u32).collect();
            prop_assert_eq!(platz, expected);

            let again = compute_standings(scope(), &matches, &rows);
            prop_assert_eq!(again, rows);
        }
    }
}
