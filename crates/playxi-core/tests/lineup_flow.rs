// Season walk-throughs over a fresh database: saves, propagation and
// scoring driven through the public services.

use std::sync::Arc;
use std::thread;

use chrono::{DateTime, Duration, TimeZone, Utc};
use playxi_core::config::LineupRules;
use playxi_core::db::Database;
use playxi_core::error::{LineupError, SequenceError};
use playxi_core::ledger::transfer::Budget;
use playxi_core::lineup::player::PlayerRef;
use playxi_core::lineup::LineupSource;
use playxi_core::model::{LeagueId, MatchId, PlayerId, TeamId};
use playxi_core::propagation::AutoPropagationService;
use playxi_core::scoring;
use playxi_core::service::{LineupService, SaveLineupRequest};

fn kickoff(match_no: usize) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 20, 14, 0, 0).unwrap() + Duration::days(match_no as i64)
}

fn before_kickoff(match_no: usize) -> DateTime<Utc> {
    kickoff(match_no) - Duration::hours(2)
}

fn squad() -> Vec<PlayerRef> {
    (1..=16)
        .map(|id| PlayerRef {
            player_id: id,
            name: format!("Player {id}"),
            role: match id {
                1..=2 => "Wicket Keeper",
                3..=8 => "Batsman",
                9..=14 => "Bowler",
                _ => "Bowling Allrounder",
            }
            .into(),
            squad_tag: "IND".into(),
        })
        .collect()
}

const XI: [PlayerId; 11] = [1, 3, 4, 5, 6, 7, 9, 10, 11, 12, 13];

fn swapped(base: &[PlayerId], out: PlayerId, incoming: PlayerId) -> Vec<PlayerId> {
    base.iter()
        .map(|&id| if id == out { incoming } else { id })
        .collect()
}

struct Season {
    db: Arc<Database>,
    service: LineupService,
    league: LeagueId,
    team: TeamId,
    matches: Vec<MatchId>,
}

fn season(limit: u32) -> Season {
    season_at(":memory:", limit)
}

fn season_at(path: &str, limit: u32) -> Season {
    let db = Arc::new(Database::open(path).unwrap());
    let league = db.insert_league("Premier", limit).unwrap();
    let team = db.insert_team(league, "Strikers").unwrap();
    db.set_squad(team, &squad()).unwrap();
    let matches = (1..=6)
        .map(|n| db.insert_match(league, n as u32, kickoff(n)).unwrap())
        .collect();
    Season {
        service: LineupService::new(db.clone(), LineupRules::default()),
        db,
        league,
        team,
        matches,
    }
}

impl Season {
    fn request(
        &self,
        match_no: usize,
        players: &[PlayerId],
        captain: PlayerId,
        vice: PlayerId,
    ) -> SaveLineupRequest {
        SaveLineupRequest {
            team_id: self.team,
            match_id: self.matches[match_no - 1],
            league_id: self.league,
            players: players.to_vec(),
            captain_id: captain,
            vice_captain_id: vice,
        }
    }

    fn save(
        &self,
        match_no: usize,
        players: &[PlayerId],
        captain: PlayerId,
        vice: PlayerId,
    ) -> Result<playxi_core::service::SaveOutcome, LineupError> {
        self.service.save_lineup(
            &self.request(match_no, players, captain, vice),
            before_kickoff(match_no),
        )
    }
}

#[test]
fn first_save_is_free_with_full_budget() {
    let s = season(10);
    let outcome = s.save(1, &XI, 3, 4).unwrap();
    assert_eq!(outcome.transfers_this_match, 0);
    assert_eq!(outcome.transfers_remaining, 10);
    assert!(!outcome.captain_change_consumed);
    assert!(!outcome.vc_change_consumed);
}

#[test]
fn one_swap_costs_one() {
    let s = season(10);
    s.save(1, &XI, 3, 4).unwrap();
    let outcome = s.save(2, &swapped(&XI, 13, 14), 3, 4).unwrap();
    assert_eq!(outcome.transfers_this_match, 1);
    assert_eq!(outcome.breakdown.player_transfers, 1);
    assert_eq!(outcome.transfers_remaining, 9);
}

#[test]
fn captain_change_is_charged_once_and_reselection_is_free() {
    let s = season(10);
    s.save(1, &XI, 3, 4).unwrap();
    s.save(2, &XI, 3, 4).unwrap();

    let changed = s.save(3, &XI, 5, 4).unwrap();
    assert_eq!(changed.transfers_this_match, 1);
    assert_eq!(changed.breakdown.captain_cost, 1);
    assert!(changed.captain_change_consumed);

    // Keeping the new captain is not another change.
    let kept = s.save(4, &XI, 5, 4).unwrap();
    assert_eq!(kept.transfers_this_match, 0);
    assert_eq!(kept.transfers_remaining, 9);
    assert!(kept.captain_change_consumed);
}

#[test]
fn third_captain_is_rejected_without_mutation() {
    let s = season(10);
    s.save(1, &XI, 3, 4).unwrap();
    s.save(2, &XI, 5, 4).unwrap();
    let history_before = s.service.transfer_history(s.team).unwrap();

    let err = s.save(3, &XI, 6, 4).unwrap_err();
    match &err {
        LineupError::BudgetExceeded(exceeded) => {
            assert_eq!(exceeded.budget, Budget::Captain);
            assert_eq!(exceeded.transfers_remaining, 9);
        }
        other => panic!("expected captain budget rejection, got {other:?}"),
    }
    assert_eq!(err.kind(), "budget_exceeded");

    assert!(s.db.lineup(s.team, s.matches[2]).unwrap().is_none());
    assert_eq!(s.service.transfer_history(s.team).unwrap(), history_before);
    let summary = s.service.transfer_summary(s.team).unwrap();
    assert_eq!(summary.transfers_used, 1);
    assert_eq!(summary.lineups_saved, 2);
}

#[test]
fn propagation_carries_lineup_forward_at_no_cost() {
    let s = season(10);
    s.save(1, &XI, 3, 4).unwrap();
    let second = swapped(&XI, 13, 14);
    s.save(2, &second, 3, 4).unwrap();

    // Match 3 starts with nothing saved for it.
    let propagation = AutoPropagationService::new(s.db.clone());
    let report = propagation
        .propagate_league(s.league, kickoff(3) + Duration::minutes(1))
        .unwrap();
    assert_eq!(report.lineups_copied, 1);

    let copy = s.db.lineup(s.team, s.matches[2]).unwrap().unwrap();
    let source = s.db.lineup(s.team, s.matches[1]).unwrap().unwrap();
    assert_eq!(copy.source, LineupSource::Auto);
    assert_eq!(copy.selection, source.selection);

    let summary = s.service.transfer_summary(s.team).unwrap();
    assert_eq!(summary.transfers_used, 1);
    assert_eq!(summary.lineups_saved, 3);

    // The copy is the baseline for match 4.
    let next = s.save(4, &second, 3, 4).unwrap();
    assert_eq!(next.transfers_this_match, 0);
    assert_eq!(next.transfers_remaining, 9);
}

#[test]
fn saving_ahead_of_an_open_match_is_a_sequence_error() {
    let s = season(10);
    s.save(1, &XI, 3, 4).unwrap();
    s.save(2, &XI, 3, 4).unwrap();

    // Match 3 has not started yet.
    let err = s
        .service
        .save_lineup(&s.request(4, &XI, 3, 4), before_kickoff(3))
        .unwrap_err();
    assert!(matches!(
        err,
        LineupError::Sequence(SequenceError::PredecessorNotLocked { .. })
    ));
}

#[test]
fn gap_in_chain_must_be_filled_first() {
    let s = season(10);
    s.save(1, &XI, 3, 4).unwrap();

    // Match 2 started without a lineup and nothing propagated it.
    let err = s.save(3, &XI, 3, 4).unwrap_err();
    assert!(matches!(
        err,
        LineupError::Sequence(SequenceError::MissingPredecessorLineup { .. })
    ));
}

#[test]
fn late_joiner_first_lineup_is_free() {
    let s = season(10);
    let outcome = s.save(4, &XI, 3, 4).unwrap();
    assert_eq!(outcome.transfers_this_match, 0);
    assert_eq!(outcome.transfers_remaining, 10);

    let next = s.save(5, &swapped(&XI, 12, 14), 5, 4).unwrap();
    assert_eq!(next.transfers_this_match, 2);
}

#[test]
fn swap_and_swap_back_cost_the_same() {
    let s = season(10);
    s.save(1, &XI, 3, 4).unwrap();
    let out = s.save(2, &swapped(&XI, 13, 14), 3, 4).unwrap();
    let back = s.save(3, &XI, 3, 4).unwrap();
    assert_eq!(out.transfers_this_match, back.transfers_this_match);
    assert_eq!(back.transfers_remaining, 8);
}

#[test]
fn spend_never_decreases_and_overdraft_is_rejected() {
    let s = season(2);
    s.save(1, &XI, 3, 4).unwrap();
    let first = s.save(2, &swapped(&XI, 13, 14), 3, 4).unwrap();
    assert_eq!(first.transfers_remaining, 1);

    let wider = swapped(&swapped(&XI, 13, 14), 12, 15);
    let wider = swapped(&wider, 7, 8);
    let err = s.save(3, &wider, 3, 4).unwrap_err();
    match &err {
        LineupError::BudgetExceeded(exceeded) => {
            assert_eq!(exceeded.budget, Budget::Transfers);
            assert_eq!(exceeded.remaining, 1);
            assert_eq!(exceeded.requested, 2);
        }
        other => panic!("expected transfer budget rejection, got {other:?}"),
    }

    let team = s.db.team(s.team).unwrap().unwrap();
    assert_eq!(team.transfers_used, 1);
    assert!(s.db.lineup(s.team, s.matches[2]).unwrap().is_none());
}

#[test]
fn started_matches_stay_locked() {
    let s = season(10);
    s.save(1, &XI, 3, 4).unwrap();

    for later in [kickoff(1), kickoff(1) + Duration::days(30)] {
        let err = s
            .service
            .save_lineup(&s.request(1, &XI, 5, 4), later)
            .unwrap_err();
        assert_eq!(err.kind(), "locked_match");
    }

    let scored_at = kickoff(1) + Duration::hours(4);
    scoring::score_match(&s.db, s.db.as_ref(), s.matches[0], scored_at).unwrap();
    let err = s
        .service
        .save_lineup(&s.request(1, &XI, 5, 4), kickoff(1) + Duration::hours(5))
        .unwrap_err();
    assert!(matches!(err, LineupError::LockedMatch { completed: true, .. }));
}

#[test]
fn scoring_applies_captaincy() {
    let s = season(10);
    s.save(1, &XI, 3, 4).unwrap();
    s.db.record_player_points(3, s.matches[0], 40.0).unwrap();
    s.db.record_player_points(4, s.matches[0], 15.0).unwrap();
    s.db.record_player_points(9, s.matches[0], 12.0).unwrap();

    let report =
        scoring::score_match(&s.db, s.db.as_ref(), s.matches[0], kickoff(1) + Duration::hours(4))
            .unwrap();
    assert_eq!(report.totals.len(), 1);
    // 40 * 2 + trunc(15 * 1.5) + 12
    assert_eq!(report.totals[0].points, 80.0 + 22.0 + 12.0);
}

#[test]
fn concurrent_saves_from_separate_handles_stay_within_budget() {
    let path = std::env::temp_dir().join(format!("playxi_concurrent_{}.db", std::process::id()));
    let path = path.to_string_lossy().into_owned();
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{path}{suffix}"));
    }
    let s = season_at(&path, 1);
    s.save(1, &XI, 3, 4).unwrap();

    let swaps = [(13, 14), (12, 15), (13, 16), (12, 14)];
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let path = path.clone();
            let (out, incoming) = swaps[i % swaps.len()];
            let request = s.request(2, &swapped(&XI, out, incoming), 3, 4);
            thread::spawn(move || {
                let db = Arc::new(Database::open(&path).unwrap());
                let service = LineupService::new(db, LineupRules::default());
                service.save_lineup(&request, before_kickoff(2))
            })
        })
        .collect();

    for handle in handles {
        let outcome = handle.join().unwrap().unwrap();
        // Each save is priced against match 1, never on top of another save.
        assert_eq!(outcome.transfers_this_match, 1);
        assert_eq!(outcome.transfers_remaining, 0);
    }

    let summary = s.service.transfer_summary(s.team).unwrap();
    assert_eq!(summary.transfers_used, 1);
    assert_eq!(summary.lineups_saved, 2);
    let team = s.db.team(s.team).unwrap().unwrap();
    assert_eq!(team.transfers_used, summary.transfers_used);

    let revisions: Vec<u32> = s
        .db
        .lineup_history(s.team, s.matches[1])
        .unwrap()
        .iter()
        .map(|l| l.revision)
        .collect();
    assert_eq!(revisions, (1..=8).collect::<Vec<_>>());

    drop(s);
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{path}{suffix}"));
    }
}
