// Captaincy multipliers and the per-match scoring pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::{self, Database};
use crate::error::LineupError;
use crate::lineup::Selection;
use crate::model::{MatchId, PlayerId, TeamMatchPoints};
use crate::provider::PointsProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Designation {
    Captain,
    ViceCaptain,
    Player,
}

impl Designation {
    pub fn of(selection: &Selection, player_id: PlayerId) -> Self {
        if player_id == selection.captain_id {
            Designation::Captain
        } else if player_id == selection.vice_captain_id {
            Designation::ViceCaptain
        } else {
            Designation::Player
        }
    }
}

/// Apply the captaincy multiplier: double for the captain, one and a half
/// (truncated toward zero) for the vice-captain.
pub fn final_points(base: f64, designation: Designation) -> f64 {
    match designation {
        Designation::Captain => base * 2.0,
        Designation::ViceCaptain => (base * 1.5).trunc(),
        Designation::Player => base,
    }
}

/// Team total for one match.
pub fn team_points(
    selection: &Selection,
    match_id: MatchId,
    provider: &dyn PointsProvider,
) -> anyhow::Result<f64> {
    let mut total = 0.0;
    for player in &selection.players {
        let base = provider.player_points(player.player_id, match_id)?;
        total += final_points(base, Designation::of(selection, player.player_id));
    }
    Ok(total)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreReport {
    pub match_id: MatchId,
    pub totals: Vec<TeamMatchPoints>,
}

/// Score every lineup of a started match, store the totals and mark the
/// match completed. Running it again overwrites the totals.
pub fn score_match(
    database: &Database,
    provider: &dyn PointsProvider,
    match_id: MatchId,
    now: DateTime<Utc>,
) -> Result<ScoreReport, LineupError> {
    let (fixture, lineups) = database.read(|conn| -> Result<_, LineupError> {
        let fixture = db::load_match(conn, match_id)?
            .ok_or_else(|| LineupError::not_found("match", match_id))?;
        Ok((fixture, db::load_match_lineups(conn, match_id)?))
    })?;
    if !fixture.is_locked(now) {
        return Err(LineupError::NotYetLocked { match_id });
    }

    // Provider lookups happen outside the write lock; the provider may be
    // this same database.
    let mut totals = Vec::with_capacity(lineups.len());
    for lineup in &lineups {
        totals.push(TeamMatchPoints {
            team_id: lineup.team_id,
            match_id,
            points: team_points(&lineup.selection, match_id, provider)?,
        });
    }

    database.with_write_tx(|tx| -> Result<(), LineupError> {
        db::load_match(tx, match_id)?.ok_or_else(|| LineupError::not_found("match", match_id))?;
        for points in &totals {
            db::upsert_team_points(tx, points)?;
        }
        db::mark_match_completed(tx, match_id)?;
        Ok(())
    })?;

    info!(match_id, teams = totals.len(), "match scored");
    Ok(ScoreReport { match_id, totals })
}
