// Save/get entry point composing validation, baseline resolution and the
// transfer ledger inside one storage transaction.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::LineupRules;
use crate::db::{self, Database};
use crate::error::{LineupError, SequenceError};
use crate::ledger::baseline::LineupChain;
use crate::ledger::timeline::{Match, MatchTimeline};
use crate::ledger::transfer::{self, PriceBreakdown};
use crate::lineup::player::Squad;
use crate::lineup::validator;
use crate::lineup::{Lineup, LineupSource, ProposedLineup};
use crate::model::{League, LeagueId, MatchId, PlayerId, Team, TeamId, TransferRecord};
use crate::provider::SquadProvider;

/// A user's request to set the lineup of one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveLineupRequest {
    pub team_id: TeamId,
    pub match_id: MatchId,
    pub league_id: LeagueId,
    pub players: Vec<PlayerId>,
    pub captain_id: PlayerId,
    pub vice_captain_id: PlayerId,
}

impl SaveLineupRequest {
    fn proposed(&self) -> ProposedLineup {
        ProposedLineup {
            players: self.players.clone(),
            captain_id: self.captain_id,
            vice_captain_id: self.vice_captain_id,
        }
    }
}

/// Result of an accepted save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    pub transfers_this_match: u32,
    pub transfers_remaining: u32,
    /// The one-shot captain change is spent once this save is applied.
    pub captain_change_consumed: bool,
    /// Same, for the vice-captain.
    pub vc_change_consumed: bool,
    pub breakdown: PriceBreakdown,
    pub revision: u32,
}

/// A stored lineup together with the match's edit window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineupView {
    pub lineup: Option<Lineup>,
    pub is_locked: bool,
    pub is_editable: bool,
}

/// Ledger totals for a team, recomputed from its lineup chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSummary {
    pub transfer_limit: u32,
    pub transfers_used: u32,
    pub transfers_remaining: u32,
    pub captain_change_used: bool,
    pub vice_captain_change_used: bool,
    pub lineups_saved: usize,
}

/// Where a save looks up the team's squad.
enum SquadSource {
    /// The `squad_members` table, read inside the save transaction.
    Store,
    /// An outside provider, consulted before the transaction opens.
    External(Arc<dyn SquadProvider + Send + Sync>),
}

/// The one place lineups are saved, read and removed.
pub struct LineupService {
    db: Arc<Database>,
    squads: SquadSource,
    rules: LineupRules,
}

impl LineupService {
    /// Service whose squads come from the database itself.
    pub fn new(db: Arc<Database>, rules: LineupRules) -> Self {
        LineupService {
            db,
            squads: SquadSource::Store,
            rules,
        }
    }

    pub fn with_squad_provider(
        db: Arc<Database>,
        squads: Arc<dyn SquadProvider + Send + Sync>,
        rules: LineupRules,
    ) -> Self {
        LineupService {
            db,
            squads: SquadSource::External(squads),
            rules,
        }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Validate, price and store a lineup. Either everything is written
    /// (lineup, audit rows, cached counters) or nothing is.
    pub fn save_lineup(
        &self,
        req: &SaveLineupRequest,
        now: DateTime<Utc>,
    ) -> Result<SaveOutcome, LineupError> {
        let external = match &self.squads {
            SquadSource::Store => None,
            SquadSource::External(provider) => Some(provider.squad(req.team_id)?),
        };
        let result = self.db.with_write_tx(|tx| -> Result<SaveOutcome, LineupError> {
            // A squad replacement committed before this transaction is seen here.
            let squad = match external {
                Some(squad) => squad,
                None => db::load_squad(tx, req.team_id)?,
            };
            self.save_in_tx(tx, req, &squad, now)
        });

        match &result {
            Ok(outcome) => info!(
                team_id = req.team_id,
                match_id = req.match_id,
                cost = outcome.transfers_this_match,
                remaining = outcome.transfers_remaining,
                revision = outcome.revision,
                "lineup saved"
            ),
            Err(e) => warn!(
                team_id = req.team_id,
                match_id = req.match_id,
                kind = e.kind(),
                "lineup rejected: {e}"
            ),
        }
        result
    }

    fn save_in_tx(
        &self,
        conn: &Connection,
        req: &SaveLineupRequest,
        squad: &Squad,
        now: DateTime<Utc>,
    ) -> Result<SaveOutcome, LineupError> {
        let league = db::load_league(conn, req.league_id)?
            .ok_or_else(|| LineupError::not_found("league", req.league_id))?;
        let team = load_team_in(conn, req.team_id, league.id)?;
        let timeline = db::load_timeline(conn, league.id)?;
        let target = timeline
            .get(req.match_id)
            .ok_or_else(|| LineupError::not_found("match", req.match_id))?;

        ensure_open(target, now)?;
        let predecessor = timeline.previous(target.id);
        if let Some(prev) = predecessor {
            if !prev.is_locked(now) {
                return Err(SequenceError::PredecessorNotLocked {
                    match_id: target.id,
                    predecessor_id: prev.id,
                }
                .into());
            }
        }

        let chain = LineupChain::new(&timeline, db::load_team_lineups(conn, team.id)?);
        let earlier = chain.before(target.id);
        if let Some(prev) = predecessor {
            if !earlier.is_empty() && chain.get(prev.id).is_none() {
                return Err(SequenceError::MissingPredecessorLineup {
                    match_id: target.id,
                    predecessor_id: prev.id,
                }
                .into());
            }
        }

        let selection = validator::validate(&req.proposed(), squad, &self.rules)?;

        let baseline = chain
            .resolve_baseline(target.id, now)
            .map(|l| &l.selection);
        let cost = transfer::price_change(baseline, &selection);
        let before = transfer::replay(earlier.iter().map(|l| &l.selection));
        let assessment = transfer::assess(before, cost, league.transfer_limit)?;
        let items = transfer::itemize(baseline, &selection);

        let stored = db::replace_lineup(
            conn,
            Lineup {
                team_id: team.id,
                match_id: target.id,
                selection,
                source: LineupSource::User,
                revision: 0,
                saved_at: now,
            },
        )?;
        db::insert_transfer_records(conn, team.id, target.id, stored.revision, &items, now)?;
        db::update_team_counters(conn, team.id, &assessment.after)?;

        Ok(SaveOutcome {
            transfers_this_match: cost.total,
            transfers_remaining: assessment.transfers_remaining(),
            captain_change_consumed: assessment.captain_change_consumed(),
            vc_change_consumed: assessment.vice_captain_change_consumed(),
            breakdown: cost,
            revision: stored.revision,
        })
    }

    /// The stored lineup for a match, if any, with its lock status.
    pub fn get_lineup(
        &self,
        team_id: TeamId,
        match_id: MatchId,
        now: DateTime<Utc>,
    ) -> Result<LineupView, LineupError> {
        self.db.read(|conn| -> Result<LineupView, LineupError> {
            let (_, timeline) = load_team_context(conn, team_id)?;
            let target = timeline
                .get(match_id)
                .ok_or_else(|| LineupError::not_found("match", match_id))?;
            let lineup = db::load_lineup(conn, team_id, match_id)?;
            Ok(LineupView {
                lineup,
                is_locked: target.is_locked(now),
                is_editable: is_editable(&timeline, target, now),
            })
        })
    }

    /// Remove the pending lineup of a match that has not started. Returns
    /// whether a lineup was there.
    pub fn delete_lineup(
        &self,
        team_id: TeamId,
        match_id: MatchId,
        now: DateTime<Utc>,
    ) -> Result<bool, LineupError> {
        let removed = self.db.with_write_tx(|tx| -> Result<bool, LineupError> {
            let (league, timeline) = load_team_context(tx, team_id)?;
            let target = timeline
                .get(match_id)
                .ok_or_else(|| LineupError::not_found("match", match_id))?;
            ensure_open(target, now)?;

            let removed = db::delete_lineup(tx, team_id, match_id)?;
            if removed {
                let chain = LineupChain::new(&timeline, db::load_team_lineups(tx, team_id)?);
                let totals = transfer::replay(chain.ordered().iter().map(|l| &l.selection));
                db::update_team_counters(tx, team_id, &totals)?;
                info!(
                    team_id,
                    match_id,
                    league_id = league.id,
                    "pending lineup deleted"
                );
            }
            Ok(removed)
        })?;
        Ok(removed)
    }

    /// Budget usage recomputed from the team's whole chain.
    pub fn transfer_summary(&self, team_id: TeamId) -> Result<TransferSummary, LineupError> {
        self.db.read(|conn| -> Result<TransferSummary, LineupError> {
            let (league, timeline) = load_team_context(conn, team_id)?;
            let chain = LineupChain::new(&timeline, db::load_team_lineups(conn, team_id)?);
            let totals = transfer::replay(chain.ordered().iter().map(|l| &l.selection));
            Ok(TransferSummary {
                transfer_limit: league.transfer_limit,
                transfers_used: totals.spent,
                transfers_remaining: league.transfer_limit.saturating_sub(totals.spent),
                captain_change_used: totals.captain_changes > 0,
                vice_captain_change_used: totals.vice_captain_changes > 0,
                lineups_saved: totals.lineups,
            })
        })
    }

    /// The team's audit trail, oldest first.
    pub fn transfer_history(&self, team_id: TeamId) -> Result<Vec<TransferRecord>, LineupError> {
        self.db.read(|conn| -> Result<Vec<TransferRecord>, LineupError> {
            db::load_team(conn, team_id)?
                .ok_or_else(|| LineupError::not_found("team", team_id))?;
            Ok(db::load_transfer_records(conn, team_id)?)
        })
    }
}

fn ensure_open(target: &Match, now: DateTime<Utc>) -> Result<(), LineupError> {
    if target.completed || target.is_locked(now) {
        return Err(LineupError::LockedMatch {
            match_id: target.id,
            completed: target.completed,
        });
    }
    Ok(())
}

/// Not started, not scored, and the previous match (if any) has started.
fn is_editable(timeline: &MatchTimeline, target: &Match, now: DateTime<Utc>) -> bool {
    !target.is_locked(now)
        && !target.completed
        && timeline
            .previous(target.id)
            .map_or(true, |prev| prev.is_locked(now))
}

fn load_team_in(
    conn: &Connection,
    team_id: TeamId,
    league_id: LeagueId,
) -> Result<Team, LineupError> {
    match db::load_team(conn, team_id)? {
        Some(team) if team.league_id == league_id => Ok(team),
        _ => Err(LineupError::not_found("team", team_id)),
    }
}

fn load_team_context(
    conn: &Connection,
    team_id: TeamId,
) -> Result<(League, MatchTimeline), LineupError> {
    let team = db::load_team(conn, team_id)?
        .ok_or_else(|| LineupError::not_found("team", team_id))?;
    let league = db::load_league(conn, team.league_id)?
        .ok_or_else(|| LineupError::not_found("league", team.league_id))?;
    let timeline = db::load_timeline(conn, league.id)?;
    Ok((league, timeline))
}
