// Auto-propagation: carry lineups forward into started matches that have none.

use std::ops::AddAssign;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::db::{self, Database};
use crate::ledger::baseline::LineupChain;
use crate::ledger::timeline::MatchTimeline;
use crate::lineup::Lineup;
use crate::model::{LeagueId, MatchId, TeamId};

/// Aggregate counts of one propagation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropagationReport {
    pub leagues_scanned: usize,
    /// Started-but-unscored matches visited.
    pub matches_processed: usize,
    pub lineups_copied: usize,
    /// (team, match) pairs left empty because the previous match had no lineup.
    pub teams_skipped: usize,
}

impl AddAssign for PropagationReport {
    fn add_assign(&mut self, other: Self) {
        self.leagues_scanned += other.leagues_scanned;
        self.matches_processed += other.matches_processed;
        self.lineups_copied += other.lineups_copied;
        self.teams_skipped += other.teams_skipped;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CopyOutcome {
    AlreadyPresent,
    Copied,
    NoSource,
}

/// Fills every started, unscored match with a verbatim copy of the team's
/// previous-match lineup. Copies cost nothing and write no audit rows.
pub struct AutoPropagationService {
    db: Arc<Database>,
}

impl AutoPropagationService {
    pub fn new(db: Arc<Database>) -> Self {
        AutoPropagationService { db }
    }

    /// Run a pass over every league. Safe to repeat: a second run with the
    /// same `now` copies nothing.
    pub fn propagate_all(&self, now: DateTime<Utc>) -> Result<PropagationReport> {
        let leagues = self.db.read(db::list_leagues)?;
        let mut report = PropagationReport::default();
        for league in &leagues {
            report += self
                .propagate_league(league.id, now)
                .with_context(|| format!("propagation failed for league {}", league.id))?;
        }

        info!(
            leagues = report.leagues_scanned,
            matches = report.matches_processed,
            copied = report.lineups_copied,
            skipped = report.teams_skipped,
            "auto-propagation pass complete"
        );
        Ok(report)
    }

    /// Run a pass over one league.
    pub fn propagate_league(
        &self,
        league_id: LeagueId,
        now: DateTime<Utc>,
    ) -> Result<PropagationReport> {
        let (timeline, teams) = self.db.read(|conn| -> Result<_> {
            db::load_league(conn, league_id)?
                .with_context(|| format!("league {league_id} not found"))?;
            Ok((
                db::load_timeline(conn, league_id)?,
                db::list_team_ids(conn, league_id)?,
            ))
        })?;

        let mut report = PropagationReport {
            leagues_scanned: 1,
            ..Default::default()
        };

        // Earliest first, so a copy made here can seed the next match.
        for target in timeline.live(now) {
            report.matches_processed += 1;
            for &team_id in &teams {
                match self.copy_forward(&timeline, team_id, target.id, now)? {
                    CopyOutcome::Copied => report.lineups_copied += 1,
                    CopyOutcome::NoSource => report.teams_skipped += 1,
                    CopyOutcome::AlreadyPresent => {}
                }
            }
        }

        if report.lineups_copied > 0 {
            info!(
                league_id,
                copied = report.lineups_copied,
                skipped = report.teams_skipped,
                "propagated lineups"
            );
        }
        Ok(report)
    }

    /// Absence check and insert share one write transaction, so a user save
    /// that lands first is never overwritten.
    fn copy_forward(
        &self,
        timeline: &MatchTimeline,
        team_id: TeamId,
        match_id: MatchId,
        now: DateTime<Utc>,
    ) -> Result<CopyOutcome> {
        self.db.with_write_tx(|tx| -> Result<CopyOutcome> {
            let chain = LineupChain::new(timeline, db::load_team_lineups(tx, team_id)?);
            if chain.get(match_id).is_some() {
                return Ok(CopyOutcome::AlreadyPresent);
            }
            let Some(source) = chain.immediate_predecessor(match_id) else {
                debug!(team_id, match_id, "previous match has no lineup, skipping");
                return Ok(CopyOutcome::NoSource);
            };

            let copy = db::replace_lineup(tx, Lineup::propagated_from(source, match_id, now))?;
            debug!(
                team_id,
                match_id,
                previous = source.match_id,
                revision = copy.revision,
                "copied lineup forward"
            );
            Ok(CopyOutcome::Copied)
        })
    }
}
