// Match ordering and lock status for one league.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{LeagueId, MatchId};

/// A league fixture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: MatchId,
    pub league_id: LeagueId,
    /// Sequence number assigned at fixture import; breaks start-time ties.
    pub sequence: u32,
    pub scheduled_start: DateTime<Utc>,
    pub completed: bool,
}

impl Match {
    /// A match locks once its scheduled start has passed and never unlocks,
    /// because `scheduled_start` is fixed after import.
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        now >= self.scheduled_start
    }

    /// Locked, and the scoring pass has not run yet.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_locked(now) && !self.completed
    }

    fn ordering_key(&self) -> (DateTime<Utc>, u32, MatchId) {
        (self.scheduled_start, self.sequence, self.id)
    }
}

/// A league's matches in play order.
#[derive(Debug, Clone, Default)]
pub struct MatchTimeline {
    matches: Vec<Match>,
}

impl MatchTimeline {
    /// Build a timeline; input order does not matter.
    pub fn new(mut matches: Vec<Match>) -> Self {
        matches.sort_by_key(|m| m.ordering_key());
        MatchTimeline { matches }
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Match> {
        self.matches.iter()
    }

    pub fn get(&self, match_id: MatchId) -> Option<&Match> {
        self.matches.iter().find(|m| m.id == match_id)
    }

    fn position(&self, match_id: MatchId) -> Option<usize> {
        self.matches.iter().position(|m| m.id == match_id)
    }

    pub fn first(&self) -> Option<&Match> {
        self.matches.first()
    }

    /// The match immediately before `match_id` in play order.
    pub fn previous(&self, match_id: MatchId) -> Option<&Match> {
        let idx = self.position(match_id)?;
        idx.checked_sub(1).map(|i| &self.matches[i])
    }

    /// The match immediately after `match_id` in play order.
    pub fn next(&self, match_id: MatchId) -> Option<&Match> {
        let idx = self.position(match_id)?;
        self.matches.get(idx + 1)
    }

    /// All matches strictly before `match_id`, earliest first. Empty for an
    /// unknown id.
    pub fn before(&self, match_id: MatchId) -> &[Match] {
        match self.position(match_id) {
            Some(idx) => &self.matches[..idx],
            None => &[],
        }
    }

    /// Matches that are locked but not yet scored, earliest first.
    pub fn live(&self, now: DateTime<Utc>) -> impl Iterator<Item = &Match> {
        self.matches.iter().filter(move |m| m.is_live(now))
    }
}
