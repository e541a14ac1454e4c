// Playing XI: the per-(team, match) lineup entity and its structural rules.

pub mod player;
pub mod validator;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{MatchId, PlayerId, TeamId};
use player::PlayerRef;

/// The eleven players plus captain/vice-captain designation.
///
/// This is the part of a lineup the transfer ledger prices; storage metadata
/// lives on [`Lineup`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub players: Vec<PlayerRef>,
    pub captain_id: PlayerId,
    pub vice_captain_id: PlayerId,
}

impl Selection {
    pub fn player_ids(&self) -> BTreeSet<PlayerId> {
        self.players.iter().map(|p| p.player_id).collect()
    }

    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.players.iter().any(|p| p.player_id == player_id)
    }
}

/// Who produced a stored lineup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineupSource {
    /// Explicit save by the team owner.
    User,
    /// Copied forward by auto-propagation.
    Auto,
}

impl LineupSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineupSource::User => "user",
            LineupSource::Auto => "auto",
        }
    }

    pub fn from_str_source(s: &str) -> Option<Self> {
        match s {
            "user" => Some(LineupSource::User),
            "auto" => Some(LineupSource::Auto),
            _ => None,
        }
    }
}

/// A stored lineup for one (team, match) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lineup {
    pub team_id: TeamId,
    pub match_id: MatchId,
    #[serde(flatten)]
    pub selection: Selection,
    pub source: LineupSource,
    /// 1 for the first save on this (team, match), incremented on every
    /// replacement.
    pub revision: u32,
    pub saved_at: DateTime<Utc>,
}

impl Lineup {
    /// Verbatim copy of `source` onto `match_id`, as auto-propagation writes it.
    pub fn propagated_from(source: &Lineup, match_id: MatchId, now: DateTime<Utc>) -> Self {
        Lineup {
            team_id: source.team_id,
            match_id,
            selection: source.selection.clone(),
            source: LineupSource::Auto,
            revision: 1,
            saved_at: now,
        }
    }
}

/// A lineup as submitted by a client: bare player ids, not yet checked
/// against the squad.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedLineup {
    pub players: Vec<PlayerId>,
    pub captain_id: PlayerId,
    pub vice_captain_id: PlayerId,
}
