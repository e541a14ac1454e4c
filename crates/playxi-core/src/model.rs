// League-level entities shared by the ledger, the store and the wire protocol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::transfer::TransferKind;

pub type LeagueId = i64;
pub type TeamId = i64;
pub type MatchId = i64;
pub type PlayerId = i64;

/// A fantasy league tied to one tournament.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct League {
    pub id: LeagueId,
    pub name: String,
    /// Season-long transfer budget shared by player swaps and captain/VC changes.
    pub transfer_limit: u32,
}

/// A league participant.
///
/// The counters are a cache of the last chain replay written by the save
/// path. Nothing reads them to make an accounting decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: TeamId,
    pub league_id: LeagueId,
    pub name: String,
    pub transfers_used: u32,
    pub captain_change_used: bool,
    pub vice_captain_change_used: bool,
}

/// Append-only audit row for one applied change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRecord {
    pub team_id: TeamId,
    pub match_id: MatchId,
    /// Lineup revision the change was applied in.
    pub revision: u32,
    pub kind: TransferKind,
    pub outgoing: PlayerId,
    pub incoming: PlayerId,
    pub created_at: DateTime<Utc>,
}

/// A team's scored total for one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamMatchPoints {
    pub team_id: TeamId,
    pub match_id: MatchId,
    pub points: f64,
}
