// Structural checks on a proposed lineup.

use std::collections::HashSet;

use thiserror::Error;

use super::player::Squad;
use super::{ProposedLineup, Selection};
use crate::config::LineupRules;
use crate::model::PlayerId;

/// The first rule a proposed lineup broke.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("lineup must have exactly {expected} players, got {actual}")]
    WrongPlayerCount { expected: usize, actual: usize },

    #[error("player {0} is selected more than once")]
    DuplicatePlayer(PlayerId),

    #[error("captain and vice-captain must be different players")]
    CaptainIsViceCaptain,

    #[error("captain {0} is not in the lineup")]
    CaptainNotInLineup(PlayerId),

    #[error("vice-captain {0} is not in the lineup")]
    ViceCaptainNotInLineup(PlayerId),

    #[error("player {0} is not in the team's squad")]
    NotInSquad(PlayerId),

    #[error("lineup needs at least {required} wicketkeeper(s), has {actual}")]
    NotEnoughKeepers { required: usize, actual: usize },

    #[error("lineup covers {actual} bowling overs, needs at least {required}")]
    BowlingQuotaUnmet { required: u32, actual: u32 },
}

impl ValidationError {
    /// Stable rule identifier for the wire protocol.
    pub fn rule(&self) -> &'static str {
        match self {
            ValidationError::WrongPlayerCount { .. } => "player_count",
            ValidationError::DuplicatePlayer(_) => "duplicate_player",
            ValidationError::CaptainIsViceCaptain => "captain_is_vice_captain",
            ValidationError::CaptainNotInLineup(_) => "captain_not_in_lineup",
            ValidationError::ViceCaptainNotInLineup(_) => "vice_captain_not_in_lineup",
            ValidationError::NotInSquad(_) => "not_in_squad",
            ValidationError::NotEnoughKeepers { .. } => "min_keepers",
            ValidationError::BowlingQuotaUnmet { .. } => "bowling_quota",
        }
    }
}

/// Check `proposed` against the squad and the lineup rules, short-circuiting
/// on the first failure, and resolve it into a [`Selection`] carrying the
/// squad's own player records.
///
/// Order: player count and distinctness, captain != vice-captain, both in the
/// lineup, squad membership, keeper minimum, bowling quota. Roles come from
/// the squad, never from the client.
pub fn validate(
    proposed: &ProposedLineup,
    squad: &Squad,
    rules: &LineupRules,
) -> Result<Selection, ValidationError> {
    // 1. Exactly N distinct players
    if proposed.players.len() != rules.lineup_size {
        return Err(ValidationError::WrongPlayerCount {
            expected: rules.lineup_size,
            actual: proposed.players.len(),
        });
    }
    let mut seen = HashSet::with_capacity(proposed.players.len());
    for &id in &proposed.players {
        if !seen.insert(id) {
            return Err(ValidationError::DuplicatePlayer(id));
        }
    }

    // 2-3. Captaincy
    if proposed.captain_id == proposed.vice_captain_id {
        return Err(ValidationError::CaptainIsViceCaptain);
    }
    if !seen.contains(&proposed.captain_id) {
        return Err(ValidationError::CaptainNotInLineup(proposed.captain_id));
    }
    if !seen.contains(&proposed.vice_captain_id) {
        return Err(ValidationError::ViceCaptainNotInLineup(
            proposed.vice_captain_id,
        ));
    }

    // 4. Squad membership
    let mut players = Vec::with_capacity(proposed.players.len());
    for &id in &proposed.players {
        match squad.get(id) {
            Some(p) => players.push(p.clone()),
            None => return Err(ValidationError::NotInSquad(id)),
        }
    }

    // 5. Keepers
    let keepers = players.iter().filter(|p| p.role_kind().is_keeper()).count();
    if keepers < rules.min_keepers {
        return Err(ValidationError::NotEnoughKeepers {
            required: rules.min_keepers,
            actual: keepers,
        });
    }

    // 6. Bowling overs
    let overs: u32 = players
        .iter()
        .map(|p| p.role_kind().bowling_overs(rules))
        .sum();
    if overs < rules.min_bowling_overs {
        return Err(ValidationError::BowlingQuotaUnmet {
            required: rules.min_bowling_overs,
            actual: overs,
        });
    }

    Ok(Selection {
        players,
        captain_id: proposed.captain_id,
        vice_captain_id: proposed.vice_captain_id,
    })
}
