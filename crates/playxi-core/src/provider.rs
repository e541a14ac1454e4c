// Interfaces to the squad and statistics collaborators.

use anyhow::Result;

use crate::lineup::player::Squad;
use crate::model::{MatchId, PlayerId, TeamId};

/// Current squad of a team. Approved replacements show up here immediately.
pub trait SquadProvider {
    fn squad(&self, team_id: TeamId) -> Result<Squad>;
}

/// Base fantasy points of a player in a match, before captaincy multipliers.
/// Players without an entry score zero.
pub trait PointsProvider {
    fn player_points(&self, player_id: PlayerId, match_id: MatchId) -> Result<f64>;
}
