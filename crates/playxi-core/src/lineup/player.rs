// Player references, role classification and squads.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::LineupRules;
use crate::model::PlayerId;

/// A player as the lineup sees them. `role` is the free-text label from the
/// statistics feed; use [`PlayerRef::role_kind`] for anything rule-related.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRef {
    pub player_id: PlayerId,
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub squad_tag: String,
}

impl PlayerRef {
    pub fn role_kind(&self) -> Role {
        classify_role(&self.role)
    }
}

/// Closed set of cricket roles the lineup rules care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Keeper,
    Batter,
    Bowler,
    BattingAllrounder,
    BowlingAllrounder,
    Unknown,
}

impl Role {
    pub fn display_str(&self) -> &'static str {
        match self {
            Role::Keeper => "WK",
            Role::Batter => "BAT",
            Role::Bowler => "BOWL",
            Role::BattingAllrounder => "BAT-AR",
            Role::BowlingAllrounder => "BOWL-AR",
            Role::Unknown => "?",
        }
    }

    pub fn is_keeper(&self) -> bool {
        matches!(self, Role::Keeper)
    }

    /// Overs this role contributes towards the lineup's bowling quota.
    pub fn bowling_overs(&self, rules: &LineupRules) -> u32 {
        match self {
            Role::Bowler => rules.bowler_overs,
            Role::BowlingAllrounder => rules.bowling_allrounder_overs,
            Role::BattingAllrounder => rules.batting_allrounder_overs,
            Role::Keeper | Role::Batter | Role::Unknown => 0,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

/// Classify a free-text role label from the data feed.
///
/// Matching is case-insensitive containment, checked in this order:
/// - "wicket" / "wk" -> Keeper (e.g. "Wicketkeeper Batter", "WK-Batsman")
/// - an all-rounder label mentioning "bowl" -> BowlingAllrounder
/// - any other all-rounder label -> BattingAllrounder
/// - "bowl" -> Bowler
/// - "bat" -> Batter
///
/// Anything else is `Unknown` and counts for nothing.
pub fn classify_role(raw: &str) -> Role {
    let label = raw.trim().to_lowercase();
    if label.is_empty() {
        return Role::Unknown;
    }

    if label.contains("wicket") || label.contains("wk") {
        return Role::Keeper;
    }

    let compact: String = label
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    if compact.contains("allrounder") {
        return if label.contains("bowl") {
            Role::BowlingAllrounder
        } else {
            Role::BattingAllrounder
        };
    }

    if label.contains("bowl") {
        Role::Bowler
    } else if label.contains("bat") {
        Role::Batter
    } else {
        Role::Unknown
    }
}

/// A team's drafted roster, keyed by player id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Squad {
    members: HashMap<PlayerId, PlayerRef>,
}

impl Squad {
    pub fn new(players: impl IntoIterator<Item = PlayerRef>) -> Self {
        Squad {
            members: players.into_iter().map(|p| (p.player_id, p)).collect(),
        }
    }

    pub fn get(&self, player_id: PlayerId) -> Option<&PlayerRef> {
        self.members.get(&player_id)
    }

    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.members.contains_key(&player_id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
