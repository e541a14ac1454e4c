// Transfer pricing, chain replay and budget enforcement.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lineup::Selection;
use crate::model::PlayerId;

/// Cost of moving from a baseline to a proposed selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    /// Players in the proposal that were not in the baseline.
    pub player_transfers: u32,
    /// 1 if the captain differs from the baseline's.
    pub captain_cost: u32,
    /// 1 if the vice-captain differs from the baseline's.
    pub vice_captain_cost: u32,
    pub total: u32,
}

/// Price `proposed` against `baseline`. A missing baseline makes the
/// selection free, whatever it contains.
pub fn price_change(baseline: Option<&Selection>, proposed: &Selection) -> PriceBreakdown {
    let Some(baseline) = baseline else {
        return PriceBreakdown::default();
    };

    let before = baseline.player_ids();
    let player_transfers = proposed
        .player_ids()
        .iter()
        .filter(|id| !before.contains(id))
        .count() as u32;
    let captain_cost = u32::from(proposed.captain_id != baseline.captain_id);
    let vice_captain_cost = u32::from(proposed.vice_captain_id != baseline.vice_captain_id);

    PriceBreakdown {
        player_transfers,
        captain_cost,
        vice_captain_cost,
        total: player_transfers + captain_cost + vice_captain_cost,
    }
}

/// Kind of an audited change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    Substitution,
    CaptainChange,
    ViceCaptainChange,
}

impl TransferKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferKind::Substitution => "substitution",
            TransferKind::CaptainChange => "captain_change",
            TransferKind::ViceCaptainChange => "vice_captain_change",
        }
    }

    pub fn from_str_kind(s: &str) -> Option<Self> {
        match s {
            "substitution" => Some(TransferKind::Substitution),
            "captain_change" => Some(TransferKind::CaptainChange),
            "vice_captain_change" => Some(TransferKind::ViceCaptainChange),
            _ => None,
        }
    }
}

/// One priced unit of a change, as written to the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferItem {
    pub kind: TransferKind,
    pub outgoing: PlayerId,
    pub incoming: PlayerId,
}

/// Break a priced change into audit items. Substitutions pair removed and
/// added players in ascending id order; the item count always equals
/// `price_change(..).total`.
pub fn itemize(baseline: Option<&Selection>, proposed: &Selection) -> Vec<TransferItem> {
    let Some(baseline) = baseline else {
        return Vec::new();
    };

    let before = baseline.player_ids();
    let after = proposed.player_ids();
    let mut items: Vec<TransferItem> = before
        .difference(&after)
        .zip(after.difference(&before))
        .map(|(&outgoing, &incoming)| TransferItem {
            kind: TransferKind::Substitution,
            outgoing,
            incoming,
        })
        .collect();

    if proposed.captain_id != baseline.captain_id {
        items.push(TransferItem {
            kind: TransferKind::CaptainChange,
            outgoing: baseline.captain_id,
            incoming: proposed.captain_id,
        });
    }
    if proposed.vice_captain_id != baseline.vice_captain_id {
        items.push(TransferItem {
            kind: TransferKind::ViceCaptainChange,
            outgoing: baseline.vice_captain_id,
            incoming: proposed.vice_captain_id,
        });
    }
    items
}

/// Totals obtained by pricing every consecutive pair of a lineup chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainReplay {
    pub lineups: usize,
    pub spent: u32,
    pub captain_changes: u32,
    pub vice_captain_changes: u32,
}

impl ChainReplay {
    /// Fold one more priced link into the totals.
    pub fn with(mut self, cost: PriceBreakdown) -> Self {
        self.lineups += 1;
        self.spent += cost.total;
        self.captain_changes += cost.captain_cost;
        self.vice_captain_changes += cost.vice_captain_cost;
        self
    }
}

/// Recompute cumulative spend from scratch. The first selection is priced
/// against nothing, each later one against its predecessor in the chain.
pub fn replay<'a, I>(chain: I) -> ChainReplay
where
    I: IntoIterator<Item = &'a Selection>,
{
    let mut totals = ChainReplay::default();
    let mut previous: Option<&Selection> = None;
    for selection in chain {
        totals = totals.with(price_change(previous, selection));
        previous = Some(selection);
    }
    totals
}

/// Which budget a rejected save would have overdrawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Budget {
    Transfers,
    Captain,
    ViceCaptain,
}

impl fmt::Display for Budget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Budget::Transfers => "transfer",
            Budget::Captain => "captain change",
            Budget::ViceCaptain => "vice-captain change",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "{budget} budget exceeded: {spent} of {limit} used, {remaining} remaining, \
     this change costs {requested}"
)]
pub struct BudgetExceeded {
    pub budget: Budget,
    pub spent: u32,
    pub limit: u32,
    pub remaining: u32,
    pub requested: u32,
    /// Player-transfer units left, reported whichever budget was hit.
    pub transfers_remaining: u32,
}

/// Lifetime allowance of captain and of vice-captain reassignments.
pub const ONE_SHOT_CHANGES: u32 = 1;

/// An accepted change: the replay before the target, the cost of the
/// proposal and the resulting totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assessment {
    pub before: ChainReplay,
    pub cost: PriceBreakdown,
    pub after: ChainReplay,
    pub transfer_limit: u32,
}

impl Assessment {
    pub fn transfers_remaining(&self) -> u32 {
        self.transfer_limit.saturating_sub(self.after.spent)
    }

    pub fn captain_change_consumed(&self) -> bool {
        self.after.captain_changes >= ONE_SHOT_CHANGES
    }

    pub fn vice_captain_change_consumed(&self) -> bool {
        self.after.vice_captain_changes >= ONE_SHOT_CHANGES
    }
}

/// Decide whether a change costing `cost` may follow a chain whose replay is
/// `before`. Nothing is mutated either way.
pub fn assess(
    before: ChainReplay,
    cost: PriceBreakdown,
    transfer_limit: u32,
) -> Result<Assessment, BudgetExceeded> {
    let transfers_remaining = transfer_limit.saturating_sub(before.spent);

    if before.spent + cost.total > transfer_limit {
        return Err(BudgetExceeded {
            budget: Budget::Transfers,
            spent: before.spent,
            limit: transfer_limit,
            remaining: transfers_remaining,
            requested: cost.total,
            transfers_remaining,
        });
    }

    if before.captain_changes + cost.captain_cost > ONE_SHOT_CHANGES {
        return Err(BudgetExceeded {
            budget: Budget::Captain,
            spent: before.captain_changes,
            limit: ONE_SHOT_CHANGES,
            remaining: ONE_SHOT_CHANGES.saturating_sub(before.captain_changes),
            requested: cost.captain_cost,
            transfers_remaining,
        });
    }

    if before.vice_captain_changes + cost.vice_captain_cost > ONE_SHOT_CHANGES {
        return Err(BudgetExceeded {
            budget: Budget::ViceCaptain,
            spent: before.vice_captain_changes,
            limit: ONE_SHOT_CHANGES,
            remaining: ONE_SHOT_CHANGES.saturating_sub(before.vice_captain_changes),
            requested: cost.vice_captain_cost,
            transfers_remaining,
        });
    }

    Ok(Assessment {
        before,
        cost,
        after: before.with(cost),
        transfer_limit,
    })
}
