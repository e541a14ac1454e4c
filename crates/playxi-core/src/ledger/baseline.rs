// Baseline resolution over a team's lineup chain.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::timeline::MatchTimeline;
use crate::lineup::Lineup;
use crate::model::MatchId;

/// One team's stored lineups, viewed in the league's play order.
pub struct LineupChain<'t> {
    timeline: &'t MatchTimeline,
    lineups: HashMap<MatchId, Lineup>,
}

impl<'t> LineupChain<'t> {
    /// Lineups on matches that are not part of `timeline` are ignored.
    pub fn new(timeline: &'t MatchTimeline, lineups: impl IntoIterator<Item = Lineup>) -> Self {
        let lineups = lineups
            .into_iter()
            .filter(|l| timeline.get(l.match_id).is_some())
            .map(|l| (l.match_id, l))
            .collect();
        LineupChain { timeline, lineups }
    }

    pub fn timeline(&self) -> &MatchTimeline {
        self.timeline
    }

    pub fn get(&self, match_id: MatchId) -> Option<&Lineup> {
        self.lineups.get(&match_id)
    }

    pub fn len(&self) -> usize {
        self.lineups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lineups.is_empty()
    }

    /// All saved lineups in play order.
    pub fn ordered(&self) -> Vec<&Lineup> {
        self.timeline
            .iter()
            .filter_map(|m| self.lineups.get(&m.id))
            .collect()
    }

    /// Saved lineups on matches strictly before `match_id`, in play order.
    pub fn before(&self, match_id: MatchId) -> Vec<&Lineup> {
        self.timeline
            .before(match_id)
            .iter()
            .filter_map(|m| self.lineups.get(&m.id))
            .collect()
    }

    /// The lineup a save on `target` is priced against: walking backwards from
    /// `target`, the first match that is locked and has a lineup. `None` means
    /// there is no baseline yet and the save is free.
    pub fn resolve_baseline(&self, target: MatchId, now: DateTime<Utc>) -> Option<&Lineup> {
        let mut cursor = self.timeline.previous(target);
        while let Some(candidate) = cursor {
            if candidate.is_locked(now) {
                if let Some(lineup) = self.lineups.get(&candidate.id) {
                    return Some(lineup);
                }
            }
            cursor = self.timeline.previous(candidate.id);
        }
        None
    }

    /// The lineup on exactly the previous match, if there is one.
    pub fn immediate_predecessor(&self, target: MatchId) -> Option<&Lineup> {
        self.timeline
            .previous(target)
            .and_then(|m| self.lineups.get(&m.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::timeline::Match;
    use crate::lineup::player::PlayerRef;
    use crate::lineup::{LineupSource, Selection};
    use chrono::TimeZone;

    fn kickoff(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, day, 14, 0, 0).unwrap()
    }

    fn timeline(days: &[u32]) -> MatchTimeline {
        MatchTimeline::new(
            days.iter()
                .enumerate()
                .map(|(i, &day)| Match {
                    id: i as MatchId + 1,
                    league_id: 1,
                    sequence: i as u32 + 1,
                    scheduled_start: kickoff(day),
                    completed: false,
                })
                .collect(),
        )
    }

    fn lineup(match_id: MatchId, captain: i64) -> Lineup {
        Lineup {
            team_id: 1,
            match_id,
            selection: Selection {
                players: (1..=11)
                    .map(|id| PlayerRef {
                        player_id: id,
                        name: format!("P{id}"),
                        role: "Batsman".into(),
                        squad_tag: String::new(),
                    })
                    .collect(),
                captain_id: captain,
                vice_captain_id: 11,
            },
            source: LineupSource::User,
            revision: 1,
            saved_at: kickoff(1),
        }
    }

    #[test]
    fn no_baseline_for_first_match() {
        let tl = timeline(&[1, 2, 3]);
        let chain = LineupChain::new(&tl, vec![lineup(1, 1)]);
        assert!(chain.resolve_baseline(1, kickoff(10)).is_none());
    }

    #[test]
    fn baseline_is_most_recent_locked_lineup() {
        let tl = timeline(&[1, 2, 3, 4]);
        let chain = LineupChain::new(&tl, vec![lineup(1, 1), lineup(2, 2)]);
        // Matches 1-3 locked at day 3.
        let baseline = chain.resolve_baseline(4, kickoff(3)).unwrap();
        assert_eq!(baseline.match_id, 2);
    }

    #[test]
    fn baseline_skips_gaps() {
        let tl = timeline(&[1, 2, 3, 4]);
        let chain = LineupChain::new(&tl, vec![lineup(1, 1)]);
        let baseline = chain.resolve_baseline(4, kickoff(3)).unwrap();
        assert_eq!(baseline.match_id, 1);
    }

    #[test]
    fn baseline_ignores_unlocked_lineups() {
        let tl = timeline(&[1, 2, 3]);
        let chain = LineupChain::new(&tl, vec![lineup(1, 1), lineup(2, 2)]);
        // At day 1 only match 1 is locked; match 2's lineup is still pending.
        let baseline = chain.resolve_baseline(3, kickoff(1)).unwrap();
        assert_eq!(baseline.match_id, 1);
    }

    #[test]
    fn immediate_predecessor_does_not_walk_back() {
        let tl = timeline(&[1, 2, 3]);
        let chain = LineupChain::new(&tl, vec![lineup(1, 1)]);
        assert!(chain.immediate_predecessor(3).is_none());
        assert_eq!(chain.immediate_predecessor(2).map(|l| l.match_id), Some(1));
    }

    #[test]
    fn ordered_follows_play_order() {
        let tl = timeline(&[1, 2, 3]);
        let chain = LineupChain::new(&tl, vec![lineup(3, 3), lineup(1, 1), lineup(99, 1)]);
        let ids: Vec<_> = chain.ordered().iter().map(|l| l.match_id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(chain.len(), 2);
        let before: Vec<_> = chain.before(3).iter().map(|l| l.match_id).collect();
        assert_eq!(before, vec![1]);
    }
}
