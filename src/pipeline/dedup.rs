//! Deduplication Filter
//!
//! Drops candidates whose id was already persisted in the recent window.
//! Advisory only: it saves evaluation calls, while the store's
//! conflict-ignoring write keyed by game id is the real guarantee against
//! double-processing across overlapping batches.

use std::collections::HashSet;

use tracing::debug;

use crate::sources::GameRecord;

/// Exactly `candidates \ seen`, preserving candidate order.
pub fn filter_unseen(seen: &HashSet<String>, candidates: Vec<GameRecord>) -> Vec<GameRecord> {
    let before = candidates.len();
    let fresh: Vec<GameRecord> = candidates
        .into_iter()
        .filter(|game| !seen.contains(&game.id))
        .collect();
    if fresh.len() < before {
        debug!(skipped = before - fresh.len(), "dedup dropped already-seen games");
    }
    fresh
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::GameOutcome;

    fn game(id: &str) -> GameRecord {
        GameRecord {
            id: id.to_string(),
            move_text: "1. e4 e5".to_string(),
            declared_winner: GameOutcome::Draw,
            white_rating: None,
            black_rating: None,
            time_control: None,
            provider_tag: "test".to_string(),
        }
    }

    #[test]
    fn output_is_exactly_candidates_minus_seen() {
        let seen: HashSet<String> = ["a", "c"].iter().map(|s| s.to_string()).collect();
        let candidates = vec![game("a"), game("b"), game("c"), game("d")];

        let fresh = filter_unseen(&seen, candidates);

        let ids: Vec<&str> = fresh.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d"]);
        for g in &fresh {
            assert!(!seen.contains(&g.id));
        }
    }

    #[test]
    fn empty_seen_set_passes_everything() {
        let fresh = filter_unseen(&HashSet::new(), vec![game("a"), game("b")]);
        assert_eq!(fresh.len(), 2);
    }

    #[test]
    fn full_overlap_passes_nothing() {
        let seen: HashSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        assert!(filter_unseen(&seen, vec![game("a"), game("b")]).is_empty());
    }
}
