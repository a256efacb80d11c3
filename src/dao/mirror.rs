use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Per-instance in-memory leaderboard used while the shared store is
/// unreachable.
///
/// Semantics mirror the sorted-set backend: idempotent initialization,
/// atomic accumulation per (quiz, user), score-descending reads. Contents
/// are discarded once the circuit closes again; the shared store is the
/// source of truth after recovery.
#[derive(Default)]
pub struct MirrorBoard {
    boards: DashMap<String, DashMap<String, i64>>,
}

impl MirrorBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `user` with score 0 only if absent. Returns whether it was added.
    pub fn add_if_absent(&self, quiz: &str, user: &str) -> bool {
        let board = self.boards.entry(quiz.to_owned()).or_default();
        match board.entry(user.to_owned()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(0);
                true
            }
        }
    }

    /// Atomically add `delta` to the member's score, creating it if absent.
    pub fn increment_score(&self, quiz: &str, user: &str, delta: i64) -> i64 {
        let board = self.boards.entry(quiz.to_owned()).or_default();
        let mut slot = board.entry(user.to_owned()).or_insert(0);
        *slot += delta;
        *slot
    }

    /// Top `n` members as `(user, score)`, score-descending.
    ///
    /// Ties break on ascending user id so a single call is deterministic;
    /// the shared store is free to order ties differently.
    pub fn top_n(&self, quiz: &str, n: usize) -> Vec<(String, i64)> {
        let mut rows = self.snapshot(quiz);
        rows.truncate(n);
        rows
    }

    pub fn score(&self, quiz: &str, user: &str) -> Option<i64> {
        self.boards
            .get(quiz)
            .and_then(|board| board.get(user).map(|slot| *slot))
    }

    /// Zero-based position in score-descending order, if present.
    pub fn rank(&self, quiz: &str, user: &str) -> Option<u64> {
        self.snapshot(quiz)
            .iter()
            .position(|(member, _)| member == user)
            .map(|position| position as u64)
    }

    pub fn member_count(&self, quiz: &str) -> u64 {
        self.boards
            .get(quiz)
            .map(|board| board.len() as u64)
            .unwrap_or(0)
    }

    pub fn remove_member(&self, quiz: &str, user: &str) -> bool {
        self.boards
            .get(quiz)
            .is_some_and(|board| board.remove(user).is_some())
    }

    pub fn delete_board(&self, quiz: &str) -> bool {
        self.boards.remove(quiz).is_some()
    }

    /// Drop all fallback state. Called when the shared store becomes the
    /// source of truth again.
    pub fn clear(&self) {
        self.boards.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.boards.is_empty()
    }

    fn snapshot(&self, quiz: &str) -> Vec<(String, i64)> {
        let Some(board) = self.boards.get(quiz) else {
            return Vec::new();
        };
        let mut rows: Vec<(String, i64)> = board
            .iter()
            .map(|slot| (slot.key().clone(), *slot.value()))
            .collect();
        rows.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_if_absent_is_idempotent() {
        let mirror = MirrorBoard::new();
        assert!(mirror.add_if_absent("q1", "alice"));
        assert!(!mirror.add_if_absent("q1", "alice"));
        assert_eq!(mirror.score("q1", "alice"), Some(0));
    }

    #[test]
    fn add_if_absent_never_lowers_a_score() {
        let mirror = MirrorBoard::new();
        mirror.increment_score("q1", "alice", 7);
        assert!(!mirror.add_if_absent("q1", "alice"));
        assert_eq!(mirror.score("q1", "alice"), Some(7));
    }

    #[test]
    fn increment_accumulates_and_creates_absent_members() {
        let mirror = MirrorBoard::new();
        assert_eq!(mirror.increment_score("q1", "alice", 3), 3);
        assert_eq!(mirror.increment_score("q1", "alice", 4), 7);
        assert_eq!(mirror.increment_score("q1", "alice", 0), 7);
    }

    #[test]
    fn top_n_sorts_by_score_descending_and_truncates() {
        let mirror = MirrorBoard::new();
        mirror.increment_score("q1", "alice", 3);
        mirror.increment_score("q1", "bob", 5);
        mirror.increment_score("q1", "carol", 1);

        let rows = mirror.top_n("q1", 2);
        assert_eq!(rows, vec![("bob".into(), 5), ("alice".into(), 3)]);
    }

    #[test]
    fn top_n_breaks_ties_deterministically() {
        let mirror = MirrorBoard::new();
        mirror.increment_score("q1", "bob", 5);
        mirror.increment_score("q1", "alice", 5);

        let rows = mirror.top_n("q1", 10);
        assert_eq!(rows, vec![("alice".into(), 5), ("bob".into(), 5)]);
    }

    #[test]
    fn top_n_of_unknown_quiz_is_empty() {
        let mirror = MirrorBoard::new();
        assert!(mirror.top_n("nope", 10).is_empty());
    }

    #[test]
    fn rank_is_zero_based_over_the_sorted_order() {
        let mirror = MirrorBoard::new();
        mirror.increment_score("q1", "alice", 3);
        mirror.increment_score("q1", "bob", 5);

        assert_eq!(mirror.rank("q1", "bob"), Some(0));
        assert_eq!(mirror.rank("q1", "alice"), Some(1));
        assert_eq!(mirror.rank("q1", "carol"), None);
    }

    #[test]
    fn remove_and_delete_clean_up() {
        let mirror = MirrorBoard::new();
        mirror.increment_score("q1", "alice", 3);
        mirror.increment_score("q1", "bob", 5);

        assert!(mirror.remove_member("q1", "alice"));
        assert!(!mirror.remove_member("q1", "alice"));
        assert_eq!(mirror.member_count("q1"), 1);

        assert!(mirror.delete_board("q1"));
        assert!(!mirror.delete_board("q1"));
        assert_eq!(mirror.member_count("q1"), 0);
    }

    #[test]
    fn clear_discards_all_fallback_state() {
        let mirror = MirrorBoard::new();
        mirror.increment_score("q1", "alice", 3);
        mirror.increment_score("q2", "bob", 5);
        assert!(!mirror.is_empty());

        mirror.clear();
        assert!(mirror.is_empty());
        assert_eq!(mirror.score("q1", "alice"), None);
    }
}
