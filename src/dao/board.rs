use futures::future::BoxFuture;

use crate::dao::storage::StorageResult;

/// Abstraction over the shared ordered-set backend holding quiz leaderboards.
///
/// Implementations must keep every operation atomic with respect to concurrent
/// callers; the resilience gate relies on that to stay stateless.
pub trait ScoreBackend: Send + Sync {
    /// Add `user` with score 0 only if absent. Returns whether the member was added.
    fn add_if_absent(&self, quiz: &str, user: &str) -> BoxFuture<'static, StorageResult<bool>>;
    /// Atomically add `delta` to the member's score, creating it at `delta` if absent.
    /// Returns the post-increment score.
    fn increment_score(
        &self,
        quiz: &str,
        user: &str,
        delta: i64,
    ) -> BoxFuture<'static, StorageResult<i64>>;
    /// Top `n` members ordered score-descending, as `(user, score)` pairs.
    fn top_n(&self, quiz: &str, n: usize) -> BoxFuture<'static, StorageResult<Vec<(String, i64)>>>;
    /// Current score of a member, if present.
    fn score(&self, quiz: &str, user: &str) -> BoxFuture<'static, StorageResult<Option<i64>>>;
    /// Zero-based position of a member in score-descending order, if present.
    fn rank(&self, quiz: &str, user: &str) -> BoxFuture<'static, StorageResult<Option<u64>>>;
    /// Number of members on the board.
    fn member_count(&self, quiz: &str) -> BoxFuture<'static, StorageResult<u64>>;
    /// Remove a member. Returns whether it existed.
    fn remove_member(&self, quiz: &str, user: &str) -> BoxFuture<'static, StorageResult<bool>>;
    /// Drop the whole board. Returns whether it existed.
    fn delete_board(&self, quiz: &str) -> BoxFuture<'static, StorageResult<bool>>;
    /// Liveness probe against the backend.
    fn ping(&self) -> BoxFuture<'static, StorageResult<()>>;
}
