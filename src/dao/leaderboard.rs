use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::dao::{
    board::ScoreBackend,
    breaker::{CircuitBreaker, CircuitState},
    mirror::MirrorBoard,
    storage::StorageResult,
};

/// One leaderboard row with its derived 1-based rank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankedScore {
    pub user_id: String,
    pub score: i64,
    pub rank: u32,
}

/// Resilience gate in front of the shared leaderboard backend.
///
/// Every operation asks the circuit breaker for permission, runs against the
/// backend under a timeout, and on refusal or failure serves the same
/// semantics from the per-instance mirror. Callers never see backend
/// unavailability; divergence between mirror and backend is resolved on
/// recovery by discarding the mirror.
pub struct LeaderboardStore {
    backend: Arc<dyn ScoreBackend>,
    breaker: Arc<CircuitBreaker>,
    mirror: MirrorBoard,
    call_timeout: Duration,
}

impl LeaderboardStore {
    pub fn new(
        backend: Arc<dyn ScoreBackend>,
        breaker: Arc<CircuitBreaker>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            backend,
            breaker,
            mirror: MirrorBoard::new(),
            call_timeout,
        }
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Add the user with score 0 if absent. Never lowers an existing score.
    pub async fn initialize(&self, quiz: &str, user: &str) -> bool {
        match self
            .guarded("initialize", self.backend.add_if_absent(quiz, user))
            .await
        {
            Some(added) => added,
            None => self.mirror.add_if_absent(quiz, user),
        }
    }

    /// Atomically add `delta` (non-negative) and return the post-increment
    /// score. A zero delta leaves the score unchanged but still reports it.
    pub async fn increment(&self, quiz: &str, user: &str, delta: i64) -> i64 {
        match self
            .guarded("increment", self.backend.increment_score(quiz, user, delta))
            .await
        {
            Some(new_score) => new_score,
            None => self.mirror.increment_score(quiz, user, delta),
        }
    }

    /// Top `n` rows, score-descending, ranks 1-based.
    pub async fn top_n(&self, quiz: &str, n: usize) -> Vec<RankedScore> {
        let rows = match self.guarded("top_n", self.backend.top_n(quiz, n)).await {
            Some(rows) => rows,
            None => self.mirror.top_n(quiz, n),
        };
        ranked(rows)
    }

    pub async fn score(&self, quiz: &str, user: &str) -> Option<i64> {
        match self.guarded("score", self.backend.score(quiz, user)).await {
            Some(score) => score,
            None => self.mirror.score(quiz, user),
        }
    }

    /// 1-based rank of the user, highest score first.
    pub async fn rank(&self, quiz: &str, user: &str) -> Option<u64> {
        let position = match self.guarded("rank", self.backend.rank(quiz, user)).await {
            Some(position) => position,
            None => self.mirror.rank(quiz, user),
        };
        position.map(|zero_based| zero_based + 1)
    }

    pub async fn size(&self, quiz: &str) -> u64 {
        match self
            .guarded("size", self.backend.member_count(quiz))
            .await
        {
            Some(count) => count,
            None => self.mirror.member_count(quiz),
        }
    }

    pub async fn remove(&self, quiz: &str, user: &str) -> bool {
        match self
            .guarded("remove", self.backend.remove_member(quiz, user))
            .await
        {
            Some(removed) => removed,
            None => self.mirror.remove_member(quiz, user),
        }
    }

    pub async fn delete(&self, quiz: &str) -> bool {
        match self
            .guarded("delete", self.backend.delete_board(quiz))
            .await
        {
            Some(deleted) => deleted,
            None => self.mirror.delete_board(quiz),
        }
    }

    /// Liveness probe for the background monitor; feeds the breaker without
    /// consuming a half-open trial permit.
    pub async fn probe(&self) -> bool {
        let healthy = match timeout(self.call_timeout, self.backend.ping()).await {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                warn!(error = %err, "shared store liveness probe failed");
                false
            }
            Err(_) => {
                warn!(timeout = ?self.call_timeout, "shared store liveness probe timed out");
                false
            }
        };
        self.breaker.record_probe(healthy);
        healthy
    }

    /// Drop fallback state accumulated during an outage. The shared store is
    /// authoritative after recovery; mirror contents are not flushed back.
    pub fn discard_mirror(&self) {
        if !self.mirror.is_empty() {
            info!("discarding fallback mirror; shared store is authoritative again");
            self.mirror.clear();
        }
    }

    /// Run one backend call through the breaker and timeout. `None` means the
    /// caller must serve the operation from the mirror.
    async fn guarded<T>(
        &self,
        op: &'static str,
        call: BoxFuture<'static, StorageResult<T>>,
    ) -> Option<T> {
        if !self.breaker.try_acquire() {
            return None;
        }
        match timeout(self.call_timeout, call).await {
            Ok(Ok(value)) => {
                self.breaker.record_success();
                Some(value)
            }
            Ok(Err(err)) => {
                self.breaker.record_failure();
                warn!(op, error = %err, "shared store call failed; using in-memory fallback");
                None
            }
            Err(_) => {
                self.breaker.record_failure();
                warn!(op, timeout = ?self.call_timeout, "shared store call timed out; using in-memory fallback");
                None
            }
        }
    }
}

fn ranked(rows: Vec<(String, i64)>) -> Vec<RankedScore> {
    rows.into_iter()
        .enumerate()
        .map(|(index, (user_id, score))| RankedScore {
            user_id,
            score,
            rank: index as u32 + 1,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CircuitSettings;
    use crate::dao::storage::StorageError;
    use std::collections::HashMap;
    use std::io;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Backend double that can be flipped between healthy and failing.
    #[derive(Default)]
    struct ScriptedBackend {
        failing: AtomicBool,
        calls: AtomicUsize,
        scores: parking_lot::Mutex<HashMap<(String, String), i64>>,
    }

    impl ScriptedBackend {
        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn outcome<T>(&self, value: T) -> StorageResult<T> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                Err(StorageError::unavailable(
                    "scripted outage".into(),
                    io::Error::other("down"),
                ))
            } else {
                Ok(value)
            }
        }
    }

    impl ScoreBackend for Arc<ScriptedBackend> {
        fn add_if_absent(&self, quiz: &str, user: &str) -> BoxFuture<'static, StorageResult<bool>> {
            let this = self.clone();
            let key = (quiz.to_owned(), user.to_owned());
            Box::pin(async move {
                let added = {
                    let mut scores = this.scores.lock();
                    if scores.contains_key(&key) {
                        false
                    } else {
                        scores.insert(key, 0);
                        true
                    }
                };
                this.outcome(added)
            })
        }

        fn increment_score(
            &self,
            quiz: &str,
            user: &str,
            delta: i64,
        ) -> BoxFuture<'static, StorageResult<i64>> {
            let this = self.clone();
            let key = (quiz.to_owned(), user.to_owned());
            Box::pin(async move {
                let new_score = {
                    let mut scores = this.scores.lock();
                    let slot = scores.entry(key).or_insert(0);
                    *slot += delta;
                    *slot
                };
                this.outcome(new_score)
            })
        }

        fn top_n(
            &self,
            quiz: &str,
            n: usize,
        ) -> BoxFuture<'static, StorageResult<Vec<(String, i64)>>> {
            let this = self.clone();
            let quiz = quiz.to_owned();
            Box::pin(async move {
                let mut rows: Vec<(String, i64)> = {
                    let scores = this.scores.lock();
                    scores
                        .iter()
                        .filter(|((q, _), _)| *q == quiz)
                        .map(|((_, u), s)| (u.clone(), *s))
                        .collect()
                };
                rows.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                rows.truncate(n);
                this.outcome(rows)
            })
        }

        fn score(&self, quiz: &str, user: &str) -> BoxFuture<'static, StorageResult<Option<i64>>> {
            let this = self.clone();
            let key = (quiz.to_owned(), user.to_owned());
            Box::pin(async move {
                let score = this.scores.lock().get(&key).copied();
                this.outcome(score)
            })
        }

        fn rank(&self, quiz: &str, user: &str) -> BoxFuture<'static, StorageResult<Option<u64>>> {
            let this = self.clone();
            let quiz_owned = quiz.to_owned();
            let user_owned = user.to_owned();
            Box::pin(async move {
                let mut rows: Vec<(String, i64)> = {
                    let scores = this.scores.lock();
                    scores
                        .iter()
                        .filter(|((q, _), _)| *q == quiz_owned)
                        .map(|((_, u), s)| (u.clone(), *s))
                        .collect()
                };
                rows.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                let rank = rows
                    .iter()
                    .position(|(u, _)| *u == user_owned)
                    .map(|p| p as u64);
                this.outcome(rank)
            })
        }

        fn member_count(&self, quiz: &str) -> BoxFuture<'static, StorageResult<u64>> {
            let this = self.clone();
            let quiz = quiz.to_owned();
            Box::pin(async move {
                let count = {
                    let scores = this.scores.lock();
                    scores.keys().filter(|(q, _)| *q == quiz).count() as u64
                };
                this.outcome(count)
            })
        }

        fn remove_member(&self, quiz: &str, user: &str) -> BoxFuture<'static, StorageResult<bool>> {
            let this = self.clone();
            let key = (quiz.to_owned(), user.to_owned());
            Box::pin(async move {
                let removed = this.scores.lock().remove(&key).is_some();
                this.outcome(removed)
            })
        }

        fn delete_board(&self, quiz: &str) -> BoxFuture<'static, StorageResult<bool>> {
            let this = self.clone();
            let quiz = quiz.to_owned();
            Box::pin(async move {
                let mut scores = this.scores.lock();
                let before = scores.len();
                scores.retain(|(q, _), _| *q != quiz);
                let deleted = scores.len() != before;
                drop(scores);
                this.outcome(deleted)
            })
        }

        fn ping(&self) -> BoxFuture<'static, StorageResult<()>> {
            let this = self.clone();
            Box::pin(async move { this.outcome(()) })
        }
    }

    fn store_over(backend: Arc<ScriptedBackend>) -> LeaderboardStore {
        let breaker = Arc::new(CircuitBreaker::new(CircuitSettings {
            failure_rate_threshold: 0.5,
            window_size: 10,
            min_calls: 5,
            open_duration: Duration::from_secs(3600),
            half_open_probes: 3,
        }));
        LeaderboardStore::new(Arc::new(backend), breaker, Duration::from_secs(2))
    }

    #[tokio::test]
    async fn closed_circuit_serves_from_the_backend() {
        let backend = Arc::new(ScriptedBackend::default());
        let store = store_over(backend.clone());

        assert!(store.initialize("q1", "alice").await);
        assert!(!store.initialize("q1", "alice").await);
        assert_eq!(store.increment("q1", "alice", 7).await, 7);
        assert_eq!(store.score("q1", "alice").await, Some(7));
        assert_eq!(store.circuit_state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn sustained_failures_trip_to_the_mirror() {
        let backend = Arc::new(ScriptedBackend::default());
        let store = store_over(backend.clone());
        backend.set_failing(true);

        // Each failing call both counts against the breaker and is answered
        // by the mirror, so scores keep accumulating locally.
        let mut last = 0;
        for _ in 0..5 {
            last = store.increment("q1", "alice", 2).await;
        }
        assert_eq!(last, 10);
        assert_eq!(store.circuit_state(), CircuitState::Open);

        // Open circuit: the backend is no longer contacted.
        let calls_before = backend.calls();
        assert_eq!(store.increment("q1", "alice", 3).await, 13);
        assert_eq!(backend.calls(), calls_before);
    }

    #[tokio::test]
    async fn fallback_reads_keep_ordered_set_semantics() {
        let backend = Arc::new(ScriptedBackend::default());
        let store = store_over(backend.clone());
        backend.set_failing(true);

        for _ in 0..5 {
            store.increment("q1", "alice", 3).await;
        }
        store.increment("q1", "bob", 20).await;

        let rows = store.top_n("q1", 10).await;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].user_id, "bob");
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[1].user_id, "alice");
        assert_eq!(rows[1].rank, 2);

        assert_eq!(store.rank("q1", "bob").await, Some(1));
        assert_eq!(store.size("q1").await, 2);
    }

    #[tokio::test]
    async fn ranks_are_one_based_from_the_backend() {
        let backend = Arc::new(ScriptedBackend::default());
        let store = store_over(backend.clone());

        store.increment("q1", "alice", 3).await;
        store.increment("q1", "bob", 5).await;

        assert_eq!(store.rank("q1", "bob").await, Some(1));
        assert_eq!(store.rank("q1", "alice").await, Some(2));
        assert_eq!(store.rank("q1", "nobody").await, None);

        let rows = store.top_n("q1", 1).await;
        assert_eq!(
            rows,
            vec![RankedScore {
                user_id: "bob".into(),
                score: 5,
                rank: 1
            }]
        );
    }

    #[tokio::test]
    async fn admin_operations_pass_through_the_gate() {
        let backend = Arc::new(ScriptedBackend::default());
        let store = store_over(backend.clone());

        store.increment("q1", "alice", 3).await;
        store.increment("q1", "bob", 5).await;
        assert_eq!(store.size("q1").await, 2);

        assert!(store.remove("q1", "alice").await);
        assert!(!store.remove("q1", "alice").await);
        assert_eq!(store.score("q1", "alice").await, None);

        assert!(store.delete("q1").await);
        assert_eq!(store.size("q1").await, 0);
        assert!(store.top_n("q1", 10).await.is_empty());
    }

    #[tokio::test]
    async fn probe_feeds_the_breaker_and_recovery_discards_the_mirror() {
        let backend = Arc::new(ScriptedBackend::default());
        let store = store_over(backend.clone());
        backend.set_failing(true);

        for _ in 0..5 {
            store.increment("q1", "alice", 1).await;
        }
        assert_eq!(store.circuit_state(), CircuitState::Open);
        assert!(!store.probe().await);

        backend.set_failing(false);
        assert!(store.probe().await);
        assert!(store.probe().await);
        assert_eq!(store.circuit_state(), CircuitState::HalfOpen);
        assert!(store.probe().await);
        assert!(store.probe().await);
        assert!(store.probe().await);
        assert_eq!(store.circuit_state(), CircuitState::Closed);

        store.discard_mirror();
        // Backend is authoritative again; mirror totals are gone.
        assert_eq!(store.increment("q1", "alice", 4).await, 4);
    }
}
