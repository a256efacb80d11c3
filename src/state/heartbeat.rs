use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::trace;

/// Last-heartbeat timestamps for every live session on this instance.
///
/// The sweep task reads a snapshot; per-entry writes stay O(1) and no lock is
/// held across I/O.
#[derive(Default)]
pub struct HeartbeatMonitor {
    last_beat: DashMap<String, Instant>,
}

impl HeartbeatMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a session as of now.
    pub fn register(&self, session_id: &str) {
        self.last_beat.insert(session_id.to_owned(), Instant::now());
    }

    /// Record a HEARTBEAT frame.
    pub fn record(&self, session_id: &str) {
        self.last_beat.insert(session_id.to_owned(), Instant::now());
        trace!(session = %session_id, "heartbeat recorded");
    }

    /// Stop tracking a session. Idempotent.
    pub fn unregister(&self, session_id: &str) {
        self.last_beat.remove(session_id);
    }

    pub fn is_alive(&self, session_id: &str, threshold: Duration) -> bool {
        self.last_beat
            .get(session_id)
            .is_some_and(|beat| beat.elapsed() <= threshold)
    }

    /// Sessions whose last beat is older than `threshold`, from a snapshot.
    pub fn stale_sessions(&self, threshold: Duration) -> Vec<String> {
        self.last_beat
            .iter()
            .filter(|entry| entry.value().elapsed() > threshold)
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn monitored_count(&self) -> usize {
        self.last_beat.len()
    }

    #[cfg(test)]
    fn backdate(&self, session_id: &str, age: Duration) {
        self.last_beat
            .insert(session_id.to_owned(), Instant::now() - age);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: Duration = Duration::from_secs(60);

    #[test]
    fn fresh_sessions_are_alive() {
        let monitor = HeartbeatMonitor::new();
        monitor.register("s1");

        assert!(monitor.is_alive("s1", THRESHOLD));
        assert!(monitor.stale_sessions(THRESHOLD).is_empty());
    }

    #[test]
    fn unknown_sessions_are_not_alive() {
        let monitor = HeartbeatMonitor::new();
        assert!(!monitor.is_alive("ghost", THRESHOLD));
    }

    #[test]
    fn sessions_past_the_threshold_are_stale() {
        let monitor = HeartbeatMonitor::new();
        monitor.register("fresh");
        monitor.register("stale");
        monitor.backdate("stale", THRESHOLD + Duration::from_secs(1));

        assert_eq!(monitor.stale_sessions(THRESHOLD), vec!["stale".to_string()]);
        assert!(!monitor.is_alive("stale", THRESHOLD));
        assert!(monitor.is_alive("fresh", THRESHOLD));
    }

    #[test]
    fn recording_a_beat_revives_a_session() {
        let monitor = HeartbeatMonitor::new();
        monitor.register("s1");
        monitor.backdate("s1", THRESHOLD + Duration::from_secs(1));
        assert!(!monitor.is_alive("s1", THRESHOLD));

        monitor.record("s1");
        assert!(monitor.is_alive("s1", THRESHOLD));
    }

    #[test]
    fn unregister_is_idempotent() {
        let monitor = HeartbeatMonitor::new();
        monitor.register("s1");
        monitor.unregister("s1");
        monitor.unregister("s1");
        assert_eq!(monitor.monitored_count(), 0);
    }
}
