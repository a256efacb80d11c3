pub mod heartbeat;
pub mod ratelimit;
pub mod rooms;
pub mod sessions;

use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::watch;
use tracing::debug;

use crate::{
    bus::publisher::EventPublisher,
    config::AppConfig,
    dao::LeaderboardStore,
};

pub use self::heartbeat::HeartbeatMonitor;
pub use self::ratelimit::SessionRateLimiter;
pub use self::rooms::RoomIndex;
pub use self::sessions::{SessionConnection, SessionRegistry};

pub type SharedState = Arc<AppState>;

/// Central application state: instance-local registries plus handles to the
/// resilience-gated store and the event bus publisher.
pub struct AppState {
    config: AppConfig,
    sessions: SessionRegistry,
    rooms: RoomIndex,
    heartbeat: HeartbeatMonitor,
    rate_limiter: SessionRateLimiter,
    leaderboard: LeaderboardStore,
    publisher: EventPublisher,
    degraded: watch::Sender<bool>,
    shutdown: watch::Sender<bool>,
}

impl AppState {
    /// Assemble the shared state from its leaves. Registries start empty;
    /// the degraded flag starts clear and is owned by the backend monitor.
    pub fn new(
        config: AppConfig,
        leaderboard: LeaderboardStore,
        publisher: EventPublisher,
    ) -> SharedState {
        let (degraded, _) = watch::channel(false);
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            sessions: SessionRegistry::new(),
            rooms: RoomIndex::new(),
            heartbeat: HeartbeatMonitor::new(),
            rate_limiter: SessionRateLimiter::new(&config.rate_limit),
            config,
            leaderboard,
            publisher,
            degraded,
            shutdown,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn rooms(&self) -> &RoomIndex {
        &self.rooms
    }

    pub fn heartbeat(&self) -> &HeartbeatMonitor {
        &self.heartbeat
    }

    pub fn rate_limiter(&self) -> &SessionRateLimiter {
        &self.rate_limiter
    }

    pub fn leaderboard(&self) -> &LeaderboardStore {
        &self.leaderboard
    }

    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    /// Whether the liveness prober currently reports the shared store down.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current != value {
                *current = value;
                true
            } else {
                false
            }
        });
    }

    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Signal background tasks to stop. Called once the server stops
    /// accepting connections.
    pub fn begin_shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    pub fn shutdown_watcher(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Remove a session from every registry: session map, user binding,
    /// room, heartbeat, rate limiter. Shared by disconnects and the stale
    /// sweep; idempotent and tolerant of partially registered sessions.
    pub fn cleanup_session(&self, session_id: &str) {
        // Best-effort close so a swept client's read loop ends too.
        if let Some(tx) = self.sessions.sender(session_id) {
            let _ = tx.send(Message::Close(None));
        }

        let removed = self.sessions.unregister(session_id);
        self.rooms.remove_session(session_id);
        self.heartbeat.unregister(session_id);
        self.rate_limiter.remove_session(session_id);

        if let Some(connection) = removed {
            debug!(session = %connection.session_id, user = ?connection.user_id, "session cleaned up");
        }
    }

    /// Drain every live session during shutdown: each gets a Close frame and
    /// the usual registry cleanup, letting in-flight connections finish.
    pub fn close_all_sessions(&self) {
        for session_id in self.sessions.session_ids() {
            self.cleanup_session(&session_id);
        }
    }
}
