use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

/// Handle used to push frames to one connected client.
#[derive(Clone)]
pub struct SessionConnection {
    pub session_id: String,
    pub user_id: Option<String>,
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Instance-local registry of live WebSocket sessions.
///
/// Holds the session→connection map plus the user→session reverse index.
/// A user id maps to at most one session on this instance; the latest JOIN
/// wins and earlier sessions keep running under their own ids.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, SessionConnection>,
    user_to_session: DashMap<String, String>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly connected session before any JOIN arrives.
    pub fn register(&self, session_id: String, tx: mpsc::UnboundedSender<Message>) {
        self.sessions.insert(
            session_id.clone(),
            SessionConnection {
                session_id,
                user_id: None,
                tx,
            },
        );
    }

    /// Bind a user id to a session, replacing any prior binding of that user.
    pub fn associate_user(&self, user_id: &str, session_id: &str) {
        if let Some(mut entry) = self.sessions.get_mut(session_id) {
            entry.user_id = Some(user_id.to_owned());
        }
        if let Some(previous) = self
            .user_to_session
            .insert(user_id.to_owned(), session_id.to_owned())
            && previous != session_id
        {
            debug!(user = %user_id, old_session = %previous, new_session = %session_id,
                "user re-associated; latest session wins");
        }
    }

    /// Outbound channel of a session, if it is still connected.
    pub fn sender(&self, session_id: &str) -> Option<mpsc::UnboundedSender<Message>> {
        self.sessions.get(session_id).map(|entry| entry.tx.clone())
    }

    pub fn user_of(&self, session_id: &str) -> Option<String> {
        self.sessions
            .get(session_id)
            .and_then(|entry| entry.user_id.clone())
    }

    pub fn session_for(&self, user_id: &str) -> Option<String> {
        self.user_to_session
            .get(user_id)
            .map(|entry| entry.value().clone())
    }

    /// Drop a session and, when it still owns its user binding, that binding
    /// too. Idempotent.
    pub fn unregister(&self, session_id: &str) -> Option<SessionConnection> {
        let (_, connection) = self.sessions.remove(session_id)?;
        if let Some(user_id) = &connection.user_id {
            self.user_to_session
                .remove_if(user_id, |_, mapped| mapped == session_id);
        }
        Some(connection)
    }

    /// Snapshot of every live session id.
    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(session_ids: &[&str]) -> SessionRegistry {
        let registry = SessionRegistry::new();
        for id in session_ids {
            let (tx, _rx) = mpsc::unbounded_channel();
            registry.register((*id).to_string(), tx);
        }
        registry
    }

    #[test]
    fn register_and_associate() {
        let registry = registry_with(&["s1"]);
        registry.associate_user("alice", "s1");

        assert_eq!(registry.user_of("s1"), Some("alice".into()));
        assert_eq!(registry.session_for("alice"), Some("s1".into()));
        assert!(registry.sender("s1").is_some());
    }

    #[test]
    fn latest_join_wins_the_user_binding() {
        let registry = registry_with(&["s1", "s2"]);
        registry.associate_user("alice", "s1");
        registry.associate_user("alice", "s2");

        assert_eq!(registry.session_for("alice"), Some("s2".into()));
        // The older session keeps running under its own id.
        assert!(registry.sender("s1").is_some());
    }

    #[test]
    fn unregister_is_idempotent_and_clears_the_binding() {
        let registry = registry_with(&["s1"]);
        registry.associate_user("alice", "s1");

        assert!(registry.unregister("s1").is_some());
        assert!(registry.unregister("s1").is_none());
        assert_eq!(registry.session_for("alice"), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn unregister_does_not_steal_a_rebound_user() {
        let registry = registry_with(&["s1", "s2"]);
        registry.associate_user("alice", "s1");
        registry.associate_user("alice", "s2");

        // Cleaning up the superseded session leaves the new binding alone.
        registry.unregister("s1");
        assert_eq!(registry.session_for("alice"), Some("s2".into()));
    }
}
