use std::collections::HashSet;

use dashmap::DashMap;
use tracing::debug;

/// Instance-local index of which sessions watch which quiz.
///
/// A session belongs to at most one room; joining a new quiz removes it from
/// the previous one, and rooms vanish when their last session leaves.
#[derive(Default)]
pub struct RoomIndex {
    rooms: DashMap<String, HashSet<String>>,
    session_to_quiz: DashMap<String, String>,
}

impl RoomIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session to a quiz room, leaving any prior room first.
    pub fn join(&self, quiz_id: &str, session_id: &str) {
        match self
            .session_to_quiz
            .insert(session_id.to_owned(), quiz_id.to_owned())
        {
            Some(previous) if previous != quiz_id => {
                self.leave_room(&previous, session_id);
                debug!(session = %session_id, from = %previous, to = %quiz_id, "session switched rooms");
            }
            _ => {}
        }
        self.rooms
            .entry(quiz_id.to_owned())
            .or_default()
            .insert(session_id.to_owned());
    }

    pub fn is_member(&self, quiz_id: &str, session_id: &str) -> bool {
        self.rooms
            .get(quiz_id)
            .is_some_and(|members| members.contains(session_id))
    }

    /// Snapshot of the sessions currently in a room.
    pub fn sessions_of(&self, quiz_id: &str) -> Vec<String> {
        self.rooms
            .get(quiz_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn quiz_of(&self, session_id: &str) -> Option<String> {
        self.session_to_quiz
            .get(session_id)
            .map(|entry| entry.value().clone())
    }

    /// Remove a session from whatever room it is in. Idempotent.
    pub fn remove_session(&self, session_id: &str) {
        if let Some((_, quiz_id)) = self.session_to_quiz.remove(session_id) {
            self.leave_room(&quiz_id, session_id);
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn leave_room(&self, quiz_id: &str, session_id: &str) {
        if let Some(mut members) = self.rooms.get_mut(quiz_id) {
            members.remove(session_id);
        }
        self.rooms.remove_if(quiz_id, |_, members| members.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_and_membership() {
        let rooms = RoomIndex::new();
        rooms.join("q1", "s1");
        rooms.join("q1", "s2");

        assert!(rooms.is_member("q1", "s1"));
        assert!(!rooms.is_member("q2", "s1"));
        assert_eq!(rooms.quiz_of("s1"), Some("q1".into()));

        let mut members = rooms.sessions_of("q1");
        members.sort();
        assert_eq!(members, vec!["s1".to_string(), "s2".to_string()]);
    }

    #[test]
    fn switching_quizzes_leaves_the_prior_room() {
        let rooms = RoomIndex::new();
        rooms.join("q1", "s1");
        rooms.join("q2", "s1");

        assert!(!rooms.is_member("q1", "s1"));
        assert!(rooms.is_member("q2", "s1"));
        // q1 emptied out and was dropped entirely.
        assert_eq!(rooms.room_count(), 1);
    }

    #[test]
    fn rejoining_the_same_quiz_is_a_no_op() {
        let rooms = RoomIndex::new();
        rooms.join("q1", "s1");
        rooms.join("q1", "s1");

        assert_eq!(rooms.sessions_of("q1"), vec!["s1".to_string()]);
        assert_eq!(rooms.room_count(), 1);
    }

    #[test]
    fn remove_session_drops_empty_rooms_and_is_idempotent() {
        let rooms = RoomIndex::new();
        rooms.join("q1", "s1");
        rooms.join("q1", "s2");

        rooms.remove_session("s1");
        assert!(!rooms.is_member("q1", "s1"));
        assert!(rooms.is_member("q1", "s2"));
        assert_eq!(rooms.room_count(), 1);

        rooms.remove_session("s2");
        rooms.remove_session("s2");
        assert_eq!(rooms.room_count(), 0);
        assert!(rooms.sessions_of("q1").is_empty());
    }
}
