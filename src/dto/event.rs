use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::dto::format_system_time;

/// Kind of a cross-instance quiz event.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub enum QuizEventKind {
    #[serde(rename = "USER_JOINED")]
    UserJoined,
    #[serde(rename = "SCORE_UPDATED")]
    ScoreUpdated,
}

/// Event published on a quiz's bus channel and consumed by the broadcast
/// coordinator on every instance, including the one that published it.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizEvent {
    #[serde(rename = "type")]
    pub kind: QuizEventKind,
    pub quiz_id: String,
    pub user_id: String,
    /// Present only for `SCORE_UPDATED`.
    pub score: Option<i64>,
    pub timestamp: String,
    pub source_instance_id: String,
}

impl QuizEvent {
    pub fn user_joined(quiz_id: &str, user_id: &str, source_instance_id: &str) -> Self {
        Self {
            kind: QuizEventKind::UserJoined,
            quiz_id: quiz_id.to_owned(),
            user_id: user_id.to_owned(),
            score: None,
            timestamp: format_system_time(SystemTime::now()),
            source_instance_id: source_instance_id.to_owned(),
        }
    }

    pub fn score_updated(
        quiz_id: &str,
        user_id: &str,
        new_score: i64,
        source_instance_id: &str,
    ) -> Self {
        Self {
            kind: QuizEventKind::ScoreUpdated,
            quiz_id: quiz_id.to_owned(),
            user_id: user_id.to_owned(),
            score: Some(new_score),
            timestamp: format_system_time(SystemTime::now()),
            source_instance_id: source_instance_id.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_updated_round_trips_through_json() {
        let event = QuizEvent::score_updated("q1", "alice", 7, "pod-a");
        let json = serde_json::to_string(&event).unwrap();
        let decoded: QuizEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded.kind, QuizEventKind::ScoreUpdated);
        assert_eq!(decoded.quiz_id, "q1");
        assert_eq!(decoded.user_id, "alice");
        assert_eq!(decoded.score, Some(7));
        assert_eq!(decoded.source_instance_id, "pod-a");
    }

    #[test]
    fn user_joined_carries_a_null_score() {
        let event = QuizEvent::user_joined("q1", "alice", "pod-a");
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], "USER_JOINED");
        assert_eq!(value["quizId"], "q1");
        assert_eq!(value["userId"], "alice");
        assert!(value["score"].is_null());
        assert_eq!(value["sourceInstanceId"], "pod-a");
        assert!(value["timestamp"].is_string());
    }
}
