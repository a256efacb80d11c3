use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dao::RankedScore;

/// Messages accepted from quiz WebSocket clients, discriminated on `type`.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "JOIN", rename_all = "camelCase")]
    Join { quiz_id: String, user_id: String },
    #[serde(rename = "SUBMIT_ANSWER", rename_all = "camelCase")]
    SubmitAnswer {
        quiz_id: String,
        user_id: String,
        #[serde(default)]
        question_number: Option<i32>,
        #[serde(default)]
        correct: Option<bool>,
    },
    #[serde(rename = "HEARTBEAT")]
    Heartbeat,
    #[serde(other)]
    Unknown,
}

/// Frames pushed to clients, either on the personal reply queue or as a
/// room-wide leaderboard broadcast.
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "JOIN_SUCCESS", rename_all = "camelCase")]
    JoinSuccess {
        quiz_id: String,
        user_id: String,
        message: String,
    },
    #[serde(rename = "ANSWER_RESULT", rename_all = "camelCase")]
    AnswerResult {
        quiz_id: String,
        user_id: String,
        question_number: i32,
        correct: bool,
        points_earned: i64,
        new_score: i64,
    },
    #[serde(rename = "LEADERBOARD_UPDATE", rename_all = "camelCase")]
    LeaderboardUpdate {
        quiz_id: String,
        leaderboard: Vec<LeaderboardEntry>,
    },
    #[serde(rename = "ERROR")]
    Error {
        error: String,
        details: Option<String>,
    },
}

impl ServerMessage {
    pub fn error(reason: impl Into<String>, details: Option<String>) -> Self {
        ServerMessage::Error {
            error: reason.into(),
            details,
        }
    }
}

/// One row of a broadcast leaderboard.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub score: i64,
    /// 1-based, score-descending.
    pub rank: u32,
}

impl From<RankedScore> for LeaderboardEntry {
    fn from(row: RankedScore) -> Self {
        Self {
            user_id: row.user_id,
            score: row.score,
            rank: row.rank,
        }
    }
}
