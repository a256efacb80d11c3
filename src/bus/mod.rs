pub mod publisher;
pub mod subscriber;

const EVENT_CHANNEL_PREFIX: &str = "quiz:";
const EVENT_CHANNEL_SUFFIX: &str = ":events";

/// Wildcard pattern every instance subscribes with.
pub const EVENT_PATTERN: &str = "quiz:*:events";

/// Pub/sub channel carrying the events of one quiz: `quiz:{quizId}:events`.
pub fn event_channel(quiz_id: &str) -> String {
    format!("{EVENT_CHANNEL_PREFIX}{quiz_id}{EVENT_CHANNEL_SUFFIX}")
}
