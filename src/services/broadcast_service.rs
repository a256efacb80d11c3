use tracing::{debug, trace};

use crate::{
    dto::{event::QuizEvent, ws::ServerMessage},
    services::websocket_service,
    state::SharedState,
};

/// React to one bus event: snapshot the top of the quiz's leaderboard and
/// push a LEADERBOARD_UPDATE to every local session in that quiz's room.
///
/// This is the only place broadcast frames are emitted. The payload reflects
/// the store at read time rather than the event's own values, which makes
/// duplicated or reordered events harmless: a stale event just triggers a
/// redraw with equal or newer data.
pub async fn handle_event(state: &SharedState, event: &QuizEvent) {
    let subscribers = state.rooms().sessions_of(&event.quiz_id);
    if subscribers.is_empty() {
        trace!(quiz = %event.quiz_id, "no local subscribers; skipping broadcast");
        return;
    }

    let rows = state
        .leaderboard()
        .top_n(&event.quiz_id, state.config().leaderboard_top_n)
        .await;

    let frame = ServerMessage::LeaderboardUpdate {
        quiz_id: event.quiz_id.clone(),
        leaderboard: rows.into_iter().map(Into::into).collect(),
    };

    let delivered = websocket_service::send_to_sessions(state, &subscribers, &frame);
    debug!(
        quiz = %event.quiz_id,
        kind = ?event.kind,
        subscribers = subscribers.len(),
        delivered,
        "leaderboard update broadcast"
    );
}
