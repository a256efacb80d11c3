use tracing::{debug, info};

use crate::{error::ServiceError, services::question_bank, state::SharedState};

/// Handle a user joining a quiz: idempotent leaderboard initialization
/// followed by a USER_JOINED event on the bus.
///
/// This function never broadcasts; the coordinator on every instance
/// (including this one) redraws leaderboards in reaction to the event, so
/// all subscribers take the same path.
pub async fn handle_join(state: &SharedState, quiz_id: &str, user_id: &str) {
    let added = state.leaderboard().initialize(quiz_id, user_id).await;
    if added {
        debug!(quiz = %quiz_id, user = %user_id, "initialized on leaderboard with score 0");
    } else {
        debug!(quiz = %quiz_id, user = %user_id, "already on leaderboard; score unchanged");
    }

    state.publisher().publish_user_joined(quiz_id, user_id).await;
    info!(quiz = %quiz_id, user = %user_id, "user joined quiz");
}

/// Handle an answer submission: validate the question, atomically apply the
/// score delta, publish SCORE_UPDATED, and return the authoritative
/// post-increment score.
pub async fn handle_submit(
    state: &SharedState,
    quiz_id: &str,
    user_id: &str,
    question_number: i32,
    correct: bool,
) -> Result<i64, ServiceError> {
    if !question_bank::is_valid_question_number(question_number) {
        return Err(ServiceError::InvalidInput(format!(
            "Invalid question number: {question_number}. Must be between {} and {}.",
            question_bank::MIN_QUESTION_NUMBER,
            question_bank::MAX_QUESTION_NUMBER,
        )));
    }

    // Incorrect answers earn nothing but still go through the store so the
    // caller gets the current score and subscribers get a redraw.
    let delta = if correct {
        question_bank::points_for(question_number)
    } else {
        0
    };

    let new_score = state.leaderboard().increment(quiz_id, user_id, delta).await;

    state
        .publisher()
        .publish_score_updated(quiz_id, user_id, new_score)
        .await;

    info!(
        quiz = %quiz_id,
        user = %user_id,
        question = question_number,
        correct,
        delta,
        new_score,
        "answer submitted"
    );

    Ok(new_score)
}
