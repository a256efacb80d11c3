use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        validation::validate_identifier,
        ws::{ClientMessage, ServerMessage},
    },
    error::ServiceError,
    services::{question_bank, quiz_service},
    state::SharedState,
};

/// Handle the full lifecycle of one quiz WebSocket connection.
///
/// Every inbound frame is answered on the session's personal queue; no
/// handler failure closes the connection. The session disappears from all
/// registries on disconnect via the same cleanup path the stale sweep uses.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let session_id = Uuid::new_v4().to_string();
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound frames flowing even while we await
    // inbound ones.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    state
        .sessions()
        .register(session_id.clone(), outbound_tx.clone());
    state.heartbeat().register(&session_id);
    info!(session = %session_id, "client connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                handle_frame(&state, &session_id, &outbound_tx, text.as_str()).await;
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                debug!(session = %session_id, "client closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(session = %session_id, error = %err, "websocket error");
                break;
            }
        }
    }

    state.cleanup_session(&session_id);
    info!(session = %session_id, "client disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Decode one text frame and dispatch on its tag. Undecodable input becomes
/// an ERROR reply; heartbeats are silent and bypass the rate limiter.
async fn handle_frame(
    state: &SharedState,
    session_id: &str,
    tx: &mpsc::UnboundedSender<Message>,
    text: &str,
) {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(err) => {
            warn!(session = %session_id, error = %err, "failed to parse client frame");
            send_frame(tx, &ServerMessage::error("Malformed message", Some(err.to_string())));
            return;
        }
    };

    match message {
        ClientMessage::Heartbeat => state.heartbeat().record(session_id),
        ClientMessage::Join { quiz_id, user_id } => {
            if let Err(err) = handle_join(state, session_id, tx, &quiz_id, &user_id).await {
                reply_error(session_id, tx, "JOIN", err);
            }
        }
        ClientMessage::SubmitAnswer {
            quiz_id,
            user_id,
            question_number,
            correct,
        } => {
            let outcome = handle_submit(
                state,
                session_id,
                tx,
                &quiz_id,
                &user_id,
                question_number,
                correct,
            )
            .await;
            if let Err(err) = outcome {
                reply_error(session_id, tx, "SUBMIT_ANSWER", err);
            }
        }
        ClientMessage::Unknown => {
            send_frame(tx, &ServerMessage::error("Unsupported message type", None));
        }
    }
}

async fn handle_join(
    state: &SharedState,
    session_id: &str,
    tx: &mpsc::UnboundedSender<Message>,
    quiz_id: &str,
    user_id: &str,
) -> Result<(), ServiceError> {
    if !state.rate_limiter().try_consume(session_id) {
        warn!(session = %session_id, user = %user_id, "rate limit exceeded for JOIN");
        return Err(ServiceError::RateLimited);
    }

    validate_identifier(quiz_id)
        .map_err(|_| ServiceError::InvalidInput("Invalid quiz ID".into()))?;
    validate_identifier(user_id)
        .map_err(|_| ServiceError::InvalidInput("Invalid user ID".into()))?;

    state.sessions().associate_user(user_id, session_id);
    state.rooms().join(quiz_id, session_id);

    quiz_service::handle_join(state, quiz_id, user_id).await;

    send_frame(
        tx,
        &ServerMessage::JoinSuccess {
            quiz_id: quiz_id.to_owned(),
            user_id: user_id.to_owned(),
            message: format!("Successfully joined quiz {quiz_id}"),
        },
    );
    Ok(())
}

async fn handle_submit(
    state: &SharedState,
    session_id: &str,
    tx: &mpsc::UnboundedSender<Message>,
    quiz_id: &str,
    user_id: &str,
    question_number: Option<i32>,
    correct: Option<bool>,
) -> Result<(), ServiceError> {
    if !state.rate_limiter().try_consume(session_id) {
        warn!(session = %session_id, user = %user_id, "rate limit exceeded for SUBMIT_ANSWER");
        return Err(ServiceError::RateLimited);
    }

    validate_identifier(quiz_id)
        .map_err(|_| ServiceError::InvalidInput("Invalid quiz ID".into()))?;
    validate_identifier(user_id)
        .map_err(|_| ServiceError::InvalidInput("Invalid user ID".into()))?;
    let question_number = question_number
        .ok_or_else(|| ServiceError::InvalidInput("Question number is required".into()))?;
    let correct = correct
        .ok_or_else(|| ServiceError::InvalidInput("Answer correctness not specified".into()))?;

    if !state.rooms().is_member(quiz_id, session_id) {
        return Err(ServiceError::NotInRoom(quiz_id.to_owned()));
    }

    let new_score =
        quiz_service::handle_submit(state, quiz_id, user_id, question_number, correct).await?;

    let points_earned = if correct {
        question_bank::points_for(question_number)
    } else {
        0
    };

    send_frame(
        tx,
        &ServerMessage::AnswerResult {
            quiz_id: quiz_id.to_owned(),
            user_id: user_id.to_owned(),
            question_number,
            correct,
            points_earned,
            new_score,
        },
    );
    Ok(())
}

fn reply_error(
    session_id: &str,
    tx: &mpsc::UnboundedSender<Message>,
    kind: &str,
    err: ServiceError,
) {
    warn!(session = %session_id, kind, error = %err, "client operation rejected");
    send_frame(tx, &ServerMessage::error(err.client_reason(), None));
}

/// Serialize a frame and queue it on one session's writer. Returns whether
/// the frame was accepted by the channel.
pub fn send_frame(tx: &mpsc::UnboundedSender<Message>, frame: &ServerMessage) -> bool {
    match serde_json::to_string(frame) {
        Ok(payload) => tx.send(Message::Text(payload.into())).is_ok(),
        Err(err) => {
            warn!(error = %err, "failed to serialize outbound frame");
            false
        }
    }
}

/// Deliver one frame to a set of local sessions, serializing it once.
/// Returns the number of sessions the frame was queued for.
pub fn send_to_sessions(state: &SharedState, session_ids: &[String], frame: &ServerMessage) -> usize {
    let payload = match serde_json::to_string(frame) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(error = %err, "failed to serialize broadcast frame");
            return 0;
        }
    };

    let mut delivered = 0;
    for session_id in session_ids {
        if let Some(tx) = state.sessions().sender(session_id)
            && tx.send(Message::Text(payload.clone().into())).is_ok()
        {
            delivered += 1;
        }
    }
    delivered
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
