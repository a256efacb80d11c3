use std::time::Duration;

use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    bus::EVENT_PATTERN, dto::event::QuizEvent, services::broadcast_service, state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);

/// Subscribe to every quiz event channel and feed decoded events to the
/// broadcast coordinator. Lost subscriptions are re-established with
/// exponential backoff; the task exits on the shutdown signal.
pub async fn run(state: SharedState, client: redis::Client) {
    let mut shutdown = state.shutdown_watcher();
    let mut delay = INITIAL_DELAY;

    loop {
        if *shutdown.borrow() {
            return;
        }

        match client.get_async_pubsub().await {
            Ok(mut pubsub) => match pubsub.psubscribe(EVENT_PATTERN).await {
                Ok(()) => {
                    info!(pattern = EVENT_PATTERN, "subscribed to quiz event channels");
                    delay = INITIAL_DELAY;

                    let mut messages = pubsub.on_message();
                    loop {
                        tokio::select! {
                            _ = shutdown.changed() => {
                                info!("event subscriber stopping");
                                return;
                            }
                            message = messages.next() => match message {
                                Some(message) => dispatch(&state, message).await,
                                None => {
                                    warn!("event bus subscription ended; reconnecting");
                                    break;
                                }
                            }
                        }
                    }
                }
                Err(err) => {
                    warn!(pattern = EVENT_PATTERN, error = %err, "failed to subscribe to event channels");
                }
            },
            Err(err) => warn!(error = %err, "event bus connection attempt failed"),
        }

        tokio::select! {
            _ = shutdown.changed() => return,
            _ = sleep(delay) => {}
        }
        delay = (delay * 2).min(MAX_DELAY);
    }
}

/// Decode one bus message and hand it to the coordinator. Malformed payloads
/// are logged and dropped; the coordinator re-reads the store, so nothing is
/// lost beyond one redraw.
async fn dispatch(state: &SharedState, message: redis::Msg) {
    let channel = message.get_channel_name().to_owned();
    let payload: String = match message.get_payload() {
        Ok(payload) => payload,
        Err(err) => {
            warn!(channel, error = %err, "undecodable bus payload; dropping");
            return;
        }
    };

    match serde_json::from_str::<QuizEvent>(&payload) {
        Ok(event) => {
            debug!(
                channel,
                kind = ?event.kind,
                quiz = %event.quiz_id,
                user = %event.user_id,
                source = %event.source_instance_id,
                "received quiz event"
            );
            broadcast_service::handle_event(state, &event).await;
        }
        Err(err) => warn!(channel, error = %err, "malformed quiz event; dropping"),
    }
}
