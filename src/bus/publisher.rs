use std::sync::Arc;
use std::time::Duration;

use redis::{AsyncCommands, aio::ConnectionManager};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::{bus::event_channel, dao::CircuitBreaker, dto::event::QuizEvent};

/// Publishes quiz events onto the shared bus so every instance, including
/// this one, can re-broadcast to its local subscribers.
///
/// Publishing is fire-and-forget: when the circuit is open or the PUBLISH
/// fails, the event is logged and dropped. The broadcast coordinator
/// re-reads the store on every event, so the next user action repairs any
/// missed redraw.
pub struct EventPublisher {
    conn: ConnectionManager,
    breaker: Arc<CircuitBreaker>,
    instance_id: String,
    publish_timeout: Duration,
}

impl EventPublisher {
    pub fn new(
        conn: ConnectionManager,
        breaker: Arc<CircuitBreaker>,
        instance_id: String,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            conn,
            breaker,
            instance_id,
            publish_timeout,
        }
    }

    pub async fn publish_user_joined(&self, quiz_id: &str, user_id: &str) {
        self.publish(QuizEvent::user_joined(quiz_id, user_id, &self.instance_id))
            .await;
    }

    pub async fn publish_score_updated(&self, quiz_id: &str, user_id: &str, new_score: i64) {
        self.publish(QuizEvent::score_updated(
            quiz_id,
            user_id,
            new_score,
            &self.instance_id,
        ))
        .await;
    }

    async fn publish(&self, event: QuizEvent) {
        let channel = event_channel(&event.quiz_id);

        if !self.breaker.try_acquire() {
            debug!(channel, kind = ?event.kind, "event bus unavailable; dropping event");
            return;
        }

        let payload = match serde_json::to_string(&event) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(channel, error = %err, "failed to serialize quiz event; dropping");
                return;
            }
        };

        let mut conn = self.conn.clone();
        let publish = async move {
            let receivers: i64 = conn.publish(&channel, payload).await?;
            Ok::<_, redis::RedisError>((channel, receivers))
        };

        match timeout(self.publish_timeout, publish).await {
            Ok(Ok((channel, receivers))) => {
                self.breaker.record_success();
                debug!(channel, receivers, kind = ?event.kind, "published quiz event");
            }
            Ok(Err(err)) => {
                self.breaker.record_failure();
                warn!(kind = ?event.kind, error = %err, "failed to publish quiz event; dropping");
            }
            Err(_) => {
                self.breaker.record_failure();
                warn!(kind = ?event.kind, timeout = ?self.publish_timeout,
                    "publish of quiz event timed out; dropping");
            }
        }
    }
}
