use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Current circuit breaker state guarding the shared store.
    pub circuit: String,
    /// Live WebSocket sessions on this instance.
    pub sessions: usize,
    /// Quiz rooms with at least one local subscriber.
    pub rooms: usize,
}

impl HealthResponse {
    /// The shared store is reachable and authoritative.
    pub fn ok(circuit: &str, sessions: usize, rooms: usize) -> Self {
        Self {
            status: "ok".to_string(),
            circuit: circuit.to_string(),
            sessions,
            rooms,
        }
    }

    /// Serving from the in-memory mirror while the shared store is down.
    pub fn degraded(circuit: &str, sessions: usize, rooms: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            circuit: circuit.to_string(),
            sessions,
            rooms,
        }
    }
}
