use crate::{dao::CircuitState, dto::health::HealthResponse, state::SharedState};

/// Health payload for the HTTP surface: degraded whenever the breaker is
/// open or the liveness prober last reported the shared store down.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let circuit = state.leaderboard().circuit_state();
    let sessions = state.sessions().len();
    let rooms = state.rooms().room_count();

    if state.is_degraded() || circuit == CircuitState::Open {
        HealthResponse::degraded(circuit.as_str(), sessions, rooms)
    } else {
        HealthResponse::ok(circuit.as_str(), sessions, rooms)
    }
}
