use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info};

use crate::{dao::CircuitState, state::SharedState};

/// Liveness prober for the shared store.
///
/// Pings on a fixed cadence independent of request traffic and feeds the
/// result into the circuit breaker: sustained success while OPEN promotes
/// to HALF_OPEN early, sustained failure keeps the cooldown from elapsing.
/// When the circuit closes after an outage the fallback mirror is discarded;
/// the shared store is authoritative from then on.
pub async fn run(state: SharedState) {
    let mut shutdown = state.shutdown_watcher();
    let mut ticker = interval(state.config().backend.health_check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut last_circuit = state.leaderboard().circuit_state();

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("backend monitor stopping");
                return;
            }
            _ = ticker.tick() => {}
        }

        let healthy = state.leaderboard().probe().await;
        if healthy && state.is_degraded() {
            info!("shared store healthy again; leaving degraded mode");
        } else if !healthy && !state.is_degraded() {
            error!("shared store health check failed; entering degraded mode");
        }
        state.update_degraded(!healthy);

        let circuit = state.leaderboard().circuit_state();
        if circuit == CircuitState::Closed && last_circuit != CircuitState::Closed {
            state.leaderboard().discard_mirror();
        }
        last_circuit = circuit;
    }
}
