use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

use crate::state::SharedState;

/// Periodic sweep that removes sessions whose last heartbeat is older than
/// interval × multiplier, using the same cleanup path as a disconnect.
pub async fn run(state: SharedState) {
    let mut shutdown = state.shutdown_watcher();
    let mut ticker = interval(state.config().heartbeat.sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; skip it so a fresh boot is quiet.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("heartbeat sweeper stopping");
                return;
            }
            _ = ticker.tick() => {}
        }
        sweep(&state);
    }
}

/// One sweep pass over a snapshot of heartbeat timestamps. Entirely
/// synchronous: no lock is held across I/O and message dispatch never waits
/// on it.
pub fn sweep(state: &SharedState) -> usize {
    let threshold = state.config().heartbeat.stale_threshold();
    let stale = state.heartbeat().stale_sessions(threshold);
    if stale.is_empty() {
        return 0;
    }

    for session_id in &stale {
        let user = state.sessions().user_of(session_id);
        let quiz = state.rooms().quiz_of(session_id);
        warn!(session = %session_id, user = ?user, quiz = ?quiz, threshold = ?threshold,
            "removing stale session");
        state.cleanup_session(session_id);
    }

    info!(count = stale.len(), "cleaned up stale sessions");
    stale.len()
}
