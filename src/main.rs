//! Quizcast Back binary entrypoint wiring WebSocket, Redis, and background layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod bus;
mod config;
mod dao;
mod dto;
mod error;
mod routes;
mod services;
mod state;

use bus::{publisher::EventPublisher, subscriber};
use config::AppConfig;
use dao::{
    CircuitBreaker, LeaderboardStore,
    redis::{RedisConfig, RedisScoreBoard, establish_connection},
};
use services::{backend_monitor, heartbeat_sweeper};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_config = AppConfig::from_env();
    info!(instance = %app_config.instance_id, "starting quizcast-back");

    let redis_config = RedisConfig::from_env().context("loading Redis configuration")?;
    let (client, manager) = establish_connection(&redis_config)
        .await
        .context("connecting to Redis")?;

    // Construct components leaves-first; one breaker guards both the
    // leaderboard store and the event publisher.
    let breaker = Arc::new(CircuitBreaker::new(app_config.circuit.clone()));
    let backend = Arc::new(RedisScoreBoard::new(manager.clone()));
    let leaderboard =
        LeaderboardStore::new(backend, breaker.clone(), app_config.backend.call_timeout);
    let publisher = EventPublisher::new(
        manager,
        breaker,
        app_config.instance_id.clone(),
        app_config.backend.call_timeout,
    );

    let app_state = AppState::new(app_config, leaderboard, publisher);

    tokio::spawn(subscriber::run(app_state.clone(), client));
    tokio::spawn(backend_monitor::run(app_state.clone()));
    tokio::spawn(heartbeat_sweeper::run(app_state.clone()));

    let app = build_router(app_state.clone());

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown({
            let state = app_state.clone();
            async move {
                shutdown_signal().await;
                info!("shutdown signal received; stopping background tasks and draining sessions");
                // Stop the sweeper, prober, and subscriber, then close every
                // session so in-flight connections can finish.
                state.begin_shutdown();
                state.close_all_sessions();
            }
        })
        .await
        .context("serving axum")?;

    Ok(())
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: state::SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
