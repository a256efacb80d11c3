use redis::{Client, aio::ConnectionManager};
use tracing::info;

use super::{
    config::RedisConfig,
    error::{RedisDaoError, RedisResult},
};

/// Open a client and a managed multiplexed connection, verifying liveness with
/// an initial PING. The manager transparently reconnects after transient drops;
/// sustained outages surface as command errors and are absorbed by the circuit
/// breaker upstream.
pub async fn establish_connection(config: &RedisConfig) -> RedisResult<(Client, ConnectionManager)> {
    let client = Client::open(config.url.as_str()).map_err(|source| RedisDaoError::InvalidUrl {
        url: config.url.clone(),
        source,
    })?;

    let mut manager = ConnectionManager::new(client.clone())
        .await
        .map_err(|source| RedisDaoError::Connect { source })?;

    let pong: String = redis::cmd("PING")
        .query_async(&mut manager)
        .await
        .map_err(|source| RedisDaoError::InitialPing { source })?;
    info!(response = %pong, "connected to Redis");

    Ok((client, manager))
}
