mod board;
mod config;
mod connection;
mod error;

pub use board::{RedisScoreBoard, leaderboard_key};
pub use config::RedisConfig;
pub use connection::establish_connection;
pub use error::RedisDaoError;
