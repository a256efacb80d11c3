use super::error::{RedisDaoError, RedisResult};

/// Connection settings for the shared Redis datastore.
#[derive(Clone)]
pub struct RedisConfig {
    pub url: String,
}

impl RedisConfig {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn from_env() -> RedisResult<Self> {
        let url =
            std::env::var("REDIS_URL").map_err(|_| RedisDaoError::MissingEnvVar { var: "REDIS_URL" })?;
        Ok(Self::from_url(url))
    }
}
