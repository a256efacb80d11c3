//! Application-level configuration, loaded from the environment with
//! baked-in defaults for every tunable.

use std::{env, fmt::Display, str::FromStr, time::Duration};

use tracing::warn;

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Number of entries carried by each leaderboard broadcast.
    pub leaderboard_top_n: usize,
    pub rate_limit: RateLimitSettings,
    pub heartbeat: HeartbeatSettings,
    pub circuit: CircuitSettings,
    pub backend: BackendSettings,
    /// Identifier stamped onto published events (pod name in practice).
    pub instance_id: String,
}

/// Per-session token bucket parameters.
#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub capacity: u32,
    pub refill_tokens: u32,
    pub refill_period: Duration,
}

/// Client heartbeat cadence and the sweep that enforces it.
#[derive(Debug, Clone)]
pub struct HeartbeatSettings {
    pub interval: Duration,
    pub timeout_multiplier: u32,
    pub sweep_interval: Duration,
}

impl HeartbeatSettings {
    /// Age beyond which a session counts as stale.
    pub fn stale_threshold(&self) -> Duration {
        self.interval * self.timeout_multiplier
    }
}

/// Circuit breaker tuning for shared-store calls.
#[derive(Debug, Clone)]
pub struct CircuitSettings {
    pub failure_rate_threshold: f64,
    pub window_size: usize,
    pub min_calls: usize,
    pub open_duration: Duration,
    pub half_open_probes: u32,
}

/// Shared-store call and liveness-probe tuning.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub health_check_interval: Duration,
    pub call_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            leaderboard_top_n: 10,
            rate_limit: RateLimitSettings {
                capacity: 10,
                refill_tokens: 5,
                refill_period: Duration::from_secs(1),
            },
            heartbeat: HeartbeatSettings {
                interval: Duration::from_secs(30),
                timeout_multiplier: 2,
                sweep_interval: Duration::from_secs(60),
            },
            circuit: CircuitSettings {
                failure_rate_threshold: 0.5,
                window_size: 10,
                min_calls: 5,
                open_duration: Duration::from_secs(30),
                half_open_probes: 3,
            },
            backend: BackendSettings {
                health_check_interval: Duration::from_secs(10),
                call_timeout: Duration::from_secs(2),
            },
            instance_id: "unknown".to_string(),
        }
    }
}

impl AppConfig {
    /// Load the configuration from the environment, falling back to the
    /// defaults above for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            leaderboard_top_n: env_parse("QUIZ_LEADERBOARD_TOP_N", defaults.leaderboard_top_n),
            rate_limit: RateLimitSettings {
                capacity: env_parse("QUIZ_RATE_LIMIT_CAPACITY", defaults.rate_limit.capacity),
                refill_tokens: env_parse(
                    "QUIZ_RATE_LIMIT_REFILL_TOKENS",
                    defaults.rate_limit.refill_tokens,
                ),
                refill_period: env_secs(
                    "QUIZ_RATE_LIMIT_REFILL_PERIOD_SECONDS",
                    defaults.rate_limit.refill_period,
                ),
            },
            heartbeat: HeartbeatSettings {
                interval: env_secs(
                    "QUIZ_HEARTBEAT_INTERVAL_SECONDS",
                    defaults.heartbeat.interval,
                ),
                timeout_multiplier: env_parse(
                    "QUIZ_HEARTBEAT_TIMEOUT_MULTIPLIER",
                    defaults.heartbeat.timeout_multiplier,
                ),
                sweep_interval: env_secs(
                    "QUIZ_HEARTBEAT_SWEEP_INTERVAL_SECONDS",
                    defaults.heartbeat.sweep_interval,
                ),
            },
            circuit: CircuitSettings {
                failure_rate_threshold: env_parse(
                    "QUIZ_CIRCUIT_FAILURE_RATE_THRESHOLD",
                    defaults.circuit.failure_rate_threshold,
                ),
                window_size: env_parse("QUIZ_CIRCUIT_WINDOW_SIZE", defaults.circuit.window_size),
                min_calls: env_parse("QUIZ_CIRCUIT_MIN_CALLS", defaults.circuit.min_calls),
                open_duration: env_secs(
                    "QUIZ_CIRCUIT_OPEN_DURATION_SECONDS",
                    defaults.circuit.open_duration,
                ),
                half_open_probes: env_parse(
                    "QUIZ_CIRCUIT_HALF_OPEN_PROBES",
                    defaults.circuit.half_open_probes,
                ),
            },
            backend: BackendSettings {
                health_check_interval: env_secs(
                    "QUIZ_BACKEND_HEALTH_CHECK_INTERVAL_SECONDS",
                    defaults.backend.health_check_interval,
                ),
                call_timeout: env_secs(
                    "QUIZ_BACKEND_CALL_TIMEOUT_SECONDS",
                    defaults.backend.call_timeout,
                ),
            },
            instance_id: resolve_instance_id(),
        }
    }
}

/// Instance identifier: explicit override first, then the pod hostname.
fn resolve_instance_id() -> String {
    env::var("QUIZ_INSTANCE_ID")
        .or_else(|_| env::var("HOSTNAME"))
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn env_parse<T>(var: &str, default: T) -> T
where
    T: FromStr + Display,
{
    let Ok(raw) = env::var(var) else {
        return default;
    };
    match raw.parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(var, value = %raw, default = %default, "unparsable configuration value; using default");
            default
        }
    }
}

fn env_secs(var: &str, default: Duration) -> Duration {
    Duration::from_secs(env_parse(var, default.as_secs()))
}
