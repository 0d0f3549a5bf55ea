use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;

/// A configuration variable that is set but cannot be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a valid {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("{var} must be greater than zero")]
    Zero { var: &'static str },
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Time allowed for in-flight analysis runs to stop on shutdown (default: `10`).
    pub shutdown_timeout_secs: u64,
    /// Per-subscriber outbound buffer, in messages (default: `64`).
    pub subscriber_buffer: usize,
    /// Interval between WebSocket keepalive pings (default: `30`).
    pub heartbeat_interval_secs: u64,
    /// Pause between the simulated engine's steps (default: `2000`).
    pub analysis_step_delay_ms: u64,
    /// Largest accepted request body, in bytes (default: 50 MiB).
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                 |
    /// |---------------------------|-------------------------|
    /// | `HOST`                    | `0.0.0.0`               |
    /// | `PORT`                    | `8000`                  |
    /// | `CORS_ORIGINS`            | `http://localhost:3000` |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`   | `10`                    |
    /// | `SUBSCRIBER_BUFFER`       | `64`                    |
    /// | `HEARTBEAT_INTERVAL_SECS` | `30`                    |
    /// | `ANALYSIS_STEP_DELAY_MS`  | `2000`                  |
    /// | `MAX_UPLOAD_BYTES`        | `52428800`              |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());

        let cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        for origin in &cors_origins {
            if HeaderValue::from_str(origin).is_err() {
                return Err(ConfigError::Invalid {
                    var: "CORS_ORIGINS",
                    expected: "list of origins",
                    value: origin.clone(),
                });
            }
        }

        Ok(Self {
            host,
            port: parse(&lookup, "PORT", "port number", 8000)?,
            cors_origins,
            request_timeout_secs: parse(&lookup, "REQUEST_TIMEOUT_SECS", "u64", 30)?,
            shutdown_timeout_secs: parse(&lookup, "SHUTDOWN_TIMEOUT_SECS", "u64", 10)?,
            subscriber_buffer: positive(
                parse(&lookup, "SUBSCRIBER_BUFFER", "usize", 64)?,
                "SUBSCRIBER_BUFFER",
            )?,
            heartbeat_interval_secs: positive(
                parse(&lookup, "HEARTBEAT_INTERVAL_SECS", "u64", 30)?,
                "HEARTBEAT_INTERVAL_SECS",
            )?,
            analysis_step_delay_ms: parse(&lookup, "ANALYSIS_STEP_DELAY_MS", "u64", 2000)?,
            max_upload_bytes: parse(&lookup, "MAX_UPLOAD_BYTES", "usize", 50 * 1024 * 1024)?,
        })
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn analysis_step_delay(&self) -> Duration {
        Duration::from_millis(self.analysis_step_delay_ms)
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            expected,
            value,
        }),
    }
}

fn positive<T: PartialEq + Default>(value: T, var: &'static str) -> Result<T, ConfigError> {
    if value == T::default() {
        return Err(ConfigError::Zero { var });
    }
    Ok(value)
}
