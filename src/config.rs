use std::env;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format {other}, expected compact/json")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub order_queue_size: usize,
    pub event_buffer_size: usize,
    pub auto_assign: bool,
    pub assignment_retry_ms: u64,
    pub assignment_max_attempts: u32,
    pub cors_allow_origin: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            order_queue_size: 1024,
            event_buffer_size: 1024,
            auto_assign: true,
            assignment_retry_ms: 250,
            assignment_max_attempts: 20,
            cors_allow_origin: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            http_port: parse_or_default(&lookup, "HTTP_PORT", defaults.http_port)?,
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format: parse_or_default(&lookup, "LOG_FORMAT", defaults.log_format)?,
            order_queue_size: parse_or_default(
                &lookup,
                "ORDER_QUEUE_SIZE",
                defaults.order_queue_size,
            )?,
            event_buffer_size: parse_or_default(
                &lookup,
                "EVENT_BUFFER_SIZE",
                defaults.event_buffer_size,
            )?,
            auto_assign: parse_or_default(&lookup, "AUTO_ASSIGN", defaults.auto_assign)?,
            assignment_retry_ms: parse_or_default(
                &lookup,
                "ASSIGNMENT_RETRY_MS",
                defaults.assignment_retry_ms,
            )?,
            assignment_max_attempts: parse_or_default(
                &lookup,
                "ASSIGNMENT_MAX_ATTEMPTS",
                defaults.assignment_max_attempts,
            )?,
            cors_allow_origin: lookup("CORS_ALLOW_ORIGIN").filter(|raw| !raw.trim().is_empty()),
        };

        // tokio channels panic on a zero capacity
        if config.order_queue_size == 0 || config.event_buffer_size == 0 {
            return Err(AppError::Internal(
                "ORDER_QUEUE_SIZE and EVENT_BUFFER_SIZE must be > 0".to_string(),
            ));
        }

        Ok(config)
    }
}

fn parse_or_default<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        None => Ok(default),
    }
}
