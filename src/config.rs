use std::str::FromStr;

use anyhow::Context;

/// Runtime settings, read from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub cors_origins: Vec<String>,
    /// Frames a single connection may have pending before the hub evicts it.
    pub outbox_capacity: usize,
    pub hub_queue_capacity: usize,
    pub session_idle_minutes: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // a missing .env is fine, the real environment still applies
        let _ = dotenv::dotenv();

        Ok(Config {
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:8081"),
            database_url: var_or("DATABASE_URL", "sqlite://projchat.db?mode=rwc"),
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 16)?,
            cors_origins: var_or("CORS_ORIGINS", "http://localhost:3000")
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_owned)
                .collect(),
            outbox_capacity: parse_or("CHAT_OUTBOX_CAPACITY", 64)?,
            hub_queue_capacity: parse_or("CHAT_HUB_QUEUE_CAPACITY", 1024)?,
            session_idle_minutes: parse_or("SESSION_IDLE_MINUTES", 60)?,
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    dotenv::var(key).unwrap_or_else(|_| default.to_owned())
}

fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    parse_setting(key, dotenv::var(key).ok().as_deref(), default)
}

fn parse_setting<T>(key: &str, raw: Option<&str>, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a number, got {raw:?}")),
        None => Ok(default),
    }
}
