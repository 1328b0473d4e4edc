use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Runtime settings, read from the environment (and `.env` via dotenv).
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// PostgreSQL URL. Without it reviews live in memory only.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub bind_address: String,
    pub port: u16,
    pub classifier_url: Option<String>,
    pub classifier_timeout: Duration,
    /// Fixed seed for the analyzer RNG; entropy when unset.
    pub analyzer_seed: Option<u64>,
    pub static_dir: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Ok(Self {
            database_url: get("DATABASE_URL"),
            database_max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 5)?,
            bind_address: get("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&get, "PORT", 5000)?,
            classifier_url: get("CLASSIFIER_URL"),
            classifier_timeout: Duration::from_secs(parse_or(&get, "CLASSIFIER_TIMEOUT_SECS", 30)?),
            analyzer_seed: get("ANALYZER_SEED")
                .map(|s| s.parse::<u64>().context("ANALYZER_SEED must be an unsigned integer"))
                .transpose()?,
            static_dir: get("STATIC_DIR").unwrap_or_else(|| "static".to_string()),
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.bind_address, self.port))
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{} has invalid value {:?}", key, raw)),
        None => Ok(default),
    }
}
