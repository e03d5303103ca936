use std::net::SocketAddr;
use std::num::NonZeroU32;

use anyhow::{anyhow, Context, Result};

use crate::db::DbConfig;
use crate::engine::EngineConfig;

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub log_level: String,
    pub dev_mode: bool,
    pub database: DbConfig,
    pub engine: EngineConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source, e.g. a map in tests.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let listen_addr = lookup("ALLOC_LISTEN_ADDR")
            .unwrap_or_else(|| "127.0.0.1:8080".to_string())
            .parse()
            .context("ALLOC_LISTEN_ADDR is not a socket address")?;

        let log_level = lookup("ALLOC_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let dev_mode = lookup("ALLOC_DEV")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        let defaults = EngineConfig::default();
        let engine = EngineConfig {
            capacity_limit: non_zero(&lookup, "ALLOC_CAPACITY_LIMIT", defaults.capacity_limit)?,
            max_attempts: non_zero(&lookup, "ALLOC_MAX_ATTEMPTS", defaults.max_attempts)?,
        };

        Ok(Self {
            listen_addr,
            log_level,
            dev_mode,
            database: DbConfig::from_lookup(&lookup)?,
            engine,
        })
    }
}

fn non_zero(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: NonZeroU32,
) -> Result<NonZeroU32> {
    match lookup(name) {
        None => Ok(default),
        Some(raw) => {
            let value: u32 = raw
                .trim()
                .parse()
                .with_context(|| format!("{name} must be a positive integer, got '{raw}'"))?;
            NonZeroU32::new(value).ok_or_else(|| anyhow!("{name} must be at least 1"))
        }
    }
}
