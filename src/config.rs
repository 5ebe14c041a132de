use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::application::{DEFAULT_MAX_ATTEMPTS, DEFAULT_STORE_TIMEOUT, WalletConfig};

pub const DEFAULT_DATABASE: &str = "neocharge.db";

/// Runtime settings, read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database: String,
    pub wallet: WalletConfig,
    pub log_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DEFAULT_DATABASE.to_string(),
            wallet: WalletConfig::default(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load settings from `NEOCHARGE_*` variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database = lookup("NEOCHARGE_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        let max_attempts = match lookup("NEOCHARGE_MAX_ATTEMPTS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .with_context(|| format!("NEOCHARGE_MAX_ATTEMPTS is not a number: '{}'", raw))?,
            None => DEFAULT_MAX_ATTEMPTS,
        };
        if max_attempts == 0 {
            bail!("NEOCHARGE_MAX_ATTEMPTS must be at least 1");
        }

        let store_timeout = match lookup("NEOCHARGE_STORE_TIMEOUT_MS") {
            Some(raw) => Duration::from_millis(raw.trim().parse::<u64>().with_context(|| {
                format!("NEOCHARGE_STORE_TIMEOUT_MS is not a number: '{}'", raw)
            })?),
            None => DEFAULT_STORE_TIMEOUT,
        };
        if store_timeout.is_zero() {
            bail!("NEOCHARGE_STORE_TIMEOUT_MS must be at least 1");
        }

        let log_file = lookup("NEOCHARGE_LOG_FILE").filter(|s| !s.trim().is_empty());

        Ok(Self {
            database,
            wallet: WalletConfig {
                max_attempts,
                store_timeout,
            },
            log_file,
        })
    }
}
