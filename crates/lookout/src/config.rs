use std::num::ParseIntError;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

pub const URL_TO_MONITOR: &str = "URL_TO_MONITOR";
pub const DISCORD_WEBHOOK_URL: &str = "DISCORD_WEBHOOK_URL";
pub const STORAGE_FILE: &str = "STORAGE_FILE";
pub const SLEEP_INTERVAL_S: &str = "SLEEP_INTERVAL_S";

const DEFAULT_STORAGE_FILE: &str = "stored_file.html";
const DEFAULT_SLEEP_INTERVAL_S: u64 = 300;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("key `{0}` is not present in environment")]
    Missing(&'static str),

    #[error("`{key}` is not a valid url: {value:?}")]
    InvalidUrl {
        key: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("`{key}` is not a whole number of seconds: {value:?}")]
    InvalidInterval {
        key: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },
}

/// Everything the monitor needs to know, resolved once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub url_to_monitor: Url,
    pub discord_webhook_url: Url,
    pub storage_file: PathBuf,
    pub sleep_interval: Duration,
}

impl Config {
    /// Resolves the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves the configuration using an arbitrary key lookup.
    ///
    /// [`from_env`](Config::from_env) is this with [`std::env::var`] plugged
    /// in. Both required keys are checked before any optional key is parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| -> Result<Url, ConfigError> {
            let value = lookup(key).ok_or(ConfigError::Missing(key))?;
            value
                .parse()
                .map_err(|source| ConfigError::InvalidUrl { key, value, source })
        };

        let url_to_monitor = required(URL_TO_MONITOR)?;
        let discord_webhook_url = required(DISCORD_WEBHOOK_URL)?;

        let storage_file = lookup(STORAGE_FILE)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_FILE));

        let sleep_interval_s = match lookup(SLEEP_INTERVAL_S) {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map_err(|source| ConfigError::InvalidInterval {
                    key: SLEEP_INTERVAL_S,
                    value,
                    source,
                })?,
            None => DEFAULT_SLEEP_INTERVAL_S,
        };

        Ok(Config {
            url_to_monitor,
            discord_webhook_url,
            storage_file,
            sleep_interval: Duration::from_secs(sleep_interval_s),
        })
    }
}
