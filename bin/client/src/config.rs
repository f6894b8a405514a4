//! Client configuration: defaults, optional TOML settings file, environment, CLI

use crate::constants::{
    DEFAULT_MAX_RETRY_WAIT_SECS, DEFAULT_REQUEST_RETRIES, DEFAULT_REQUEST_TIMEOUT_SECS,
    ENV_CHUNK_SIZE, ENV_MAX_RETRIES, ENV_RETRY_WAIT_SECS,
};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use transfer::{
    Backoff, HttpOptions, RetryPolicy, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_RETRIES,
    DEFAULT_RETRY_WAIT_SECS,
};

/// How the wait between trials grows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    Fixed,
    Exponential,
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Master coordinator addresses, tried in order
    pub masters: Vec<String>,
    /// Trials after the first one
    pub max_retries: u32,
    /// Wait between trials (base wait for exponential backoff)
    pub retry_wait_secs: u64,
    pub backoff: BackoffKind,
    /// Upper bound of the exponential backoff wait
    pub max_retry_wait_secs: u64,
    /// Initial chunk size in bytes
    pub chunk_size: u64,
    /// Retries of a single request that could not be sent
    pub request_retries: u32,
    pub request_timeout_secs: u64,
    pub retry_local_file_errors: bool,
    pub retry_session_init: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            masters: Vec::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_wait_secs: DEFAULT_RETRY_WAIT_SECS,
            backoff: BackoffKind::Fixed,
            max_retry_wait_secs: DEFAULT_MAX_RETRY_WAIT_SECS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            request_retries: DEFAULT_REQUEST_RETRIES,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            retry_local_file_errors: false,
            retry_session_init: false,
        }
    }
}

impl ClientConfig {
    /// Read a TOML settings file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Unable to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Unable to parse config file: {}", path.display()))
    }

    /// Apply `UPLOAD_*` environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(value) = parse_var(&lookup, ENV_MAX_RETRIES)? {
            self.max_retries = value;
        }
        if let Some(value) = parse_var(&lookup, ENV_RETRY_WAIT_SECS)? {
            self.retry_wait_secs = value;
        }
        if let Some(value) = parse_var(&lookup, ENV_CHUNK_SIZE)? {
            self.chunk_size = value;
        }
        Ok(())
    }

    /// Check the configuration can drive an upload
    pub fn validate(&self) -> Result<()> {
        if self.masters.is_empty() {
            anyhow::bail!("No masters ip provided");
        }
        if self.chunk_size == 0 {
            anyhow::bail!("Chunk size must be greater than 0");
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let wait = Duration::from_secs(self.retry_wait_secs);
        let backoff = match self.backoff {
            BackoffKind::Fixed => Backoff::Fixed(wait),
            BackoffKind::Exponential => Backoff::Exponential {
                base: wait,
                max: Duration::from_secs(self.max_retry_wait_secs),
            },
        };
        RetryPolicy {
            max_retries: self.max_retries,
            backoff,
            retry_local_file_errors: self.retry_local_file_errors,
            retry_session_init: self.retry_session_init,
        }
    }

    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            request_retries: self.request_retries,
            request_retry_wait: Duration::from_secs(self.retry_wait_secs),
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("Invalid value for {}: {}", key, raw)),
        None => Ok(None),
    }
}
