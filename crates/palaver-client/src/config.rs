//! Client configuration loaded from environment variables.
//!
//! All settings have defaults so the client runs with zero configuration
//! against a local development backend.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use palaver_shared::constants::{
    DEFAULT_API_BASE_URL, MAX_SEND_ATTEMPTS, READ_ACK_DELAY_MS, REQUEST_TIMEOUT_SECS,
    RETRY_BASE_DELAY_MS, RETRY_MAX_DELAY_MS, TYPING_EXPIRY_MS,
};

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST API.
    /// Env: `PALAVER_API_URL`
    /// Default: `http://localhost:5001/api`
    pub api_base_url: String,

    /// Directory holding the key/value database.
    /// Env: `PALAVER_DATA_DIR`
    /// Default: `None` (platform data directory).
    pub data_dir: Option<PathBuf>,

    /// How long an inbound message stays on screen before it is marked read.
    /// Env: `PALAVER_READ_ACK_DELAY_MS`
    pub read_ack_delay: Duration,

    /// Inactivity after which a typing indicator is dropped.
    /// Env: `PALAVER_TYPING_EXPIRY_MS`
    pub typing_expiry: Duration,

    /// Automatic resends per message before it stays `failed`.
    /// Env: `PALAVER_MAX_SEND_ATTEMPTS`
    pub max_send_attempts: u32,

    /// Env: `PALAVER_RETRY_BASE_MS`
    pub retry_base: Duration,

    /// Env: `PALAVER_RETRY_MAX_MS`
    pub retry_max: Duration,

    /// Env: `PALAVER_REQUEST_TIMEOUT_SECS`
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            data_dir: None,
            read_ack_delay: Duration::from_millis(READ_ACK_DELAY_MS),
            typing_expiry: Duration::from_millis(TYPING_EXPIRY_MS),
            max_send_attempts: MAX_SEND_ATTEMPTS,
            retry_base: Duration::from_millis(RETRY_BASE_DELAY_MS),
            retry_max: Duration::from_millis(RETRY_MAX_DELAY_MS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("PALAVER_API_URL").filter(|u| !u.trim().is_empty()) {
            config.api_base_url = url.trim().trim_end_matches('/').to_string();
        }

        if let Some(dir) = lookup("PALAVER_DATA_DIR").filter(|d| !d.is_empty()) {
            config.data_dir = Some(PathBuf::from(dir));
        }

        if let Some(ms) = parse_var::<u64>(&lookup, "PALAVER_READ_ACK_DELAY_MS") {
            config.read_ack_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "PALAVER_TYPING_EXPIRY_MS") {
            config.typing_expiry = Duration::from_millis(ms);
        }
        if let Some(n) = parse_var::<u32>(&lookup, "PALAVER_MAX_SEND_ATTEMPTS") {
            config.max_send_attempts = n;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "PALAVER_RETRY_BASE_MS") {
            config.retry_base = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "PALAVER_RETRY_MAX_MS") {
            config.retry_max = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "PALAVER_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Duration::from_secs(secs);
        }

        if config.retry_max < config.retry_base {
            tracing::warn!(
                base_ms = config.retry_base.as_millis() as u64,
                max_ms = config.retry_max.as_millis() as u64,
                "PALAVER_RETRY_MAX_MS below base delay, clamping"
            );
            config.retry_max = config.retry_base;
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Invalid value, using default");
            None
        }
    }
}
