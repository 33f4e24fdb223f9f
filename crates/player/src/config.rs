//! Client configuration from environment variables
//!
//! # Environment Variables
//!
//! - `SECRET_HITLER_PAGE_URL` - URL the client is "served from" (default: http://localhost:3737/)
//! - `SECRET_HITLER_RETRY_INITIAL_MS` - First reconnect delay in ms (default: 250)
//! - `SECRET_HITLER_RETRY_MAX_MS` - Reconnect delay cap in ms (default: 4000)
//! - `SECRET_HITLER_EVENT_LOG_CAPACITY` - Event log entries kept (default: 200)
//! - `SECRET_HITLER_STORAGE_PATH` - Identity file (default: platform config dir)
//!
//! The socket endpoint is derived from the page URL: `https` pages connect over
//! `wss`, everything else over `ws`, and `ws` is appended to the page path.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::infrastructure::websocket::{
    RetryPolicy, BACKOFF_MULTIPLIER, INITIAL_RETRY_DELAY_MS, MAX_RETRY_DELAY_MS,
};
use crate::state::DEFAULT_EVENT_LOG_CAPACITY;

pub const DEFAULT_PAGE_URL: &str = "http://localhost:3737/";

const PAGE_URL_VAR: &str = "SECRET_HITLER_PAGE_URL";
const RETRY_INITIAL_VAR: &str = "SECRET_HITLER_RETRY_INITIAL_MS";
const RETRY_MAX_VAR: &str = "SECRET_HITLER_RETRY_MAX_MS";
const EVENT_LOG_CAPACITY_VAR: &str = "SECRET_HITLER_EVENT_LOG_CAPACITY";
const STORAGE_PATH_VAR: &str = "SECRET_HITLER_STORAGE_PATH";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is not a valid URL: {source}")]
    InvalidUrl {
        var: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported page scheme `{0}` (expected http or https)")]
    UnsupportedScheme(String),
    #[error("{var}={value:?} is not a valid {expected}")]
    InvalidNumber {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("{var} must be greater than zero")]
    Zero { var: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub page_url: Url,
    pub retry: RetryPolicy,
    pub event_log_capacity: usize,
    pub storage_path: Option<PathBuf>,
}

impl ClientConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` for each variable. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let raw_page = get(PAGE_URL_VAR).unwrap_or_else(|| DEFAULT_PAGE_URL.to_string());
        let page_url = Url::parse(&raw_page).map_err(|source| ConfigError::InvalidUrl {
            var: PAGE_URL_VAR,
            source,
        })?;
        // Reject unusable pages up front rather than on first connect.
        endpoint_url(&page_url)?;

        let initial_ms = parse_positive(RETRY_INITIAL_VAR, get(RETRY_INITIAL_VAR))?
            .unwrap_or(INITIAL_RETRY_DELAY_MS);
        let max_ms =
            parse_positive(RETRY_MAX_VAR, get(RETRY_MAX_VAR))?.unwrap_or(MAX_RETRY_DELAY_MS);

        let event_log_capacity =
            parse_positive(EVENT_LOG_CAPACITY_VAR, get(EVENT_LOG_CAPACITY_VAR))?
                .map(|v| v as usize)
                .unwrap_or(DEFAULT_EVENT_LOG_CAPACITY);

        Ok(Self {
            page_url,
            retry: RetryPolicy {
                initial_delay: Duration::from_millis(initial_ms),
                max_delay: Duration::from_millis(max_ms.max(initial_ms)),
                multiplier: BACKOFF_MULTIPLIER,
            },
            event_log_capacity,
            storage_path: get(STORAGE_PATH_VAR).map(PathBuf::from),
        })
    }

    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        endpoint_url(&self.page_url)
    }
}

fn parse_positive(var: &'static str, value: Option<String>) -> Result<Option<u64>, ConfigError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let parsed: u64 = value.parse().map_err(|_| ConfigError::InvalidNumber {
        var,
        value: value.clone(),
        expected: "positive integer",
    })?;
    if parsed == 0 {
        return Err(ConfigError::Zero { var });
    }
    Ok(Some(parsed))
}

/// Derive the socket endpoint from the page the client was served from.
///
/// `https://host/app/` becomes `wss://host/app/ws`; `http://host` becomes
/// `ws://host/ws`. Query and fragment are dropped.
pub fn endpoint_url(page: &Url) -> Result<Url, ConfigError> {
    let scheme = match page.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
    };

    let mut endpoint = page.clone();
    let path = format!("{}/ws", page.path().trim_end_matches('/'));
    endpoint.set_path(&path);
    endpoint.set_query(None);
    endpoint.set_fragment(None);
    endpoint
        .set_scheme(scheme)
        .map_err(|_| ConfigError::UnsupportedScheme(page.scheme().to_string()))?;
    Ok(endpoint)
}
