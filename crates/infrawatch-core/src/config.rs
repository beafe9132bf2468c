//! Client configuration.
//!
//! The REST base path is the only externally configurable value
//! (`INFRAWATCH_API_URL`); everything else is an internal default.

use std::time::Duration;

use url::Url;

use crate::error::TransportError;

/// Environment variable overriding the REST base path.
pub const API_URL_ENV: &str = "INFRAWATCH_API_URL";

/// REST base path used when no override is set.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";

/// Reconnect backoff policy.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// First delay, and the delay after every successful open.
    pub base: Duration,
    /// Growth factor applied after each scheduled retry.
    pub factor: f64,
    /// Upper bound on any delay.
    pub max: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(3),
            factor: 1.5,
            max: Duration::from_secs(30),
        }
    }
}

/// Default page size per resource view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSizes {
    pub alerts: u32,
    pub alert_rules: u32,
    pub metrics: u32,
    pub logs: u32,
}

impl Default for PageSizes {
    fn default() -> Self {
        Self {
            alerts: 20,
            alert_rules: 20,
            metrics: 20,
            logs: 50,
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// REST base path, without trailing slash.
    pub api_url: String,
    /// Push channel path on the API origin.
    pub ws_path: String,
    pub backoff: BackoffConfig,
    /// Inbound silence after which a ping is sent. Zero disables keepalive.
    pub keepalive_interval: Duration,
    /// Larger inbound frames are dropped.
    pub max_frame_bytes: usize,
    pub request_timeout: Duration,
    /// Delay before a search-driven query change is fetched.
    pub search_debounce: Duration,
    /// Period of the optional aggregate reconciliation fetch.
    pub stats_refresh_interval: Duration,
    pub page_sizes: PageSizes,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_path: "/ws".to_string(),
            backoff: BackoffConfig::default(),
            keepalive_interval: Duration::from_secs(30),
            max_frame_bytes: 1024 * 1024,
            request_timeout: Duration::from_secs(30),
            search_debounce: Duration::from_millis(300),
            stats_refresh_interval: Duration::from_secs(60),
            page_sizes: PageSizes::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults, with the base path taken from `INFRAWATCH_API_URL` if set.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`ClientConfig::from_env`] with a custom variable source.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let config = Self::default();
        match lookup(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            Some(url) => config.with_api_url(&url),
            None => config,
        }
    }

    /// Override the REST base path.
    #[must_use]
    pub fn with_api_url(mut self, url: &str) -> Self {
        self.api_url = url.trim().trim_end_matches('/').to_string();
        self
    }

    /// REST base path, parsed.
    ///
    /// # Errors
    /// Returns [`TransportError::InvalidUrl`] unless the base path is an
    /// absolute `http`/`https` (or `ws`/`wss`) URL.
    pub fn api_base(&self) -> Result<Url, TransportError> {
        let invalid =
            |reason: String| TransportError::InvalidUrl(format!("'{}': {reason}", self.api_url));
        let url = Url::parse(&self.api_url).map_err(|e| invalid(e.to_string()))?;
        match url.scheme() {
            "http" | "https" | "ws" | "wss" => Ok(url),
            other => Err(invalid(format!("unsupported scheme '{other}'"))),
        }
    }

    /// Push channel URL: the API origin with a `ws`/`wss` scheme plus
    /// [`ClientConfig::ws_path`]. Path, query and fragment of the base are
    /// dropped.
    ///
    /// # Errors
    /// Returns [`TransportError::InvalidUrl`] if the base path is invalid.
    pub fn ws_url(&self) -> Result<Url, TransportError> {
        let mut url = self.api_base()?;
        let scheme = if matches!(url.scheme(), "https" | "wss") { "wss" } else { "ws" };
        url.set_scheme(scheme).map_err(|()| {
            TransportError::InvalidUrl(format!("'{}': cannot use {scheme}", self.api_url))
        })?;
        url.set_path(&self.ws_path);
        url.set_query(None);
        url.set_fragment(None);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(|_| None);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.ws_url().unwrap().as_str(), "ws://localhost:8000/ws");
        assert_eq!(config.backoff.base, Duration::from_secs(3));
        assert_eq!(config.page_sizes.logs, 50);
    }

    #[test]
    fn test_env_override() {
        let config = ClientConfig::from_lookup(|key| {
            (key == API_URL_ENV).then(|| "https://watch.example.com/api/v2/".to_string())
        });
        assert_eq!(config.api_url, "https://watch.example.com/api/v2");
        assert_eq!(config.ws_url().unwrap().as_str(), "wss://watch.example.com/ws");
    }

    #[test]
    fn test_ws_url_keeps_port_and_drops_query() {
        let config =
            ClientConfig::default().with_api_url("http://watch.example.com:9000/api/v1?x=1#top");
        assert_eq!(config.ws_url().unwrap().as_str(), "ws://watch.example.com:9000/ws");

        let config = ClientConfig::default().with_api_url("http://watch.example.com?x=1");
        assert_eq!(config.ws_url().unwrap().as_str(), "ws://watch.example.com/ws");
    }

    #[test]
    fn test_base_without_scheme_is_rejected() {
        for base in ["watch.example.com:9000/api/v1", "/api/v1", "ftp://watch.example.com/api"] {
            let config = ClientConfig::default().with_api_url(base);
            let err = config.ws_url().unwrap_err();
            assert!(matches!(err, TransportError::InvalidUrl(_)), "{base}: {err}");
            assert!(config.api_base().is_err());
        }
    }

    #[test]
    fn test_blank_override_ignored() {
        let config = ClientConfig::from_lookup(|_| Some("  ".to_string()));
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }
}
