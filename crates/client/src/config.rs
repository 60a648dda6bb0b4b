//! Client configuration from environment variables.

use presence_shared::USER_ID_PARAM;
use url::Url;

use crate::error::{ClientError, ConfigError};
use crate::ws::BackoffPolicy;

/// Fixed path of the realtime endpoint.
pub const WS_PATH: &str = "/ws";

const DEFAULT_PAGE_URL: &str = "http://localhost:8080";

/// Normalize a host string for use as a key (strips protocol prefix)
pub fn normalize_host(host: &str) -> String {
    host.trim_start_matches("http://")
        .trim_start_matches("https://")
        .trim_start_matches("ws://")
        .trim_start_matches("wss://")
        .trim_end_matches('/')
        .to_string()
}

/// Where the realtime endpoint lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Hosting page is served over https, so the socket uses wss
    pub secure: bool,
    /// Host (and optional port), e.g. "presence.example.com:8443"
    pub host: String,
    /// Path of the realtime endpoint
    pub path: String,
}

impl EndpointConfig {
    pub fn new(secure: bool, host: impl AsRef<str>) -> Self {
        Self {
            secure,
            host: normalize_host(host.as_ref()),
            path: WS_PATH.to_string(),
        }
    }

    /// Derive the endpoint from the URL of the hosting page.
    pub fn for_page(page: &Url) -> Option<Self> {
        let host = page.host_str()?;
        let host = match page.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        Some(Self::new(page.scheme() == "https", host))
    }

    pub fn scheme(&self) -> &'static str {
        if self.secure {
            "wss"
        } else {
            "ws"
        }
    }

    /// Build the connect URL for `identity`.
    pub fn url_for(&self, identity: &str) -> Result<Url, ClientError> {
        if identity.is_empty() {
            return Err(ClientError::EmptyIdentity);
        }
        let mut url = Url::parse(&format!("{}://{}", self.scheme(), self.host))?;
        url.set_path(&self.path);
        url.query_pairs_mut().append_pair(USER_ID_PARAM, identity);
        Ok(url)
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self::new(false, "localhost:8080")
    }
}

/// Everything the connection manager needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    pub endpoint: EndpointConfig,
    pub backoff: BackoffPolicy,
}

impl ClientConfig {
    /// Read configuration from the process environment.
    ///
    /// Environment variables:
    /// - `PRESENCE_PAGE_URL`: origin of the hosting page (default: "http://localhost:8080");
    ///   an https page selects wss
    /// - `PRESENCE_WS_HOST`: realtime host override (default: host of the page URL)
    /// - `PRESENCE_BACKOFF_BASE_MS`: first retry delay (default: 5000)
    /// - `PRESENCE_BACKOFF_MAX_MS`: delay cap (default: 30000)
    /// - `PRESENCE_BACKOFF_MAX_ATTEMPTS`: retries before giving up (default: 5)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`ClientConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let page_var = "PRESENCE_PAGE_URL";
        let page = lookup(page_var).unwrap_or_else(|| DEFAULT_PAGE_URL.to_string());
        let page = Url::parse(&page).map_err(|source| ConfigError::InvalidUrl {
            var: page_var,
            source,
        })?;
        let mut endpoint =
            EndpointConfig::for_page(&page).ok_or(ConfigError::MissingHost { var: page_var })?;

        if let Some(host) = lookup("PRESENCE_WS_HOST").filter(|h| !h.trim().is_empty()) {
            endpoint.host = normalize_host(host.trim());
        }

        let defaults = BackoffPolicy::default();
        let backoff = BackoffPolicy {
            base_delay_ms: read_number(&lookup, "PRESENCE_BACKOFF_BASE_MS")?
                .unwrap_or(defaults.base_delay_ms),
            max_delay_ms: read_number(&lookup, "PRESENCE_BACKOFF_MAX_MS")?
                .unwrap_or(defaults.max_delay_ms),
            max_attempts: read_number(&lookup, "PRESENCE_BACKOFF_MAX_ATTEMPTS")?
                .unwrap_or(defaults.max_attempts),
        };

        Ok(Self { endpoint, backoff })
    }
}

fn read_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
    }
}
