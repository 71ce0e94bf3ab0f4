// Sync engine configuration
// Backend address and HTTP client limits, overridable from the environment

use std::time::Duration;

use url::Url;

use super::{NotificationError, NotificationResult};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:4000";
pub const DEFAULT_PUSH_PATH: &str = "/ws";

pub const BACKEND_URL_VAR: &str = "NOTIFY_BACKEND_URL";
pub const HTTP_TIMEOUT_VAR: &str = "NOTIFY_HTTP_TIMEOUT_SECS";
pub const PUSH_PATH_VAR: &str = "NOTIFY_PUSH_PATH";

#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Base address of the REST API and push endpoint
    pub backend_url: Url,
    /// Total time allowed for one gateway request
    pub request_timeout: Duration,
    /// Time allowed to establish a TCP/WebSocket connection
    pub connect_timeout: Duration,
    pub user_agent: String,
    /// Path of the push endpoint relative to `backend_url`
    pub push_path: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            backend_url: Url::parse(DEFAULT_BACKEND_URL).expect("default backend url is valid"),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: format!("inbox-sync/{}", env!("CARGO_PKG_VERSION")),
            push_path: DEFAULT_PUSH_PATH.to_string(),
        }
    }
}

impl SyncConfig {
    pub fn new(backend_url: &str) -> NotificationResult<Self> {
        Ok(Self::default().with_backend_url(parse_backend_url(backend_url)?))
    }

    /// Read overrides from `NOTIFY_*` environment variables
    pub fn from_env() -> NotificationResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> NotificationResult<Self> {
        let mut config = Self::default();

        if let Some(raw) = lookup(BACKEND_URL_VAR) {
            config.backend_url = parse_backend_url(&raw)?;
        }

        if let Some(raw) = lookup(HTTP_TIMEOUT_VAR) {
            let secs = raw.trim().parse::<u64>().ok().filter(|secs| *secs > 0).ok_or_else(|| {
                NotificationError::Validation {
                    field: HTTP_TIMEOUT_VAR.to_string(),
                    message: format!("expected a positive number of seconds, got '{}'", raw),
                }
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Some(raw) = lookup(PUSH_PATH_VAR) {
            config.push_path = raw;
        }

        Ok(config)
    }

    pub fn with_backend_url(mut self, backend_url: Url) -> Self {
        self.backend_url = backend_url;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_push_path(mut self, path: impl Into<String>) -> Self {
        self.push_path = path.into();
        self
    }

    /// Resolve an API path below the backend address
    ///
    /// Segments are percent-encoded, so ids can never escape their position.
    pub fn endpoint(&self, segments: &[&str]) -> NotificationResult<Url> {
        let mut url = self.backend_url.clone();
        append_segments(&mut url, segments.iter().copied())?;
        Ok(url)
    }

    /// WebSocket address of the push channel (`http` -> `ws`, `https` -> `wss`)
    pub fn push_url(&self) -> NotificationResult<Url> {
        let mut url = self.backend_url.clone();
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme).map_err(|()| NotificationError::Validation {
            field: "backend_url".to_string(),
            message: format!("cannot derive a push address from '{}'", self.backend_url),
        })?;
        append_segments(&mut url, self.push_path.split('/').filter(|segment| !segment.is_empty()))?;
        Ok(url)
    }
}

fn parse_backend_url(raw: &str) -> NotificationResult<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| NotificationError::Validation {
        field: "backend_url".to_string(),
        message: format!("'{}' is not a valid url: {}", raw, e),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(NotificationError::Validation {
            field: "backend_url".to_string(),
            message: format!("unsupported scheme '{}'", other),
        }),
    }
}

fn append_segments<'a>(url: &mut Url, segments: impl Iterator<Item = &'a str>) -> NotificationResult<()> {
    let display = url.to_string();
    url.path_segments_mut()
        .map_err(|()| NotificationError::Validation {
            field: "backend_url".to_string(),
            message: format!("'{}' cannot be used as a base address", display),
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(())
}
