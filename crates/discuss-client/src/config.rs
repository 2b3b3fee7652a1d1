use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost:8069";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server root; RPC paths are appended to it.
    pub base_url: String,
    /// Default number of partners a search collects.
    pub search_limit: usize,
    pub http: HttpTransportConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            search_limit: 10,
            http: HttpTransportConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `DISCUSS_BASE_URL` and `DISCUSS_TIMEOUT_MS` when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(base_url) = std::env::var("DISCUSS_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(ms) = std::env::var("DISCUSS_TIMEOUT_MS")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
        {
            config.http.timeout = Duration::from_millis(ms);
        }
        config
    }
}

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Hard cap on one request, including reading the body.
    pub timeout: Duration,
    /// Maximum response body size in bytes.
    pub max_body_size: usize,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// The signed-in user, seeded into the store as a partner persona.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub partner_id: i64,
    pub is_admin: bool,
}
