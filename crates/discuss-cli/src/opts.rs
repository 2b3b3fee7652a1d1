//! Global CLI options.

use std::time::Duration;

use clap::Args;
use discuss_client::{ClientConfig, RouteContext, SessionInfo};

/// Global options for CLI commands.
///
/// These options apply to all commands and can be set via env vars.
#[derive(Args, Debug, Clone)]
pub struct ClientOpts {
    /// Server root URL (env: DISCUSS_BASE_URL)
    #[arg(long, global = true, env = "DISCUSS_BASE_URL")]
    pub base_url: Option<String>,

    /// Request timeout in milliseconds (env: DISCUSS_TIMEOUT_MS)
    #[arg(long, global = true, env = "DISCUSS_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Override maximum response body size (bytes)
    #[arg(long, global = true, hide = true)]
    pub max_body_bytes: Option<usize>,

    /// Partner id of the signed-in user (env: DISCUSS_PARTNER_ID)
    #[arg(long, global = true, env = "DISCUSS_PARTNER_ID", default_value_t = 0)]
    pub partner_id: i64,

    /// Treat the signed-in user as an administrator
    #[arg(long, global = true)]
    pub admin: bool,

    /// Navigation hash, e.g. "menu_id=5&action=mail.action_discuss" (env: DISCUSS_ROUTE)
    #[arg(long, global = true, env = "DISCUSS_ROUTE", default_value = "")]
    pub route: String,

    /// JSON output envelope
    #[arg(long, global = true)]
    pub json: bool,

    /// Pretty-print JSON output (implies --json)
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Suppress notices
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Drop metadata in JSON output
    #[arg(long, global = true)]
    pub no_meta: bool,
}

impl ClientOpts {
    /// Environment-backed defaults with flag overrides applied on top.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::from_env();
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(ms) = self.timeout_ms {
            config.http.timeout = Duration::from_millis(ms);
        }
        if let Some(bytes) = self.max_body_bytes {
            config.http.max_body_size = bytes;
        }
        config
    }

    pub fn session(&self) -> SessionInfo {
        SessionInfo {
            partner_id: self.partner_id,
            is_admin: self.admin,
        }
    }

    pub fn route_context(&self) -> RouteContext {
        RouteContext::from_hash(&self.route)
    }
}
