use async_trait::async_trait;
use serde_json::Value;

use crate::error::RpcError;

/// The two server calls the messaging layer depends on. Both are silent:
/// failures are returned to the caller, never surfaced to the user here.
#[async_trait]
pub trait MessagingRpc: Send + Sync {
    /// Initial snapshot: model collections keyed by model name plus metadata.
    async fn init_messaging(&self) -> Result<Value, RpcError>;

    /// Partner payloads (at least `id` and `name`) matching `term`.
    async fn search_partners(&self, term: &str, limit: usize) -> Result<Vec<Value>, RpcError>;
}
