use std::time::Duration;

use discuss_store::StoreError;
use serde_json::Value;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("rpc failed: {0}")]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Gate(#[from] GateError),
    #[error("bootstrap already {0}")]
    AlreadyStarted(&'static str),
}

/// Transport-level failures of the two messaging calls.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("unexpected http status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("response body {size} bytes exceeds limit {limit}")]
    BodyTooLarge { size: usize, limit: usize },
    #[error("server error {code}: {message}")]
    Server {
        code: i64,
        message: String,
        data: Option<Value>,
    },
    #[error("malformed response: {0}")]
    Decode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("readiness gate dropped before it settled")]
    Closed,
}
