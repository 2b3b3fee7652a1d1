use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tokio::time::timeout;
use tracing::debug;

use super::traits::MessagingRpc;
use crate::config::HttpTransportConfig;
use crate::error::RpcError;

const INIT_MESSAGING_PATH: &str = "/mail/init_messaging";
const IM_SEARCH_PATH: &str = "/web/dataset/call_kw/res.partner/im_search";

/// JSON-RPC transport against a messaging server.
pub struct HttpMessagingRpc {
    client: Client,
    base_url: String,
    config: HttpTransportConfig,
    next_id: AtomicU64,
}

impl HttpMessagingRpc {
    pub fn new(base_url: impl Into<String>, config: HttpTransportConfig) -> Result<Self, RpcError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RpcError::Transport(format!("build http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            config,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn call(&self, path: &str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let url = format!("{}{}", self.base_url, path);
        let envelope = json!({
            "jsonrpc": "2.0",
            "method": "call",
            "params": params,
            "id": id,
        });
        debug!(%url, id, "rpc call");

        // Transport-level timeout as a hard cap over send and body read.
        let body = timeout(self.config.timeout, async {
            let response = self
                .client
                .post(&url)
                .json(&envelope)
                .send()
                .await
                .map_err(|e| self.map_reqwest(e))?;
            let status = response.status();
            let body = response.bytes().await.map_err(|e| self.map_reqwest(e))?;
            if !status.is_success() {
                return Err(RpcError::Status {
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&body).into_owned(),
                });
            }
            Ok(body)
        })
        .await
        .map_err(|_| RpcError::Timeout(self.config.timeout))??;

        if body.len() > self.config.max_body_size {
            return Err(RpcError::BodyTooLarge {
                size: body.len(),
                limit: self.config.max_body_size,
            });
        }
        let reply: Value = serde_json::from_slice(&body)
            .map_err(|e| RpcError::Decode(format!("invalid json: {e}")))?;
        unwrap_envelope(reply)
    }

    fn map_reqwest(&self, err: reqwest::Error) -> RpcError {
        if err.is_timeout() {
            RpcError::Timeout(self.config.timeout)
        } else {
            RpcError::Transport(err.to_string())
        }
    }
}

/// `result` on success; `error` becomes [`RpcError::Server`].
fn unwrap_envelope(reply: Value) -> Result<Value, RpcError> {
    let Value::Object(mut reply) = reply else {
        return Err(RpcError::Decode("reply is not an object".into()));
    };
    if let Some(error) = reply.remove("error") {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
        let data = error.get("data").cloned();
        // Servers put the useful text in data.message and a generic one in message.
        let message = data
            .as_ref()
            .and_then(|data| data.get("message"))
            .or_else(|| error.get("message"))
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(RpcError::Server {
            code,
            message,
            data,
        });
    }
    reply
        .remove("result")
        .ok_or_else(|| RpcError::Decode("reply has neither result nor error".into()))
}

#[async_trait]
impl MessagingRpc for HttpMessagingRpc {
    async fn init_messaging(&self) -> Result<Value, RpcError> {
        self.call(INIT_MESSAGING_PATH, json!({})).await
    }

    async fn search_partners(&self, term: &str, limit: usize) -> Result<Vec<Value>, RpcError> {
        let params = json!({
            "model": "res.partner",
            "method": "im_search",
            "args": [term, limit],
            "kwargs": {},
        });
        match self.call(IM_SEARCH_PATH, params).await? {
            Value::Array(partners) => Ok(partners),
            // Some servers answer "nothing found" with false.
            Value::Null | Value::Bool(false) => Ok(Vec::new()),
            other => Err(RpcError::Decode(format!(
                "im_search returned {other}, expected a list"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_result_is_unwrapped() {
        let result = unwrap_envelope(json!({"jsonrpc": "2.0", "id": 1, "result": [1, 2]})).unwrap();
        assert_eq!(result, json!([1, 2]));
    }

    #[test]
    fn envelope_error_prefers_data_message() {
        let err = unwrap_envelope(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": 200, "message": "Odoo Server Error", "data": {"message": "Access denied"}},
        }))
        .unwrap_err();
        match err {
            RpcError::Server { code, message, .. } => {
                assert_eq!(code, 200);
                assert_eq!(message, "Access denied");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn envelope_without_result_is_malformed() {
        assert!(matches!(
            unwrap_envelope(json!({"id": 1})),
            Err(RpcError::Decode(_))
        ));
        assert!(matches!(unwrap_envelope(json!([])), Err(RpcError::Decode(_))));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let rpc = HttpMessagingRpc::new("http://host:8069/", HttpTransportConfig::default()).unwrap();
        assert_eq!(rpc.base_url(), "http://host:8069");
    }
}
