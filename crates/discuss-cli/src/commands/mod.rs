//! CLI command handlers.

pub mod bootstrap;
pub mod search;

use std::sync::Arc;

use anyhow::{Context, Result};
use discuss_client::{HttpMessagingRpc, Messaging, build_store};
use discuss_store::{RecordId, Store};
use serde_json::Value;
use tracing::debug;

use crate::opts::ClientOpts;

/// Messaging service over HTTP, bootstrapped and ready.
pub async fn connect(opts: &ClientOpts) -> Result<Arc<Messaging>> {
    let config = opts.client_config();
    debug!(base_url = %config.base_url, "connecting");
    let rpc = HttpMessagingRpc::new(config.base_url.clone(), config.http.clone())
        .context("create http transport")?;
    let store = build_store().context("declare messaging models")?;
    let messaging = Arc::new(Messaging::new(
        store,
        Arc::new(rpc),
        &opts.session(),
        opts.route_context(),
        config,
    )?);
    messaging
        .initialize()
        .await
        .context("bootstrap messaging (init_messaging)")?;
    Ok(messaging)
}

/// JSON view of records, skipping ids the store no longer resolves.
pub fn records_json(store: &Store, ids: &[RecordId]) -> Value {
    ids.iter().filter_map(|id| store.to_json(*id)).collect()
}
