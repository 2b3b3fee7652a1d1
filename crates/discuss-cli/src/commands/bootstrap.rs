//! `discuss bootstrap` command.

use anyhow::Result;
use discuss_client::models::DISCUSS_APP;
use serde_json::{Map, Value, json};

use crate::opts::ClientOpts;
use crate::output::print_success;

use super::connect;

pub async fn cmd_bootstrap(opts: &ClientOpts) -> Result<()> {
    let messaging = connect(opts).await?;
    let data = messaging.with_store(|store| -> Result<Value> {
        let mut models = Map::new();
        for registry in store.registries() {
            models.insert(registry.name().to_string(), json!(registry.len()));
        }

        let app = store
            .record(store.singleton(DISCUSS_APP)?)
            .ok_or_else(|| anyhow::anyhow!("discuss app record missing"))?;
        let mut mailboxes = Map::new();
        for field in ["inbox", "starred", "history"] {
            let counter = app
                .one(field)
                .and_then(|id| store.record(id))
                .and_then(|thread| thread.scalar("counter").cloned())
                .unwrap_or(Value::Null);
            mailboxes.insert(field.to_string(), counter);
        }

        Ok(json!({
            "state": messaging.state(),
            "models": models,
            "discuss": {
                "isActive": app.scalar("isActive").cloned().unwrap_or(Value::Bool(false)),
                "mailboxes": mailboxes,
            },
        }))
    })?;

    let meta = messaging.gate().payload().map(|payload| {
        json!({
            "menu_id": payload.get("menu_id").cloned().unwrap_or(Value::Null),
        })
    });
    print_success(opts, data, meta, vec![])
}
