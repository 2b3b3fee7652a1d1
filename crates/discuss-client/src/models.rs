//! Messaging model declarations.

use std::sync::Arc;

use discuss_store::{ModelHooks, ModelSchema, RecordId, SchemaError, Store, StoreResult};
use serde_json::{Value, json};
use tracing::debug;

pub const PERSONA: &str = "Persona";
pub const THREAD: &str = "Thread";
pub const MESSAGE: &str = "Message";
pub const DISCUSS_APP_CATEGORY: &str = "DiscussAppCategory";
pub const DISCUSS_APP: &str = "DiscussApp";

/// Persona `type` value of contacts that partner search considers.
pub const PARTNER_TYPE: &str = "partner";

pub fn messaging_schemas() -> Result<Vec<ModelSchema>, SchemaError> {
    Ok(vec![
        ModelSchema::build(PERSONA)
            .scalar_default("type", json!(PARTNER_TYPE))
            .scalar("name")
            .scalar("email")
            .scalar("im_status")
            .scalar_default("isAdmin", json!(false))
            .finish()?,
        ModelSchema::build(THREAD)
            .scalar("model")
            .scalar("name")
            .scalar("description")
            .scalar_default("counter", json!(0))
            .one("correspondent", PERSONA, None)
            .one("category", DISCUSS_APP_CATEGORY, Some("threads"))
            .many("messages", MESSAGE, Some("thread"))
            .finish()?,
        ModelSchema::build(MESSAGE)
            .scalar("body")
            .scalar("date")
            .one("thread", THREAD, Some("messages"))
            .one("author", PERSONA, None)
            .finish()?,
        ModelSchema::build(DISCUSS_APP_CATEGORY)
            .scalar("extraClass")
            .scalar("name")
            .scalar_default("isOpen", json!(false))
            .scalar_default("canView", json!(false))
            .scalar_default("canAdd", json!(false))
            .scalar("serverStateKey")
            .scalar("addTitle")
            .scalar("addHotkey")
            .many("threads", THREAD, Some("category"))
            .finish()?,
        ModelSchema::build(DISCUSS_APP)
            .singleton()
            .scalar_default("activeTab", json!("all"))
            .scalar_default("isActive", json!(false))
            .one("thread", THREAD, None)
            .one("channels", DISCUSS_APP_CATEGORY, None)
            .one("chats", DISCUSS_APP_CATEGORY, None)
            .one("inbox", THREAD, None)
            .one("starred", THREAD, None)
            .one("history", THREAD, None)
            .hooks(Arc::new(DiscussAppHooks))
            .finish()?,
    ])
}

/// Store with every messaging model registered and the app singleton created.
pub fn build_store() -> StoreResult<Store> {
    messaging_schemas()?
        .into_iter()
        .fold(Store::builder(), |builder, schema| builder.register(schema))
        .build()
}

/// Creates the sidebar categories the discuss app owns from the start.
struct DiscussAppHooks;

impl ModelHooks for DiscussAppHooks {
    fn on_create(&self, store: &mut Store, app: RecordId) -> StoreResult<()> {
        let channels = store.model(DISCUSS_APP_CATEGORY)?.insert(&channels_category())?;
        let chats = store.model(DISCUSS_APP_CATEGORY)?.insert(&chats_category())?;
        store.set_one(app, "channels", Some(channels))?;
        store.set_one(app, "chats", Some(chats))?;
        debug!("discuss app categories created");
        Ok(())
    }
}

fn channels_category() -> Value {
    json!({
        "id": "channels",
        "extraClass": "o-mail-DiscussSidebarCategory-channel",
        "name": "Channels",
        "isOpen": false,
        "canView": true,
        "canAdd": true,
        "serverStateKey": "is_discuss_sidebar_category_channel_open",
        "addTitle": "Add or join a channel",
        "addHotkey": "c",
    })
}

fn chats_category() -> Value {
    json!({
        "id": "chats",
        "extraClass": "o-mail-DiscussSidebarCategory-chat",
        "name": "Direct messages",
        "isOpen": false,
        "canView": false,
        "canAdd": true,
        "serverStateKey": "is_discuss_sidebar_category_chat_open",
        "addTitle": "Start a conversation",
        "addHotkey": "d",
    })
}
