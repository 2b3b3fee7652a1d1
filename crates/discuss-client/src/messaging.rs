//! Messaging service: bootstrap behind a readiness gate, plus partner search.

use std::sync::{Arc, Mutex, PoisonError};

use discuss_store::{RecordId, Store};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::config::{ClientConfig, SessionInfo};
use crate::error::{ClientError, ClientResult};
use crate::gate::ReadinessGate;
use crate::models::{DISCUSS_APP, PARTNER_TYPE, PERSONA, THREAD};
use crate::route::RouteContext;
use crate::rpc::MessagingRpc;
use crate::search::{clean_term, local_partner_matches};

/// Snapshot keys that are not model collections.
pub const SNAPSHOT_METADATA: &[&str] = &[
    "menu_id",
    "starred_counter",
    "needaction_inbox_counter",
    "history_counter",
];

/// Mailbox thread key and the snapshot counter applied to it.
const MAILBOX_COUNTERS: &[(&str, &str)] = &[
    ("inbox", "needaction_inbox_counter"),
    ("starred", "starred_counter"),
    ("history", "history_counter"),
];

/// Store shared between the service and its readers. Locks are only taken
/// for synchronous merges and scans, never across a network call.
pub type SharedStore = Arc<Mutex<Store>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapState {
    Uninitialized,
    Fetching,
    Ready,
}

impl BootstrapState {
    fn as_str(self) -> &'static str {
        match self {
            BootstrapState::Uninitialized => "uninitialized",
            BootstrapState::Fetching => "fetching",
            BootstrapState::Ready => "ready",
        }
    }
}

pub struct Messaging {
    store: SharedStore,
    rpc: Arc<dyn MessagingRpc>,
    route: RouteContext,
    config: ClientConfig,
    gate: ReadinessGate,
    state: Mutex<BootstrapState>,
}

impl Messaging {
    /// Seed `store` with the session persona and the mailbox threads.
    pub fn new(
        mut store: Store,
        rpc: Arc<dyn MessagingRpc>,
        session: &SessionInfo,
        route: RouteContext,
        config: ClientConfig,
    ) -> ClientResult<Self> {
        store.model(PERSONA)?.insert(&json!({
            "id": session.partner_id,
            "type": PARTNER_TYPE,
            "isAdmin": session.is_admin,
        }))?;
        store.model(DISCUSS_APP)?.insert(&json!({
            "inbox": {"id": "inbox", "model": "mail.box", "name": "Inbox"},
            "starred": {"id": "starred", "model": "mail.box", "name": "Starred", "counter": 0},
            "history": {"id": "history", "model": "mail.box", "name": "History", "counter": 0},
        }))?;
        debug!(partner_id = session.partner_id, "messaging store seeded");

        Ok(Self {
            store: Arc::new(Mutex::new(store)),
            rpc,
            route,
            config,
            gate: ReadinessGate::new(),
            state: Mutex::new(BootstrapState::Uninitialized),
        })
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn gate(&self) -> &ReadinessGate {
        &self.gate
    }

    pub fn with_store<R>(&self, f: impl FnOnce(&Store) -> R) -> R {
        let guard = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub fn with_store_mut<R>(&self, f: impl FnOnce(&mut Store) -> R) -> R {
        let mut guard = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn state(&self) -> BootstrapState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Non-blocking readiness check.
    pub fn is_ready(&self) -> bool {
        self.state() == BootstrapState::Ready
    }

    /// Wait for bootstrap; resolves immediately once it has happened.
    pub async fn ready(&self) -> ClientResult<Arc<Value>> {
        Ok(self.gate.wait().await?)
    }

    /// The discuss app singleton.
    pub fn discuss(&self) -> ClientResult<RecordId> {
        Ok(self.with_store(|store| store.singleton(DISCUSS_APP))?)
    }

    /// Fetch the initial snapshot, merge it and settle the readiness gate.
    ///
    /// A failed fetch or merge is returned and logged; the gate stays pending
    /// and the state returns to `Uninitialized`. Nothing is retried here.
    pub async fn initialize(&self) -> ClientResult<Arc<Value>> {
        self.begin_fetch()?;
        info!("fetching messaging snapshot");
        let result = match self.rpc.init_messaging().await {
            Ok(data) => self.apply_snapshot(data),
            Err(err) => Err(err.into()),
        };
        match result {
            Ok(payload) => {
                self.set_state(BootstrapState::Ready);
                self.gate.settle(payload.clone());
                info!("messaging ready");
                Ok(payload)
            }
            Err(err) => {
                self.set_state(BootstrapState::Uninitialized);
                warn!(error = %err, "messaging bootstrap failed; readiness stays pending");
                Err(err)
            }
        }
    }

    /// Local-first partner search.
    ///
    /// On a local miss the server is asked once with the original `term`; its
    /// results are merged into the store for later calls, and this call still
    /// returns the (empty) local result. Blank terms and a zero limit never
    /// reach the server.
    pub async fn search_partners(&self, term: &str, limit: usize) -> ClientResult<Vec<RecordId>> {
        let local = self.local_partners(term, limit)?;
        if !local.is_empty() || limit == 0 || term.trim().is_empty() {
            return Ok(local);
        }

        let partners = self.rpc.search_partners(term, limit).await?;
        let merged = self.with_store_mut(|store| store.insert(PERSONA, &Value::Array(partners)))?;
        debug!(term, limit, merged = merged.len(), "partner search filled from server");
        Ok(local)
    }

    /// Scan of the partners already in the store.
    pub fn local_partners(&self, term: &str, limit: usize) -> ClientResult<Vec<RecordId>> {
        let cleaned = clean_term(term);
        Ok(self.with_store(|store| local_partner_matches(store, &cleaned, limit))?)
    }

    fn begin_fetch(&self) -> ClientResult<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *state {
            BootstrapState::Uninitialized => {
                *state = BootstrapState::Fetching;
                Ok(())
            }
            other => Err(ClientError::AlreadyStarted(other.as_str())),
        }
    }

    fn set_state(&self, next: BootstrapState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }

    fn apply_snapshot(&self, data: Value) -> ClientResult<Arc<Value>> {
        let active = self.route.is_discuss_active(data.get("menu_id"));
        self.with_store_mut(|store| -> ClientResult<()> {
            let inserted = store.insert_snapshot(&data, SNAPSHOT_METADATA)?;
            for (model, ids) in &inserted {
                debug!(model = model.as_str(), count = ids.len(), "snapshot merged");
            }
            for (mailbox, counter) in MAILBOX_COUNTERS {
                if let Some(value) = data.get(*counter) {
                    store.insert(THREAD, &json!({"id": mailbox, "counter": value}))?;
                }
            }
            store.model(DISCUSS_APP)?.insert(&json!({"isActive": active}))?;
            Ok(())
        })?;
        Ok(Arc::new(data))
    }
}
