//! Scripted transport for tests.
//!
//! Responses are queued per call kind and consumed in order. Search responses
//! can be deferred: the test holds a [`oneshot::Sender`] and decides when (and
//! in which order) each outstanding call resolves.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use super::traits::MessagingRpc;
use crate::error::RpcError;

pub type SearchReply = Result<Vec<Value>, RpcError>;

/// A call observed by the mock, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcCall {
    InitMessaging,
    SearchPartners { term: String, limit: usize },
}

enum ScriptedSearch {
    Ready(SearchReply),
    Deferred(oneshot::Receiver<SearchReply>),
}

#[derive(Default)]
struct MockState {
    init: VecDeque<Result<Value, RpcError>>,
    search: VecDeque<ScriptedSearch>,
    calls: Vec<RpcCall>,
}

#[derive(Default)]
pub struct MockMessagingRpc {
    state: Mutex<MockState>,
}

impl MockMessagingRpc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock whose first `init_messaging` returns `snapshot`.
    pub fn with_snapshot(snapshot: Value) -> Self {
        let mock = Self::new();
        mock.push_init(Ok(snapshot));
        mock
    }

    pub fn push_init(&self, reply: Result<Value, RpcError>) {
        self.lock().init.push_back(reply);
    }

    pub fn push_search(&self, partners: Vec<Value>) {
        self.lock()
            .search
            .push_back(ScriptedSearch::Ready(Ok(partners)));
    }

    pub fn push_search_error(&self, err: RpcError) {
        self.lock().search.push_back(ScriptedSearch::Ready(Err(err)));
    }

    /// Queue a search reply that stays pending until the returned sender fires.
    pub fn defer_search(&self) -> oneshot::Sender<SearchReply> {
        let (tx, rx) = oneshot::channel();
        self.lock().search.push_back(ScriptedSearch::Deferred(rx));
        tx
    }

    pub fn calls(&self) -> Vec<RpcCall> {
        self.lock().calls.clone()
    }

    pub fn search_calls(&self) -> Vec<(String, usize)> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                RpcCall::SearchPartners { term, limit } => Some((term.clone(), *limit)),
                RpcCall::InitMessaging => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl MessagingRpc for MockMessagingRpc {
    async fn init_messaging(&self) -> Result<Value, RpcError> {
        let reply = {
            let mut state = self.lock();
            state.calls.push(RpcCall::InitMessaging);
            state.init.pop_front()
        };
        reply.unwrap_or_else(|| Err(RpcError::Transport("no scripted init_messaging reply".into())))
    }

    async fn search_partners(&self, term: &str, limit: usize) -> Result<Vec<Value>, RpcError> {
        let scripted = {
            let mut state = self.lock();
            state.calls.push(RpcCall::SearchPartners {
                term: term.to_string(),
                limit,
            });
            state.search.pop_front()
        };
        debug!(term, limit, "mock im_search");
        match scripted {
            None => Ok(Vec::new()),
            Some(ScriptedSearch::Ready(reply)) => reply,
            Some(ScriptedSearch::Deferred(rx)) => rx
                .await
                .unwrap_or_else(|_| Err(RpcError::Transport("deferred reply dropped".into()))),
        }
    }
}
