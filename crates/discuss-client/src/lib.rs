//! Messaging client: store bootstrap behind a readiness gate, local-first
//! partner search and the RPC transport they depend on.

pub mod config;
pub mod error;
pub mod gate;
pub mod messaging;
pub mod models;
pub mod route;
pub mod rpc;
pub mod search;

pub use config::{ClientConfig, HttpTransportConfig, SessionInfo};
pub use error::{ClientError, ClientResult, GateError, RpcError};
pub use gate::{ReadinessGate, ReadyWaiter};
pub use messaging::{BootstrapState, Messaging, SNAPSHOT_METADATA, SharedStore};
pub use models::build_store;
pub use route::RouteContext;
pub use rpc::MessagingRpc;
pub use rpc::http::HttpMessagingRpc;
pub use search::{PartnerAutocomplete, SuggestionState, clean_term};
