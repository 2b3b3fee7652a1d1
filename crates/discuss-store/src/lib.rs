//! Identity-mapped, normalized record store with bidirectional relations.
//!
//! Records are created the first time a payload references their key and are
//! never replaced afterwards: upserts merge into the existing identity.

mod change;
mod key;
mod record;
mod registry;
mod relation;
pub mod schema;
mod store;

pub use change::{Change, ChangeBatch};
pub use key::{ModelId, RecordId, RecordKey, SINGLETON_KEY};
pub use record::{FieldSlot, Record};
pub use registry::RecordRegistry;
pub use schema::{Cardinality, FieldDecl, FieldKind, ModelHooks, ModelSchema, RelationDecl};
pub use store::{ModelHandle, Store, StoreBuilder};

use serde_json::Value;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("unknown model '{0}'")]
    UnknownModel(String),
    #[error("model '{model}' has no field '{field}'")]
    UnknownField { model: String, field: String },
    #[error("payload for '{model}' is missing key field '{field}'")]
    MissingKey { model: String, field: String },
    #[error("invalid key for '{model}': {value}")]
    InvalidKey { model: String, value: Value },
    #[error("record {key} already exists in '{model}'")]
    IdentityConflict { model: String, key: RecordKey },
    #[error("invalid payload for '{model}': {reason}")]
    InvalidPayload { model: String, reason: String },
    #[error("invalid value for relation '{model}.{field}': {reason}")]
    InvalidRelationValue {
        model: String,
        field: String,
        reason: String,
    },
    #[error("field '{model}.{field}' is not a {expected} relation")]
    NotARelation {
        model: String,
        field: String,
        expected: &'static str,
    },
    #[error("relation '{model}.{field}' expects '{expected}' records, got '{found}'")]
    RelationTargetMismatch {
        model: String,
        field: String,
        expected: String,
        found: String,
    },
    #[error("model '{0}' is not a singleton")]
    NotSingleton(String),
    #[error("registry for '{model}' is full")]
    RegistryFull { model: String },
    #[error("unknown record {0}")]
    UnknownRecord(RecordId),
}

/// Declaration-time errors: the registered models do not form a consistent graph.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("model '{0}' registered twice")]
    DuplicateModel(String),
    #[error("model '{model}' declares field '{field}' twice")]
    DuplicateField { model: String, field: String },
    #[error("model '{model}' declares its key field '{field}' as a regular field")]
    KeyFieldRedeclared { model: String, field: String },
    #[error("relation '{model}.{field}' targets unknown model '{target}'")]
    UnknownTarget {
        model: String,
        field: String,
        target: String,
    },
    #[error("relation '{model}.{field}' names inverse '{target}.{inverse}', which does not exist")]
    InverseMissing {
        model: String,
        field: String,
        target: String,
        inverse: String,
    },
    #[error("relation '{model}.{field}' and inverse '{target}.{inverse}' do not point at each other")]
    InverseMismatch {
        model: String,
        field: String,
        target: String,
        inverse: String,
    },
}
