//! Model declarations: scalar fields, relation fields and construction hooks.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::{RecordId, SchemaError, Store, StoreResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelationDecl {
    pub cardinality: Cardinality,
    pub target: String,
    /// Field on the target model holding the opposite side, if any.
    pub inverse: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldKind {
    Scalar { default: Option<Value> },
    Relation(RelationDecl),
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldDecl {
    pub fn relation(&self) -> Option<&RelationDecl> {
        match &self.kind {
            FieldKind::Relation(rel) => Some(rel),
            FieldKind::Scalar { .. } => None,
        }
    }
}

/// Extension points invoked by the store for records of one model.
///
/// Variant behavior (for example a record that owns sub-records from the
/// moment it exists) registers a hook set on the schema instead of wrapping
/// the store's insert path.
pub trait ModelHooks: Send + Sync {
    /// Called once per record, after its identity is allocated and the
    /// creating payload is merged.
    fn on_create(&self, store: &mut Store, record: RecordId) -> StoreResult<()> {
        let _ = (store, record);
        Ok(())
    }
}

/// Declared shape of a record type. Immutable once registered.
pub struct ModelSchema {
    name: String,
    key_field: String,
    singleton: bool,
    fields: Vec<FieldDecl>,
    index: HashMap<String, usize>,
    hooks: Option<Arc<dyn ModelHooks>>,
}

impl fmt::Debug for ModelSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSchema")
            .field("name", &self.name)
            .field("key_field", &self.key_field)
            .field("singleton", &self.singleton)
            .field("fields", &self.fields)
            .field("hooks", &self.hooks.is_some())
            .finish()
    }
}

impl ModelSchema {
    pub fn build(name: impl Into<String>) -> ModelSchemaBuilder {
        ModelSchemaBuilder {
            name: name.into(),
            key_field: "id".into(),
            singleton: false,
            fields: Vec::new(),
            hooks: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    pub fn fields(&self) -> &[FieldDecl] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> &FieldDecl {
        &self.fields[index]
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub(crate) fn hooks(&self) -> Option<Arc<dyn ModelHooks>> {
        self.hooks.clone()
    }
}

pub struct ModelSchemaBuilder {
    name: String,
    key_field: String,
    singleton: bool,
    fields: Vec<FieldDecl>,
    hooks: Option<Arc<dyn ModelHooks>>,
}

impl ModelSchemaBuilder {
    /// Payload field carrying the record key (defaults to `id`).
    pub fn key(mut self, field: impl Into<String>) -> Self {
        self.key_field = field.into();
        self
    }

    /// At most one record exists; every key is normalized to the fixed singleton key.
    pub fn singleton(mut self) -> Self {
        self.singleton = true;
        self
    }

    pub fn scalar(self, name: impl Into<String>) -> Self {
        self.field(name, FieldKind::Scalar { default: None })
    }

    pub fn scalar_default(self, name: impl Into<String>, default: Value) -> Self {
        self.field(
            name,
            FieldKind::Scalar {
                default: Some(default),
            },
        )
    }

    pub fn one(self, name: impl Into<String>, target: impl Into<String>, inverse: Option<&str>) -> Self {
        self.relation(name, Cardinality::One, target, inverse)
    }

    pub fn many(self, name: impl Into<String>, target: impl Into<String>, inverse: Option<&str>) -> Self {
        self.relation(name, Cardinality::Many, target, inverse)
    }

    pub fn hooks(mut self, hooks: Arc<dyn ModelHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    fn relation(
        self,
        name: impl Into<String>,
        cardinality: Cardinality,
        target: impl Into<String>,
        inverse: Option<&str>,
    ) -> Self {
        self.field(
            name,
            FieldKind::Relation(RelationDecl {
                cardinality,
                target: target.into(),
                inverse: inverse.map(str::to_string),
            }),
        )
    }

    fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldDecl {
            name: name.into(),
            kind,
        });
        self
    }

    pub fn finish(self) -> Result<ModelSchema, SchemaError> {
        let mut index = HashMap::with_capacity(self.fields.len());
        for (pos, field) in self.fields.iter().enumerate() {
            if field.name == self.key_field {
                return Err(SchemaError::KeyFieldRedeclared {
                    model: self.name,
                    field: field.name.clone(),
                });
            }
            if index.insert(field.name.clone(), pos).is_some() {
                return Err(SchemaError::DuplicateField {
                    model: self.name,
                    field: field.name.clone(),
                });
            }
        }
        Ok(ModelSchema {
            name: self.name,
            key_field: self.key_field,
            singleton: self.singleton,
            fields: self.fields,
            index,
            hooks: self.hooks,
        })
    }
}
