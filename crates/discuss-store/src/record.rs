use std::sync::Arc;

use indexmap::IndexSet;
use serde_json::Value;

use crate::schema::{Cardinality, FieldKind, ModelSchema};
use crate::{RecordId, RecordKey};

/// Current value of one declared field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldSlot {
    Scalar(Value),
    One(Option<RecordId>),
    Many(IndexSet<RecordId>),
}

/// One identity-stable record. Owned by its registry; callers hold `RecordId`s.
#[derive(Debug)]
pub struct Record {
    id: RecordId,
    key: RecordKey,
    schema: Arc<ModelSchema>,
    slots: Vec<FieldSlot>,
}

impl Record {
    pub(crate) fn new(id: RecordId, key: RecordKey, schema: Arc<ModelSchema>) -> Self {
        let slots = schema
            .fields()
            .iter()
            .map(|field| match &field.kind {
                FieldKind::Scalar { default } => {
                    FieldSlot::Scalar(default.clone().unwrap_or(Value::Null))
                }
                FieldKind::Relation(rel) => match rel.cardinality {
                    Cardinality::One => FieldSlot::One(None),
                    Cardinality::Many => FieldSlot::Many(IndexSet::new()),
                },
            })
            .collect();
        Self {
            id,
            key,
            schema,
            slots,
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn key(&self) -> &RecordKey {
        &self.key
    }

    pub fn model(&self) -> &str {
        self.schema.name()
    }

    pub fn schema(&self) -> &ModelSchema {
        &self.schema
    }

    /// Scalar value by field name; `None` when the field is unknown or not a scalar.
    pub fn scalar(&self, field: &str) -> Option<&Value> {
        match self.slot_by_name(field)? {
            FieldSlot::Scalar(value) => Some(value),
            _ => None,
        }
    }

    /// Text scalar shortcut.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.scalar(field).and_then(Value::as_str)
    }

    pub fn one(&self, field: &str) -> Option<RecordId> {
        match self.slot_by_name(field)? {
            FieldSlot::One(target) => *target,
            _ => None,
        }
    }

    pub fn many(&self, field: &str) -> Option<&IndexSet<RecordId>> {
        match self.slot_by_name(field)? {
            FieldSlot::Many(targets) => Some(targets),
            _ => None,
        }
    }

    fn slot_by_name(&self, field: &str) -> Option<&FieldSlot> {
        self.schema.field_index(field).map(|idx| &self.slots[idx])
    }

    pub(crate) fn slot(&self, field: usize) -> &FieldSlot {
        &self.slots[field]
    }

    pub(crate) fn slot_mut(&mut self, field: usize) -> &mut FieldSlot {
        &mut self.slots[field]
    }
}
