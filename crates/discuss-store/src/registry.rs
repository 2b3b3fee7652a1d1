//! Per-model identity map.

use std::collections::HashMap;
use std::sync::Arc;

use crate::record::Record;
use crate::schema::ModelSchema;
use crate::{ModelId, RecordId, RecordKey, StoreError, StoreResult};

/// Identity map from key to record for one model.
///
/// Records live in allocation order and are never moved or replaced, so a
/// `RecordId` handed out for a key keeps pointing at the same record while its
/// field values change.
#[derive(Debug)]
pub struct RecordRegistry {
    model: ModelId,
    schema: Arc<ModelSchema>,
    by_key: HashMap<RecordKey, u32>,
    records: Vec<Record>,
}

impl RecordRegistry {
    pub(crate) fn new(model: ModelId, schema: Arc<ModelSchema>) -> Self {
        Self {
            model,
            schema,
            by_key: HashMap::new(),
            records: Vec::new(),
        }
    }

    pub fn model(&self) -> ModelId {
        self.model
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Singleton models map every key to the fixed singleton key.
    pub fn normalize_key(&self, key: RecordKey) -> RecordKey {
        if self.schema.is_singleton() {
            RecordKey::singleton()
        } else {
            key
        }
    }

    pub fn get_id(&self, key: &RecordKey) -> Option<RecordId> {
        let slot = if self.schema.is_singleton() {
            self.by_key.get(&RecordKey::singleton())
        } else {
            self.by_key.get(key)
        };
        slot.map(|slot| RecordId {
            model: self.model,
            slot: *slot,
        })
    }

    pub fn get(&self, key: &RecordKey) -> Option<&Record> {
        self.get_id(key).map(|id| &self.records[id.slot as usize])
    }

    /// Records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    pub(crate) fn allocate(&mut self, key: RecordKey) -> StoreResult<RecordId> {
        let key = self.normalize_key(key);
        if self.by_key.contains_key(&key) {
            return Err(StoreError::IdentityConflict {
                model: self.schema.name().to_string(),
                key,
            });
        }
        let slot = u32::try_from(self.records.len()).map_err(|_| StoreError::RegistryFull {
            model: self.schema.name().to_string(),
        })?;
        let id = RecordId {
            model: self.model,
            slot,
        };
        self.records
            .push(Record::new(id, key.clone(), self.schema.clone()));
        self.by_key.insert(key, slot);
        Ok(id)
    }

    pub(crate) fn record(&self, slot: u32) -> &Record {
        &self.records[slot as usize]
    }

    pub(crate) fn record_mut(&mut self, slot: u32) -> &mut Record {
        &mut self.records[slot as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(singleton: bool) -> RecordRegistry {
        let mut builder = ModelSchema::build("Persona").scalar("name");
        if singleton {
            builder = builder.singleton();
        }
        RecordRegistry::new(ModelId(0), Arc::new(builder.finish().unwrap()))
    }

    #[test]
    fn allocate_then_get_returns_same_identity() {
        let mut reg = registry(false);
        let id = reg.allocate(RecordKey::from(4)).unwrap();
        assert_eq!(reg.get_id(&RecordKey::from(4)), Some(id));
        assert_eq!(reg.get(&RecordKey::from(4)).unwrap().id(), id);
        assert!(reg.get(&RecordKey::from(5)).is_none());
    }

    #[test]
    fn allocate_twice_is_identity_conflict() {
        let mut reg = registry(false);
        reg.allocate(RecordKey::from(4)).unwrap();
        let err = reg.allocate(RecordKey::from(4)).unwrap_err();
        assert!(matches!(err, StoreError::IdentityConflict { .. }));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn singleton_normalizes_any_key() {
        let mut reg = registry(true);
        let id = reg.allocate(RecordKey::from(9)).unwrap();
        assert_eq!(reg.get_id(&RecordKey::from("other")), Some(id));
        assert_eq!(reg.get(&RecordKey::from(1)).unwrap().key(), &RecordKey::singleton());
        assert!(reg.allocate(RecordKey::from(2)).is_err());
    }

    #[test]
    fn iteration_follows_insertion_order() {
        let mut reg = registry(false);
        for key in [3, 1, 2] {
            reg.allocate(RecordKey::from(key)).unwrap();
        }
        let keys: Vec<_> = reg.iter().map(|r| r.key().clone()).collect();
        assert_eq!(
            keys,
            vec![RecordKey::from(3), RecordKey::from(1), RecordKey::from(2)]
        );
    }
}
