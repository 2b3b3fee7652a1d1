//! Store facade: registries by model name, nested upsert and relation edits.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::debug;

use crate::change::{Change, ChangeBatch, ChangeNotifier};
use crate::record::{FieldSlot, Record};
use crate::registry::RecordRegistry;
use crate::relation::{RelationMeta, RelationTable};
use crate::schema::{Cardinality, ModelSchema};
use crate::{ModelId, RecordId, RecordKey, SchemaError, StoreError, StoreResult};

const DEFAULT_CHANGE_CAPACITY: usize = 256;

/// Collects model declarations; `build` validates them and creates singletons.
pub struct StoreBuilder {
    schemas: Vec<ModelSchema>,
    change_capacity: usize,
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self {
            schemas: Vec::new(),
            change_capacity: DEFAULT_CHANGE_CAPACITY,
        }
    }
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, schema: ModelSchema) -> Self {
        self.schemas.push(schema);
        self
    }

    /// Number of unread change batches kept per subscriber before it lags.
    pub fn change_capacity(mut self, capacity: usize) -> Self {
        self.change_capacity = capacity;
        self
    }

    pub fn build(self) -> StoreResult<Store> {
        let mut names = HashMap::with_capacity(self.schemas.len());
        let mut schemas = Vec::with_capacity(self.schemas.len());
        for schema in self.schemas {
            if names.contains_key(schema.name()) {
                return Err(SchemaError::DuplicateModel(schema.name().to_string()).into());
            }
            names.insert(schema.name().to_string(), ModelId(schemas.len() as u32));
            schemas.push(Arc::new(schema));
        }
        let relations = RelationTable::compile(&schemas, &names)?;
        let registries = schemas
            .iter()
            .enumerate()
            .map(|(pos, schema)| RecordRegistry::new(ModelId(pos as u32), schema.clone()))
            .collect();

        let mut store = Store {
            names,
            registries,
            relations,
            notifier: ChangeNotifier::new(self.change_capacity),
        };
        let singletons: Vec<ModelId> = schemas
            .iter()
            .enumerate()
            .filter(|(_, schema)| schema.is_singleton())
            .map(|(pos, _)| ModelId(pos as u32))
            .collect();
        store.batch(|store| {
            for model in singletons {
                store.create_record(model, RecordKey::singleton(), None)?;
            }
            Ok(())
        })?;
        Ok(store)
    }
}

/// Owner of every record, one registry per declared model.
///
/// All creation and mutation from external data goes through the store. Each
/// public mutating call publishes at most one [`ChangeBatch`] when it returns.
pub struct Store {
    pub(crate) names: HashMap<String, ModelId>,
    pub(crate) registries: Vec<RecordRegistry>,
    pub(crate) relations: RelationTable,
    pub(crate) notifier: ChangeNotifier,
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_map();
        for registry in &self.registries {
            out.entry(&registry.name(), &registry.len());
        }
        out.finish()
    }
}

impl Store {
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    pub fn model_id(&self, name: &str) -> StoreResult<ModelId> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| StoreError::UnknownModel(name.to_string()))
    }

    pub fn registry(&self, name: &str) -> StoreResult<&RecordRegistry> {
        let model = self.model_id(name)?;
        Ok(&self.registries[model.index()])
    }

    pub fn registries(&self) -> impl Iterator<Item = &RecordRegistry> {
        self.registries.iter()
    }

    /// Registry accessor with the `get` / `new` / `insert` protocol.
    pub fn model(&mut self, name: &str) -> StoreResult<ModelHandle<'_>> {
        let model = self.model_id(name)?;
        Ok(ModelHandle { store: self, model })
    }

    pub fn record(&self, id: RecordId) -> Option<&Record> {
        let registry = self.registries.get(id.model.index())?;
        ((id.slot as usize) < registry.len()).then(|| registry.record(id.slot))
    }

    /// Identity of the one record of a singleton model.
    pub fn singleton(&self, name: &str) -> StoreResult<RecordId> {
        let registry = self.registry(name)?;
        if !registry.schema().is_singleton() {
            return Err(StoreError::NotSingleton(name.to_string()));
        }
        registry
            .get_id(&RecordKey::singleton())
            .ok_or_else(|| StoreError::NotSingleton(name.to_string()))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ChangeBatch>> {
        self.notifier.subscribe()
    }

    /// Upsert one payload object or an array of them into `model`.
    pub fn insert(&mut self, model: &str, data: &Value) -> StoreResult<Vec<RecordId>> {
        let model = self.model_id(model)?;
        self.insert_into(model, data)
    }

    /// Insert every top-level collection keyed by a registered model name.
    /// Keys listed in `metadata` are skipped; any other unknown key is an error.
    pub fn insert_snapshot(
        &mut self,
        payload: &Value,
        metadata: &[&str],
    ) -> StoreResult<IndexMap<String, Vec<RecordId>>> {
        let Value::Object(collections) = payload else {
            return Err(StoreError::InvalidPayload {
                model: "<snapshot>".into(),
                reason: "snapshot must be an object".into(),
            });
        };
        let mut plan = Vec::new();
        for (name, data) in collections {
            if metadata.contains(&name.as_str()) {
                continue;
            }
            let model = self.model_id(name)?;
            self.validate_collection(model, data)?;
            plan.push((name.clone(), model, data));
        }
        self.batch(|store| {
            let mut inserted = IndexMap::with_capacity(plan.len());
            for (name, model, data) in plan {
                let ids = store.apply_collection(model, data)?;
                inserted.insert(name, ids);
            }
            Ok(inserted)
        })
    }

    pub fn set_one(
        &mut self,
        source: RecordId,
        field: &str,
        target: Option<RecordId>,
    ) -> StoreResult<()> {
        let (idx, meta) = self.relation_field(source, field, Cardinality::One)?;
        if let Some(target) = target {
            self.check_target(source, field, meta, target)?;
        }
        self.batch(|store| {
            store.link_one(source, idx, meta, target);
            Ok(())
        })
    }

    pub fn add_to_many(&mut self, source: RecordId, field: &str, target: RecordId) -> StoreResult<()> {
        let (idx, meta) = self.relation_field(source, field, Cardinality::Many)?;
        self.check_target(source, field, meta, target)?;
        self.batch(|store| {
            store.link_many(source, idx, meta, target);
            Ok(())
        })
    }

    pub fn remove_from_many(
        &mut self,
        source: RecordId,
        field: &str,
        target: RecordId,
    ) -> StoreResult<()> {
        let (idx, meta) = self.relation_field(source, field, Cardinality::Many)?;
        self.check_target(source, field, meta, target)?;
        self.batch(|store| {
            store.unlink_many(source, idx, meta, target);
            Ok(())
        })
    }

    pub fn replace_many(
        &mut self,
        source: RecordId,
        field: &str,
        targets: &[RecordId],
    ) -> StoreResult<()> {
        let (idx, meta) = self.relation_field(source, field, Cardinality::Many)?;
        for target in targets {
            self.check_target(source, field, meta, *target)?;
        }
        self.batch(|store| {
            store.relink_many(source, idx, meta, targets);
            Ok(())
        })
    }

    /// Flat JSON view of a record; relations render as target keys.
    pub fn to_json(&self, id: RecordId) -> Option<Value> {
        let record = self.record(id)?;
        let schema = record.schema();
        let mut out = Map::new();
        out.insert(schema.key_field().to_string(), record.key().to_value());
        for (idx, field) in schema.fields().iter().enumerate() {
            let value = match record.slot(idx) {
                FieldSlot::Scalar(value) => value.clone(),
                FieldSlot::One(target) => target
                    .map(|target| self.rec(target).key().to_value())
                    .unwrap_or(Value::Null),
                FieldSlot::Many(targets) => targets
                    .iter()
                    .map(|target| self.rec(*target).key().to_value())
                    .collect(),
            };
            out.insert(field.name.clone(), value);
        }
        Some(Value::Object(out))
    }

    pub(crate) fn rec(&self, id: RecordId) -> &Record {
        self.registries[id.model.index()].record(id.slot)
    }

    pub(crate) fn rec_mut(&mut self, id: RecordId) -> &mut Record {
        self.registries[id.model.index()].record_mut(id.slot)
    }

    fn schema_of(&self, model: ModelId) -> Arc<ModelSchema> {
        self.registries[model.index()].schema().clone()
    }

    /// Run `op` as one notification unit; nested calls join the outer batch.
    fn batch<R>(&mut self, op: impl FnOnce(&mut Self) -> StoreResult<R>) -> StoreResult<R> {
        self.notifier.begin();
        let out = op(self);
        self.notifier.finish();
        out
    }

    fn insert_into(&mut self, model: ModelId, data: &Value) -> StoreResult<Vec<RecordId>> {
        self.validate_collection(model, data)?;
        self.batch(|store| store.apply_collection(model, data))
    }

    fn apply_collection(&mut self, model: ModelId, data: &Value) -> StoreResult<Vec<RecordId>> {
        match data {
            Value::Array(items) => items
                .iter()
                .map(|item| self.insert_value(model, item))
                .collect(),
            other => Ok(vec![self.insert_value(model, other)?]),
        }
    }

    fn insert_value(&mut self, model: ModelId, data: &Value) -> StoreResult<RecordId> {
        match data {
            Value::Object(obj) => self.insert_object(model, obj),
            _ => Err(self.invalid_payload(model, "expected an object")),
        }
    }

    fn insert_object(&mut self, model: ModelId, obj: &Map<String, Value>) -> StoreResult<RecordId> {
        let key = self.payload_key(model, obj)?;
        match self.registries[model.index()].get_id(&key) {
            Some(id) => {
                self.merge(id, obj)?;
                Ok(id)
            }
            None => self.create_record(model, key, Some(obj)),
        }
    }

    /// Allocate identity first, then merge, then run hooks. Nested payloads that
    /// refer back to this key find the identity already registered.
    fn create_record(
        &mut self,
        model: ModelId,
        key: RecordKey,
        data: Option<&Map<String, Value>>,
    ) -> StoreResult<RecordId> {
        let id = self.registries[model.index()].allocate(key)?;
        self.notifier.record(Change::Created(id));
        debug!(
            model = self.registries[model.index()].name(),
            key = %self.rec(id).key(),
            "record created"
        );
        if let Some(data) = data {
            self.merge(id, data)?;
        }
        if let Some(hooks) = self.registries[model.index()].schema().hooks() {
            hooks.on_create(self, id)?;
        }
        Ok(id)
    }

    fn merge(&mut self, id: RecordId, obj: &Map<String, Value>) -> StoreResult<()> {
        let schema = self.schema_of(id.model);
        for (name, value) in obj {
            if name == schema.key_field() {
                continue;
            }
            let idx = schema
                .field_index(name)
                .ok_or_else(|| StoreError::UnknownField {
                    model: schema.name().to_string(),
                    field: name.clone(),
                })?;
            match self.relations.get(id.model, idx) {
                None => self.set_scalar(id, idx, value),
                Some(meta) => match meta.cardinality {
                    Cardinality::One => {
                        let target = self.resolve_target(meta.target, value)?;
                        self.link_one(id, idx, meta, target);
                    }
                    Cardinality::Many => {
                        let items: &[Value] = match value {
                            Value::Array(items) => items,
                            _ => &[],
                        };
                        let mut targets = Vec::with_capacity(items.len());
                        for item in items {
                            if let Some(target) = self.resolve_target(meta.target, item)? {
                                targets.push(target);
                            }
                        }
                        self.relink_many(id, idx, meta, &targets);
                    }
                },
            }
        }
        Ok(())
    }

    fn set_scalar(&mut self, id: RecordId, field: usize, value: &Value) {
        let changed = match self.rec_mut(id).slot_mut(field) {
            FieldSlot::Scalar(current) if current != value => {
                *current = value.clone();
                true
            }
            _ => false,
        };
        if changed {
            self.note_field(id, field);
        }
    }

    /// Nested object -> upsert; bare key -> existing record or a new one; null -> none.
    fn resolve_target(&mut self, model: ModelId, value: &Value) -> StoreResult<Option<RecordId>> {
        match value {
            Value::Null => Ok(None),
            Value::Object(obj) => self.insert_object(model, obj).map(Some),
            other => {
                let key = RecordKey::from_value(other)
                    .ok_or_else(|| self.invalid_payload(model, "relation target is not a key"))?;
                let key = self.registries[model.index()].normalize_key(key);
                match self.registries[model.index()].get_id(&key) {
                    Some(id) => Ok(Some(id)),
                    None => self.create_record(model, key, None).map(Some),
                }
            }
        }
    }

    fn payload_key(&self, model: ModelId, obj: &Map<String, Value>) -> StoreResult<RecordKey> {
        let schema = self.registries[model.index()].schema();
        if schema.is_singleton() {
            return Ok(RecordKey::singleton());
        }
        let raw = obj
            .get(schema.key_field())
            .ok_or_else(|| StoreError::MissingKey {
                model: schema.name().to_string(),
                field: schema.key_field().to_string(),
            })?;
        RecordKey::from_value(raw).ok_or_else(|| StoreError::InvalidKey {
            model: schema.name().to_string(),
            value: raw.clone(),
        })
    }

    fn validate_collection(&self, model: ModelId, data: &Value) -> StoreResult<()> {
        match data {
            Value::Array(items) => items
                .iter()
                .try_for_each(|item| self.validate_collection_item(model, item)),
            other => self.validate_collection_item(model, other),
        }
    }

    fn validate_collection_item(&self, model: ModelId, data: &Value) -> StoreResult<()> {
        match data {
            Value::Object(obj) => {
                self.payload_key(model, obj)?;
                self.validate_fields(model, obj)
            }
            _ => Err(self.invalid_payload(model, "expected an object")),
        }
    }

    /// Walk the whole nested payload before touching any record, so a schema
    /// violation anywhere leaves the store unchanged.
    fn validate_fields(&self, model: ModelId, obj: &Map<String, Value>) -> StoreResult<()> {
        let schema = self.registries[model.index()].schema();
        for (name, value) in obj {
            if name == schema.key_field() {
                continue;
            }
            let idx = schema
                .field_index(name)
                .ok_or_else(|| StoreError::UnknownField {
                    model: schema.name().to_string(),
                    field: name.clone(),
                })?;
            let Some(meta) = self.relations.get(model, idx) else {
                continue;
            };
            let invalid = |reason: &str| StoreError::InvalidRelationValue {
                model: schema.name().to_string(),
                field: name.clone(),
                reason: reason.to_string(),
            };
            match (meta.cardinality, value) {
                (_, Value::Null) => {}
                (Cardinality::One, Value::Object(nested)) => {
                    self.payload_key(meta.target, nested)?;
                    self.validate_fields(meta.target, nested)?;
                }
                (Cardinality::One, other) => {
                    RecordKey::from_value(other).ok_or_else(|| invalid("expected object, key or null"))?;
                }
                (Cardinality::Many, Value::Array(items)) => {
                    for item in items {
                        match item {
                            Value::Object(nested) => {
                                self.payload_key(meta.target, nested)?;
                                self.validate_fields(meta.target, nested)?;
                            }
                            other => {
                                RecordKey::from_value(other)
                                    .ok_or_else(|| invalid("list items must be objects or keys"))?;
                            }
                        }
                    }
                }
                (Cardinality::Many, _) => return Err(invalid("expected a list or null")),
            }
        }
        Ok(())
    }

    fn relation_field(
        &self,
        source: RecordId,
        field: &str,
        expected: Cardinality,
    ) -> StoreResult<(usize, RelationMeta)> {
        let record = self.record(source).ok_or(StoreError::UnknownRecord(source))?;
        let schema = record.schema();
        let idx = schema
            .field_index(field)
            .ok_or_else(|| StoreError::UnknownField {
                model: schema.name().to_string(),
                field: field.to_string(),
            })?;
        match self.relations.get(source.model, idx) {
            Some(meta) if meta.cardinality == expected => Ok((idx, meta)),
            _ => Err(StoreError::NotARelation {
                model: schema.name().to_string(),
                field: field.to_string(),
                expected: match expected {
                    Cardinality::One => "one",
                    Cardinality::Many => "many",
                },
            }),
        }
    }

    fn check_target(
        &self,
        source: RecordId,
        field: &str,
        meta: RelationMeta,
        target: RecordId,
    ) -> StoreResult<()> {
        let found = self.record(target).ok_or(StoreError::UnknownRecord(target))?;
        if target.model != meta.target {
            return Err(StoreError::RelationTargetMismatch {
                model: self.rec(source).model().to_string(),
                field: field.to_string(),
                expected: self.registries[meta.target.index()].name().to_string(),
                found: found.model().to_string(),
            });
        }
        Ok(())
    }

    fn invalid_payload(&self, model: ModelId, reason: &str) -> StoreError {
        StoreError::InvalidPayload {
            model: self.registries[model.index()].name().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Borrowed view of one model's registry on a mutable store.
pub struct ModelHandle<'a> {
    store: &'a mut Store,
    model: ModelId,
}

impl ModelHandle<'_> {
    pub fn id(&self) -> ModelId {
        self.model
    }

    pub fn registry(&self) -> &RecordRegistry {
        &self.store.registries[self.model.index()]
    }

    pub fn get(&self, key: impl Into<RecordKey>) -> Option<&Record> {
        self.registry().get(&key.into())
    }

    /// Allocate a fresh identity for `key`; fails if the key already exists.
    pub fn new(&mut self, key: impl Into<RecordKey>, data: &Value) -> StoreResult<RecordId> {
        let model = self.model;
        let key = self.registry().normalize_key(key.into());
        let data = match data {
            Value::Null => None,
            Value::Object(obj) => {
                self.store.validate_fields(model, obj)?;
                Some(obj)
            }
            _ => return Err(self.store.invalid_payload(model, "expected an object")),
        };
        if self.registry().get_id(&key).is_some() {
            return Err(StoreError::IdentityConflict {
                model: self.registry().name().to_string(),
                key,
            });
        }
        self.store
            .batch(|store| store.create_record(model, key, data))
    }

    /// Upsert one payload object, returning the record's stable identity.
    pub fn insert(&mut self, data: &Value) -> StoreResult<RecordId> {
        let model = self.model;
        self.store.validate_collection_item(model, data)?;
        self.store.batch(|store| store.insert_value(model, data))
    }

    /// Upsert a payload object or an array of them, each resolved by its own key.
    pub fn insert_many(&mut self, data: &Value) -> StoreResult<Vec<RecordId>> {
        self.store.insert_into(self.model, data)
    }
}
