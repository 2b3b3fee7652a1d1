//! Relation metadata and the single link/unlink routine that keeps both sides
//! of a declared inverse pair consistent.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexSet;

use crate::change::Change;
use crate::record::FieldSlot;
use crate::schema::{Cardinality, ModelSchema};
use crate::{ModelId, RecordId, SchemaError, Store};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct InverseMeta {
    pub(crate) field: usize,
    pub(crate) cardinality: Cardinality,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct RelationMeta {
    pub(crate) cardinality: Cardinality,
    pub(crate) target: ModelId,
    pub(crate) inverse: Option<InverseMeta>,
}

/// (model, field) -> target model and inverse side, compiled once per store.
#[derive(Debug, Default)]
pub(crate) struct RelationTable {
    entries: HashMap<(ModelId, usize), RelationMeta>,
}

impl RelationTable {
    pub(crate) fn compile(
        schemas: &[Arc<ModelSchema>],
        names: &HashMap<String, ModelId>,
    ) -> Result<Self, SchemaError> {
        let mut entries = HashMap::new();
        for (pos, schema) in schemas.iter().enumerate() {
            let model = ModelId(pos as u32);
            for (field_idx, field) in schema.fields().iter().enumerate() {
                let Some(rel) = field.relation() else {
                    continue;
                };
                let target = *names.get(&rel.target).ok_or_else(|| SchemaError::UnknownTarget {
                    model: schema.name().to_string(),
                    field: field.name.clone(),
                    target: rel.target.clone(),
                })?;
                entries.insert(
                    (model, field_idx),
                    RelationMeta {
                        cardinality: rel.cardinality,
                        target,
                        inverse: None,
                    },
                );
            }
        }

        let mut table = Self { entries };
        for (pos, schema) in schemas.iter().enumerate() {
            let model = ModelId(pos as u32);
            for (field_idx, field) in schema.fields().iter().enumerate() {
                let Some(rel) = field.relation() else {
                    continue;
                };
                let Some(inverse_name) = rel.inverse.as_deref() else {
                    continue;
                };
                let mismatch = || SchemaError::InverseMismatch {
                    model: schema.name().to_string(),
                    field: field.name.clone(),
                    target: rel.target.clone(),
                    inverse: inverse_name.to_string(),
                };
                let target = table.entries[&(model, field_idx)].target;
                let target_schema = &schemas[target.index()];
                let inverse_idx = target_schema.field_index(inverse_name).ok_or_else(|| {
                    SchemaError::InverseMissing {
                        model: schema.name().to_string(),
                        field: field.name.clone(),
                        target: rel.target.clone(),
                        inverse: inverse_name.to_string(),
                    }
                })?;
                let inverse_decl = target_schema
                    .field(inverse_idx)
                    .relation()
                    .ok_or_else(mismatch)?;
                if inverse_decl.target != schema.name() {
                    return Err(mismatch());
                }
                if inverse_decl
                    .inverse
                    .as_deref()
                    .is_some_and(|back| back != field.name)
                {
                    return Err(mismatch());
                }

                let forward = InverseMeta {
                    field: inverse_idx,
                    cardinality: inverse_decl.cardinality,
                };
                let backward = InverseMeta {
                    field: field_idx,
                    cardinality: rel.cardinality,
                };
                if !table.set_inverse((model, field_idx), forward)
                    || !table.set_inverse((target, inverse_idx), backward)
                {
                    return Err(mismatch());
                }
            }
        }
        Ok(table)
    }

    // Returns false when the slot already pairs with a different field.
    fn set_inverse(&mut self, at: (ModelId, usize), inverse: InverseMeta) -> bool {
        let Some(meta) = self.entries.get_mut(&at) else {
            return false;
        };
        match meta.inverse {
            Some(existing) if existing != inverse => false,
            _ => {
                meta.inverse = Some(inverse);
                true
            }
        }
    }

    pub(crate) fn get(&self, model: ModelId, field: usize) -> Option<RelationMeta> {
        self.entries.get(&(model, field)).copied()
    }
}

impl Store {
    pub(crate) fn note_field(&mut self, id: RecordId, field: usize) {
        let name = self.registries[id.model.index()]
            .schema()
            .field(field)
            .name
            .clone();
        self.notifier.record(Change::Field { record: id, field: name });
    }

    pub(crate) fn one_slot(&self, id: RecordId, field: usize) -> Option<RecordId> {
        match self.rec(id).slot(field) {
            FieldSlot::One(target) => *target,
            _ => None,
        }
    }

    fn many_contains(&self, id: RecordId, field: usize, target: RecordId) -> bool {
        match self.rec(id).slot(field) {
            FieldSlot::Many(targets) => targets.contains(&target),
            _ => false,
        }
    }

    fn raw_set_one(&mut self, id: RecordId, field: usize, value: Option<RecordId>) {
        let changed = match self.rec_mut(id).slot_mut(field) {
            FieldSlot::One(slot) if *slot != value => {
                *slot = value;
                true
            }
            _ => false,
        };
        if changed {
            self.note_field(id, field);
        }
    }

    fn raw_insert_many(&mut self, id: RecordId, field: usize, target: RecordId) {
        let changed = match self.rec_mut(id).slot_mut(field) {
            FieldSlot::Many(targets) => targets.insert(target),
            _ => false,
        };
        if changed {
            self.note_field(id, field);
        }
    }

    fn raw_remove_many(&mut self, id: RecordId, field: usize, target: RecordId) {
        let changed = match self.rec_mut(id).slot_mut(field) {
            FieldSlot::Many(targets) => targets.shift_remove(&target),
            _ => false,
        };
        if changed {
            self.note_field(id, field);
        }
    }

    fn detach_inverse(&mut self, target: RecordId, inverse: InverseMeta, source: RecordId) {
        match inverse.cardinality {
            Cardinality::One => {
                if self.one_slot(target, inverse.field) == Some(source) {
                    self.raw_set_one(target, inverse.field, None);
                }
            }
            Cardinality::Many => self.raw_remove_many(target, inverse.field, source),
        }
    }

    /// Point `target`'s inverse side at `source`. A `one` inverse that pointed
    /// elsewhere first releases its previous owner's forward link.
    fn attach_inverse(
        &mut self,
        target: RecordId,
        inverse: InverseMeta,
        source: RecordId,
        forward: (usize, Cardinality),
    ) {
        match inverse.cardinality {
            Cardinality::One => {
                match (self.one_slot(target, inverse.field), forward.1) {
                    (Some(previous), Cardinality::One) if previous != source => {
                        self.raw_set_one(previous, forward.0, None);
                    }
                    (Some(previous), Cardinality::Many) if previous != source => {
                        self.raw_remove_many(previous, forward.0, target);
                    }
                    _ => {}
                }
                self.raw_set_one(target, inverse.field, Some(source));
            }
            Cardinality::Many => self.raw_insert_many(target, inverse.field, source),
        }
    }

    /// Assign a `one` field, keeping the inverse side symmetric.
    pub(crate) fn link_one(
        &mut self,
        source: RecordId,
        field: usize,
        meta: RelationMeta,
        target: Option<RecordId>,
    ) {
        let current = self.one_slot(source, field);
        if current == target {
            return;
        }
        if let Some(inverse) = meta.inverse {
            if let Some(old) = current {
                self.detach_inverse(old, inverse, source);
            }
            if let Some(new) = target {
                self.attach_inverse(new, inverse, source, (field, Cardinality::One));
            }
        }
        self.raw_set_one(source, field, target);
    }

    pub(crate) fn link_many(
        &mut self,
        source: RecordId,
        field: usize,
        meta: RelationMeta,
        target: RecordId,
    ) {
        if self.many_contains(source, field, target) {
            return;
        }
        if let Some(inverse) = meta.inverse {
            self.attach_inverse(target, inverse, source, (field, Cardinality::Many));
        }
        self.raw_insert_many(source, field, target);
    }

    pub(crate) fn unlink_many(
        &mut self,
        source: RecordId,
        field: usize,
        meta: RelationMeta,
        target: RecordId,
    ) {
        if !self.many_contains(source, field, target) {
            return;
        }
        self.raw_remove_many(source, field, target);
        if let Some(inverse) = meta.inverse {
            self.detach_inverse(target, inverse, source);
        }
    }

    /// Set-replace a `many` field: unlink what disappeared, link what is new,
    /// then adopt the given order. Unchanged members cause no inverse churn.
    pub(crate) fn relink_many(
        &mut self,
        source: RecordId,
        field: usize,
        meta: RelationMeta,
        targets: &[RecordId],
    ) {
        let wanted: IndexSet<RecordId> = targets.iter().copied().collect();
        let current = match self.rec(source).slot(field) {
            FieldSlot::Many(set) => set.clone(),
            _ => return,
        };
        for removed in current.iter().filter(|id| !wanted.contains(*id)) {
            self.unlink_many(source, field, meta, *removed);
        }
        for added in wanted.iter().filter(|id| !current.contains(*id)) {
            self.link_many(source, field, meta, *added);
        }

        let reordered = match self.rec_mut(source).slot_mut(field) {
            FieldSlot::Many(set) if !set.iter().eq(wanted.iter()) => {
                *set = wanted;
                true
            }
            _ => false,
        };
        if reordered {
            self.note_field(source, field);
        }
    }
}
