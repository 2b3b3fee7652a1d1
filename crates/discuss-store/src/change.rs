//! Change batches published after each top-level store operation.

use std::sync::Arc;

use indexmap::IndexSet;
use tokio::sync::broadcast;

use crate::RecordId;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Change {
    Created(RecordId),
    Field { record: RecordId, field: String },
}

/// Deduplicated set of changes produced by one store operation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    changes: IndexSet<Change>,
}

impl ChangeBatch {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }

    pub fn created(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.changes.iter().filter_map(|change| match change {
            Change::Created(id) => Some(*id),
            Change::Field { .. } => None,
        })
    }

    pub fn has_field(&self, record: RecordId, field: &str) -> bool {
        self.changes.iter().any(|change| {
            matches!(change, Change::Field { record: r, field: f } if *r == record && f == field)
        })
    }

    pub(crate) fn push(&mut self, change: Change) {
        self.changes.insert(change);
    }
}

/// Collects changes across nested operations and publishes them once the
/// outermost operation finishes, so observers never see a half-applied link.
pub(crate) struct ChangeNotifier {
    tx: broadcast::Sender<Arc<ChangeBatch>>,
    pending: ChangeBatch,
    depth: usize,
}

impl ChangeNotifier {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            pending: ChangeBatch::default(),
            depth: 0,
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Arc<ChangeBatch>> {
        self.tx.subscribe()
    }

    pub(crate) fn begin(&mut self) {
        self.depth += 1;
    }

    pub(crate) fn record(&mut self, change: Change) {
        self.pending.push(change);
    }

    pub(crate) fn finish(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        if self.depth > 0 || self.pending.is_empty() {
            return;
        }
        let batch = std::mem::take(&mut self.pending);
        // No subscribers is not an error.
        let _ = self.tx.send(Arc::new(batch));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ModelId;

    fn rid(slot: u32) -> RecordId {
        RecordId {
            model: ModelId(0),
            slot,
        }
    }

    #[test]
    fn nested_operations_publish_one_batch() {
        let mut notifier = ChangeNotifier::new(4);
        let mut rx = notifier.subscribe();

        notifier.begin();
        notifier.record(Change::Created(rid(0)));
        notifier.begin();
        notifier.record(Change::Field {
            record: rid(0),
            field: "name".into(),
        });
        notifier.finish();
        assert!(rx.try_recv().is_err(), "inner finish must not publish");
        notifier.finish();

        let batch = rx.try_recv().expect("batch");
        assert_eq!(batch.len(), 2);
        assert!(batch.has_field(rid(0), "name"));
        assert_eq!(batch.created().collect::<Vec<_>>(), vec![rid(0)]);
    }

    #[test]
    fn empty_operations_publish_nothing() {
        let mut notifier = ChangeNotifier::new(4);
        let mut rx = notifier.subscribe();
        notifier.begin();
        notifier.finish();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn duplicate_changes_collapse() {
        let mut batch = ChangeBatch::default();
        for _ in 0..3 {
            batch.push(Change::Field {
                record: rid(1),
                field: "counter".into(),
            });
        }
        assert_eq!(batch.len(), 1);
    }
}
