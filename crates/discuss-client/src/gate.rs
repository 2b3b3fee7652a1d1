//! One-shot readiness signal carrying the bootstrap payload.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;

use crate::error::GateError;

/// Settles at most once. Awaiting before or after settlement yields the same
/// payload, for any number of awaiters.
#[derive(Debug)]
pub struct ReadinessGate {
    tx: watch::Sender<Option<Arc<Value>>>,
}

impl Default for ReadinessGate {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessGate {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Store `payload` and wake every awaiter. Returns false if already settled;
    /// the first payload is kept.
    pub fn settle(&self, payload: Arc<Value>) -> bool {
        self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(payload);
            true
        })
    }

    pub fn is_settled(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn payload(&self) -> Option<Arc<Value>> {
        self.tx.borrow().clone()
    }

    /// Owned handle that can be moved into another task.
    pub fn waiter(&self) -> ReadyWaiter {
        ReadyWaiter {
            rx: self.tx.subscribe(),
        }
    }

    pub async fn wait(&self) -> Result<Arc<Value>, GateError> {
        self.waiter().wait().await
    }
}

#[derive(Debug, Clone)]
pub struct ReadyWaiter {
    rx: watch::Receiver<Option<Arc<Value>>>,
}

impl ReadyWaiter {
    /// Resolves once the gate settles; fails only if the gate is dropped first.
    pub async fn wait(&mut self) -> Result<Arc<Value>, GateError> {
        let settled = self
            .rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| GateError::Closed)?;
        settled.clone().ok_or(GateError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn awaiters_before_and_after_settle_see_same_payload() {
        let gate = ReadinessGate::new();
        let early: Vec<_> = (0..3)
            .map(|_| {
                let mut waiter = gate.waiter();
                tokio::spawn(async move { waiter.wait().await })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!gate.is_settled());

        assert!(gate.settle(Arc::new(json!({"menu_id": 1}))));
        assert!(!gate.settle(Arc::new(json!({"menu_id": 2}))));

        for handle in early {
            let payload = handle.await.unwrap().unwrap();
            assert_eq!(*payload, json!({"menu_id": 1}));
        }
        let late = gate.wait().await.unwrap();
        assert_eq!(*late, json!({"menu_id": 1}));
        assert!(Arc::ptr_eq(&late, &gate.payload().unwrap()));
    }

    #[tokio::test]
    async fn pending_gate_does_not_resolve() {
        let gate = ReadinessGate::new();
        let waited = tokio::time::timeout(Duration::from_millis(20), gate.wait()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn dropped_gate_reports_closed() {
        let gate = ReadinessGate::new();
        let mut waiter = gate.waiter();
        drop(gate);
        assert!(matches!(waiter.wait().await, Err(GateError::Closed)));
    }
}
