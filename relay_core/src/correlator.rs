//! Request/response correlation for one session.
//!
//! Every outbound request carries a numeric id allocated here; the inbound
//! stream delivers responses in whatever order the backend produces them.
//! The correlator hands the caller a oneshot receiver at registration time
//! and fulfills it when the matching response arrives, the deadline elapses,
//! or the session is torn down — whichever happens first. Resolution and
//! expiry race on the same `DashMap` entry; the atomic `remove` is the
//! tie-break, so exactly one terminal event fires per id.

use crate::error::{RelayError, Result};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;

type PendingSender = oneshot::Sender<Result<Value>>;

/// Receiver half handed to the caller awaiting a response.
pub type ResponseHandle = oneshot::Receiver<Result<Value>>;

#[derive(Debug, Default)]
pub struct RequestCorrelator {
    next_id: AtomicU64,
    pending: DashMap<u64, PendingSender>,
}

impl RequestCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next request id. Ids start at 1 and are never reused
    /// within the correlator's lifetime.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Records a pending request and returns the handle the caller awaits.
    pub fn register(&self, id: u64) -> ResponseHandle {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);
        rx
    }

    /// Fulfills the pending request `id` with `payload`.
    ///
    /// Returns `false` when `id` is unknown (already resolved, expired, or
    /// never registered); the caller logs that as a stray response and drops
    /// the payload.
    pub fn resolve(&self, id: u64, payload: Value) -> bool {
        let Some((_, tx)) = self.pending.remove(&id) else {
            return false;
        };
        let _ = tx.send(Ok(payload));
        true
    }

    /// Abandons the pending request `id` after its deadline elapsed.
    ///
    /// A no-op returning `false` if the response won the race. Dropping the
    /// sender is enough: the awaiting side already gave up.
    pub fn expire(&self, id: u64) -> bool {
        self.pending.remove(&id).is_some()
    }

    /// Fails every pending request with `reason` and clears the table.
    /// Used during session teardown so no caller is left waiting forever.
    pub fn cancel_all(&self, reason: &str) {
        let ids: Vec<u64> = self.pending.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Some((_, tx)) = self.pending.remove(&id) {
                let _ = tx.send(Err(RelayError::Canceled(reason.to_string())));
            }
        }
    }

    /// Number of requests still awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_are_strictly_increasing_from_one() {
        let correlator = RequestCorrelator::new();
        let ids: Vec<u64> = (0..5).map(|_| correlator.next_id()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn resolve_delivers_to_registered_handle() {
        let correlator = RequestCorrelator::new();
        let id = correlator.next_id();
        let rx = correlator.register(id);

        assert!(correlator.resolve(id, json!({"result": "ok"})));
        let payload = rx.await.unwrap().unwrap();
        assert_eq!(payload["result"], "ok");
        assert_eq!(correlator.pending_count(), 0);
    }

    #[tokio::test]
    async fn out_of_order_resolution_reaches_the_right_handles() {
        let correlator = RequestCorrelator::new();
        let first = correlator.next_id();
        let second = correlator.next_id();
        let rx_first = correlator.register(first);
        let rx_second = correlator.register(second);

        assert!(correlator.resolve(second, json!({"seq": 2})));
        assert!(correlator.resolve(first, json!({"seq": 1})));

        assert_eq!(rx_first.await.unwrap().unwrap()["seq"], 1);
        assert_eq!(rx_second.await.unwrap().unwrap()["seq"], 2);
    }

    #[test]
    fn resolve_unknown_id_is_discarded() {
        let correlator = RequestCorrelator::new();
        assert!(!correlator.resolve(42, json!({})));

        // Unrelated pending entries are unaffected.
        let id = correlator.next_id();
        let _rx = correlator.register(id);
        assert!(!correlator.resolve(999, json!({})));
        assert_eq!(correlator.pending_count(), 1);
    }

    #[test]
    fn expire_removes_entry_and_loses_to_earlier_resolve() {
        let correlator = RequestCorrelator::new();
        let id = correlator.next_id();
        let _rx = correlator.register(id);

        assert!(correlator.expire(id));
        assert_eq!(correlator.pending_count(), 0);
        // The race loser observes the entry already gone.
        assert!(!correlator.resolve(id, json!({})));
        assert!(!correlator.expire(id));
    }

    #[tokio::test]
    async fn cancel_all_fails_every_pending_handle() {
        let correlator = RequestCorrelator::new();
        let a = correlator.register(correlator.next_id());
        let b = correlator.register(correlator.next_id());

        correlator.cancel_all("session closed");
        assert_eq!(correlator.pending_count(), 0);

        for rx in [a, b] {
            match rx.await.unwrap() {
                Err(RelayError::Canceled(reason)) => assert_eq!(reason, "session closed"),
                other => panic!("expected cancellation, got {other:?}"),
            }
        }
    }
}
