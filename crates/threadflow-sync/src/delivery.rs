//! # Completion Delivery
//!
//! The single exit through which engines hand completions to subscribers.
//!
//! ```text
//!   PollSyncEngine ──┐
//!                    ├──► CompletionSink ──► dedup ──► mpsc ──► subscriber
//!   PushSyncEngine ──┘        (shared)      (seen?)
//! ```
//!
//! Deduplication and the channel send happen under one lock, so two engines
//! sharing a sink can never interleave a duplicate or reorder a batch.

use parking_lot::Mutex;
use std::sync::Arc;
use threadflow_core::{CompletedItem, CompletionDeduper};
use tokio::sync::mpsc;
use tracing::debug;

/// Deduplication state that may be shared between engines.
pub type SharedDeduper = Arc<Mutex<CompletionDeduper>>;

/// Receiving half handed to the subscriber.
pub type CompletionReceiver = mpsc::UnboundedReceiver<CompletedItem>;

/// Deduplicating sender for completed items.
#[derive(Debug, Clone)]
pub struct CompletionSink {
    deduper: SharedDeduper,
    tx: mpsc::UnboundedSender<CompletedItem>,
}

impl CompletionSink {
    /// Creates a sink with fresh deduplication state.
    pub fn channel() -> (Self, CompletionReceiver) {
        Self::with_deduper(Arc::new(Mutex::new(CompletionDeduper::new())))
    }

    /// Creates a sink that shares an existing deduper.
    pub fn with_deduper(deduper: SharedDeduper) -> (Self, CompletionReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (CompletionSink { deduper, tx }, rx)
    }

    /// Returns the deduplication state.
    pub fn deduper(&self) -> SharedDeduper {
        Arc::clone(&self.deduper)
    }

    /// Delivers `item` unless its identifier was delivered before.
    ///
    /// Returns true if the item was new. A closed receiver does not undo
    /// the bookkeeping; the item still counts as seen.
    pub fn deliver(&self, item: CompletedItem) -> bool {
        let mut seen = self.deduper.lock();
        if !seen.accept(&item) {
            debug!(task_id = %item.id, "Suppressed duplicate completion");
            return false;
        }
        debug!(task_id = %item.id, "Delivering completion");
        if self.tx.send(item).is_err() {
            debug!("Completion subscriber has gone away");
        }
        true
    }

    /// Delivers a batch in order and returns how many were new.
    pub fn deliver_batch<I>(&self, items: I) -> usize
    where
        I: IntoIterator<Item = CompletedItem>,
    {
        let mut seen = self.deduper.lock();
        let mut delivered = 0;
        for item in items {
            if !seen.accept(&item) {
                debug!(task_id = %item.id, "Suppressed duplicate completion");
                continue;
            }
            debug!(task_id = %item.id, "Delivering completion");
            let _ = self.tx.send(item);
            delivered += 1;
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut CompletionReceiver) -> Vec<String> {
        let mut ids = Vec::new();
        while let Ok(item) = rx.try_recv() {
            ids.push(item.id.into_inner());
        }
        ids
    }

    #[test]
    fn test_deliver_suppresses_duplicates() {
        let (sink, mut rx) = CompletionSink::channel();
        assert!(sink.deliver(CompletedItem::new("a")));
        assert!(!sink.deliver(CompletedItem::new("a")));
        assert!(sink.deliver(CompletedItem::new("b")));
        assert_eq!(drain(&mut rx), vec!["a", "b"]);
    }

    #[test]
    fn test_batch_preserves_order() {
        let (sink, mut rx) = CompletionSink::channel();
        sink.deliver(CompletedItem::new("b"));
        let delivered = sink.deliver_batch(
            ["a", "b", "c"].into_iter().map(CompletedItem::new),
        );
        assert_eq!(delivered, 2);
        assert_eq!(drain(&mut rx), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_shared_deduper_across_sinks() {
        let (first, mut first_rx) = CompletionSink::channel();
        let (second, mut second_rx) = CompletionSink::with_deduper(first.deduper());

        assert!(first.deliver(CompletedItem::new("x")));
        assert!(!second.deliver(CompletedItem::new("x")));
        assert_eq!(drain(&mut first_rx), vec!["x"]);
        assert!(drain(&mut second_rx).is_empty());
    }

    #[test]
    fn test_closed_receiver_still_records() {
        let (sink, rx) = CompletionSink::channel();
        drop(rx);
        assert!(sink.deliver(CompletedItem::new("gone")));
        assert!(sink.deduper().lock().contains(&"gone".into()));
    }
}
