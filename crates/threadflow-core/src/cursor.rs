//! # Cursor Tracker
//!
//! Holds the identifier of the newest completion observed so far. The poll
//! engine sends it as `?since=` so the server only returns newer items.
//!
//! The server returns each batch oldest-to-newest, so the newest item is
//! always the last element. The tracker does not compare identifiers (they
//! are opaque); it simply takes the last one it is handed.

use crate::types::{CompletedItem, ItemId};

/// Last-seen completion identifier.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CursorTracker {
    current: Option<ItemId>,
}

impl CursorTracker {
    /// Creates an empty tracker (next fetch is unfiltered).
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current cursor, if any.
    pub fn current(&self) -> Option<&ItemId> {
        self.current.as_ref()
    }

    /// Moves the cursor to `latest`.
    pub fn advance(&mut self, latest: ItemId) {
        self.current = Some(latest);
    }

    /// Advances to the last item of a batch; empty batches leave it alone.
    ///
    /// Returns true if the cursor moved.
    pub fn advance_to_batch_end(&mut self, batch: &[CompletedItem]) -> bool {
        match batch.last() {
            Some(last) => {
                self.advance(last.id.clone());
                true
            }
            None => false,
        }
    }

    /// Clears the cursor so the next fetch requests the full set.
    pub fn reset(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_advance_and_reset() {
        let mut cursor = CursorTracker::new();
        assert!(cursor.current().is_none());

        cursor.advance("a".into());
        assert_eq!(cursor.current().map(ItemId::as_str), Some("a"));

        cursor.reset();
        assert!(cursor.current().is_none());
    }

    #[test]
    fn test_batch_end() {
        let mut cursor = CursorTracker::new();
        let batch = vec![CompletedItem::new("a"), CompletedItem::new("b")];

        assert!(cursor.advance_to_batch_end(&batch));
        assert_eq!(cursor.current().map(ItemId::as_str), Some("b"));

        assert!(!cursor.advance_to_batch_end(&[]));
        assert_eq!(cursor.current().map(ItemId::as_str), Some("b"));
    }

    proptest! {
        // Server ids here are zero-padded sequence numbers, so "later" means
        // lexically greater; every batch is internally ordered.
        #[test]
        fn prop_cursor_never_moves_backwards(
            mut seqs in proptest::collection::vec(0u32..10_000, 0..40),
            splits in proptest::collection::vec(0usize..6, 0..10),
        ) {
            seqs.sort_unstable();
            let ids: Vec<CompletedItem> = seqs
                .iter()
                .map(|n| CompletedItem::new(format!("task_{n:05}")))
                .collect();

            let mut cursor = CursorTracker::new();
            let mut rest = ids.as_slice();
            for take in splits {
                let take = take.min(rest.len());
                let (batch, tail) = rest.split_at(take);
                let before = cursor.current().cloned();
                cursor.advance_to_batch_end(batch);
                if let (Some(before), Some(after)) = (before, cursor.current()) {
                    prop_assert!(after >= &before);
                }
                rest = tail;
            }
        }
    }
}
