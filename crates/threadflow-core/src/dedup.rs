//! # Completion Deduper
//!
//! Remembers every item identifier already delivered to the caller and
//! suppresses repeats.
//!
//! The poll engine sees the same item again after `reset()` clears its cursor,
//! and the push engine sees it again when the server replays events after a
//! reconnect. Both route through this set, so the caller observes each
//! identifier at most once per process.
//!
//! Growth is unbounded. Long-lived callers that need a bound can wrap this
//! type with their own eviction.

use std::collections::HashSet;

use crate::types::{CompletedItem, ItemId};

/// Set of identifiers already delivered.
#[derive(Debug, Default, Clone)]
pub struct CompletionDeduper {
    seen: HashSet<ItemId>,
}

impl CompletionDeduper {
    /// Creates an empty deduper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the item and returns true the first time its id is seen.
    pub fn accept(&mut self, item: &CompletedItem) -> bool {
        self.accept_id(&item.id)
    }

    /// Identifier-only form of [`accept`](Self::accept).
    pub fn accept_id(&mut self, id: &ItemId) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        self.seen.insert(id.clone())
    }

    /// Returns true if the id has been delivered already.
    pub fn contains(&self, id: &ItemId) -> bool {
        self.seen.contains(id)
    }

    /// Number of distinct identifiers delivered so far.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns true if nothing has been delivered yet.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_first_sighting_only() {
        let mut dedup = CompletionDeduper::new();
        let a = CompletedItem::new("a");

        assert!(dedup.accept(&a));
        assert!(!dedup.accept(&a));
        assert!(!dedup.accept(&CompletedItem::new("a").with_data("different payload")));
        assert!(dedup.accept(&CompletedItem::new("b")));
        assert_eq!(dedup.len(), 2);
        assert!(dedup.contains(&ItemId::from("a")));
    }

    proptest! {
        #[test]
        fn prop_each_id_accepted_once(
            batches in proptest::collection::vec(
                proptest::collection::vec("[a-e]", 0..6),
                0..8,
            )
        ) {
            let mut dedup = CompletionDeduper::new();
            let mut delivered: Vec<String> = Vec::new();

            for batch in &batches {
                for id in batch {
                    if dedup.accept_id(&ItemId::from(id.as_str())) {
                        delivered.push(id.clone());
                    }
                }
            }

            let mut unique: Vec<String> = batches.iter().flatten().cloned().collect();
            unique.sort();
            unique.dedup();

            let mut sorted = delivered.clone();
            sorted.sort();
            prop_assert_eq!(sorted, unique);
        }
    }
}
