//! Board of tasks submitted from this process.
//!
//! Completions for ids the board does not track are ignored; the sync
//! engines report every finished task, not only ours.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use threadflow_core::{CompletedItem, Item, ItemId};

/// Submitted items in submission order.
#[derive(Debug, Default)]
pub struct TaskBoard {
    items: Vec<Item>,
    index: HashMap<ItemId, usize>,
}

impl TaskBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking an item. Re-tracking an id replaces the entry.
    pub fn track(&mut self, item: Item) {
        match self.index.get(&item.id) {
            Some(&slot) => self.items[slot] = item,
            None => {
                self.index.insert(item.id.clone(), self.items.len());
                self.items.push(item);
            }
        }
    }

    pub fn get(&self, id: &ItemId) -> Option<&Item> {
        self.index.get(id).map(|&slot| &self.items[slot])
    }

    /// Flips the matching item to completed.
    ///
    /// Returns the item only on its first completion.
    pub fn apply(&mut self, record: &CompletedItem, now: DateTime<Utc>) -> Option<&Item> {
        let slot = *self.index.get(&record.id)?;
        let item = &mut self.items[slot];
        match item.apply(record, now) {
            Ok(true) => Some(&self.items[slot]),
            _ => None,
        }
    }

    pub fn pending(&self) -> impl Iterator<Item = &Item> {
        self.items.iter().filter(|item| !item.is_completed())
    }

    pub fn all_completed(&self) -> bool {
        self.pending().next().is_none()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}
