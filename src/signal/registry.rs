//! Subscription Registry
//!
//! Ordered id → entry storage shared by both bus flavours. Ids come from a
//! monotonic counter that is never rewound, so an id is never handed out
//! twice by the same registry.

use std::collections::BTreeMap;
use std::fmt;

use crate::signal::stats::DeliveryStats;

/// Identifier of a connected callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(u64);

impl SlotId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub(crate) struct Registry<E> {
    pub(crate) entries: BTreeMap<SlotId, E>,
    last_id: u64,
    pub(crate) stats: DeliveryStats,
}

impl<E> Registry<E> {
    pub(crate) fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            last_id: 0,
            stats: DeliveryStats::default(),
        }
    }

    /// Store `entry` under a fresh id (first id is 1)
    pub(crate) fn insert(&mut self, entry: E) -> SlotId {
        self.last_id += 1;
        let id = SlotId(self.last_id);
        self.entries.insert(id, entry);
        id
    }

    pub(crate) fn remove(&mut self, id: SlotId) -> Option<E> {
        self.entries.remove(&id)
    }

    pub(crate) fn contains(&self, id: SlotId) -> bool {
        self.entries.contains_key(&id)
    }

    pub(crate) fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Ascending-id copy of the current entries
    pub(crate) fn snapshot(&self) -> Vec<(SlotId, E)>
    where
        E: Clone,
    {
        self.entries
            .iter()
            .map(|(id, entry)| (*id, entry.clone()))
            .collect()
    }
}
