//! Recency List Module
//!
//! Intrusive doubly-linked list ordering cached entries from most recently
//! used (head) to least recently used (tail).
//!
//! The list only stores its two ends. Neighbour links live inside the nodes
//! themselves and are reached through [`LinkStore`], so the list has no
//! knowledge of how or where nodes are kept.

use crate::cache::entry::{Links, SlotId};

// == Link Store ==
/// Storage that can hand out the recency links of a node.
pub trait LinkStore {
    /// Links of the node in `slot`, if that slot is occupied.
    fn links(&self, slot: SlotId) -> Option<&Links>;

    /// Mutable links of the node in `slot`, if that slot is occupied.
    fn links_mut(&mut self, slot: SlotId) -> Option<&mut Links>;
}

// == Recency List ==
/// Usage order of cached entries.
///
/// `head` and `tail` are either both `None` (empty list) or both `Some`.
/// None of the operations are synchronized; callers hold the cache lock.
#[derive(Debug, Default)]
pub struct RecencyList {
    head: Option<SlotId>,
    tail: Option<SlotId>,
    len: usize,
}

impl RecencyList {
    // == Constructor ==
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently used node.
    pub fn head(&self) -> Option<SlotId> {
        self.head
    }

    /// Least recently used node, the next eviction victim.
    pub fn tail(&self) -> Option<SlotId> {
        self.tail
    }

    /// Number of linked nodes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    // == Detach ==
    /// Unlinks `slot` from the list, repairing its neighbours and the list ends.
    ///
    /// The caller must know that `slot` is currently linked into this list.
    /// A node that is already unlinked is left untouched.
    pub fn detach<S: LinkStore>(&mut self, store: &mut S, slot: SlotId) {
        let Some(links) = store.links(slot).copied() else {
            return;
        };
        let is_linked = links.prev.is_some() || links.next.is_some() || self.head == Some(slot);
        if !is_linked {
            return;
        }

        match links.prev {
            Some(prev) => {
                if let Some(prev_links) = store.links_mut(prev) {
                    prev_links.next = links.next;
                }
            }
            None => self.head = links.next,
        }

        match links.next {
            Some(next) => {
                if let Some(next_links) = store.links_mut(next) {
                    next_links.prev = links.prev;
                }
            }
            None => self.tail = links.prev,
        }

        if let Some(own) = store.links_mut(slot) {
            *own = Links::default();
        }
        self.len -= 1;
    }

    // == Attach To Head ==
    /// Links a detached `slot` in as the new head.
    ///
    /// On an empty list the node also becomes the tail.
    pub fn attach_to_head<S: LinkStore>(&mut self, store: &mut S, slot: SlotId) {
        let old_head = self.head;

        match store.links_mut(slot) {
            Some(own) => {
                debug_assert!(own.is_unlinked(), "attaching a node that is still linked");
                own.prev = None;
                own.next = old_head;
            }
            None => return,
        }

        if let Some(head) = old_head {
            if let Some(head_links) = store.links_mut(head) {
                head_links.prev = Some(slot);
            }
        }

        self.head = Some(slot);
        if self.tail.is_none() {
            self.tail = Some(slot);
        }
        self.len += 1;
    }

    // == Move To Head ==
    /// Marks an already linked `slot` as most recently used.
    pub fn move_to_head<S: LinkStore>(&mut self, store: &mut S, slot: SlotId) {
        if self.head == Some(slot) {
            return;
        }
        self.detach(store, slot);
        self.attach_to_head(store, slot);
    }

    // == Iteration ==
    /// Walks the list from head to tail.
    pub fn iter<'a, S: LinkStore>(&self, store: &'a S) -> RecencyIter<'a, S> {
        RecencyIter {
            store,
            current: self.head,
        }
    }

    /// Forgets every node without touching their links.
    ///
    /// Only valid when the nodes themselves are being dropped.
    pub fn reset(&mut self) {
        self.head = None;
        self.tail = None;
        self.len = 0;
    }
}

/// Head-to-tail iterator over slot ids.
pub struct RecencyIter<'a, S> {
    store: &'a S,
    current: Option<SlotId>,
}

impl<S: LinkStore> Iterator for RecencyIter<'_, S> {
    type Item = SlotId;

    fn next(&mut self) -> Option<SlotId> {
        let slot = self.current?;
        self.current = self.store.links(slot).and_then(|links| links.next);
        Some(slot)
    }
}
