//! Per-host message buffer

use std::collections::BTreeMap;

use geodtn_core::{Message, MessageId};

/// Messages held by one host, keyed by id
///
/// Iteration is in id order so that every run over the same inputs visits
/// messages in the same sequence.
#[derive(Debug, Clone)]
pub struct MessageBuffer {
    messages: BTreeMap<MessageId, Message>,
    capacity: u64,
    occupied: u64,
}

impl MessageBuffer {
    pub fn new(capacity: u64) -> Self {
        Self {
            messages: BTreeMap::new(),
            capacity,
            occupied: 0,
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Bytes used by buffered messages
    pub fn occupied(&self) -> u64 {
        self.occupied
    }

    /// Capacity minus occupancy; negative while transiently overfull
    pub fn free(&self) -> i64 {
        let capacity = self.capacity.min(i64::MAX as u64) as i64;
        capacity.saturating_sub(self.occupied.min(i64::MAX as u64) as i64)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.messages.contains_key(id)
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.messages.get(id)
    }

    pub fn get_mut(&mut self, id: &MessageId) -> Option<&mut Message> {
        self.messages.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Message> {
        self.messages.values_mut()
    }

    pub fn ids(&self) -> Vec<MessageId> {
        self.messages.keys().cloned().collect()
    }

    /// Insert, replacing any message with the same id
    pub fn insert(&mut self, message: Message) {
        self.occupied += message.size;
        if let Some(old) = self.messages.insert(message.id.clone(), message) {
            self.occupied -= old.size;
        }
    }

    pub fn remove(&mut self, id: &MessageId) -> Option<Message> {
        let removed = self.messages.remove(id)?;
        self.occupied -= removed.size;
        Some(removed)
    }

    /// Oldest message by receive time that `pinned` does not protect
    ///
    /// Ties go to the first message in iteration order.
    pub fn oldest_evictable(&self, pinned: impl Fn(&MessageId) -> bool) -> Option<&MessageId> {
        let mut oldest: Option<&Message> = None;
        for m in self.messages.values().filter(|m| !pinned(&m.id)) {
            if oldest.is_none_or(|o| m.received_at < o.received_at) {
                oldest = Some(m);
            }
        }
        oldest.map(|m| &m.id)
    }
}
