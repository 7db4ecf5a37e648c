//! Per-entity in-flight operation tags.
//!
//! Advisory only: a busy key has its row actions disabled so the same user
//! cannot submit twice, nothing more. Every mark gets a fresh ticket so a
//! request resolving late can tell whether a push event has since cleared or
//! re-marked the key.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BusyTicket(u64);

#[derive(Debug, Clone, PartialEq)]
struct BusyEntry {
    tag: String,
    ticket: BusyTicket,
}

#[derive(Debug, Clone, Default)]
pub struct BusyTracker {
    entries: HashMap<String, BusyEntry>,
    next_ticket: u64,
}

impl BusyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&mut self, key: &str, tag: &str) -> BusyTicket {
        self.next_ticket += 1;
        let ticket = BusyTicket(self.next_ticket);
        self.entries.insert(
            key.to_string(),
            BusyEntry {
                tag: tag.to_string(),
                ticket,
            },
        );
        ticket
    }

    pub fn clear(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key).map(|entry| entry.tag)
    }

    /// Clear only if the entry is still the one `ticket` created.
    pub fn clear_if_current(&mut self, key: &str, ticket: BusyTicket) -> bool {
        let current = self
            .entries
            .get(key)
            .is_some_and(|entry| entry.ticket == ticket);
        if current {
            self.entries.remove(key);
        }
        current
    }

    pub fn is_busy(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|entry| entry.tag.as_str())
    }

    /// Apply a run status reported by a push event: in-flight marks, anything
    /// else clears. An in-flight event always takes a new ticket, so the push
    /// channel owns the entry from then on. Returns true when the visible tag
    /// changed.
    pub fn apply_run_status(&mut self, key: &str, status: &str, tag: &str) -> bool {
        if shared::is_in_flight_status(status) {
            let changed = self.is_busy(key) != Some(tag);
            self.mark(key, tag);
            changed
        } else {
            self.clear(key).is_some()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
