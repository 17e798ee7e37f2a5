//! Listener registry — the durable registration table.
//!
//! The table is pure data: event name → ordered callback entries, with a
//! global monotonic id doubling as the registration sequence. Binding the
//! table onto a live transport handle is a projection applied on every
//! connected transition; disconnects detach the bindings but never touch
//! the table.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::transport::{EventCallback, ListenerId, TransportHandle};

/// One registered handler.
struct ListenerEntry {
    /// Registration id; globally monotonic, so sorting by id yields
    /// registration order across all events.
    id: ListenerId,
    /// The handler.
    callback: EventCallback,
}

/// Registry of all listener registrations for one connection.
#[derive(Default)]
pub struct ListenerRegistry {
    /// Event name → entries in registration order.
    entries: DashMap<String, Vec<ListenerEntry>>,
    /// Id sequence.
    next_id: AtomicU64,
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("events", &self.entries.len())
            .field("listeners", &self.len())
            .finish()
    }
}

impl ListenerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a handler under `event` and returns its registration id.
    pub fn add(&self, event: &str, callback: EventCallback) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.entries
            .entry(event.to_string())
            .or_default()
            .push(ListenerEntry { id, callback });
        id
    }

    /// Removes the registration with `id` under `event`. Returns whether
    /// an entry was removed.
    pub fn remove(&self, event: &str, id: ListenerId) -> bool {
        let Some(mut entries) = self.entries.get_mut(event) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        let removed = entries.len() < before;
        if entries.is_empty() {
            drop(entries);
            self.entries.remove(event);
        }
        removed
    }

    /// Drops every registration.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Total number of registrations.
    pub fn len(&self) -> usize {
        self.entries.iter().map(|entries| entries.len()).sum()
    }

    /// Whether the registry has no registrations.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Binds every registration onto `handle`, in registration order.
    pub fn bind_all(&self, handle: &dyn TransportHandle) {
        let mut all: Vec<(String, ListenerId, EventCallback)> = self
            .entries
            .iter()
            .flat_map(|entries| {
                let event = entries.key().clone();
                entries
                    .iter()
                    .map(|entry| (event.clone(), entry.id, entry.callback.clone()))
                    .collect::<Vec<_>>()
            })
            .collect();
        all.sort_by_key(|(_, id, _)| *id);

        for (event, id, callback) in all {
            handle.on(&event, id, callback);
        }
    }

    /// Detaches every registration from `handle`. The table is unchanged.
    pub fn detach_all(&self, handle: &dyn TransportHandle) {
        for entries in self.entries.iter() {
            for entry in entries.iter() {
                handle.off(entries.key(), entry.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn noop() -> EventCallback {
        Arc::new(|_| {})
    }

    #[test]
    fn test_ids_are_monotonic_across_events() {
        let registry = ListenerRegistry::new();
        let a = registry.add("document.reported", noop());
        let b = registry.add("document.matched", noop());
        let c = registry.add("document.reported", noop());
        assert!(a < b && b < c);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_remove_targets_one_exact_entry() {
        let registry = ListenerRegistry::new();
        let a = registry.add("document.reported", noop());
        let b = registry.add("document.reported", noop());

        assert!(registry.remove("document.reported", a));
        assert!(!registry.remove("document.reported", a));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove("document.reported", b));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_clear_empties_the_table() {
        let registry = ListenerRegistry::new();
        registry.add("document.reported", noop());
        registry.add("document.claimed", noop());
        registry.clear();
        assert!(registry.is_empty());
    }
}
