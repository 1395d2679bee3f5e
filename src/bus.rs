//! Synchronous publish/subscribe for recorded and snapshot events.
//!
//! Listeners are keyed by event name and run on the emitting thread, in
//! registration order, before the emitting operation returns.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::event::Event;

/// Callback invoked with each event emitted under the name it was
/// registered for.
pub type Listener = Arc<dyn Fn(&Event) + Send + Sync + 'static>;

/// Handle returned by [`EventBus::on`], used to unregister the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Name-keyed listener registry.
#[derive(Default, Clone)]
pub struct EventBus {
    listeners: HashMap<String, Vec<(ListenerId, Listener)>>,
    next_id: u64,
}

// Manual `Debug` because listeners are opaque closures.
impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<&str, usize> = self
            .listeners
            .iter()
            .map(|(name, ls)| (name.as_str(), ls.len()))
            .collect();
        f.debug_struct("EventBus").field("listeners", &counts).finish()
    }
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for events emitted under `name`.
    ///
    /// # Returns
    ///
    /// A [`ListenerId`] that can be passed to [`off`](EventBus::off).
    pub fn on<F>(&mut self, name: impl Into<String>, listener: F) -> ListenerId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners
            .entry(name.into())
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Unregister a listener.
    ///
    /// # Returns
    ///
    /// `true` if the listener was registered.
    pub fn off(&mut self, id: ListenerId) -> bool {
        let mut removed = false;
        self.listeners.retain(|_, ls| {
            let before = ls.len();
            ls.retain(|(lid, _)| *lid != id);
            removed |= ls.len() != before;
            !ls.is_empty()
        });
        removed
    }

    /// Deliver `event` to every listener registered under `name`.
    pub fn emit(&self, name: &str, event: &Event) {
        let Some(listeners) = self.listeners.get(name) else {
            tracing::trace!(event = name, "no listeners");
            return;
        };
        tracing::trace!(event = name, count = listeners.len(), "notifying listeners");
        for (_, listener) in listeners {
            listener(event);
        }
    }

    /// Number of listeners registered under `name`.
    pub fn listener_count(&self, name: &str) -> usize {
        self.listeners.get(name).map_or(0, Vec::len)
    }
}
