//! Subscriber lists for change notifications.
//!
//! Fields and collections own a [`Listeners`] list. A dispatch delivers one
//! immutable event to each subscriber synchronously, in registration order.
//! A subscriber may return [`Propagation::Stop`] to keep the event from the
//! subscribers registered after it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// Unique identifier for a subscription.
///
/// Returned when subscribing and used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Generate a new unique listener ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

/// What a subscriber wants to happen after it handled an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Propagation {
    #[default]
    Continue,
    /// Later subscribers of the same list do not see this event.
    Stop,
}

type Callback<E> = Arc<dyn Fn(&E) -> Propagation + Send + Sync>;

/// An ordered list of subscribers for events of type `E`.
pub struct Listeners<E> {
    entries: RwLock<Vec<(ListenerId, Callback<E>)>>,
}

impl<E> Listeners<E> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Add a subscriber at the end of the list.
    pub fn subscribe<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&E) -> Propagation + Send + Sync + 'static,
    {
        let id = ListenerId::new();
        self.entries.write().push((id, Arc::new(callback)));
        id
    }

    /// Remove a subscriber. Returns false if the id was not subscribed.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    /// Deliver `event` to every subscriber in order.
    ///
    /// The list is snapshotted first, so subscribers may subscribe,
    /// unsubscribe or trigger nested dispatches while handling the event.
    pub fn dispatch(&self, event: &E) -> Propagation {
        let snapshot: Vec<Callback<E>> = self
            .entries
            .read()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in snapshot {
            if callback(event) == Propagation::Stop {
                return Propagation::Stop;
            }
        }
        Propagation::Continue
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("len", &self.len())
            .finish()
    }
}
