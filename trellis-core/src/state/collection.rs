//! Fields Collection
//!
//! Groups fields, including same-name groups such as radio buttons, and
//! relays every member's change batches through one listener list. Grouping
//! rules (one checked radio per name, ...) belong to subscribers of that
//! list, not to the collection.

use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::RwLock;

use super::change::ChangeBatch;
use super::field::{Field, FieldId};
use crate::reactive::{ListenerId, Listeners, Propagation};

struct Member {
    field: Arc<Field>,
    relay: ListenerId,
}

#[derive(Default)]
pub struct FieldsCollection {
    members: RwLock<Vec<Member>>,
    listeners: Arc<Listeners<ChangeBatch>>,
}

impl FieldsCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `field` and start relaying its change batches.
    pub fn add(&self, field: Arc<Field>) {
        let listeners = Arc::clone(&self.listeners);
        let relay = field.subscribe(move |batch| {
            listeners.dispatch(batch);
            Propagation::Continue
        });
        self.members.write().push(Member { field, relay });
    }

    /// Remove the field with `id` and detach its relay.
    pub fn remove(&self, id: FieldId) -> Option<Arc<Field>> {
        let member = {
            let mut members = self.members.write();
            let index = members.iter().position(|member| member.field.id() == id)?;
            members.remove(index)
        };
        member.field.unsubscribe(member.relay);
        Some(member.field)
    }

    /// Every field named `name`, in insertion order.
    pub fn get(&self, name: &str) -> Vec<Arc<Field>> {
        self.members
            .read()
            .iter()
            .filter(|member| member.field.name() == name)
            .map(|member| Arc::clone(&member.field))
            .collect()
    }

    pub fn first(&self, name: &str) -> Option<Arc<Field>> {
        self.members
            .read()
            .iter()
            .find(|member| member.field.name() == name)
            .map(|member| Arc::clone(&member.field))
    }

    pub fn get_by_id(&self, id: FieldId) -> Option<Arc<Field>> {
        self.members
            .read()
            .iter()
            .find(|member| member.field.id() == id)
            .map(|member| Arc::clone(&member.field))
    }

    /// Distinct field names, in first-insertion order.
    pub fn names(&self) -> IndexSet<String> {
        self.members
            .read()
            .iter()
            .map(|member| member.field.name().to_string())
            .collect()
    }

    pub fn all(&self) -> Vec<Arc<Field>> {
        self.members
            .read()
            .iter()
            .map(|member| Arc::clone(&member.field))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }

    /// Receive the change batches of every member.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ChangeBatch) -> Propagation + Send + Sync + 'static,
    {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }
}

impl std::fmt::Debug for FieldsCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldsCollection")
            .field("len", &self.len())
            .field("names", &self.names())
            .finish()
    }
}
