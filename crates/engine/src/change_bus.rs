//! Change notifications published once per commit, undo or redo.

use std::{collections::BTreeSet, fmt};

use uuid::Uuid;

use crate::Entity;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeOrigin {
    Commit,
    Undo,
    Redo,
}

/// Everything that changed in one persisted unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeSet {
    pub origin: ChangeOrigin,
    pub inserted: Vec<Entity>,
    pub deleted: Vec<Entity>,
    /// `(before, after)` pairs.
    pub changed: Vec<(Entity, Entity)>,
}

impl ChangeSet {
    pub fn new(origin: ChangeOrigin) -> Self {
        Self {
            origin,
            inserted: Vec::new(),
            deleted: Vec::new(),
            changed: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.deleted.is_empty() && self.changed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inserted.len() + self.deleted.len() + self.changed.len()
    }

    /// Every entity mentioned by the set, befores included.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.inserted
            .iter()
            .chain(self.deleted.iter())
            .chain(
                self.changed
                    .iter()
                    .flat_map(|(before, after)| [before, after]),
            )
    }

    /// Accounts referenced by any entity of the set, before or after the
    /// change.
    pub fn account_ids(&self) -> BTreeSet<Uuid> {
        self.entities().flat_map(Entity::account_ids).collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

type Handler = Box<dyn FnMut(&ChangeSet)>;

/// Synchronous publish/subscribe for [`ChangeSet`]s.
#[derive(Default)]
pub struct ChangeBus {
    next_id: u64,
    handlers: Vec<(SubscriptionId, Handler)>,
}

impl ChangeBus {
    pub fn subscribe(&mut self, handler: impl FnMut(&ChangeSet) + 'static) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(handler_id, _)| *handler_id != id);
        self.handlers.len() != before
    }

    pub fn publish(&mut self, change_set: &ChangeSet) {
        for (_, handler) in &mut self.handlers {
            handler(change_set);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for ChangeBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeBus")
            .field("subscribers", &self.handlers.len())
            .finish()
    }
}
