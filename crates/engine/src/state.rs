//! Committed in-memory copy of everything persisted in the store.

use std::collections::{BTreeSet, HashMap};

use uuid::Uuid;

use crate::{
    Account, EngineError, Entity, EntityKey, EntityKind, ResultEngine, SplitEntry,
    Transaction, undo::SnapshotPair,
};

#[derive(Clone, Debug, Default)]
pub(crate) struct EntityState {
    entities: HashMap<EntityKey, Entity>,
    /// Parent transaction id -> split ids.
    children: HashMap<Uuid, BTreeSet<Uuid>>,
}

impl EntityState {
    pub(crate) fn from_entities(entities: Vec<Entity>) -> ResultEngine<Self> {
        let mut state = Self::default();
        for entity in entities {
            let key = entity.key();
            if state.entities.contains_key(&key) {
                return Err(EngineError::ExistingKey(key.to_string()));
            }
            state.put(entity);
        }
        Ok(state)
    }

    pub(crate) fn get(&self, key: &EntityKey) -> Option<&Entity> {
        self.entities.get(key)
    }

    pub(crate) fn children_of(&self, transaction_id: Uuid) -> impl Iterator<Item = Uuid> + '_ {
        self.children
            .get(&transaction_id)
            .into_iter()
            .flat_map(|ids| ids.iter().copied())
    }

    pub(crate) fn of_kind(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.entities
            .values()
            .filter(move |entity| entity.kind() == kind)
    }

    pub(crate) fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.of_kind(EntityKind::Account)
            .filter_map(Entity::as_account)
    }

    pub(crate) fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.of_kind(EntityKind::Transaction)
            .filter_map(Entity::as_transaction)
    }

    pub(crate) fn splits(&self) -> impl Iterator<Item = &SplitEntry> {
        self.of_kind(EntityKind::Split).filter_map(Entity::as_split)
    }

    /// Move a pair from its before to its after. The current value must be
    /// exactly the before, anything else means memory and storage diverged.
    pub(crate) fn apply(&mut self, from: Option<&Entity>, to: Option<&Entity>) -> ResultEngine<()> {
        let Some(key) = to.or(from).map(Entity::key) else {
            return Ok(());
        };
        if self.entities.get(&key) != from {
            return Err(EngineError::Inconsistent(format!(
                "{key} does not match its recorded state"
            )));
        }
        self.take(&key);
        if let Some(entity) = to {
            self.put(entity.clone());
        }
        Ok(())
    }

    /// Apply a batch of pairs forwards or backwards.
    pub(crate) fn apply_pairs(&mut self, pairs: &[SnapshotPair], backward: bool) -> ResultEngine<()> {
        if backward {
            for pair in pairs.iter().rev() {
                self.apply(pair.after.as_ref(), pair.before.as_ref())?;
            }
        } else {
            for pair in pairs {
                self.apply(pair.before.as_ref(), pair.after.as_ref())?;
            }
        }
        Ok(())
    }

    fn put(&mut self, entity: Entity) {
        if let Entity::Split(split) = &entity {
            self.children
                .entry(split.transaction_id)
                .or_default()
                .insert(split.id);
        }
        self.entities.insert(entity.key(), entity);
    }

    fn take(&mut self, key: &EntityKey) -> Option<Entity> {
        let entity = self.entities.remove(key)?;
        if let Entity::Split(split) = &entity {
            if let Some(ids) = self.children.get_mut(&split.transaction_id) {
                ids.remove(&split.id);
                if ids.is_empty() {
                    self.children.remove(&split.transaction_id);
                }
            }
        }
        Some(entity)
    }
}
