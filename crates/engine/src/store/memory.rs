use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::{Entity, EntityFilter, EntityKey, EntityWrite, EngineError, ResultEngine};

use super::EntityStore;

/// Store kept entirely in memory, for tests and throwaway documents.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    rows: BTreeMap<EntityKey, Entity>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store without going through a document.
    pub fn with_entities(entities: impl IntoIterator<Item = Entity>) -> Self {
        Self {
            rows: entities
                .into_iter()
                .map(|entity| (entity.key(), entity))
                .collect(),
        }
    }

    pub fn get(&self, key: &EntityKey) -> Option<&Entity> {
        self.rows.get(key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn apply_write(rows: &mut BTreeMap<EntityKey, Entity>, write: &EntityWrite) -> ResultEngine<()> {
    let key = write.key();
    match write {
        EntityWrite::Insert(entity) => {
            if rows.contains_key(&key) {
                return Err(EngineError::ExistingKey(key.to_string()));
            }
            rows.insert(key, entity.clone());
        }
        EntityWrite::Update(entity) => {
            let row = rows
                .get_mut(&key)
                .ok_or_else(|| EngineError::KeyNotFound(key.to_string()))?;
            *row = entity.clone();
        }
        EntityWrite::Delete(_) => {
            rows.remove(&key)
                .ok_or_else(|| EngineError::KeyNotFound(key.to_string()))?;
        }
    }
    Ok(())
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn query(&self, filter: EntityFilter) -> ResultEngine<Vec<Entity>> {
        if let EntityFilter::Key(key) = filter {
            return Ok(self.rows.get(&key).cloned().into_iter().collect());
        }
        Ok(self
            .rows
            .values()
            .filter(|entity| filter.matches(entity))
            .cloned()
            .collect())
    }

    async fn apply(&mut self, writes: &[EntityWrite]) -> ResultEngine<()> {
        // Work on a copy and swap it in only once the whole batch succeeded.
        let mut staged = self.rows.clone();
        for write in writes {
            apply_write(&mut staged, write)?;
        }
        self.rows = staged;
        Ok(())
    }
}
