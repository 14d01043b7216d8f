//! Persistence contract for the document.
//!
//! A store only has to answer queries and apply a batch of writes
//! atomically: either every write of the batch lands or none does.

use async_trait::async_trait;

use crate::{Entity, EntityFilter, EntityWrite, ResultEngine};

mod db;
mod memory;

pub use db::DbStore;
pub use memory::MemoryStore;

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn query(&self, filter: EntityFilter) -> ResultEngine<Vec<Entity>>;

    /// Apply every write or none of them. Inserting an existing key fails
    /// with `ExistingKey`, updating or deleting a missing one with
    /// `KeyNotFound`.
    async fn apply(&mut self, writes: &[EntityWrite]) -> ResultEngine<()>;
}
