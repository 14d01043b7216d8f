//! Undoable scopes, commit, undo and redo.

use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    ChangeOrigin, EngineError, Entity, EntityKey, EntityStore, ResultEngine, Selection, UndoUnit,
    undo::ChangeRecorder,
};

use super::{Document, OpenScope};

/// What an outermost `commit` did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// An inner scope was closed; nothing was persisted yet.
    Nested,
    /// The scope closed without net changes, no undo unit was pushed.
    NoChanges,
    /// The changes of `entities` entities were persisted as one unit.
    Committed { entities: usize },
}

/// Returned by a successful undo or redo.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UndoOutcome {
    pub caption: String,
    pub selection: Selection,
}

impl<S: EntityStore> Document<S> {
    /// Open an undoable scope, or join the one already open. Captions and
    /// selections of inner scopes are discarded.
    pub fn begin(&mut self, caption: impl Into<String>, selection: Selection) -> ResultEngine<()> {
        self.ensure_healthy()?;
        match self.scope.as_mut() {
            Some(scope) => {
                scope.depth += 1;
                debug!(depth = scope.depth, "joined undoable scope");
            }
            None => {
                let caption = caption.into();
                debug!(%caption, "undoable scope opened");
                self.scope = Some(OpenScope {
                    caption,
                    selection,
                    depth: 1,
                    recorder: Default::default(),
                });
            }
        }
        Ok(())
    }

    /// Close one scope level. The outermost commit validates the staged
    /// changes and persists them as one atomic batch.
    ///
    /// A validation error leaves the scope open so the caller can fix the
    /// changes or [`cancel`](Self::cancel). A storage error discards the
    /// scope, the document keeps the last persisted state.
    pub async fn commit(&mut self) -> ResultEngine<CommitOutcome> {
        self.ensure_healthy()?;
        let scope = self.scope.as_mut().ok_or(EngineError::ScopeNotOpen)?;
        if scope.depth > 1 {
            scope.depth -= 1;
            return Ok(CommitOutcome::Nested);
        }
        if scope.recorder.pairs().all(|pair| pair.is_noop()) {
            self.scope = None;
            debug!("undoable scope closed without changes");
            return Ok(CommitOutcome::NoChanges);
        }

        self.validate_scope()?;

        let scope = self.scope.take().ok_or(EngineError::ScopeNotOpen)?;
        let pairs = scope.recorder.into_net_pairs();
        let unit = UndoUnit::new(scope.caption, scope.selection, pairs).inspect_err(|err| {
            error!(%err, "malformed undo unit");
        })?;
        let writes = unit.forward_writes();
        if let Err(err) = self.store.apply(&writes).await {
            error!(%err, caption = unit.caption(), "commit failed, scope discarded");
            return Err(err);
        }
        self.settle(&unit, ChangeOrigin::Commit)?;

        let entities = unit.pairs().len();
        debug!(caption = unit.caption(), entities, "undoable scope committed");
        self.history.push(unit);
        Ok(CommitOutcome::Committed { entities })
    }

    /// Discard the whole open scope, nested levels included.
    pub fn cancel(&mut self) -> ResultEngine<()> {
        let scope = self.scope.take().ok_or(EngineError::ScopeNotOpen)?;
        debug!(caption = %scope.caption, "undoable scope cancelled");
        Ok(())
    }

    /// Run `body` inside its own scope level and commit it. On error the
    /// level is closed again: an outermost scope is cancelled, a nested one
    /// drops whatever `body` staged and is left to its outer owner.
    pub async fn transact<T>(
        &mut self,
        caption: impl Into<String>,
        selection: Selection,
        body: impl FnOnce(&mut Self) -> ResultEngine<T>,
    ) -> ResultEngine<T> {
        let outer = self.scope.as_ref().map(|scope| scope.recorder.clone());
        self.begin(caption, selection)?;
        let value = match body(self) {
            Ok(value) => value,
            Err(err) => {
                self.abandon_level(outer);
                return Err(err);
            }
        };
        match self.commit().await {
            Ok(_) => Ok(value),
            Err(err) => {
                if self.scope.is_some() {
                    self.abandon_level(outer);
                }
                Err(err)
            }
        }
    }

    /// Close the level opened by `transact`. `outer` is the recorder of the
    /// enclosing scope as it was before the level began.
    fn abandon_level(&mut self, outer: Option<ChangeRecorder>) {
        match (outer, self.scope.as_mut()) {
            (Some(recorder), Some(scope)) => {
                scope.depth = scope.depth.saturating_sub(1).max(1);
                scope.recorder = recorder;
                debug!(depth = scope.depth, "nested scope level rolled back");
            }
            _ => self.scope = None,
        }
    }

    /// Revert the most recent unit.
    pub async fn undo(&mut self) -> ResultEngine<UndoOutcome> {
        self.ensure_healthy()?;
        if self.scope.is_some() {
            return Err(EngineError::ScopeOpen);
        }
        let unit = self.history.pop_undo().ok_or(EngineError::NothingToUndo)?;
        if let Err(err) = self.store.apply(&unit.backward_writes()).await {
            error!(%err, caption = unit.caption(), "undo failed");
            self.history.push_undo(unit);
            return Err(err);
        }
        self.settle(&unit, ChangeOrigin::Undo)?;
        info!(caption = unit.caption(), "undone");
        let outcome = UndoOutcome {
            caption: unit.caption().to_string(),
            selection: unit.selection(),
        };
        self.history.push_redo(unit);
        Ok(outcome)
    }

    /// Reapply the most recently undone unit.
    pub async fn redo(&mut self) -> ResultEngine<UndoOutcome> {
        self.ensure_healthy()?;
        if self.scope.is_some() {
            return Err(EngineError::ScopeOpen);
        }
        let unit = self.history.pop_redo().ok_or(EngineError::NothingToRedo)?;
        if let Err(err) = self.store.apply(&unit.forward_writes()).await {
            error!(%err, caption = unit.caption(), "redo failed");
            self.history.push_redo(unit);
            return Err(err);
        }
        self.settle(&unit, ChangeOrigin::Redo)?;
        info!(caption = unit.caption(), "redone");
        let outcome = UndoOutcome {
            caption: unit.caption().to_string(),
            selection: unit.selection(),
        };
        self.history.push_undo(unit);
        Ok(outcome)
    }

    /// Apply a persisted unit to memory, refresh the derived views and
    /// notify subscribers once.
    fn settle(&mut self, unit: &UndoUnit, origin: ChangeOrigin) -> ResultEngine<()> {
        let backward = origin == ChangeOrigin::Undo;
        if let Err(err) = self.state.apply_pairs(unit.pairs(), backward) {
            self.poisoned = true;
            error!(%err, caption = unit.caption(), "document poisoned");
            return Err(err);
        }
        let changes = unit.change_set(origin);
        self.refresh_ledgers(&changes);
        self.bus.publish(&changes);
        Ok(())
    }

    fn ensure_scope(&self) -> ResultEngine<()> {
        self.ensure_healthy()?;
        if self.scope.is_none() {
            return Err(EngineError::ScopeNotOpen);
        }
        Ok(())
    }

    fn record(&mut self, key: EntityKey, after: Option<Entity>) -> ResultEngine<()> {
        let before = self.state.get(&key).cloned();
        let scope = self.scope.as_mut().ok_or(EngineError::ScopeNotOpen)?;
        scope.recorder.record(key, before, after);
        Ok(())
    }

    /// Stage a new entity in the open scope.
    pub fn insert(&mut self, entity: impl Into<Entity>) -> ResultEngine<Uuid> {
        self.ensure_scope()?;
        let entity = entity.into();
        let key = entity.key();
        if self.entity(&key).is_some() {
            return Err(EngineError::ExistingKey(key.to_string()));
        }
        self.record(key, Some(entity))?;
        Ok(key.id)
    }

    /// Stage a new version of an existing entity.
    pub fn update(&mut self, entity: impl Into<Entity>) -> ResultEngine<()> {
        self.ensure_scope()?;
        let entity = entity.into();
        let key = entity.key();
        if self.entity(&key).is_none() {
            return Err(EngineError::KeyNotFound(key.to_string()));
        }
        self.record(key, Some(entity))
    }

    /// Stage the removal of an entity, returning its last version.
    pub fn delete(&mut self, key: EntityKey) -> ResultEngine<Entity> {
        self.ensure_scope()?;
        let current = self
            .entity(&key)
            .cloned()
            .ok_or_else(|| EngineError::KeyNotFound(key.to_string()))?;
        self.record(key, None)?;
        Ok(current)
    }
}
