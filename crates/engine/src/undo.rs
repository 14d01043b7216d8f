//! Recording of undoable changes and the bounded undo/redo history.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::{
    ChangeOrigin, ChangeSet, Entity, EntityKey, EntityWrite, EngineError, ResultEngine, Selection,
};

/// State of one entity before and after a unit. `None` means absent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotPair {
    pub before: Option<Entity>,
    pub after: Option<Entity>,
}

impl SnapshotPair {
    pub fn key(&self) -> Option<EntityKey> {
        self.after
            .as_ref()
            .or(self.before.as_ref())
            .map(Entity::key)
    }

    pub fn is_noop(&self) -> bool {
        self.before == self.after
    }
}

/// Coalesces mutations of an open scope: one pair per entity key, keeping
/// the first observed before and the last observed after.
#[derive(Clone, Debug, Default)]
pub struct ChangeRecorder {
    order: Vec<EntityKey>,
    records: HashMap<EntityKey, SnapshotPair>,
}

impl ChangeRecorder {
    pub fn record(&mut self, key: EntityKey, before: Option<Entity>, after: Option<Entity>) {
        match self.records.get_mut(&key) {
            Some(pair) => pair.after = after,
            None => {
                self.order.push(key);
                self.records.insert(key, SnapshotPair { before, after });
            }
        }
    }

    pub fn get(&self, key: &EntityKey) -> Option<&SnapshotPair> {
        self.records.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Pairs in first-recorded order.
    pub fn pairs(&self) -> impl Iterator<Item = &SnapshotPair> {
        self.order.iter().filter_map(|key| self.records.get(key))
    }

    /// Consume the recorder, dropping pairs whose net effect is nothing.
    pub fn into_net_pairs(mut self) -> Vec<SnapshotPair> {
        self.order
            .iter()
            .filter_map(|key| self.records.remove(key))
            .filter(|pair| !pair.is_noop())
            .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Forward,
    Backward,
}

/// One atomic, reversible batch of entity changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UndoUnit {
    caption: String,
    selection: Selection,
    pairs: Vec<SnapshotPair>,
}

impl UndoUnit {
    /// Build a unit, rejecting structurally malformed pairs.
    pub fn new(
        caption: impl Into<String>,
        selection: Selection,
        pairs: Vec<SnapshotPair>,
    ) -> ResultEngine<Self> {
        let mut seen = HashSet::with_capacity(pairs.len());
        for pair in &pairs {
            let key = match (&pair.before, &pair.after) {
                (None, None) => {
                    return Err(EngineError::Invariant(
                        "undo unit holds an empty snapshot pair".to_string(),
                    ));
                }
                (Some(before), Some(after)) if before.key() != after.key() => {
                    return Err(EngineError::Invariant(format!(
                        "snapshot pair mixes {} and {}",
                        before.key(),
                        after.key()
                    )));
                }
                (Some(entity), _) | (None, Some(entity)) => entity.key(),
            };
            if !seen.insert(key) {
                return Err(EngineError::Invariant(format!(
                    "{key} appears twice in one undo unit"
                )));
            }
        }
        Ok(Self {
            caption: caption.into(),
            selection,
            pairs,
        })
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn pairs(&self) -> &[SnapshotPair] {
        &self.pairs
    }

    /// Store writes that move storage from the befores to the afters.
    pub fn forward_writes(&self) -> Vec<EntityWrite> {
        ordered_writes(self.pairs.iter().map(|pair| pair_write(pair, Direction::Forward)))
    }

    /// Store writes that restore the befores, in reverse recorded order.
    pub fn backward_writes(&self) -> Vec<EntityWrite> {
        ordered_writes(
            self.pairs
                .iter()
                .rev()
                .map(|pair| pair_write(pair, Direction::Backward)),
        )
    }

    pub fn change_set(&self, origin: ChangeOrigin) -> ChangeSet {
        let mut set = ChangeSet::new(origin);
        let iter: Box<dyn Iterator<Item = &SnapshotPair>> = match origin {
            ChangeOrigin::Undo => Box::new(self.pairs.iter().rev()),
            ChangeOrigin::Commit | ChangeOrigin::Redo => Box::new(self.pairs.iter()),
        };
        for pair in iter {
            let (from, to) = match origin {
                ChangeOrigin::Undo => (&pair.after, &pair.before),
                ChangeOrigin::Commit | ChangeOrigin::Redo => (&pair.before, &pair.after),
            };
            match (from, to) {
                (None, Some(entity)) => set.inserted.push(entity.clone()),
                (Some(entity), None) => set.deleted.push(entity.clone()),
                (Some(before), Some(after)) => {
                    set.changed.push((before.clone(), after.clone()));
                }
                (None, None) => {}
            }
        }
        set
    }
}

fn pair_write(pair: &SnapshotPair, direction: Direction) -> Option<EntityWrite> {
    let (from, to) = match direction {
        Direction::Forward => (&pair.before, &pair.after),
        Direction::Backward => (&pair.after, &pair.before),
    };
    match (from, to) {
        (None, Some(entity)) => Some(EntityWrite::Insert(entity.clone())),
        (Some(_), Some(entity)) => Some(EntityWrite::Update(entity.clone())),
        (Some(entity), None) => Some(EntityWrite::Delete(entity.key())),
        (None, None) => None,
    }
}

/// Inserts parents-first, then updates, then deletes children-first. The
/// sort is stable so recorded order survives inside each group.
fn ordered_writes(writes: impl Iterator<Item = Option<EntityWrite>>) -> Vec<EntityWrite> {
    let mut writes: Vec<EntityWrite> = writes.flatten().collect();
    writes.sort_by_key(|write| match write {
        EntityWrite::Insert(entity) => (0, entity.kind().rank()),
        EntityWrite::Update(entity) => (1, entity.kind().rank()),
        EntityWrite::Delete(key) => (2, u8::MAX - key.kind.rank()),
    });
    writes
}

/// Bounded LIFO undo stack plus redo stack, without branching.
#[derive(Clone, Debug)]
pub struct UndoHistory {
    capacity: usize,
    undo: VecDeque<UndoUnit>,
    redo: Vec<UndoUnit>,
}

impl UndoHistory {
    pub const DEFAULT_CAPACITY: usize = 100;

    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            undo: VecDeque::with_capacity(capacity.min(Self::DEFAULT_CAPACITY)),
            redo: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record a freshly committed unit; the redo stack is cleared.
    pub fn push(&mut self, unit: UndoUnit) {
        self.redo.clear();
        self.push_undo(unit);
    }

    pub(crate) fn push_undo(&mut self, unit: UndoUnit) {
        if self.capacity == 0 {
            return;
        }
        while self.undo.len() >= self.capacity {
            self.undo.pop_front();
        }
        self.undo.push_back(unit);
    }

    pub(crate) fn pop_undo(&mut self) -> Option<UndoUnit> {
        self.undo.pop_back()
    }

    pub(crate) fn push_redo(&mut self, unit: UndoUnit) {
        self.redo.push(unit);
    }

    pub(crate) fn pop_redo(&mut self) -> Option<UndoUnit> {
        self.redo.pop()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_caption(&self) -> Option<&str> {
        self.undo.back().map(UndoUnit::caption)
    }

    pub fn redo_caption(&self) -> Option<&str> {
        self.redo.last().map(UndoUnit::caption)
    }

    /// Undo captions, most recent first.
    pub fn undo_captions(&self) -> impl Iterator<Item = &str> {
        self.undo.iter().rev().map(UndoUnit::caption)
    }
}

impl Default for UndoHistory {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
