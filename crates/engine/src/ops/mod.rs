use std::collections::{BTreeSet, HashMap};

use tracing::info;
use uuid::Uuid;

use crate::{
    Account, Category, ChangeBus, ChangeSet, EngineError, Entity, EntityFilter, EntityKey,
    EntityKind, EntityStore, Ledger, LedgerEntry, Money, NetWorth, ResultEngine, Selection,
    SplitEntry, SubscriptionId, Transaction, UndoHistory, state::EntityState,
    undo::ChangeRecorder,
};

mod accounts;
mod categories;
mod ledgers;
mod scope;
mod splits;
mod transactions;
mod transfers;
mod validate;

pub use scope::{CommitOutcome, UndoOutcome};

/// The open undoable scope. Nested `begin` calls only bump `depth`.
#[derive(Debug)]
struct OpenScope {
    caption: String,
    selection: Selection,
    depth: usize,
    recorder: ChangeRecorder,
}

/// One open ledger document.
pub struct Document<S: EntityStore> {
    store: S,
    state: EntityState,
    ledgers: HashMap<Uuid, Ledger>,
    net_worth: NetWorth,
    history: UndoHistory,
    bus: ChangeBus,
    scope: Option<OpenScope>,
    poisoned: bool,
}

impl<S: EntityStore> std::fmt::Debug for Document<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("ledgers", &self.ledgers.len())
            .field("history", &self.history)
            .field("bus", &self.bus)
            .field("scope_open", &self.scope.is_some())
            .field("poisoned", &self.poisoned)
            .finish_non_exhaustive()
    }
}

/// Read access to the document as the open scope sees it: staged changes
/// first, committed state otherwise.
#[derive(Clone, Copy)]
pub(crate) struct View<'a> {
    state: &'a EntityState,
    recorder: Option<&'a ChangeRecorder>,
}

impl<'a> View<'a> {
    pub(crate) fn entity(&self, key: &EntityKey) -> Option<&'a Entity> {
        match self.recorder.and_then(|recorder| recorder.get(key)) {
            Some(pair) => pair.after.as_ref(),
            None => self.state.get(key),
        }
    }

    pub(crate) fn account(&self, id: Uuid) -> Option<&'a Account> {
        self.entity(&EntityKey::account(id))
            .and_then(Entity::as_account)
    }

    pub(crate) fn category(&self, id: Uuid) -> Option<&'a Category> {
        self.entity(&EntityKey::category(id))
            .and_then(Entity::as_category)
    }

    pub(crate) fn transaction(&self, id: Uuid) -> Option<&'a Transaction> {
        self.entity(&EntityKey::transaction(id))
            .and_then(Entity::as_transaction)
    }

    pub(crate) fn split(&self, id: Uuid) -> Option<&'a SplitEntry> {
        self.entity(&EntityKey::split(id))
            .and_then(Entity::as_split)
    }

    /// Splits of a parent in creation order.
    pub(crate) fn splits_of(&self, transaction_id: Uuid) -> Vec<&'a SplitEntry> {
        let mut ids: BTreeSet<Uuid> = self.state.children_of(transaction_id).collect();
        if let Some(recorder) = self.recorder {
            ids.extend(
                recorder
                    .pairs()
                    .filter_map(|pair| pair.after.as_ref().and_then(Entity::as_split))
                    .filter(|split| split.transaction_id == transaction_id)
                    .map(|split| split.id),
            );
        }
        ids.into_iter()
            .filter_map(|id| self.split(id))
            .filter(|split| split.transaction_id == transaction_id)
            .collect()
    }

    /// Every entity of `kind`, staged changes applied.
    pub(crate) fn all_of(&self, kind: EntityKind) -> Vec<&'a Entity> {
        let recorder = self.recorder;
        let mut entities: Vec<&'a Entity> = self
            .state
            .of_kind(kind)
            .filter(|entity| recorder.is_none_or(|r| r.get(&entity.key()).is_none()))
            .collect();
        if let Some(recorder) = recorder {
            entities.extend(
                recorder
                    .pairs()
                    .filter_map(|pair| pair.after.as_ref())
                    .filter(|entity| entity.kind() == kind),
            );
        }
        entities
    }
}

impl<S: EntityStore> Document<S> {
    /// Return a builder for `Document`. Help to build the struct.
    pub fn builder() -> DocumentBuilder<S> {
        DocumentBuilder::default()
    }

    pub(crate) fn view(&self) -> View<'_> {
        View {
            state: &self.state,
            recorder: self.scope.as_ref().map(|scope| &scope.recorder),
        }
    }

    pub fn entity(&self, key: &EntityKey) -> Option<&Entity> {
        self.view().entity(key)
    }

    pub fn account(&self, id: Uuid) -> Option<&Account> {
        self.view().account(id)
    }

    pub fn category(&self, id: Uuid) -> Option<&Category> {
        self.view().category(id)
    }

    pub fn transaction(&self, id: Uuid) -> Option<&Transaction> {
        self.view().transaction(id)
    }

    pub fn split(&self, id: Uuid) -> Option<&SplitEntry> {
        self.view().split(id)
    }

    pub fn splits_of(&self, transaction_id: Uuid) -> Vec<&SplitEntry> {
        self.view().splits_of(transaction_id)
    }

    /// Accounts sorted by name.
    pub fn accounts(&self) -> Vec<&Account> {
        let mut accounts: Vec<&Account> = self
            .view()
            .all_of(EntityKind::Account)
            .into_iter()
            .filter_map(Entity::as_account)
            .collect();
        accounts.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        accounts
    }

    /// Categories sorted by name.
    pub fn categories(&self) -> Vec<&Category> {
        let mut categories: Vec<&Category> = self
            .view()
            .all_of(EntityKind::Category)
            .into_iter()
            .filter_map(Entity::as_category)
            .collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        categories
    }

    /// Every transaction, oldest first.
    pub fn transactions(&self) -> Vec<&Transaction> {
        let mut transactions: Vec<&Transaction> = self
            .view()
            .all_of(EntityKind::Transaction)
            .into_iter()
            .filter_map(Entity::as_transaction)
            .collect();
        transactions.sort_by(|a, b| a.when.cmp(&b.when).then(a.id.cmp(&b.id)));
        transactions
    }

    /// Committed ledger of an account.
    pub fn ledger(&self, account_id: Uuid) -> Option<&[LedgerEntry]> {
        self.ledgers.get(&account_id).map(Ledger::entries)
    }

    pub fn balance(&self, account_id: Uuid) -> Option<Money> {
        self.ledgers.get(&account_id).map(Ledger::balance)
    }

    /// Sum of the balances of every open account.
    pub fn net_worth(&self) -> Money {
        self.net_worth.total()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_caption(&self) -> Option<&str> {
        self.history.undo_caption()
    }

    pub fn redo_caption(&self) -> Option<&str> {
        self.history.redo_caption()
    }

    pub fn history(&self) -> &UndoHistory {
        &self.history
    }

    pub fn is_scope_open(&self) -> bool {
        self.scope.is_some()
    }

    /// `true` once memory and storage diverged. A poisoned document refuses
    /// every further mutation and must be reopened.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub fn subscribe(&mut self, handler: impl FnMut(&ChangeSet) + 'static) -> SubscriptionId {
        self.bus.subscribe(handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn ensure_healthy(&self) -> ResultEngine<()> {
        if self.poisoned {
            return Err(EngineError::Inconsistent(
                "document diverged from storage and must be reopened".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn require_account(&self, id: Uuid) -> ResultEngine<&Account> {
        self.account(id)
            .ok_or_else(|| EngineError::KeyNotFound("account not exists".to_string()))
    }

    pub(crate) fn require_category(&self, id: Uuid) -> ResultEngine<&Category> {
        self.category(id)
            .ok_or_else(|| EngineError::KeyNotFound("category not exists".to_string()))
    }

    pub(crate) fn require_transaction(&self, id: Uuid) -> ResultEngine<&Transaction> {
        self.transaction(id)
            .ok_or_else(|| EngineError::KeyNotFound("transaction not exists".to_string()))
    }

    pub(crate) fn require_split(&self, id: Uuid) -> ResultEngine<&SplitEntry> {
        self.split(id)
            .ok_or_else(|| EngineError::KeyNotFound("split not exists".to_string()))
    }
}

/// The builder for `Document`
pub struct DocumentBuilder<S: EntityStore> {
    store: Option<S>,
    undo_capacity: usize,
}

impl<S: EntityStore> Default for DocumentBuilder<S> {
    fn default() -> Self {
        Self {
            store: None,
            undo_capacity: UndoHistory::DEFAULT_CAPACITY,
        }
    }
}

impl<S: EntityStore> DocumentBuilder<S> {
    /// Pass the required store
    pub fn store(mut self, store: S) -> DocumentBuilder<S> {
        self.store = Some(store);
        self
    }

    /// Maximum number of undoable units kept.
    pub fn undo_capacity(mut self, capacity: usize) -> DocumentBuilder<S> {
        self.undo_capacity = capacity;
        self
    }

    /// Construct `Document`, loading everything the store holds.
    pub async fn build(self) -> ResultEngine<Document<S>> {
        let store = self
            .store
            .ok_or_else(|| EngineError::Validation("a document needs a store".to_string()))?;
        let state = EntityState::from_entities(store.query(EntityFilter::All).await?)?;
        let mut document = Document {
            store,
            state,
            ledgers: HashMap::new(),
            net_worth: NetWorth::default(),
            history: UndoHistory::new(self.undo_capacity),
            bus: ChangeBus::default(),
            scope: None,
            poisoned: false,
        };
        document.rebuild_ledgers();
        info!(
            accounts = document.ledgers.len(),
            undo_capacity = self.undo_capacity,
            "document opened"
        );
        Ok(document)
    }
}
