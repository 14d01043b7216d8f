//! Keeping account ledgers and the net worth in step with committed changes.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;
use uuid::Uuid;

use crate::{
    ChangeSet, Entity, EntityKey, EntityStore, Ledger, LedgerEntry, state::EntityState,
};

use super::Document;

/// Projection of one source (a transaction or a split) into one account.
fn project(state: &EntityState, source_id: Uuid, account_id: Uuid) -> Option<LedgerEntry> {
    if let Some(tx) = state
        .get(&EntityKey::transaction(source_id))
        .and_then(Entity::as_transaction)
    {
        return tx
            .amount_for(account_id)
            .map(|amount| LedgerEntry::for_transaction(tx, amount));
    }
    let split = state
        .get(&EntityKey::split(source_id))
        .and_then(Entity::as_split)?;
    if split.target.transfer_account() != Some(account_id) {
        return None;
    }
    let parent = state
        .get(&EntityKey::transaction(split.transaction_id))
        .and_then(Entity::as_transaction)?;
    Some(LedgerEntry::for_split(split, parent))
}

/// Every entry of every account, in one pass over the state.
fn project_all(state: &EntityState) -> HashMap<Uuid, Vec<LedgerEntry>> {
    let mut buckets: HashMap<Uuid, Vec<LedgerEntry>> = state
        .accounts()
        .map(|account| (account.id, Vec::new()))
        .collect();
    for tx in state.transactions() {
        for account_id in tx.account_ids() {
            if let (Some(bucket), Some(amount)) =
                (buckets.get_mut(&account_id), tx.amount_for(account_id))
            {
                bucket.push(LedgerEntry::for_transaction(tx, amount));
            }
        }
    }
    for split in state.splits() {
        let Some(account_id) = split.target.transfer_account() else {
            continue;
        };
        if let Some(entry) = project(state, split.id, account_id) {
            if let Some(bucket) = buckets.get_mut(&account_id) {
                bucket.push(entry);
            }
        }
    }
    buckets
}

impl<S: EntityStore> Document<S> {
    pub(crate) fn rebuild_ledgers(&mut self) {
        self.ledgers = project_all(&self.state)
            .into_iter()
            .map(|(account_id, entries)| (account_id, Ledger::from_entries(account_id, entries)))
            .collect();
        let account_ids: Vec<Uuid> = self.ledgers.keys().copied().collect();
        self.refresh_net_worth(&account_ids);
    }

    /// Bring the ledgers of the accounts touched by `changes` up to date
    /// with the committed state.
    pub(crate) fn refresh_ledgers(&mut self, changes: &ChangeSet) {
        let mut accounts = changes.account_ids();
        let mut sources: BTreeSet<Uuid> = BTreeSet::new();
        for entity in changes.entities() {
            match entity {
                Entity::Transaction(tx) => {
                    sources.insert(tx.id);
                    // Transfer splits repeat the parent's date and payee.
                    for split_id in self.state.children_of(tx.id) {
                        sources.insert(split_id);
                        if let Some(target) = self
                            .state
                            .get(&EntityKey::split(split_id))
                            .and_then(Entity::as_split)
                            .and_then(|split| split.target.transfer_account())
                        {
                            accounts.insert(target);
                        }
                    }
                }
                Entity::Split(split) => {
                    sources.insert(split.id);
                }
                Entity::Account(_) | Entity::Category(_) => {}
            }
        }

        for &account_id in &accounts {
            let exists = self
                .state
                .get(&EntityKey::account(account_id))
                .is_some();
            if !exists {
                self.ledgers.remove(&account_id);
                continue;
            }
            let state = &self.state;
            let ledger = self
                .ledgers
                .entry(account_id)
                .or_insert_with(|| Ledger::new(account_id));
            for &source_id in &sources {
                let desired = project(state, source_id, account_id);
                let unchanged = ledger.get(source_id).map(|current| {
                    desired
                        .as_ref()
                        .is_some_and(|entry| current.same_projection(entry))
                });
                match (unchanged, desired) {
                    (None, Some(entry)) => {
                        ledger.insert(entry);
                    }
                    (Some(_), None) => {
                        ledger.remove(source_id);
                    }
                    (Some(false), Some(entry)) => {
                        ledger.reposition(entry);
                    }
                    _ => {}
                }
            }
            debug_assert!(ledger.is_consistent());
        }

        let accounts: Vec<Uuid> = accounts.into_iter().collect();
        self.refresh_net_worth(&accounts);
        debug!(
            accounts = accounts.len(),
            sources = sources.len(),
            "ledgers refreshed"
        );
    }

    fn refresh_net_worth(&mut self, account_ids: &[Uuid]) {
        for &account_id in account_ids {
            let account = self
                .state
                .get(&EntityKey::account(account_id))
                .and_then(Entity::as_account);
            self.net_worth
                .refresh(account_id, account, self.ledgers.get(&account_id));
        }
    }
}
