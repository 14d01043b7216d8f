//! Per-account ordered view with running balances.
//!
//! A [`Ledger`] keeps its entries sorted by `(when asc, amount desc, id asc,
//! payee asc)` and caches the running balance on every entry:
//!
//! - `balance(e[0]) = amount(e[0])`
//! - `balance(e[i]) = balance(e[i - 1]) + amount(e[i])`
//!
//! Edits only walk forward from the disturbed index and stop as soon as a
//! recomputed balance matches the cached one past the disturbed range.

use std::{cmp::Ordering, collections::HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{Money, SplitEntry, Transaction};

/// What a ledger entry projects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntrySource {
    Transaction,
    /// A split line targeting this account; `transaction_id` is the parent.
    Split { transaction_id: Uuid },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    /// Transaction id, or split id for split projections.
    pub id: Uuid,
    pub source: EntrySource,
    pub when: DateTime<Utc>,
    pub payee: Option<String>,
    pub amount: Money,
    pub balance: Money,
}

impl LedgerEntry {
    pub fn new(id: Uuid, when: DateTime<Utc>, amount: Money) -> Self {
        Self {
            id,
            source: EntrySource::Transaction,
            when,
            payee: None,
            amount,
            balance: Money::ZERO,
        }
    }

    pub(crate) fn for_transaction(tx: &Transaction, amount: Money) -> Self {
        Self {
            id: tx.id,
            source: EntrySource::Transaction,
            when: tx.when,
            payee: tx.payee.clone(),
            amount,
            balance: Money::ZERO,
        }
    }

    /// The split seen from the target account, so the sign is reversed.
    pub(crate) fn for_split(split: &SplitEntry, parent: &Transaction) -> Self {
        Self {
            id: split.id,
            source: EntrySource::Split {
                transaction_id: parent.id,
            },
            when: parent.when,
            payee: parent.payee.clone(),
            amount: -split.amount,
            balance: Money::ZERO,
        }
    }

    /// `true` when both entries sort and display the same, ignoring balance.
    pub(crate) fn same_projection(&self, other: &LedgerEntry) -> bool {
        self.id == other.id
            && self.source == other.source
            && self.when == other.when
            && self.payee == other.payee
            && self.amount == other.amount
    }

    /// The ledger total order.
    pub fn order(&self, other: &LedgerEntry) -> Ordering {
        self.when
            .cmp(&other.when)
            .then_with(|| other.amount.cmp(&self.amount))
            .then_with(|| self.id.cmp(&other.id))
            .then_with(|| self.payee.cmp(&other.payee))
    }
}

#[derive(Clone, Debug, Default)]
pub struct Ledger {
    account_id: Uuid,
    entries: Vec<LedgerEntry>,
    ids: HashSet<Uuid>,
}

impl Ledger {
    pub fn new(account_id: Uuid) -> Self {
        Self {
            account_id,
            entries: Vec::new(),
            ids: HashSet::new(),
        }
    }

    /// Build a ledger from unordered entries.
    pub fn from_entries(account_id: Uuid, mut entries: Vec<LedgerEntry>) -> Self {
        entries.sort_by(LedgerEntry::order);
        let ids = entries.iter().map(|entry| entry.id).collect();
        let mut ledger = Self {
            account_id,
            entries,
            ids,
        };
        ledger.rebuild_balances();
        ledger
    }

    pub fn account_id(&self) -> Uuid {
        self.account_id
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.ids.contains(&id)
    }

    pub fn get(&self, id: Uuid) -> Option<&LedgerEntry> {
        self.position(id).map(|index| &self.entries[index])
    }

    pub fn position(&self, id: Uuid) -> Option<usize> {
        if !self.contains(id) {
            return None;
        }
        self.entries.iter().position(|entry| entry.id == id)
    }

    /// Balance after the last entry.
    pub fn balance(&self) -> Money {
        self.entries
            .last()
            .map_or(Money::ZERO, |entry| entry.balance)
    }

    /// Insert a new entry at its sorted position and return that position.
    pub fn insert(&mut self, entry: LedgerEntry) -> usize {
        debug_assert!(
            !self.ids.contains(&entry.id),
            "entry {} already in ledger {}",
            entry.id,
            self.account_id
        );
        let index = self.sorted_index(&entry);
        self.ids.insert(entry.id);
        self.entries.insert(index, entry);
        self.recompute(index, index + 1);
        index
    }

    /// Remove the entry with `id`, returning it.
    pub fn remove(&mut self, id: Uuid) -> Option<LedgerEntry> {
        let index = self.position(id)?;
        self.ids.remove(&id);
        let removed = self.entries.remove(index);
        self.recompute(index, index);
        Some(removed)
    }

    /// Replace the entry with the same id, moving it to its new sorted
    /// position. Unknown ids are inserted.
    pub fn reposition(&mut self, entry: LedgerEntry) -> usize {
        let Some(old) = self.position(entry.id) else {
            debug_assert!(false, "entry {} not in ledger {}", entry.id, self.account_id);
            return self.insert(entry);
        };
        self.entries.remove(old);
        let new = self.sorted_index(&entry);
        self.entries.insert(new, entry);
        self.recompute(old.min(new), old.max(new) + 1);
        new
    }

    /// Recompute every balance from scratch.
    pub fn rebuild_balances(&mut self) {
        let len = self.entries.len();
        self.recompute(0, len);
    }

    /// `true` when every cached balance matches the running sum.
    pub fn is_consistent(&self) -> bool {
        let mut running = Money::ZERO;
        self.entries.iter().all(|entry| {
            running = running.wrapping_add(entry.amount);
            entry.balance == running
        })
    }

    fn sorted_index(&self, entry: &LedgerEntry) -> usize {
        self.entries
            .partition_point(|probe| probe.order(entry) == Ordering::Less)
    }

    /// Walk forward from `start`. Indices below `settled_from` are always
    /// rewritten; from there on the walk stops at the first cached balance
    /// that already matches.
    ///
    /// A refresh passes through mixes of old and new entries that were never
    /// validated, so partial sums wrap. Committed contents always fit, and
    /// the wrapped balances then equal the exact ones.
    fn recompute(&mut self, start: usize, settled_from: usize) {
        let mut running = match start {
            0 => Money::ZERO,
            _ => self.entries[start - 1].balance,
        };
        for (index, entry) in self.entries.iter_mut().enumerate().skip(start) {
            running = running.wrapping_add(entry.amount);
            if index >= settled_from && entry.balance == running {
                break;
            }
            entry.balance = running;
        }
    }
}
