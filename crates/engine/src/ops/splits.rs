//! Split coordination.
//!
//! Once a transaction owns split lines its category is the `Split` sentinel
//! and its amount is derived: the signed amount on its home side is always
//! the sum of the lines. The home side flips between credit and debit with
//! the sign of that sum.

use uuid::Uuid;

use crate::{
    CategoryRef, EngineError, EntityKey, EntityStore, Money, ResultEngine, SplitEntry,
    SplitTarget, Transaction, util::normalize_optional_text,
};

use super::Document;

fn home_of(tx: &Transaction) -> ResultEngine<Uuid> {
    tx.home_account().ok_or_else(|| {
        EngineError::Invariant(format!("split transaction {} is not single-sided", tx.id))
    })
}

impl<S: EntityStore> Document<S> {
    /// Append a split line to a transaction.
    ///
    /// The first line takes over the transaction's amount and category, or
    /// its counterpart for a transfer, so the total does not change. Further
    /// lines start empty.
    pub fn new_split(&mut self, transaction_id: Uuid) -> ResultEngine<Uuid> {
        let mut parent = self.require_transaction(transaction_id)?.clone();
        let mut split = SplitEntry::new(transaction_id);

        if !parent.is_split() {
            let (home, target) = match (&parent.debit, &parent.credit) {
                (Some(debit), Some(credit)) => {
                    (debit.account_id, SplitTarget::Transfer(credit.account_id))
                }
                _ => {
                    let target = match parent.category {
                        CategoryRef::Category(category_id) => SplitTarget::Category(category_id),
                        CategoryRef::None | CategoryRef::Split => SplitTarget::None,
                    };
                    (home_of(&parent)?, target)
                }
            };
            let amount = parent.amount_for(home).unwrap_or_default();
            split.amount = amount;
            split.target = target;
            parent.set_single_sided(home, amount);
            parent.category = CategoryRef::Split;
            self.update(parent)?;
        }
        self.insert(split)
    }

    fn split_with_parent(&self, split_id: Uuid) -> ResultEngine<(SplitEntry, Transaction)> {
        let split = self.require_split(split_id)?.clone();
        let parent = self.require_transaction(split.transaction_id)?.clone();
        Ok((split, parent))
    }

    /// Re-derive the parent amount from its lines.
    fn sync_parent_amount(&mut self, mut parent: Transaction) -> ResultEngine<()> {
        let home = home_of(&parent)?;
        let lines = self.splits_of(parent.id);
        let sum = Money::checked_sum(lines.iter().map(|split| split.amount))?;
        parent.set_single_sided(home, sum);
        self.update(parent)
    }

    pub fn set_split_amount(&mut self, split_id: Uuid, amount: Money) -> ResultEngine<()> {
        let (mut split, parent) = self.split_with_parent(split_id)?;
        split.amount = amount;
        self.update(split)?;
        self.sync_parent_amount(parent)
    }

    pub fn set_split_target(&mut self, split_id: Uuid, target: SplitTarget) -> ResultEngine<()> {
        let (mut split, parent) = self.split_with_parent(split_id)?;
        match target {
            SplitTarget::None => {}
            SplitTarget::Category(category_id) => {
                self.require_category(category_id)?;
            }
            SplitTarget::Transfer(account_id) => {
                self.require_account(account_id)?;
                if parent.home_account() == Some(account_id) {
                    return Err(EngineError::Validation(
                        "a split cannot transfer into the account of its transaction".to_string(),
                    ));
                }
            }
        }
        split.target = target;
        self.update(split)
    }

    pub fn set_split_memo(&mut self, split_id: Uuid, memo: Option<&str>) -> ResultEngine<()> {
        let (mut split, _) = self.split_with_parent(split_id)?;
        split.memo = normalize_optional_text(memo);
        self.update(split)
    }

    /// Remove one line.
    ///
    /// With a single line left the transaction absorbs its amount, target
    /// and memo and stops being split; with none left it reverts to an
    /// empty, uncategorized transaction.
    pub fn delete_split(&mut self, transaction_id: Uuid, split_id: Uuid) -> ResultEngine<()> {
        let (split, parent) = self.split_with_parent(split_id)?;
        if split.transaction_id != transaction_id {
            return Err(EngineError::KeyNotFound("split not exists".to_string()));
        }
        self.delete(EntityKey::split(split_id))?;

        let remaining: Vec<SplitEntry> = self
            .splits_of(transaction_id)
            .into_iter()
            .cloned()
            .collect();
        match remaining.as_slice() {
            [] => {
                let mut parent = parent;
                let home = home_of(&parent)?;
                parent.set_single_sided(home, Money::ZERO);
                parent.category = CategoryRef::None;
                self.update(parent)
            }
            [last] => self.absorb(parent, last),
            _ => self.sync_parent_amount(parent),
        }
    }

    /// Merge every line into the transaction: the amount becomes the sum and
    /// target and memo survive only when exactly one line exists.
    pub fn collapse_splits(&mut self, transaction_id: Uuid) -> ResultEngine<()> {
        let mut parent = self.require_transaction(transaction_id)?.clone();
        if !parent.is_split() {
            return Err(EngineError::Validation(
                "transaction is not split".to_string(),
            ));
        }
        let lines: Vec<SplitEntry> = self
            .splits_of(transaction_id)
            .into_iter()
            .cloned()
            .collect();
        if let [only] = lines.as_slice() {
            return self.absorb(parent, only);
        }

        let home = home_of(&parent)?;
        let sum = Money::checked_sum(lines.iter().map(|split| split.amount))?;
        for line in &lines {
            self.delete(EntityKey::split(line.id))?;
        }
        parent.set_single_sided(home, sum);
        parent.category = CategoryRef::None;
        self.update(parent)
    }

    /// `true` when collapsing would drop data of two or more lines, so the
    /// caller should confirm first.
    pub fn collapse_would_lose_data(&self, transaction_id: Uuid) -> ResultEngine<bool> {
        self.require_transaction(transaction_id)?;
        let meaningful = self
            .splits_of(transaction_id)
            .iter()
            .filter(|split| !split.is_trivial())
            .count();
        Ok(meaningful >= 2)
    }

    /// Fold the last line into its parent and delete it.
    fn absorb(&mut self, mut parent: Transaction, line: &SplitEntry) -> ResultEngine<()> {
        let home = home_of(&parent)?;
        self.delete(EntityKey::split(line.id))?;
        match line.target {
            SplitTarget::Transfer(other) => {
                parent.category = CategoryRef::None;
                parent.set_transfer(home, other, line.amount);
            }
            SplitTarget::Category(category_id) => {
                parent.category = CategoryRef::Category(category_id);
                parent.set_single_sided(home, line.amount);
            }
            SplitTarget::None => {
                parent.category = CategoryRef::None;
                parent.set_single_sided(home, line.amount);
            }
        }
        if line.memo.is_some() {
            parent.memo = line.memo.clone();
        }
        self.update(parent)
    }
}
