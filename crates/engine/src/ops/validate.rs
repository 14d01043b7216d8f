//! Checks run by the outermost commit over the staged changes.
//!
//! Validation errors describe user-fixable input and leave the scope open.
//! Invariant errors mean an operation produced an impossible shape.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, error};
use uuid::Uuid;

use crate::{
    CategoryRef, EngineError, Entity, EntityKind, EntityStore, Money, ResultEngine, SplitEntry,
    SplitTarget, Transaction,
};

use super::{Document, View};

fn validation(message: impl Into<String>) -> EngineError {
    EngineError::Validation(message.into())
}

fn check_name(name: &str, label: &str) -> ResultEngine<()> {
    if name.trim().is_empty() {
        return Err(validation(format!("{label} name must not be empty")));
    }
    Ok(())
}

fn check_transaction(view: &View<'_>, tx: &Transaction) -> ResultEngine<()> {
    if tx.debit.is_none() && tx.credit.is_none() {
        return Err(validation("a transaction needs a debit or a credit side"));
    }
    for side in tx.debit.iter().chain(tx.credit.iter()) {
        if side.amount.is_negative() {
            return Err(EngineError::InvalidAmount(
                "side amounts must not be negative".to_string(),
            ));
        }
        if view.account(side.account_id).is_none() {
            return Err(EngineError::KeyNotFound("account not exists".to_string()));
        }
    }
    if let (Some(debit), Some(credit)) = (&tx.debit, &tx.credit) {
        if debit.account_id == credit.account_id {
            return Err(validation("a transfer needs two different accounts"));
        }
        if debit.amount != credit.amount {
            return Err(validation("both sides of a transfer move the same amount"));
        }
        if tx.category != CategoryRef::None {
            return Err(validation("a transfer cannot carry a category"));
        }
    }
    if let CategoryRef::Category(category_id) = tx.category {
        if view.category(category_id).is_none() {
            return Err(EngineError::KeyNotFound("category not exists".to_string()));
        }
    }
    Ok(())
}

fn check_split(view: &View<'_>, split: &SplitEntry) -> ResultEngine<()> {
    let parent = view
        .transaction(split.transaction_id)
        .ok_or_else(|| EngineError::KeyNotFound("transaction not exists".to_string()))?;
    if !parent.is_split() {
        return Err(validation("split lines need a split transaction"));
    }
    match split.target {
        SplitTarget::None => {}
        SplitTarget::Category(category_id) => {
            if view.category(category_id).is_none() {
                return Err(EngineError::KeyNotFound("category not exists".to_string()));
            }
        }
        SplitTarget::Transfer(account_id) => {
            if view.account(account_id).is_none() {
                return Err(EngineError::KeyNotFound("account not exists".to_string()));
            }
            if parent.home_account() == Some(account_id) {
                return Err(validation(
                    "a split cannot transfer into the account of its transaction",
                ));
            }
        }
    }
    Ok(())
}

fn transactions<'a>(view: &View<'a>) -> impl Iterator<Item = &'a Transaction> {
    view.all_of(EntityKind::Transaction)
        .into_iter()
        .filter_map(Entity::as_transaction)
}

fn splits<'a>(view: &View<'a>) -> impl Iterator<Item = &'a SplitEntry> {
    view.all_of(EntityKind::Split)
        .into_iter()
        .filter_map(Entity::as_split)
}

fn check_removed(view: &View<'_>, removed: &Entity) -> ResultEngine<()> {
    match removed {
        Entity::Account(account) => {
            let referenced = transactions(view).any(|tx| tx.involves(account.id))
                || splits(view).any(|split| split.target == SplitTarget::Transfer(account.id));
            if referenced {
                return Err(validation(format!(
                    "account '{}' still has transactions",
                    account.name
                )));
            }
        }
        Entity::Category(category) => {
            let referenced = transactions(view)
                .any(|tx| tx.category == CategoryRef::Category(category.id))
                || splits(view).any(|split| split.target == SplitTarget::Category(category.id));
            if referenced {
                return Err(validation(format!(
                    "category '{}' is still in use",
                    category.name
                )));
            }
        }
        Entity::Transaction(tx) => {
            if !view.splits_of(tx.id).is_empty() {
                return Err(EngineError::Invariant(
                    "deleted transaction still owns split lines".to_string(),
                ));
            }
        }
        Entity::Split(_) => {}
    }
    Ok(())
}

/// Split-sum invariant: a split parent owns at least one line and its
/// signed amount equals the sum of its lines. Other transactions own none.
fn check_split_sum(view: &View<'_>, transaction_id: Uuid) -> ResultEngine<()> {
    let Some(tx) = view.transaction(transaction_id) else {
        return Ok(());
    };
    let lines = view.splits_of(transaction_id);
    if !tx.is_split() {
        if !lines.is_empty() {
            return Err(EngineError::Invariant(format!(
                "transaction {transaction_id} owns split lines without being split"
            )));
        }
        return Ok(());
    }
    let Some(home) = tx.home_account() else {
        return Err(EngineError::Invariant(format!(
            "split transaction {transaction_id} must be single-sided"
        )));
    };
    if lines.is_empty() {
        return Err(EngineError::Invariant(format!(
            "split transaction {transaction_id} has no split lines"
        )));
    }
    let sum = Money::checked_sum(lines.iter().map(|split| split.amount))?;
    let amount = tx.amount_for(home).unwrap_or_default();
    if sum != amount {
        return Err(EngineError::Invariant(format!(
            "split lines of {transaction_id} sum to {sum}, transaction says {amount}"
        )));
    }
    Ok(())
}

/// Per account, the summed magnitude of its entries bounds every running
/// balance, so it has to fit. The net worth over open accounts has to fit
/// as well.
fn check_magnitudes(view: &View<'_>) -> ResultEngine<()> {
    let too_large =
        || EngineError::InvalidAmount("balances would exceed the supported range".to_string());
    let transaction_entries = transactions(view).flat_map(|tx| {
        tx.account_ids().into_iter().filter_map(|account_id| {
            tx.amount_for(account_id).map(|amount| (account_id, amount))
        })
    });
    let transfer_lines = splits(view).filter_map(|split| {
        split
            .target
            .transfer_account()
            .map(|account_id| (account_id, Money::ZERO.wrapping_sub(split.amount)))
    });

    // (magnitude, balance) per account
    let mut totals: HashMap<Uuid, (Money, Money)> = HashMap::new();
    for (account_id, amount) in transaction_entries.chain(transfer_lines) {
        let (magnitude, balance) = totals.entry(account_id).or_default();
        *magnitude = amount
            .checked_abs()
            .and_then(|abs| magnitude.checked_add(abs))
            .ok_or_else(too_large)?;
        *balance += amount;
    }

    let open_balances = totals.iter().filter_map(|(account_id, (_, balance))| {
        view.account(*account_id)
            .filter(|account| !account.closed)
            .map(|_| *balance)
    });
    Money::checked_sum(open_balances).map_err(|_| too_large())?;
    Ok(())
}

impl<S: EntityStore> Document<S> {
    /// Validate every staged entity, then check the split-sum invariant of
    /// every transaction the scope touched. Balances that would overflow are
    /// rejected here, before anything reaches the store.
    pub(crate) fn validate_scope(&self) -> ResultEngine<()> {
        let Some(scope) = self.scope.as_ref() else {
            return Err(EngineError::ScopeNotOpen);
        };
        let view = self.view();
        let mut parents = BTreeSet::new();

        let checked = scope.recorder.pairs().try_for_each(|pair| -> ResultEngine<()> {
            match (&pair.before, &pair.after) {
                (_, Some(Entity::Account(account))) => check_name(&account.name, "account")?,
                (_, Some(Entity::Category(category))) => check_name(&category.name, "category")?,
                (_, Some(Entity::Transaction(tx))) => check_transaction(&view, tx)?,
                (_, Some(Entity::Split(split))) => check_split(&view, split)?,
                (Some(removed), None) => check_removed(&view, removed)?,
                (None, None) => {}
            }
            for entity in pair.before.iter().chain(pair.after.iter()) {
                match entity {
                    Entity::Transaction(tx) => {
                        parents.insert(tx.id);
                    }
                    Entity::Split(split) => {
                        parents.insert(split.transaction_id);
                    }
                    Entity::Account(_) | Entity::Category(_) => {}
                }
            }
            Ok(())
        });
        if let Err(err) = checked {
            debug!(%err, "commit rejected");
            return Err(err);
        }

        for transaction_id in parents {
            check_split_sum(&view, transaction_id).inspect_err(|err| {
                error!(%err, "split invariant violated");
            })?;
        }
        check_magnitudes(&view).inspect_err(|err| {
            debug!(%err, "commit rejected");
        })
    }
}
