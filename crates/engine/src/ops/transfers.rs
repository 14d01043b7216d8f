//! Account-specific edits of a transaction.
//!
//! Shared fields live once on the transaction, so editing them from either
//! ledger edits the same record. Direction and cleared state belong to one
//! side and are edited through the account that sees it.

use uuid::Uuid;

use crate::{
    CategoryRef, ClearedState, EngineError, EntityStore, Money, ResultEngine, Transaction,
};

use super::Document;

fn not_involved() -> EngineError {
    EngineError::Validation("transaction does not involve the account".to_string())
}

impl<S: EntityStore> Document<S> {
    fn involved_transaction(&self, transaction_id: Uuid, account_id: Uuid) -> ResultEngine<Transaction> {
        let tx = self.require_transaction(transaction_id)?;
        if !tx.involves(account_id) {
            return Err(not_involved());
        }
        Ok(tx.clone())
    }

    /// Set the amount as seen by `account_id`. For a transfer the
    /// counterpart sees the opposite sign. A sign change flips the side.
    pub fn set_amount_for(
        &mut self,
        transaction_id: Uuid,
        account_id: Uuid,
        amount: Money,
    ) -> ResultEngine<()> {
        let mut tx = self.involved_transaction(transaction_id, account_id)?;
        if tx.is_split() {
            return Err(EngineError::Validation(
                "the amount of a split transaction is the sum of its lines".to_string(),
            ));
        }
        match tx.counterpart_of(account_id) {
            Some(other) => tx.set_transfer(account_id, other, amount),
            None => tx.set_single_sided(account_id, amount),
        }
        self.update(tx)
    }

    pub fn set_cleared_for(
        &mut self,
        transaction_id: Uuid,
        account_id: Uuid,
        cleared: ClearedState,
    ) -> ResultEngine<()> {
        let mut tx = self.involved_transaction(transaction_id, account_id)?;
        let side = tx.side_for_mut(account_id).ok_or_else(not_involved)?;
        side.cleared = cleared;
        self.update(tx)
    }

    /// Turn a transaction into a transfer between `account_id` and `other`,
    /// or back into a plain deposit/withdrawal of `account_id` with `None`.
    /// The amount seen by `account_id` is kept.
    pub fn set_transfer_target(
        &mut self,
        transaction_id: Uuid,
        account_id: Uuid,
        other: Option<Uuid>,
    ) -> ResultEngine<()> {
        let mut tx = self.involved_transaction(transaction_id, account_id)?;
        if tx.is_split() {
            return Err(EngineError::Validation(
                "split transactions transfer through their lines".to_string(),
            ));
        }
        let amount = tx.amount_for(account_id).ok_or_else(not_involved)?;
        match other {
            Some(other) => {
                if other == account_id {
                    return Err(EngineError::Validation(
                        "a transfer needs two different accounts".to_string(),
                    ));
                }
                self.require_account(other)?;
                tx.category = CategoryRef::None;
                tx.set_transfer(account_id, other, amount);
            }
            None => tx.set_single_sided(account_id, amount),
        }
        self.update(tx)
    }
}
