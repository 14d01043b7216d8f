use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::{
    CategoryRef, EngineError, EntityKey, EntityStore, Money, NewTransactionCmd, ResultEngine,
    Transaction, TransactionShape, util::normalize_optional_text,
};

use super::Document;

impl<S: EntityStore> Document<S> {
    /// Stage a new deposit, withdrawal or transfer.
    ///
    /// The amount is signed from `cmd.account_id`: a positive amount is a
    /// deposit (credit side), a negative one a withdrawal (debit side). With
    /// `transfer_to` both sides are filled and the counterpart sees the
    /// opposite sign.
    pub fn new_transaction(&mut self, cmd: NewTransactionCmd) -> ResultEngine<Uuid> {
        self.require_account(cmd.account_id)?;
        let mut tx = Transaction::new(cmd.account_id, cmd.when);
        tx.payee = normalize_optional_text(cmd.payee.as_deref());
        tx.memo = normalize_optional_text(cmd.memo.as_deref());
        tx.check_number = cmd.check_number;

        match cmd.transfer_to {
            Some(other) => {
                if other == cmd.account_id {
                    return Err(EngineError::Validation(
                        "a transfer needs two different accounts".to_string(),
                    ));
                }
                if cmd.category_id.is_some() {
                    return Err(EngineError::Validation(
                        "a transfer cannot carry a category".to_string(),
                    ));
                }
                self.require_account(other)?;
                tx.set_transfer(cmd.account_id, other, cmd.amount);
            }
            None => {
                if let Some(category_id) = cmd.category_id {
                    self.require_category(category_id)?;
                    tx.category = CategoryRef::Category(category_id);
                }
                tx.set_single_sided(cmd.account_id, cmd.amount);
            }
        }
        if let Some(side) = tx.side_for_mut(cmd.account_id) {
            side.cleared = cmd.cleared;
        }

        debug!(transaction_id = %tx.id, shape = ?tx.shape(), "transaction staged");
        self.insert(tx)
    }

    /// Move a transaction in time. Every ledger showing it repositions the
    /// entry, transfer splits included.
    pub fn set_when(&mut self, transaction_id: Uuid, when: DateTime<Utc>) -> ResultEngine<()> {
        let mut tx = self.require_transaction(transaction_id)?.clone();
        tx.when = when;
        self.update(tx)
    }

    pub fn set_payee(&mut self, transaction_id: Uuid, payee: Option<&str>) -> ResultEngine<()> {
        let mut tx = self.require_transaction(transaction_id)?.clone();
        tx.payee = normalize_optional_text(payee);
        self.update(tx)
    }

    pub fn set_memo(&mut self, transaction_id: Uuid, memo: Option<&str>) -> ResultEngine<()> {
        let mut tx = self.require_transaction(transaction_id)?.clone();
        tx.memo = normalize_optional_text(memo);
        self.update(tx)
    }

    pub fn set_check_number(
        &mut self,
        transaction_id: Uuid,
        check_number: Option<u32>,
    ) -> ResultEngine<()> {
        let mut tx = self.require_transaction(transaction_id)?.clone();
        tx.check_number = check_number;
        self.update(tx)
    }

    /// Categorize a simple transaction. Split transactions carry their
    /// categories on the lines, transfers carry none.
    pub fn set_category(
        &mut self,
        transaction_id: Uuid,
        category_id: Option<Uuid>,
    ) -> ResultEngine<()> {
        let mut tx = self.require_transaction(transaction_id)?.clone();
        match tx.shape() {
            TransactionShape::Simple => {}
            TransactionShape::Split => {
                return Err(EngineError::Validation(
                    "split transactions are categorized per line".to_string(),
                ));
            }
            TransactionShape::Transfer => {
                return Err(EngineError::Validation(
                    "a transfer cannot carry a category".to_string(),
                ));
            }
        }
        tx.category = match category_id {
            Some(category_id) => {
                self.require_category(category_id)?;
                CategoryRef::Category(category_id)
            }
            None => CategoryRef::None,
        };
        self.update(tx)
    }

    /// Change the signed amount of a simple transaction in its account.
    pub fn set_amount(&mut self, transaction_id: Uuid, amount: Money) -> ResultEngine<()> {
        let tx = self.require_transaction(transaction_id)?;
        match (tx.shape(), tx.home_account()) {
            (TransactionShape::Simple, Some(account_id)) => {
                self.set_amount_for(transaction_id, account_id, amount)
            }
            (TransactionShape::Split, _) => Err(EngineError::Validation(
                "the amount of a split transaction is the sum of its lines".to_string(),
            )),
            _ => Err(EngineError::Validation(
                "transfer amounts are set from one of their accounts".to_string(),
            )),
        }
    }

    /// Delete a transaction with its split lines, from whichever ledger the
    /// request comes.
    pub fn delete_transaction(&mut self, transaction_id: Uuid) -> ResultEngine<()> {
        self.require_transaction(transaction_id)?;
        let split_ids: Vec<Uuid> = self
            .splits_of(transaction_id)
            .iter()
            .map(|split| split.id)
            .collect();
        for split_id in split_ids {
            self.delete(EntityKey::split(split_id))?;
        }
        self.delete(EntityKey::transaction(transaction_id))?;
        Ok(())
    }
}
