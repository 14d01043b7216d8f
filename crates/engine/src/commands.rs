//! Command structs for document operations.
//!
//! These types group parameters for write operations, keeping call sites
//! readable and avoiding long argument lists.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{ClearedState, Money};

/// Create a deposit, withdrawal or transfer seen from `account_id`.
///
/// `amount` is signed from the account perspective: positive money comes
/// in, negative money leaves. With a transfer counterpart a negative amount
/// moves money from `account_id` to the counterpart.
#[derive(Clone, Debug)]
pub struct NewTransactionCmd {
    pub account_id: Uuid,
    pub when: DateTime<Utc>,
    pub amount: Money,
    pub payee: Option<String>,
    pub memo: Option<String>,
    pub check_number: Option<u32>,
    pub category_id: Option<Uuid>,
    pub transfer_to: Option<Uuid>,
    pub cleared: ClearedState,
}

impl NewTransactionCmd {
    #[must_use]
    pub fn new(account_id: Uuid, when: DateTime<Utc>, amount: Money) -> Self {
        Self {
            account_id,
            when,
            amount,
            payee: None,
            memo: None,
            check_number: None,
            category_id: None,
            transfer_to: None,
            cleared: ClearedState::None,
        }
    }

    #[must_use]
    pub fn payee(mut self, payee: impl Into<String>) -> Self {
        self.payee = Some(payee.into());
        self
    }

    #[must_use]
    pub fn memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    #[must_use]
    pub fn check_number(mut self, check_number: u32) -> Self {
        self.check_number = Some(check_number);
        self
    }

    #[must_use]
    pub fn category(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }

    #[must_use]
    pub fn transfer_to(mut self, account_id: Uuid) -> Self {
        self.transfer_to = Some(account_id);
        self
    }

    #[must_use]
    pub fn cleared(mut self, cleared: ClearedState) -> Self {
        self.cleared = cleared;
        self
    }
}
