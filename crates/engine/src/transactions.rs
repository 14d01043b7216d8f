//! Transaction primitives.
//!
//! A [`Transaction`] moves money through one or two [`TransactionSide`]s:
//! - credit side only: a deposit into the credit account;
//! - debit side only: a withdrawal from the debit account;
//! - both sides: a transfer from the debit account to the credit account.
//!
//! Side amounts are non-negative magnitudes. The signed amount seen by one
//! account is returned by [`Transaction::amount_for`].

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, Money, ResultEngine,
    util::{parse_optional_uuid, parse_uuid},
};

use super::splits;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearedState {
    #[default]
    None,
    Cleared,
    Reconciled,
}

impl ClearedState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Cleared => "cleared",
            Self::Reconciled => "reconciled",
        }
    }
}

impl TryFrom<&str> for ClearedState {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "none" => Ok(Self::None),
            "cleared" => Ok(Self::Cleared),
            "reconciled" => Ok(Self::Reconciled),
            other => Err(EngineError::Validation(format!(
                "invalid cleared state: {other}"
            ))),
        }
    }
}

/// What a transaction is filed under.
///
/// `Split` is the sentinel used once the transaction owns split lines; the
/// categories then live on the lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CategoryRef {
    #[default]
    None,
    Category(Uuid),
    Split,
}

impl CategoryRef {
    pub(crate) fn kind_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Category(_) => "category",
            Self::Split => "split",
        }
    }

    pub(crate) fn category_id(self) -> Option<Uuid> {
        match self {
            Self::Category(id) => Some(id),
            Self::None | Self::Split => None,
        }
    }

    fn from_columns(kind: &str, id: Option<Uuid>) -> ResultEngine<Self> {
        match (kind, id) {
            ("none", _) => Ok(Self::None),
            ("split", _) => Ok(Self::Split),
            ("category", Some(id)) => Ok(Self::Category(id)),
            (other, _) => Err(EngineError::Validation(format!(
                "invalid category reference: {other}"
            ))),
        }
    }
}

/// One account's participation in a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSide {
    pub account_id: Uuid,
    /// Magnitude moved through this side. Never negative.
    pub amount: Money,
    pub asset_id: Option<Uuid>,
    pub cleared: ClearedState,
}

impl TransactionSide {
    pub fn new(account_id: Uuid, amount: Money) -> Self {
        Self {
            account_id,
            amount,
            asset_id: None,
            cleared: ClearedState::None,
        }
    }
}

/// Closed set of transaction shapes, used instead of per-kind types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionShape {
    /// A deposit or withdrawal, optionally categorized.
    Simple,
    /// A single-sided transaction whose amount is the sum of its split lines.
    Split,
    /// Debit and credit sides in two different accounts.
    Transfer,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub when: DateTime<Utc>,
    pub payee: Option<String>,
    pub memo: Option<String>,
    pub check_number: Option<u32>,
    pub debit: Option<TransactionSide>,
    pub credit: Option<TransactionSide>,
    pub category: CategoryRef,
}

impl Transaction {
    /// An empty deposit of zero into `account_id`.
    pub fn new(account_id: Uuid, when: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            when,
            payee: None,
            memo: None,
            check_number: None,
            debit: None,
            credit: Some(TransactionSide::new(account_id, Money::ZERO)),
            category: CategoryRef::None,
        }
    }

    pub fn shape(&self) -> TransactionShape {
        match (&self.debit, &self.credit, self.category) {
            (Some(_), Some(_), _) => TransactionShape::Transfer,
            (_, _, CategoryRef::Split) => TransactionShape::Split,
            _ => TransactionShape::Simple,
        }
    }

    pub fn is_split(&self) -> bool {
        self.category == CategoryRef::Split
    }

    pub fn is_transfer(&self) -> bool {
        self.shape() == TransactionShape::Transfer
    }

    /// Accounts referenced by either side.
    pub fn account_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self
            .debit
            .iter()
            .chain(self.credit.iter())
            .map(|side| side.account_id)
            .collect();
        ids.dedup();
        ids
    }

    pub fn involves(&self, account_id: Uuid) -> bool {
        self.side_for(account_id).is_some()
    }

    pub fn side_for(&self, account_id: Uuid) -> Option<&TransactionSide> {
        self.credit
            .iter()
            .chain(self.debit.iter())
            .find(|side| side.account_id == account_id)
    }

    pub(crate) fn side_for_mut(&mut self, account_id: Uuid) -> Option<&mut TransactionSide> {
        self.credit
            .iter_mut()
            .chain(self.debit.iter_mut())
            .find(|side| side.account_id == account_id)
    }

    /// The single account of a non-transfer transaction.
    pub fn home_account(&self) -> Option<Uuid> {
        match (&self.debit, &self.credit) {
            (Some(side), None) | (None, Some(side)) => Some(side.account_id),
            _ => None,
        }
    }

    /// The other account of a transfer, seen from `account_id`.
    pub fn counterpart_of(&self, account_id: Uuid) -> Option<Uuid> {
        match (&self.debit, &self.credit) {
            (Some(debit), Some(credit)) if debit.account_id == account_id => {
                Some(credit.account_id)
            }
            (Some(debit), Some(credit)) if credit.account_id == account_id => {
                Some(debit.account_id)
            }
            _ => None,
        }
    }

    /// Signed amount as seen by `account_id`, `None` if not involved.
    pub fn amount_for(&self, account_id: Uuid) -> Option<Money> {
        if let Some(credit) = self.credit.filter(|side| side.account_id == account_id) {
            return Some(credit.amount);
        }
        self.debit
            .filter(|side| side.account_id == account_id)
            .map(|side| -side.amount)
    }

    /// Rewrite the transaction as a single side of `account_id` carrying
    /// `signed`; the side keeps the asset and cleared state it had before.
    pub(crate) fn set_single_sided(&mut self, account_id: Uuid, signed: Money) {
        let previous = self.side_for(account_id).copied();
        let mut side = previous.unwrap_or_else(|| TransactionSide::new(account_id, Money::ZERO));
        side.amount = signed.abs();
        if signed.is_negative() {
            self.debit = Some(side);
            self.credit = None;
        } else {
            self.credit = Some(side);
            self.debit = None;
        }
    }

    /// Rewrite the transaction as a transfer between `account_id` and
    /// `other`, `signed` being the amount seen by `account_id`.
    pub(crate) fn set_transfer(&mut self, account_id: Uuid, other: Uuid, signed: Money) {
        let mut own = self
            .side_for(account_id)
            .copied()
            .unwrap_or_else(|| TransactionSide::new(account_id, Money::ZERO));
        let mut counterpart = self
            .side_for(other)
            .copied()
            .unwrap_or_else(|| TransactionSide::new(other, Money::ZERO));
        if counterpart.asset_id.is_none() {
            counterpart.asset_id = own.asset_id;
        }
        own.amount = signed.abs();
        counterpart.amount = signed.abs();
        if signed.is_negative() {
            self.debit = Some(own);
            self.credit = Some(counterpart);
        } else {
            self.credit = Some(own);
            self.debit = Some(counterpart);
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub occurred_at: DateTimeUtc,
    pub payee: Option<String>,
    pub memo: Option<String>,
    pub check_number: Option<i64>,
    pub debit_account_id: Option<String>,
    pub debit_amount_minor: Option<i64>,
    pub debit_asset_id: Option<String>,
    pub debit_cleared: String,
    pub credit_account_id: Option<String>,
    pub credit_amount_minor: Option<i64>,
    pub credit_asset_id: Option<String>,
    pub credit_cleared: String,
    pub category_kind: String,
    pub category_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::splits::Entity")]
    Splits,
}

impl Related<splits::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Splits.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        let debit = tx.debit.as_ref();
        let credit = tx.credit.as_ref();
        Self {
            id: ActiveValue::Set(tx.id.to_string()),
            occurred_at: ActiveValue::Set(tx.when),
            payee: ActiveValue::Set(tx.payee.clone()),
            memo: ActiveValue::Set(tx.memo.clone()),
            check_number: ActiveValue::Set(tx.check_number.map(i64::from)),
            debit_account_id: ActiveValue::Set(debit.map(|s| s.account_id.to_string())),
            debit_amount_minor: ActiveValue::Set(debit.map(|s| s.amount.minor())),
            debit_asset_id: ActiveValue::Set(debit.and_then(|s| s.asset_id).map(|id| id.to_string())),
            debit_cleared: ActiveValue::Set(
                debit.map_or(ClearedState::None, |s| s.cleared).as_str().to_string(),
            ),
            credit_account_id: ActiveValue::Set(credit.map(|s| s.account_id.to_string())),
            credit_amount_minor: ActiveValue::Set(credit.map(|s| s.amount.minor())),
            credit_asset_id: ActiveValue::Set(
                credit.and_then(|s| s.asset_id).map(|id| id.to_string()),
            ),
            credit_cleared: ActiveValue::Set(
                credit.map_or(ClearedState::None, |s| s.cleared).as_str().to_string(),
            ),
            category_kind: ActiveValue::Set(tx.category.kind_str().to_string()),
            category_id: ActiveValue::Set(tx.category.category_id().map(|id| id.to_string())),
        }
    }
}

fn side_from_columns(
    account_id: Option<&str>,
    amount_minor: Option<i64>,
    asset_id: Option<&str>,
    cleared: &str,
) -> ResultEngine<Option<TransactionSide>> {
    let Some(account_id) = parse_optional_uuid(account_id, "account")? else {
        return Ok(None);
    };
    Ok(Some(TransactionSide {
        account_id,
        amount: Money::new(amount_minor.unwrap_or_default()),
        asset_id: parse_optional_uuid(asset_id, "asset")?,
        cleared: ClearedState::try_from(cleared)?,
    }))
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let check_number = model
            .check_number
            .map(u32::try_from)
            .transpose()
            .map_err(|_| EngineError::Validation("invalid check number".to_string()))?;
        Ok(Self {
            id: parse_uuid(&model.id, "transaction")?,
            when: model.occurred_at,
            payee: model.payee,
            memo: model.memo,
            check_number,
            debit: side_from_columns(
                model.debit_account_id.as_deref(),
                model.debit_amount_minor,
                model.debit_asset_id.as_deref(),
                &model.debit_cleared,
            )?,
            credit: side_from_columns(
                model.credit_account_id.as_deref(),
                model.credit_amount_minor,
                model.credit_asset_id.as_deref(),
                &model.credit_cleared,
            )?,
            category: CategoryRef::from_columns(
                &model.category_kind,
                parse_optional_uuid(model.category_id.as_deref(), "category")?,
            )?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(day: u32) -> DateTime<Utc> {
        chrono::TimeZone::with_ymd_and_hms(&Utc, 2021, 1, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn amount_for_signs_by_side() {
        let checking = Uuid::now_v7();
        let savings = Uuid::now_v7();
        let mut tx = Transaction::new(checking, at(1));
        tx.set_transfer(checking, savings, Money::new(-1000));

        assert_eq!(tx.shape(), TransactionShape::Transfer);
        assert_eq!(tx.amount_for(checking), Some(Money::new(-1000)));
        assert_eq!(tx.amount_for(savings), Some(Money::new(1000)));
        assert_eq!(tx.counterpart_of(checking), Some(savings));
        assert_eq!(tx.home_account(), None);
    }

    #[test]
    fn single_sided_flips_with_sign_and_keeps_cleared() {
        let checking = Uuid::now_v7();
        let mut tx = Transaction::new(checking, at(1));
        tx.credit = tx.credit.map(|mut side| {
            side.cleared = ClearedState::Cleared;
            side
        });

        tx.set_single_sided(checking, Money::new(-250));
        assert!(tx.credit.is_none());
        let debit = tx.debit.unwrap();
        assert_eq!(debit.amount, Money::new(250));
        assert_eq!(debit.cleared, ClearedState::Cleared);
        assert_eq!(tx.amount_for(checking), Some(Money::new(-250)));
    }

    #[test]
    fn model_round_trip_keeps_category_reference() {
        let checking = Uuid::now_v7();
        let mut tx = Transaction::new(checking, at(3));
        tx.category = CategoryRef::Split;
        tx.check_number = Some(15);
        let active = ActiveModel::from(&tx);
        let model = Model {
            id: active.id.unwrap(),
            occurred_at: active.occurred_at.unwrap(),
            payee: active.payee.unwrap(),
            memo: active.memo.unwrap(),
            check_number: active.check_number.unwrap(),
            debit_account_id: active.debit_account_id.unwrap(),
            debit_amount_minor: active.debit_amount_minor.unwrap(),
            debit_asset_id: active.debit_asset_id.unwrap(),
            debit_cleared: active.debit_cleared.unwrap(),
            credit_account_id: active.credit_account_id.unwrap(),
            credit_amount_minor: active.credit_amount_minor.unwrap(),
            credit_asset_id: active.credit_asset_id.unwrap(),
            credit_cleared: active.credit_cleared.unwrap(),
            category_kind: active.category_kind.unwrap(),
            category_id: active.category_id.unwrap(),
        };
        assert_eq!(Transaction::try_from(model).unwrap(), tx);
    }
}
