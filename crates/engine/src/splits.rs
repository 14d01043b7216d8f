//! Split lines of a transaction.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, Money, ResultEngine,
    util::{parse_optional_uuid, parse_uuid},
};

/// Where the money of one split line goes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SplitTarget {
    #[default]
    None,
    Category(Uuid),
    /// Part of the parent moved to another account. The line shows up in
    /// that account's ledger with the opposite sign.
    Transfer(Uuid),
}

impl SplitTarget {
    pub fn transfer_account(self) -> Option<Uuid> {
        match self {
            Self::Transfer(account_id) => Some(account_id),
            Self::None | Self::Category(_) => None,
        }
    }

    fn kind_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Category(_) => "category",
            Self::Transfer(_) => "transfer",
        }
    }

    fn target_id(self) -> Option<Uuid> {
        match self {
            Self::None => None,
            Self::Category(id) | Self::Transfer(id) => Some(id),
        }
    }

    fn from_columns(kind: &str, id: Option<Uuid>) -> ResultEngine<Self> {
        match (kind, id) {
            ("none", _) => Ok(Self::None),
            ("category", Some(id)) => Ok(Self::Category(id)),
            ("transfer", Some(id)) => Ok(Self::Transfer(id)),
            (other, _) => Err(EngineError::Validation(format!(
                "invalid split target: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitEntry {
    pub id: Uuid,
    pub transaction_id: Uuid,
    /// Signed, from the parent's home account perspective.
    pub amount: Money,
    pub target: SplitTarget,
    pub memo: Option<String>,
}

impl SplitEntry {
    pub fn new(transaction_id: Uuid) -> Self {
        Self {
            id: Uuid::now_v7(),
            transaction_id,
            amount: Money::ZERO,
            target: SplitTarget::None,
            memo: None,
        }
    }

    /// A line is trivial when dropping it loses nothing.
    pub fn is_trivial(&self) -> bool {
        self.amount.is_zero() && self.target == SplitTarget::None && self.memo.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "splits")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub transaction_id: String,
    pub amount_minor: i64,
    pub target_kind: String,
    pub target_id: Option<String>,
    pub memo: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::transactions::Entity",
        from = "Column::TransactionId",
        to = "super::transactions::Column::Id"
    )]
    Transaction,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&SplitEntry> for ActiveModel {
    fn from(split: &SplitEntry) -> Self {
        Self {
            id: ActiveValue::Set(split.id.to_string()),
            transaction_id: ActiveValue::Set(split.transaction_id.to_string()),
            amount_minor: ActiveValue::Set(split.amount.minor()),
            target_kind: ActiveValue::Set(split.target.kind_str().to_string()),
            target_id: ActiveValue::Set(split.target.target_id().map(|id| id.to_string())),
            memo: ActiveValue::Set(split.memo.clone()),
        }
    }
}

impl TryFrom<Model> for SplitEntry {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "split")?,
            transaction_id: parse_uuid(&model.transaction_id, "transaction")?,
            amount: Money::new(model.amount_minor),
            target: SplitTarget::from_columns(
                &model.target_kind,
                parse_optional_uuid(model.target_id.as_deref(), "split target")?,
            )?,
            memo: model.memo,
        })
    }
}
