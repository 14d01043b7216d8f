//! Accounts.
//!
//! An [`Account`] does not contain its transactions: transactions reference
//! accounts by id through their debit/credit sides, and a transfer is
//! referenced by two accounts at once.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError,
    util::{parse_optional_uuid, parse_uuid},
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    /// A single fiat currency with deposits, withdrawals and transfers.
    #[default]
    Banking,
    /// May hold any number of assets (brokerage, retirement, crypto wallet).
    Investing,
}

impl AccountKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Banking => "banking",
            Self::Investing => "investing",
        }
    }
}

impl TryFrom<&str> for AccountKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "banking" => Ok(Self::Banking),
            "investing" => Ok(Self::Investing),
            other => Err(EngineError::Validation(format!(
                "invalid account kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub kind: AccountKind,
    /// Closed accounts keep their history but are left out of the net worth.
    pub closed: bool,
    pub currency_asset_id: Option<Uuid>,
}

impl Account {
    pub fn new(name: impl Into<String>, kind: AccountKind) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            kind,
            closed: false,
            currency_asset_id: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub kind: String,
    pub closed: bool,
    pub currency_asset_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Account> for ActiveModel {
    fn from(account: &Account) -> Self {
        Self {
            id: ActiveValue::Set(account.id.to_string()),
            name: ActiveValue::Set(account.name.clone()),
            kind: ActiveValue::Set(account.kind.as_str().to_string()),
            closed: ActiveValue::Set(account.closed),
            currency_asset_id: ActiveValue::Set(
                account.currency_asset_id.map(|id| id.to_string()),
            ),
        }
    }
}

impl TryFrom<Model> for Account {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "account")?,
            name: model.name,
            kind: AccountKind::try_from(model.kind.as_str())?,
            closed: model.closed,
            currency_asset_id: parse_optional_uuid(model.currency_asset_id.as_deref(), "asset")?,
        })
    }
}
