//! Type-erased entity wrapper shared by the store, the undo history and
//! change notifications.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Account, Category, SplitEntry, Transaction};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Account,
    Category,
    Transaction,
    Split,
}

impl EntityKind {
    /// Parents come before children: accounts and categories are referenced
    /// by transactions, transactions own splits.
    pub(crate) fn rank(self) -> u8 {
        match self {
            Self::Account => 0,
            Self::Category => 1,
            Self::Transaction => 2,
            Self::Split => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Category => "category",
            Self::Transaction => "transaction",
            Self::Split => "split",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub kind: EntityKind,
    pub id: Uuid,
}

impl EntityKey {
    pub fn new(kind: EntityKind, id: Uuid) -> Self {
        Self { kind, id }
    }

    pub fn account(id: Uuid) -> Self {
        Self::new(EntityKind::Account, id)
    }

    pub fn category(id: Uuid) -> Self {
        Self::new(EntityKind::Category, id)
    }

    pub fn transaction(id: Uuid) -> Self {
        Self::new(EntityKind::Transaction, id)
    }

    pub fn split(id: Uuid) -> Self {
        Self::new(EntityKind::Split, id)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.as_str(), self.id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum Entity {
    Account(Account),
    Category(Category),
    Transaction(Transaction),
    Split(SplitEntry),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Account(_) => EntityKind::Account,
            Self::Category(_) => EntityKind::Category,
            Self::Transaction(_) => EntityKind::Transaction,
            Self::Split(_) => EntityKind::Split,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Self::Account(account) => account.id,
            Self::Category(category) => category.id,
            Self::Transaction(tx) => tx.id,
            Self::Split(split) => split.id,
        }
    }

    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.kind(), self.id())
    }

    pub fn as_account(&self) -> Option<&Account> {
        match self {
            Self::Account(account) => Some(account),
            _ => None,
        }
    }

    pub fn as_category(&self) -> Option<&Category> {
        match self {
            Self::Category(category) => Some(category),
            _ => None,
        }
    }

    pub fn as_transaction(&self) -> Option<&Transaction> {
        match self {
            Self::Transaction(tx) => Some(tx),
            _ => None,
        }
    }

    pub fn as_split(&self) -> Option<&SplitEntry> {
        match self {
            Self::Split(split) => Some(split),
            _ => None,
        }
    }

    /// Accounts whose view may change when this entity changes.
    pub fn account_ids(&self) -> Vec<Uuid> {
        match self {
            Self::Account(account) => vec![account.id],
            Self::Category(_) => Vec::new(),
            Self::Transaction(tx) => tx.account_ids(),
            Self::Split(split) => split.target.transfer_account().into_iter().collect(),
        }
    }
}

impl From<Account> for Entity {
    fn from(value: Account) -> Self {
        Self::Account(value)
    }
}

impl From<Category> for Entity {
    fn from(value: Category) -> Self {
        Self::Category(value)
    }
}

impl From<Transaction> for Entity {
    fn from(value: Transaction) -> Self {
        Self::Transaction(value)
    }
}

impl From<SplitEntry> for Entity {
    fn from(value: SplitEntry) -> Self {
        Self::Split(value)
    }
}

/// One element of an atomic store batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntityWrite {
    Insert(Entity),
    Update(Entity),
    Delete(EntityKey),
}

impl EntityWrite {
    pub fn key(&self) -> EntityKey {
        match self {
            Self::Insert(entity) | Self::Update(entity) => entity.key(),
            Self::Delete(key) => *key,
        }
    }
}

/// Narrows a store query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityFilter {
    All,
    Kind(EntityKind),
    Key(EntityKey),
    /// Transactions with a side in the account.
    AccountTransactions(Uuid),
    SplitsOf(Uuid),
}

impl EntityFilter {
    pub fn matches(&self, entity: &Entity) -> bool {
        match self {
            Self::All => true,
            Self::Kind(kind) => entity.kind() == *kind,
            Self::Key(key) => entity.key() == *key,
            Self::AccountTransactions(account_id) => entity
                .as_transaction()
                .is_some_and(|tx| tx.involves(*account_id)),
            Self::SplitsOf(transaction_id) => entity
                .as_split()
                .is_some_and(|split| split.transaction_id == *transaction_id),
        }
    }
}

/// Hint about what the user was looking at when an undoable unit was
/// recorded; returned by undo/redo so a caller can restore the view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selection {
    #[default]
    None,
    Account {
        account_id: Uuid,
    },
    Category {
        category_id: Uuid,
    },
    Transaction {
        account_id: Uuid,
        transaction_id: Uuid,
    },
}
