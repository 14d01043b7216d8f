//! Ledger engine for a personal-finance document.
//!
//! A [`Document`] owns a store handle, the committed entities, one
//! [`Ledger`] per account, the undo/redo history and the change
//! subscribers. Every mutation happens inside an undoable scope:
//!
//! ```rust,no_run
//! # async fn demo() -> Result<(), engine::EngineError> {
//! use engine::{AccountKind, Document, MemoryStore, Selection};
//!
//! let mut doc = Document::builder().store(MemoryStore::new()).build().await?;
//! doc.begin("New account", Selection::None)?;
//! let id = doc.new_account("Checking", AccountKind::Banking)?;
//! doc.commit().await?;
//! assert!(doc.account(id).is_some());
//! # Ok(())
//! # }
//! ```

pub use accounts::{Account, AccountKind};
pub use categories::Category;
pub use change_bus::{ChangeBus, ChangeOrigin, ChangeSet, SubscriptionId};
pub use commands::NewTransactionCmd;
pub use entity::{Entity, EntityFilter, EntityKey, EntityKind, EntityWrite, Selection};
pub use error::EngineError;
pub use ledger::{EntrySource, Ledger, LedgerEntry};
pub use money::Money;
pub use net_worth::NetWorth;
pub use ops::{CommitOutcome, Document, DocumentBuilder, UndoOutcome};
pub use splits::{SplitEntry, SplitTarget};
pub use store::{DbStore, EntityStore, MemoryStore};
pub use transactions::{CategoryRef, ClearedState, Transaction, TransactionShape, TransactionSide};
pub use undo::{SnapshotPair, UndoHistory, UndoUnit};

mod accounts;
mod categories;
mod change_bus;
mod commands;
mod entity;
mod error;
mod ledger;
mod money;
mod net_worth;
mod ops;
mod splits;
mod state;
mod store;
mod transactions;
mod undo;
mod util;

pub type ResultEngine<T> = Result<T, EngineError>;
