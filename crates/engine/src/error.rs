//! The module contains the error the engine can throw.
//!
//! Errors fall into three families:
//!
//! - validation errors ([`Validation`], [`InvalidAmount`]) block a scope
//!   commit and leave the undo history untouched;
//! - storage errors ([`Database`], [`KeyNotFound`], [`ExistingKey`]) abort the
//!   requested operation and keep the last persisted state in memory;
//! - invariant violations ([`Invariant`], [`Inconsistent`]) signal a defect
//!   and are never repaired silently.
//!
//!  [`Validation`]: EngineError::Validation
//!  [`InvalidAmount`]: EngineError::InvalidAmount
//!  [`Database`]: EngineError::Database
//!  [`KeyNotFound`]: EngineError::KeyNotFound
//!  [`ExistingKey`]: EngineError::ExistingKey
//!  [`Invariant`]: EngineError::Invariant
//!  [`Inconsistent`]: EngineError::Inconsistent
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid id: {0}")]
    InvalidId(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Invariant violated: {0}")]
    Invariant(String),
    #[error("Document is inconsistent with storage: {0}")]
    Inconsistent(String),
    #[error("No undoable scope is open")]
    ScopeNotOpen,
    #[error("An undoable scope is still open")]
    ScopeOpen,
    #[error("Nothing to undo")]
    NothingToUndo,
    #[error("Nothing to redo")]
    NothingToRedo,
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidId(a), Self::InvalidId(b)) => a == b,
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::Invariant(a), Self::Invariant(b)) => a == b,
            (Self::Inconsistent(a), Self::Inconsistent(b)) => a == b,
            (Self::ScopeNotOpen, Self::ScopeNotOpen) => true,
            (Self::ScopeOpen, Self::ScopeOpen) => true,
            (Self::NothingToUndo, Self::NothingToUndo) => true,
            (Self::NothingToRedo, Self::NothingToRedo) => true,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
