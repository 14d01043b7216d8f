//! CSV import.
//!
//! Columns: `date,account,amount,payee,memo,category,transfer_to`. Only the
//! first three are required. Unknown accounts and categories are created on
//! the fly and the whole file lands as one undoable unit.

use std::path::Path;

use engine::{
    AccountKind, Document, EngineError, EntityStore, Money, NewTransactionCmd, ResultEngine,
    Selection,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{error::Result, shell::parse_day};

#[derive(Debug, Deserialize)]
struct Row {
    date: String,
    account: String,
    amount: String,
    payee: Option<String>,
    memo: Option<String>,
    category: Option<String>,
    transfer_to: Option<String>,
}

/// Import every row of `path` and return how many transactions were added.
pub async fn import_csv<S: EntityStore>(document: &mut Document<S>, path: &Path) -> Result<usize> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    let rows = reader
        .deserialize()
        .collect::<std::result::Result<Vec<Row>, _>>()?;

    let caption = format!("Import {}", path.display());
    let count = document
        .transact(caption, Selection::None, |doc| stage_rows(doc, &rows))
        .await?;
    info!(path = %path.display(), count, "csv imported");
    Ok(count)
}

fn stage_rows<S: EntityStore>(document: &mut Document<S>, rows: &[Row]) -> ResultEngine<usize> {
    for (index, row) in rows.iter().enumerate() {
        // Header is line 1.
        let line = index + 2;
        let when = parse_day(&row.date)
            .ok_or_else(|| EngineError::Validation(format!("line {line}: invalid date")))?;
        let amount: Money = row
            .amount
            .parse()
            .map_err(|err| EngineError::InvalidAmount(format!("line {line}: {err}")))?;

        let account_id = account_named(document, &row.account)?;
        let mut cmd = NewTransactionCmd::new(account_id, when, amount);
        if let Some(payee) = &row.payee {
            cmd = cmd.payee(payee.clone());
        }
        if let Some(memo) = &row.memo {
            cmd = cmd.memo(memo.clone());
        }
        if let Some(other) = &row.transfer_to {
            cmd = cmd.transfer_to(account_named(document, other)?);
        } else if let Some(category) = &row.category {
            cmd = cmd.category(category_named(document, category)?);
        }
        document.new_transaction(cmd)?;
    }
    Ok(rows.len())
}

fn account_named<S: EntityStore>(document: &mut Document<S>, name: &str) -> ResultEngine<Uuid> {
    match document.account_by_name(name) {
        Some(account) => Ok(account.id),
        None => document.new_account(name, AccountKind::Banking),
    }
}

fn category_named<S: EntityStore>(document: &mut Document<S>, name: &str) -> ResultEngine<Uuid> {
    match document.category_by_name(name) {
        Some(category) => Ok(category.id),
        None => document.new_category(name),
    }
}
