//! Interactive shell over one open document.
//!
//! Every line is parsed with clap and every mutating command runs inside
//! its own undoable scope.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use engine::{
    AccountKind, ClearedState, Document, EntityStore, EntrySource, Money, NewTransactionCmd,
    Selection, SplitTarget,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    import,
};

#[derive(Debug, Parser)]
#[command(name = "moneybook", no_binary_name = true, disable_version_flag = true)]
struct Line {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(subcommand)]
    Account(AccountCommand),
    #[command(subcommand)]
    Category(CategoryCommand),
    /// Money entering an account.
    Deposit(MoneyArgs),
    /// Money leaving an account.
    Withdraw(MoneyArgs),
    /// Move money between two accounts.
    Transfer {
        from: String,
        to: String,
        amount: String,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        payee: Option<String>,
        #[arg(long)]
        memo: Option<String>,
    },
    #[command(subcommand)]
    Split(SplitCommand),
    #[command(subcommand)]
    Edit(EditCommand),
    /// Mark the side of a transaction seen by an account as cleared.
    Clear {
        transaction: String,
        account: String,
        #[arg(long, conflicts_with = "none")]
        reconciled: bool,
        #[arg(long)]
        none: bool,
    },
    /// Delete a transaction from every ledger showing it.
    Delete { transaction: String },
    Ledger {
        account: String,
        #[arg(long)]
        json: bool,
    },
    Networth,
    Undo,
    Redo,
    History,
    /// Bulk load transactions from a CSV file as one undoable unit.
    Import { path: PathBuf },
    #[command(alias = "exit")]
    Quit,
}

#[derive(Debug, Subcommand)]
enum AccountCommand {
    Add {
        name: String,
        #[arg(long)]
        investing: bool,
    },
    List,
    Close {
        name: String,
        #[arg(long)]
        reopen: bool,
    },
    Rename {
        name: String,
        new_name: String,
    },
    Delete {
        name: String,
    },
}

#[derive(Debug, Subcommand)]
enum CategoryCommand {
    Add { name: String },
    List,
    Delete { name: String },
}

#[derive(Debug, clap::Args)]
struct MoneyArgs {
    account: String,
    amount: String,
    #[arg(long)]
    date: Option<String>,
    #[arg(long)]
    payee: Option<String>,
    #[arg(long)]
    memo: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    check: Option<u32>,
}

#[derive(Debug, Subcommand)]
enum SplitCommand {
    Add {
        transaction: String,
    },
    List {
        transaction: String,
    },
    Amount {
        split: String,
        #[arg(allow_negative_numbers = true)]
        amount: String,
    },
    Target {
        split: String,
        #[arg(long, conflicts_with = "account")]
        category: Option<String>,
        #[arg(long)]
        account: Option<String>,
    },
    Memo {
        split: String,
        memo: Option<String>,
    },
    Delete {
        transaction: String,
        split: String,
    },
    /// Merge every split back into the transaction.
    Collapse {
        transaction: String,
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Subcommand)]
enum EditCommand {
    When {
        transaction: String,
        date: String,
    },
    Payee {
        transaction: String,
        payee: Option<String>,
    },
    Memo {
        transaction: String,
        memo: Option<String>,
    },
    Category {
        transaction: String,
        category: Option<String>,
    },
    /// Signed amount as seen by one of the accounts of the transaction.
    Amount {
        transaction: String,
        account: String,
        #[arg(allow_negative_numbers = true)]
        amount: String,
    },
    /// Turn the transaction into a transfer, or back with no account.
    Transfer {
        transaction: String,
        account: String,
        to: Option<String>,
    },
}

enum Flow {
    Continue,
    Quit,
}

/// Split a command line into words, honoring single and double quotes.
pub(crate) fn split_words(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_word = false;
    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if quote.is_some() {
        return Err(AppError::Usage("unterminated quote".to_string()));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

/// Parse `YYYY-MM-DD` as midnight UTC.
pub(crate) fn parse_day(value: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
}

fn parse_when(value: Option<&str>) -> Result<DateTime<Utc>> {
    match value {
        None => Ok(Utc::now()),
        Some(value) => {
            parse_day(value).ok_or_else(|| AppError::Usage(format!("invalid date '{value}'")))
        }
    }
}

fn parse_amount(value: &str) -> Result<Money> {
    Ok(value.parse::<Money>()?)
}

fn short(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

pub struct Shell<S: EntityStore> {
    document: Document<S>,
}

impl<S: EntityStore> Shell<S> {
    pub fn new(document: Document<S>) -> Self {
        Self { document }
    }

    pub fn document(&self) -> &Document<S> {
        &self.document
    }

    /// Read commands from stdin until `quit` or end of input.
    pub async fn run(&mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();
        loop {
            stdout.write_all(b"moneybook> ").await?;
            stdout.flush().await?;
            let Some(line) = lines.next_line().await? else {
                break;
            };
            match self.execute_line(&line).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break,
                Err(err) => println!("error: {err}"),
            }
        }
        Ok(())
    }

    async fn execute_line(&mut self, line: &str) -> Result<Flow> {
        let words = split_words(line)?;
        if words.is_empty() {
            return Ok(Flow::Continue);
        }
        match Line::try_parse_from(words) {
            Ok(line) => self.execute(line.command).await,
            Err(err) => {
                println!("{err}");
                Ok(Flow::Continue)
            }
        }
    }

    fn account_id(&self, name: &str) -> Result<Uuid> {
        self.document
            .account_by_name(name)
            .map(|account| account.id)
            .ok_or_else(|| AppError::Usage(format!("unknown account '{name}'")))
    }

    fn category_id(&self, name: &str) -> Result<Uuid> {
        self.document
            .category_by_name(name)
            .map(|category| category.id)
            .ok_or_else(|| AppError::Usage(format!("unknown category '{name}'")))
    }

    /// Resolve a full id or a unique prefix of one.
    fn transaction_id(&self, prefix: &str) -> Result<Uuid> {
        let ids = self
            .document
            .transactions()
            .into_iter()
            .map(|tx| tx.id)
            .collect::<Vec<_>>();
        unique_match(prefix, ids, "transaction")
    }

    fn split_id(&self, prefix: &str) -> Result<Uuid> {
        let ids = self
            .document
            .transactions()
            .into_iter()
            .flat_map(|tx| self.document.splits_of(tx.id))
            .map(|split| split.id)
            .collect::<Vec<_>>();
        unique_match(prefix, ids, "split")
    }

    async fn execute(&mut self, command: Command) -> Result<Flow> {
        debug!(?command, "shell command");
        match command {
            Command::Account(command) => self.account(command).await?,
            Command::Category(command) => self.category(command).await?,
            Command::Deposit(args) => self.money(args, false).await?,
            Command::Withdraw(args) => self.money(args, true).await?,
            Command::Transfer {
                from,
                to,
                amount,
                date,
                payee,
                memo,
            } => {
                let from = self.account_id(&from)?;
                let to = self.account_id(&to)?;
                let mut cmd =
                    NewTransactionCmd::new(from, parse_when(date.as_deref())?, -parse_amount(&amount)?.abs())
                        .transfer_to(to);
                if let Some(payee) = payee {
                    cmd = cmd.payee(payee);
                }
                if let Some(memo) = memo {
                    cmd = cmd.memo(memo);
                }
                let id = self
                    .document
                    .transact("Transfer", Selection::Account { account_id: from }, |doc| {
                        doc.new_transaction(cmd)
                    })
                    .await?;
                println!("transfer {}", short(id));
            }
            Command::Split(command) => self.split(command).await?,
            Command::Edit(command) => self.edit(command).await?,
            Command::Clear {
                transaction,
                account,
                reconciled,
                none,
            } => {
                let transaction_id = self.transaction_id(&transaction)?;
                let account_id = self.account_id(&account)?;
                let state = match (reconciled, none) {
                    (true, _) => ClearedState::Reconciled,
                    (_, true) => ClearedState::None,
                    _ => ClearedState::Cleared,
                };
                self.document
                    .transact("Clear", transaction_selection(account_id, transaction_id), |doc| {
                        doc.set_cleared_for(transaction_id, account_id, state)
                    })
                    .await?;
            }
            Command::Delete { transaction } => {
                let transaction_id = self.transaction_id(&transaction)?;
                self.document
                    .transact("Delete transaction", Selection::None, |doc| {
                        doc.delete_transaction(transaction_id)
                    })
                    .await?;
            }
            Command::Ledger { account, json } => {
                let account_id = self.account_id(&account)?;
                let entries = self.document.ledger(account_id).unwrap_or_default();
                if json {
                    println!("{}", serde_json::to_string_pretty(entries)?);
                } else {
                    for entry in entries {
                        let marker = match entry.source {
                            EntrySource::Transaction => ' ',
                            EntrySource::Split { .. } => '*',
                        };
                        println!(
                            "{}{marker} {} {:<24} {:>12} {:>12}",
                            short(entry.id),
                            entry.when.format("%Y-%m-%d"),
                            entry.payee.as_deref().unwrap_or(""),
                            entry.amount,
                            entry.balance
                        );
                    }
                }
            }
            Command::Networth => println!("{}", self.document.net_worth()),
            Command::Undo => {
                let outcome = self.document.undo().await?;
                println!("undone: {}", outcome.caption);
            }
            Command::Redo => {
                let outcome = self.document.redo().await?;
                println!("redone: {}", outcome.caption);
            }
            Command::History => {
                for caption in self.document.history().undo_captions() {
                    println!("  {caption}");
                }
                if let Some(caption) = self.document.redo_caption() {
                    println!("redo: {caption}");
                }
            }
            Command::Import { path } => {
                let count = import::import_csv(&mut self.document, &path).await?;
                println!("imported {count} transactions");
            }
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    async fn account(&mut self, command: AccountCommand) -> Result<()> {
        match command {
            AccountCommand::Add { name, investing } => {
                let kind = if investing {
                    AccountKind::Investing
                } else {
                    AccountKind::Banking
                };
                self.document
                    .transact(format!("New account {name}"), Selection::None, |doc| {
                        doc.new_account(&name, kind)
                    })
                    .await?;
            }
            AccountCommand::List => {
                for account in self.document.accounts() {
                    let balance = self.document.balance(account.id).unwrap_or_default();
                    let closed = if account.closed { " (closed)" } else { "" };
                    println!("{:<24} {:>12}{closed}", account.name, balance);
                }
            }
            AccountCommand::Close { name, reopen } => {
                let account_id = self.account_id(&name)?;
                let caption = if reopen { "Reopen account" } else { "Close account" };
                self.document
                    .transact(caption, Selection::Account { account_id }, |doc| {
                        doc.set_account_closed(account_id, !reopen)
                    })
                    .await?;
            }
            AccountCommand::Rename { name, new_name } => {
                let account_id = self.account_id(&name)?;
                self.document
                    .transact("Rename account", Selection::Account { account_id }, |doc| {
                        doc.rename_account(account_id, &new_name)
                    })
                    .await?;
            }
            AccountCommand::Delete { name } => {
                let account_id = self.account_id(&name)?;
                self.document
                    .transact("Delete account", Selection::None, |doc| {
                        doc.delete_account(account_id)
                    })
                    .await?;
            }
        }
        Ok(())
    }

    async fn category(&mut self, command: CategoryCommand) -> Result<()> {
        match command {
            CategoryCommand::Add { name } => {
                self.document
                    .transact(format!("New category {name}"), Selection::None, |doc| {
                        doc.new_category(&name)
                    })
                    .await?;
            }
            CategoryCommand::List => {
                for category in self.document.categories() {
                    println!("{}", category.name);
                }
            }
            CategoryCommand::Delete { name } => {
                let category_id = self.category_id(&name)?;
                self.document
                    .transact("Delete category", Selection::None, |doc| {
                        doc.delete_category(category_id)
                    })
                    .await?;
            }
        }
        Ok(())
    }

    async fn money(&mut self, args: MoneyArgs, withdrawal: bool) -> Result<()> {
        let account_id = self.account_id(&args.account)?;
        let magnitude = parse_amount(&args.amount)?.abs();
        let amount = if withdrawal { -magnitude } else { magnitude };
        let mut cmd = NewTransactionCmd::new(account_id, parse_when(args.date.as_deref())?, amount);
        if let Some(payee) = args.payee {
            cmd = cmd.payee(payee);
        }
        if let Some(memo) = args.memo {
            cmd = cmd.memo(memo);
        }
        if let Some(category) = args.category {
            cmd = cmd.category(self.category_id(&category)?);
        }
        if let Some(check) = args.check {
            cmd = cmd.check_number(check);
        }
        let caption = if withdrawal { "Withdrawal" } else { "Deposit" };
        let id = self
            .document
            .transact(caption, Selection::Account { account_id }, |doc| {
                doc.new_transaction(cmd)
            })
            .await?;
        println!("{} {}", caption.to_lowercase(), short(id));
        Ok(())
    }

    async fn split(&mut self, command: SplitCommand) -> Result<()> {
        match command {
            SplitCommand::Add { transaction } => {
                let transaction_id = self.transaction_id(&transaction)?;
                let id = self
                    .document
                    .transact("New split", Selection::None, |doc| {
                        doc.new_split(transaction_id)
                    })
                    .await?;
                println!("split {}", short(id));
            }
            SplitCommand::List { transaction } => {
                let transaction_id = self.transaction_id(&transaction)?;
                for split in self.document.splits_of(transaction_id) {
                    let target = match split.target {
                        SplitTarget::None => String::new(),
                        SplitTarget::Category(id) => self
                            .document
                            .category(id)
                            .map(|category| category.name.clone())
                            .unwrap_or_default(),
                        SplitTarget::Transfer(id) => self
                            .document
                            .account(id)
                            .map(|account| format!("-> {}", account.name))
                            .unwrap_or_default(),
                    };
                    println!(
                        "{} {:>12} {:<20} {}",
                        short(split.id),
                        split.amount,
                        target,
                        split.memo.as_deref().unwrap_or("")
                    );
                }
            }
            SplitCommand::Amount { split, amount } => {
                let split_id = self.split_id(&split)?;
                let amount = parse_amount(&amount)?;
                self.document
                    .transact("Split amount", Selection::None, |doc| {
                        doc.set_split_amount(split_id, amount)
                    })
                    .await?;
            }
            SplitCommand::Target {
                split,
                category,
                account,
            } => {
                let split_id = self.split_id(&split)?;
                let target = match (category, account) {
                    (Some(category), _) => SplitTarget::Category(self.category_id(&category)?),
                    (_, Some(account)) => SplitTarget::Transfer(self.account_id(&account)?),
                    (None, None) => SplitTarget::None,
                };
                self.document
                    .transact("Split target", Selection::None, |doc| {
                        doc.set_split_target(split_id, target)
                    })
                    .await?;
            }
            SplitCommand::Memo { split, memo } => {
                let split_id = self.split_id(&split)?;
                self.document
                    .transact("Split memo", Selection::None, |doc| {
                        doc.set_split_memo(split_id, memo.as_deref())
                    })
                    .await?;
            }
            SplitCommand::Delete { transaction, split } => {
                let transaction_id = self.transaction_id(&transaction)?;
                let split_id = self.split_id(&split)?;
                self.document
                    .transact("Delete split", Selection::None, |doc| {
                        doc.delete_split(transaction_id, split_id)
                    })
                    .await?;
            }
            SplitCommand::Collapse { transaction, force } => {
                let transaction_id = self.transaction_id(&transaction)?;
                if !force && self.document.collapse_would_lose_data(transaction_id)? {
                    println!("several splits carry data, repeat with --force to merge them");
                    return Ok(());
                }
                self.document
                    .transact("Collapse splits", Selection::None, |doc| {
                        doc.collapse_splits(transaction_id)
                    })
                    .await?;
            }
        }
        Ok(())
    }

    async fn edit(&mut self, command: EditCommand) -> Result<()> {
        match command {
            EditCommand::When { transaction, date } => {
                let transaction_id = self.transaction_id(&transaction)?;
                let when = parse_when(Some(&date))?;
                self.document
                    .transact("Change date", Selection::None, |doc| {
                        doc.set_when(transaction_id, when)
                    })
                    .await?;
            }
            EditCommand::Payee { transaction, payee } => {
                let transaction_id = self.transaction_id(&transaction)?;
                self.document
                    .transact("Change payee", Selection::None, |doc| {
                        doc.set_payee(transaction_id, payee.as_deref())
                    })
                    .await?;
            }
            EditCommand::Memo { transaction, memo } => {
                let transaction_id = self.transaction_id(&transaction)?;
                self.document
                    .transact("Change memo", Selection::None, |doc| {
                        doc.set_memo(transaction_id, memo.as_deref())
                    })
                    .await?;
            }
            EditCommand::Category {
                transaction,
                category,
            } => {
                let transaction_id = self.transaction_id(&transaction)?;
                let category_id = category
                    .as_deref()
                    .map(|name| self.category_id(name))
                    .transpose()?;
                self.document
                    .transact("Change category", Selection::None, |doc| {
                        doc.set_category(transaction_id, category_id)
                    })
                    .await?;
            }
            EditCommand::Amount {
                transaction,
                account,
                amount,
            } => {
                let transaction_id = self.transaction_id(&transaction)?;
                let account_id = self.account_id(&account)?;
                let amount = parse_amount(&amount)?;
                self.document
                    .transact(
                        "Change amount",
                        transaction_selection(account_id, transaction_id),
                        |doc| doc.set_amount_for(transaction_id, account_id, amount),
                    )
                    .await?;
            }
            EditCommand::Transfer {
                transaction,
                account,
                to,
            } => {
                let transaction_id = self.transaction_id(&transaction)?;
                let account_id = self.account_id(&account)?;
                let other = to.as_deref().map(|name| self.account_id(name)).transpose()?;
                self.document
                    .transact(
                        "Change transfer",
                        transaction_selection(account_id, transaction_id),
                        |doc| doc.set_transfer_target(transaction_id, account_id, other),
                    )
                    .await?;
            }
        }
        Ok(())
    }
}

fn transaction_selection(account_id: Uuid, transaction_id: Uuid) -> Selection {
    Selection::Transaction {
        account_id,
        transaction_id,
    }
}

fn unique_match(prefix: &str, ids: Vec<Uuid>, label: &str) -> Result<Uuid> {
    let prefix = prefix.trim().to_lowercase().replace('-', "");
    let mut matches = ids
        .into_iter()
        .filter(|id| id.simple().to_string().starts_with(&prefix));
    match (matches.next(), matches.next()) {
        (Some(id), None) if !prefix.is_empty() => Ok(id),
        (Some(_), Some(_)) => Err(AppError::Usage(format!("ambiguous {label} id '{prefix}'"))),
        _ => Err(AppError::Usage(format!("unknown {label} '{prefix}'"))),
    }
}

#[cfg(test)]
mod tests {
    use engine::MemoryStore;

    use super::*;

    async fn shell() -> Shell<MemoryStore> {
        let document = Document::builder()
            .store(MemoryStore::new())
            .build()
            .await
            .unwrap();
        Shell::new(document)
    }

    #[test]
    fn quoted_words_stay_together() {
        assert_eq!(
            split_words(r#"deposit Checking 10 --payee "Corner Shop" --memo 'a b'"#).unwrap(),
            vec!["deposit", "Checking", "10", "--payee", "Corner Shop", "--memo", "a b"]
        );
        assert!(split_words("edit payee \"open").is_err());
    }

    #[test]
    fn days_parse_as_utc_midnight() {
        let day = parse_day("2021-03-04").unwrap();
        assert_eq!(day.to_rfc3339(), "2021-03-04T00:00:00+00:00");
        assert!(parse_day("04/03/2021").is_none());
    }

    #[tokio::test]
    async fn commands_drive_the_document() {
        let mut shell = shell().await;
        for line in [
            "account add Checking",
            "account add Savings",
            "deposit Checking 100 --date 2021-01-01",
            "transfer Checking Savings 40 --date 2021-01-02",
        ] {
            assert!(matches!(shell.execute_line(line).await.unwrap(), Flow::Continue));
        }

        let checking = shell.account_id("Checking").unwrap();
        let savings = shell.account_id("Savings").unwrap();
        assert_eq!(shell.document().balance(checking), Some(Money::new(6_000)));
        assert_eq!(shell.document().balance(savings), Some(Money::new(4_000)));
        assert_eq!(shell.document().net_worth(), Money::new(10_000));

        shell.execute_line("undo").await.unwrap();
        assert_eq!(shell.document().balance(savings), Some(Money::ZERO));
        assert!(matches!(shell.execute_line("quit").await.unwrap(), Flow::Quit));
    }

    #[tokio::test]
    async fn unknown_names_are_usage_errors() {
        let mut shell = shell().await;
        let result = shell.execute_line("deposit Nowhere 10").await;
        assert!(matches!(result, Err(AppError::Usage(_))));
    }
}
