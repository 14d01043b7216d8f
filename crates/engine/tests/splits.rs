use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use engine::{
    AccountKind, CategoryRef, Document, EngineError, EntityKey, MemoryStore, Money,
    NewTransactionCmd, Selection, SplitEntry, SplitTarget,
};

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 1, d, 0, 0, 0).unwrap()
}

async fn document() -> Document<MemoryStore> {
    Document::builder()
        .store(MemoryStore::new())
        .build()
        .await
        .unwrap()
}

async fn account(doc: &mut Document<MemoryStore>, name: &str) -> Uuid {
    doc.transact("New account", Selection::None, |doc| {
        doc.new_account(name, AccountKind::Banking)
    })
    .await
    .unwrap()
}

async fn category(doc: &mut Document<MemoryStore>, name: &str) -> Uuid {
    doc.transact("New category", Selection::None, |doc| doc.new_category(name))
        .await
        .unwrap()
}

async fn transaction(doc: &mut Document<MemoryStore>, cmd: NewTransactionCmd) -> Uuid {
    doc.transact("New transaction", Selection::None, |doc| {
        doc.new_transaction(cmd)
    })
    .await
    .unwrap()
}

async fn split(doc: &mut Document<MemoryStore>, tx: Uuid, amount: i64, target: SplitTarget) -> Uuid {
    doc.transact("New split", Selection::None, |doc| {
        let id = doc.new_split(tx)?;
        doc.set_split_amount(id, Money::new(amount))?;
        doc.set_split_target(id, target)?;
        Ok(id)
    })
    .await
    .unwrap()
}

fn assert_split_sum(doc: &Document<MemoryStore>, tx: Uuid) {
    let parent = doc.transaction(tx).unwrap();
    let home = parent.home_account().unwrap();
    let sum: Money = doc.splits_of(tx).iter().map(|split| split.amount).sum();
    assert_eq!(parent.amount_for(home), Some(sum));
}

#[tokio::test]
async fn deleting_second_to_last_split_absorbs_the_remaining_one() {
    let mut doc = document().await;
    let checking = account(&mut doc, "Checking").await;
    let food = category(&mut doc, "Food").await;
    let fun = category(&mut doc, "Fun").await;
    let tx = transaction(&mut doc, NewTransactionCmd::new(checking, day(1), Money::ZERO)).await;

    let a = split(&mut doc, tx, 1_000, SplitTarget::Category(food)).await;
    let b = split(&mut doc, tx, 500, SplitTarget::Category(fun)).await;
    doc.transact("Split memo", Selection::None, |doc| {
        doc.set_split_memo(b, Some("tickets"))
    })
    .await
    .unwrap();
    assert!(doc.transaction(tx).unwrap().is_split());
    assert_split_sum(&doc, tx);
    assert_eq!(doc.balance(checking), Some(Money::new(1_500)));

    doc.transact("Delete split", Selection::None, |doc| doc.delete_split(tx, a))
        .await
        .unwrap();

    let parent = doc.transaction(tx).unwrap();
    assert_eq!(parent.amount_for(checking), Some(Money::new(500)));
    assert_eq!(parent.category, CategoryRef::Category(fun));
    assert_eq!(parent.memo.as_deref(), Some("tickets"));
    assert!(!parent.is_split());
    assert!(doc.split(b).is_none());
    assert!(doc.splits_of(tx).is_empty());
    assert!(doc.store().get(&EntityKey::split(b)).is_none());
    assert_eq!(doc.balance(checking), Some(Money::new(500)));
}

#[tokio::test]
async fn deleting_the_only_split_reverts_to_an_empty_transaction() {
    let mut doc = document().await;
    let checking = account(&mut doc, "Checking").await;
    let tx = transaction(
        &mut doc,
        NewTransactionCmd::new(checking, day(1), Money::new(-2_000)),
    )
    .await;
    let only = doc
        .transact("New split", Selection::None, |doc| doc.new_split(tx))
        .await
        .unwrap();
    assert_eq!(doc.split(only).unwrap().amount, Money::new(-2_000));

    doc.transact("Delete split", Selection::None, |doc| doc.delete_split(tx, only))
        .await
        .unwrap();

    let parent = doc.transaction(tx).unwrap();
    assert_eq!(parent.amount_for(checking), Some(Money::ZERO));
    assert_eq!(parent.category, CategoryRef::None);
    assert_eq!(doc.balance(checking), Some(Money::ZERO));
}

#[tokio::test]
async fn first_split_inherits_amount_and_category() {
    let mut doc = document().await;
    let checking = account(&mut doc, "Checking").await;
    let food = category(&mut doc, "Food").await;
    let tx = transaction(
        &mut doc,
        NewTransactionCmd::new(checking, day(1), Money::new(-1_500)).category(food),
    )
    .await;

    let first = doc
        .transact("New split", Selection::None, |doc| doc.new_split(tx))
        .await
        .unwrap();
    let second = doc
        .transact("New split", Selection::None, |doc| doc.new_split(tx))
        .await
        .unwrap();

    let line = doc.split(first).unwrap();
    assert_eq!(line.amount, Money::new(-1_500));
    assert_eq!(line.target, SplitTarget::Category(food));
    assert!(doc.split(second).unwrap().is_trivial());
    assert_eq!(doc.transaction(tx).unwrap().category, CategoryRef::Split);
    let ids: Vec<Uuid> = doc.splits_of(tx).iter().map(|split| split.id).collect();
    assert_eq!(ids, vec![first, second]);
    assert_eq!(doc.balance(checking), Some(Money::new(-1_500)));
}

#[tokio::test]
async fn parent_amount_follows_its_lines_across_zero() {
    let mut doc = document().await;
    let checking = account(&mut doc, "Checking").await;
    let food = category(&mut doc, "Food").await;
    let tx = transaction(
        &mut doc,
        NewTransactionCmd::new(checking, day(1), Money::new(-300)),
    )
    .await;
    let first = doc
        .transact("New split", Selection::None, |doc| doc.new_split(tx))
        .await
        .unwrap();
    split(&mut doc, tx, 1_000, SplitTarget::Category(food)).await;

    let parent = doc.transaction(tx).unwrap();
    assert_eq!(parent.amount_for(checking), Some(Money::new(700)));
    assert!(parent.credit.is_some() && parent.debit.is_none());
    assert_split_sum(&doc, tx);

    doc.transact("Split amount", Selection::None, |doc| {
        doc.set_split_amount(first, Money::new(-1_200))
    })
    .await
    .unwrap();
    let parent = doc.transaction(tx).unwrap();
    assert_eq!(parent.amount_for(checking), Some(Money::new(-200)));
    assert!(parent.debit.is_some() && parent.credit.is_none());
    assert_eq!(doc.balance(checking), Some(Money::new(-200)));
}

#[tokio::test]
async fn collapse_sums_lines_and_asks_before_losing_data() {
    let mut doc = document().await;
    let checking = account(&mut doc, "Checking").await;
    let food = category(&mut doc, "Food").await;
    let fun = category(&mut doc, "Fun").await;
    let tx = transaction(&mut doc, NewTransactionCmd::new(checking, day(1), Money::ZERO)).await;
    split(&mut doc, tx, -1_000, SplitTarget::Category(food)).await;
    assert!(!doc.collapse_would_lose_data(tx).unwrap());
    split(&mut doc, tx, -500, SplitTarget::Category(fun)).await;
    assert!(doc.collapse_would_lose_data(tx).unwrap());

    doc.transact("Collapse", Selection::None, |doc| doc.collapse_splits(tx))
        .await
        .unwrap();

    let parent = doc.transaction(tx).unwrap();
    assert_eq!(parent.amount_for(checking), Some(Money::new(-1_500)));
    assert_eq!(parent.category, CategoryRef::None);
    assert!(doc.splits_of(tx).is_empty());
    assert_eq!(doc.store().len(), 4);

    let err = doc
        .transact("Collapse", Selection::None, |doc| doc.collapse_splits(tx))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn split_sum_mismatch_is_an_invariant_violation() {
    let mut doc = document().await;
    let checking = account(&mut doc, "Checking").await;
    let tx = transaction(
        &mut doc,
        NewTransactionCmd::new(checking, day(1), Money::new(100)),
    )
    .await;
    let line = doc
        .transact("New split", Selection::None, |doc| doc.new_split(tx))
        .await
        .unwrap();

    doc.begin("Raw edit", Selection::None).unwrap();
    let mut broken: SplitEntry = doc.split(line).unwrap().clone();
    broken.amount = Money::new(999);
    doc.update(broken).unwrap();
    let err = doc.commit().await.unwrap_err();
    assert!(matches!(err, EngineError::Invariant(_)));
    assert!(doc.is_scope_open());
    doc.cancel().unwrap();

    assert_eq!(doc.split(line).unwrap().amount, Money::new(100));
    assert_eq!(doc.balance(checking), Some(Money::new(100)));
}

#[tokio::test]
async fn transfer_split_shows_in_the_target_ledger() {
    let mut doc = document().await;
    let checking = account(&mut doc, "Checking").await;
    let savings = account(&mut doc, "Savings").await;
    let food = category(&mut doc, "Food").await;
    let tx = transaction(
        &mut doc,
        NewTransactionCmd::new(checking, day(3), Money::ZERO).payee("Payroll"),
    )
    .await;
    let to_savings = split(&mut doc, tx, -4_000, SplitTarget::Transfer(savings)).await;
    split(&mut doc, tx, -1_000, SplitTarget::Category(food)).await;

    assert_eq!(doc.balance(checking), Some(Money::new(-5_000)));
    assert_eq!(doc.balance(savings), Some(Money::new(4_000)));
    let entries = doc.ledger(savings).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, to_savings);
    assert_eq!(entries[0].when, day(3));
    assert_eq!(entries[0].payee.as_deref(), Some("Payroll"));

    doc.transact("Move", Selection::None, |doc| doc.set_when(tx, day(9)))
        .await
        .unwrap();
    assert_eq!(doc.ledger(savings).unwrap()[0].when, day(9));

    let err = doc
        .transact("Self transfer", Selection::None, |doc| {
            doc.set_split_target(to_savings, SplitTarget::Transfer(checking))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    doc.transact("Delete", Selection::None, |doc| doc.delete_transaction(tx))
        .await
        .unwrap();
    assert!(doc.ledger(savings).unwrap().is_empty());
    assert_eq!(doc.net_worth(), Money::ZERO);
}

#[tokio::test]
async fn splitting_a_transfer_keeps_both_ledgers() {
    let mut doc = document().await;
    let checking = account(&mut doc, "Checking").await;
    let savings = account(&mut doc, "Savings").await;
    let tx = transaction(
        &mut doc,
        NewTransactionCmd::new(checking, day(1), Money::new(-2_500)).transfer_to(savings),
    )
    .await;

    let line = doc
        .transact("New split", Selection::None, |doc| doc.new_split(tx))
        .await
        .unwrap();

    let split = doc.split(line).unwrap();
    assert_eq!(split.target, SplitTarget::Transfer(savings));
    assert_eq!(split.amount, Money::new(-2_500));
    assert_eq!(doc.transaction(tx).unwrap().home_account(), Some(checking));
    assert_eq!(doc.balance(checking), Some(Money::new(-2_500)));
    assert_eq!(doc.balance(savings), Some(Money::new(2_500)));
    assert_eq!(doc.ledger(savings).unwrap()[0].id, line);

    doc.transact("Delete split", Selection::None, |doc| doc.delete_split(tx, line))
        .await
        .unwrap();
    assert_eq!(doc.ledger(checking).unwrap()[0].amount, Money::ZERO);
    assert!(doc.ledger(savings).unwrap().is_empty());
}
