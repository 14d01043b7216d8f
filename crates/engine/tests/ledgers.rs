use std::{cell::RefCell, rc::Rc};

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use engine::{
    AccountKind, ChangeOrigin, ChangeSet, ClearedState, CommitOutcome, Document, EngineError,
    EntrySource, MemoryStore, Money, NewTransactionCmd, Selection,
};

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 3, d, 0, 0, 0).unwrap()
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

async fn transaction(doc: &mut Document<MemoryStore>, cmd: NewTransactionCmd) -> Uuid {
    doc.transact("New transaction", Selection::None, |doc| {
        doc.new_transaction(cmd)
    })
    .await
    .unwrap()
}

fn balances(doc: &Document<MemoryStore>, account_id: Uuid) -> Vec<(Uuid, Money)> {
    doc.ledger(account_id)
        .unwrap()
        .iter()
        .map(|entry| (entry.id, entry.balance))
        .collect()
}

#[tokio::test]
async fn earlier_entry_shifts_later_balances() {
    let mut doc = document().await;
    let checking = account(&mut doc, "Checking").await;
    let tx1 = transaction(&mut doc, NewTransactionCmd::new(checking, day(10), Money::new(5))).await;
    let tx2 = transaction(&mut doc, NewTransactionCmd::new(checking, day(20), Money::new(8))).await;
    assert_eq!(
        balances(&doc, checking),
        vec![(tx1, Money::new(5)), (tx2, Money::new(13))]
    );

    let tx0 = transaction(&mut doc, NewTransactionCmd::new(checking, day(1), Money::new(4))).await;
    assert_eq!(
        balances(&doc, checking),
        vec![
            (tx0, Money::new(4)),
            (tx1, Money::new(9)),
            (tx2, Money::new(17))
        ]
    );
    assert_eq!(doc.balance(checking), Some(Money::new(17)));
}

#[tokio::test]
async fn same_day_sorts_larger_amounts_first() {
    let mut doc = document().await;
    let checking = account(&mut doc, "Checking").await;
    let small = transaction(&mut doc, NewTransactionCmd::new(checking, day(1), Money::new(-300))).await;
    let large = transaction(&mut doc, NewTransactionCmd::new(checking, day(1), Money::new(1_000))).await;

    assert_eq!(
        balances(&doc, checking),
        vec![(large, Money::new(1_000)), (small, Money::new(700))]
    );
}

#[tokio::test]
async fn transfer_appears_once_in_each_ledger() {
    let mut doc = document().await;
    let a = account(&mut doc, "A").await;
    let b = account(&mut doc, "B").await;
    let early = transaction(&mut doc, NewTransactionCmd::new(b, day(5), Money::new(100))).await;
    let tx = transaction(
        &mut doc,
        NewTransactionCmd::new(a, day(1), Money::new(-1_000)).transfer_to(b),
    )
    .await;

    let in_a = doc.ledger(a).unwrap();
    let in_b = doc.ledger(b).unwrap();
    assert_eq!(in_a.iter().filter(|entry| entry.id == tx).count(), 1);
    assert_eq!(in_b.iter().filter(|entry| entry.id == tx).count(), 1);
    assert_eq!(in_a[0].amount, Money::new(-1_000));
    assert_eq!(in_b[0].amount, Money::new(1_000));
    assert_eq!(in_b[0].source, EntrySource::Transaction);

    doc.transact(
        "Change date",
        Selection::Transaction {
            account_id: a,
            transaction_id: tx,
        },
        |doc| doc.set_when(tx, day(9)),
    )
    .await
    .unwrap();

    assert_eq!(
        balances(&doc, b),
        vec![(early, Money::new(100)), (tx, Money::new(1_100))]
    );
    assert_eq!(doc.ledger(a).unwrap()[0].when, day(9));
}

#[tokio::test]
async fn transfer_can_be_edited_and_deleted_from_either_side() {
    let mut doc = document().await;
    let a = account(&mut doc, "A").await;
    let b = account(&mut doc, "B").await;
    let tx = transaction(
        &mut doc,
        NewTransactionCmd::new(a, day(1), Money::new(-1_000)).transfer_to(b),
    )
    .await;

    doc.transact("Change amount", Selection::None, |doc| {
        doc.set_amount_for(tx, b, Money::new(2_500))
    })
    .await
    .unwrap();
    assert_eq!(doc.balance(a), Some(Money::new(-2_500)));
    assert_eq!(doc.balance(b), Some(Money::new(2_500)));

    doc.transact("Change payee", Selection::None, |doc| doc.set_payee(tx, Some("Rent")))
        .await
        .unwrap();
    assert_eq!(doc.ledger(a).unwrap()[0].payee.as_deref(), Some("Rent"));
    assert_eq!(doc.ledger(b).unwrap()[0].payee.as_deref(), Some("Rent"));

    doc.transact("Clear", Selection::None, |doc| {
        doc.set_cleared_for(tx, b, ClearedState::Reconciled)
    })
    .await
    .unwrap();
    let stored = doc.transaction(tx).unwrap();
    assert_eq!(stored.side_for(b).unwrap().cleared, ClearedState::Reconciled);
    assert_eq!(stored.side_for(a).unwrap().cleared, ClearedState::None);

    doc.transact("Delete", Selection::None, |doc| doc.delete_transaction(tx))
        .await
        .unwrap();
    assert!(doc.ledger(a).unwrap().is_empty());
    assert!(doc.ledger(b).unwrap().is_empty());
    assert_eq!(doc.net_worth(), Money::ZERO);
}

#[tokio::test]
async fn removing_the_transfer_target_leaves_a_withdrawal() {
    let mut doc = document().await;
    let a = account(&mut doc, "A").await;
    let b = account(&mut doc, "B").await;
    let tx = transaction(
        &mut doc,
        NewTransactionCmd::new(a, day(1), Money::new(-400)).transfer_to(b),
    )
    .await;

    doc.transact("Untransfer", Selection::None, |doc| {
        doc.set_transfer_target(tx, a, None)
    })
    .await
    .unwrap();

    assert!(!doc.transaction(tx).unwrap().is_transfer());
    assert_eq!(doc.balance(a), Some(Money::new(-400)));
    assert!(doc.ledger(b).unwrap().is_empty());
    assert_eq!(doc.net_worth(), Money::new(-400));
}

#[tokio::test]
async fn one_publication_per_commit_undo_and_redo() {
    let mut doc = document().await;
    let seen: Rc<RefCell<Vec<ChangeSet>>> = Rc::default();
    let sink = Rc::clone(&seen);
    let subscription = doc.subscribe(move |changes| sink.borrow_mut().push(changes.clone()));

    doc.begin("Setup", Selection::None).unwrap();
    let checking = doc.new_account("Checking", AccountKind::Banking).unwrap();
    doc.new_transaction(NewTransactionCmd::new(checking, day(1), Money::new(100)))
        .unwrap();
    doc.new_transaction(NewTransactionCmd::new(checking, day(2), Money::new(200)))
        .unwrap();
    assert!(seen.borrow().is_empty());
    assert_eq!(doc.commit().await.unwrap(), CommitOutcome::Committed { entities: 3 });

    {
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].origin, ChangeOrigin::Commit);
        assert_eq!(seen[0].inserted.len(), 3);
        assert!(seen[0].account_ids().contains(&checking));
    }

    doc.undo().await.unwrap();
    doc.redo().await.unwrap();
    {
        let seen = seen.borrow();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[1].origin, ChangeOrigin::Undo);
        assert_eq!(seen[1].deleted.len(), 3);
        assert_eq!(seen[2].origin, ChangeOrigin::Redo);
    }

    assert!(doc.unsubscribe(subscription));
    doc.transact("Rename", Selection::None, |doc| doc.rename_account(checking, "Main"))
        .await
        .unwrap();
    assert_eq!(seen.borrow().len(), 3);
}

#[tokio::test]
async fn nested_scopes_commit_as_one_unit() {
    let mut doc = document().await;
    doc.begin("Outer", Selection::None).unwrap();
    doc.new_account("A", AccountKind::Banking).unwrap();
    doc.begin("Inner", Selection::None).unwrap();
    doc.new_account("B", AccountKind::Investing).unwrap();
    assert_eq!(doc.commit().await.unwrap(), CommitOutcome::Nested);
    assert!(doc.store().is_empty());
    assert_eq!(
        doc.commit().await.unwrap(),
        CommitOutcome::Committed { entities: 2 }
    );

    assert_eq!(doc.undo_caption(), Some("Outer"));
    assert_eq!(doc.history().undo_captions().count(), 1);
    assert_eq!(doc.accounts().len(), 2);
}

#[tokio::test]
async fn validation_error_keeps_scope_open_and_history_untouched() {
    let mut doc = document().await;
    let checking = account(&mut doc, "Checking").await;

    doc.begin("Blank", Selection::None).unwrap();
    let mut account = doc.account(checking).unwrap().clone();
    account.name = "   ".to_string();
    doc.update(account).unwrap();
    let err = doc.commit().await.unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert!(doc.is_scope_open());
    assert_eq!(doc.history().undo_captions().count(), 1);
    assert!(matches!(doc.undo().await, Err(EngineError::ScopeOpen)));

    doc.rename_account(checking, "Main").unwrap();
    doc.commit().await.unwrap();
    assert!(!doc.is_scope_open());
    assert_eq!(doc.account(checking).unwrap().name, "Main");
    assert_eq!(doc.undo_caption(), Some("Blank"));
}

#[tokio::test]
async fn referenced_accounts_cannot_be_deleted() {
    let mut doc = document().await;
    let checking = account(&mut doc, "Checking").await;
    transaction(&mut doc, NewTransactionCmd::new(checking, day(1), Money::new(1))).await;

    let err = doc
        .transact("Delete account", Selection::None, |doc| doc.delete_account(checking))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert!(!doc.is_scope_open());
    assert!(doc.account(checking).is_some());

    let err = doc
        .transact("Duplicate", Selection::None, |doc| {
            doc.new_account("checking", AccountKind::Banking)
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));
}

#[tokio::test]
async fn net_worth_leaves_out_closed_accounts() {
    let mut doc = document().await;
    let checking = account(&mut doc, "Checking").await;
    let savings = account(&mut doc, "Savings").await;
    transaction(&mut doc, NewTransactionCmd::new(checking, day(1), Money::new(1_000))).await;
    transaction(&mut doc, NewTransactionCmd::new(savings, day(1), Money::new(5_000))).await;
    assert_eq!(doc.net_worth(), Money::new(6_000));

    doc.transact("Close", Selection::None, |doc| doc.set_account_closed(savings, true))
        .await
        .unwrap();
    assert_eq!(doc.net_worth(), Money::new(1_000));
    assert_eq!(doc.balance(savings), Some(Money::new(5_000)));

    doc.undo().await.unwrap();
    assert_eq!(doc.net_worth(), Money::new(6_000));
}

#[tokio::test]
async fn mutations_need_an_open_scope() {
    let mut doc = document().await;
    assert_eq!(
        doc.new_account("Checking", AccountKind::Banking),
        Err(EngineError::ScopeNotOpen)
    );
    assert_eq!(doc.commit().await, Err(EngineError::ScopeNotOpen));

    doc.begin("Nothing", Selection::None).unwrap();
    assert_eq!(doc.commit().await.unwrap(), CommitOutcome::NoChanges);
    assert!(!doc.can_undo());
}

#[tokio::test]
async fn overflowing_balances_are_rejected_before_storage() {
    let mut doc = document().await;
    let checking = account(&mut doc, "Checking").await;
    let savings = account(&mut doc, "Savings").await;
    let big: Money = "90000000000000000".parse().unwrap();
    let deposit = transaction(&mut doc, NewTransactionCmd::new(checking, day(1), big)).await;
    let stored = doc.store().len();

    let err = doc
        .transact("Deposit", Selection::None, |doc| {
            doc.new_transaction(NewTransactionCmd::new(checking, day(2), big))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));
    assert!(!doc.is_scope_open());
    assert_eq!(doc.store().len(), stored);
    assert_eq!(doc.balance(checking), Some(big));
    assert_eq!(doc.net_worth(), big);

    let err = doc
        .transact("Split", Selection::None, |doc| {
            doc.new_split(deposit)?;
            let extra = doc.new_split(deposit)?;
            doc.set_split_amount(extra, big)
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));
    assert!(doc.splits_of(deposit).is_empty());

    // each ledger fits on its own but the open balances together do not
    let err = doc
        .transact("Deposit", Selection::None, |doc| {
            doc.new_transaction(NewTransactionCmd::new(savings, day(3), big))
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));
    assert_eq!(doc.store().len(), stored);

    doc.transact("Close", Selection::None, |doc| doc.set_account_closed(checking, true))
        .await
        .unwrap();
    doc.transact("Deposit", Selection::None, |doc| {
        doc.new_transaction(NewTransactionCmd::new(savings, day(3), big))
    })
    .await
    .unwrap();
    assert_eq!(doc.net_worth(), big);

    let err = doc
        .transact("Reopen", Selection::None, |doc| doc.set_account_closed(checking, false))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));
    assert!(doc.account(checking).unwrap().closed);
}

#[tokio::test]
async fn large_transfer_fits_both_ledgers() {
    let mut doc = document().await;
    let a = account(&mut doc, "A").await;
    let b = account(&mut doc, "B").await;
    let big: Money = "90000000000000000".parse().unwrap();
    transaction(
        &mut doc,
        NewTransactionCmd::new(a, day(1), -big).transfer_to(b),
    )
    .await;

    assert_eq!(doc.balance(a), Some(-big));
    assert_eq!(doc.balance(b), Some(big));
    assert_eq!(doc.net_worth(), Money::ZERO);
}

#[tokio::test]
async fn failed_nested_transact_drops_its_staged_changes() {
    let mut doc = document().await;
    doc.begin("Outer", Selection::None).unwrap();
    let a = doc.new_account("A", AccountKind::Banking).unwrap();

    let err = doc
        .transact("Inner", Selection::None, |doc| {
            doc.new_account("B", AccountKind::Banking)?;
            doc.new_account("a", AccountKind::Banking)
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ExistingKey(_)));
    assert!(doc.is_scope_open());
    assert_eq!(doc.accounts().len(), 1);

    doc.new_account("C", AccountKind::Investing).unwrap();
    assert_eq!(
        doc.commit().await.unwrap(),
        CommitOutcome::Committed { entities: 2 }
    );
    let names: Vec<&str> = doc.accounts().iter().map(|account| account.name.as_str()).collect();
    assert_eq!(names, vec!["A", "C"]);
    assert!(doc.account(a).is_some());
    assert_eq!(doc.store().len(), 2);
}
