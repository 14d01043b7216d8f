use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::{Rng, SeedableRng, rngs::StdRng};
use uuid::Uuid;

use engine::{
    AccountKind, Document, MemoryStore, Money, NewTransactionCmd, ResultEngine, Selection,
    SplitTarget,
};

fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(n)
}

fn amount(rng: &mut StdRng) -> Money {
    Money::new(rng.gen_range(-50_000..50_000))
}

fn pick<T: Copy>(rng: &mut StdRng, items: &[T]) -> Option<T> {
    match items.len() {
        0 => None,
        len => Some(items[rng.gen_range(0..len)]),
    }
}

/// One edit staged in the open scope, picked so that it always applies.
fn random_edit(
    doc: &mut Document<MemoryStore>,
    rng: &mut StdRng,
    accounts: &[Uuid],
) -> ResultEngine<()> {
    let transactions: Vec<Uuid> = doc.transactions().iter().map(|tx| tx.id).collect();
    let Some(tx_id) = pick(rng, &transactions).filter(|_| rng.gen_range(0..6) != 0) else {
        let account_id = pick(rng, accounts).unwrap_or_default();
        let mut cmd = NewTransactionCmd::new(account_id, day(rng.gen_range(0..20)), amount(rng));
        if rng.gen_bool(0.4) {
            if let Some(other) = pick(rng, accounts).filter(|other| *other != account_id) {
                cmd = cmd.transfer_to(other);
            }
        }
        return doc.new_transaction(cmd).map(|_| ());
    };

    let Some(tx) = doc.transaction(tx_id).cloned() else {
        return Ok(());
    };
    let Some(account_id) = tx.account_ids().first().copied() else {
        return Ok(());
    };
    match rng.gen_range(0..5) {
        0 => doc.set_when(tx_id, day(rng.gen_range(0..20))),
        1 if !tx.is_split() => doc.set_amount_for(tx_id, account_id, amount(rng)),
        1 | 2 => {
            let lines: Vec<Uuid> = doc.splits_of(tx_id).iter().map(|split| split.id).collect();
            let line = match pick(rng, &lines) {
                Some(line) if rng.gen_bool(0.7) => line,
                _ => doc.new_split(tx_id)?,
            };
            doc.set_split_amount(line, amount(rng))
        }
        3 => {
            let first = doc.splits_of(tx_id).first().map(|split| split.id);
            let line = match first {
                Some(line) => line,
                None => doc.new_split(tx_id)?,
            };
            let home = doc.transaction(tx_id).and_then(|tx| tx.home_account());
            let others: Vec<Uuid> = accounts
                .iter()
                .copied()
                .filter(|other| Some(*other) != home)
                .collect();
            let target = match pick(rng, &others) {
                Some(other) => SplitTarget::Transfer(other),
                None => SplitTarget::None,
            };
            doc.set_split_target(line, target)
        }
        _ => doc.delete_transaction(tx_id),
    }
}

async fn assert_matches_rebuild(doc: &Document<MemoryStore>, accounts: &[Uuid], context: &str) {
    let rebuilt = Document::builder()
        .store(doc.store().clone())
        .build()
        .await
        .unwrap();
    for &account_id in accounts {
        assert_eq!(
            doc.ledger(account_id),
            rebuilt.ledger(account_id),
            "{context}: ledger {account_id}"
        );
    }
    assert_eq!(doc.net_worth(), rebuilt.net_worth(), "{context}: net worth");
}

#[tokio::test]
async fn multi_edit_scopes_match_a_rebuilt_document() {
    for seed in [3_u64, 17, 2_024] {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut doc = Document::builder()
            .store(MemoryStore::new())
            .undo_capacity(100)
            .build()
            .await
            .unwrap();
        let accounts = doc
            .transact("Setup", Selection::None, |doc| {
                ["Checking", "Savings", "Cash"]
                    .into_iter()
                    .map(|name| doc.new_account(name, AccountKind::Banking))
                    .collect::<ResultEngine<Vec<Uuid>>>()
            })
            .await
            .unwrap();

        for step in 0..60 {
            let edits = rng.gen_range(2..6);
            doc.transact(format!("Edit {step}"), Selection::None, |doc| {
                for _ in 0..edits {
                    random_edit(doc, &mut rng, &accounts)?;
                }
                Ok(())
            })
            .await
            .unwrap_or_else(|err| panic!("seed {seed} step {step}: {err}"));
            let context = format!("seed {seed} step {step}");
            assert_matches_rebuild(&doc, &accounts, &context).await;

            if step % 4 == 3 {
                doc.undo().await.unwrap();
                assert_matches_rebuild(&doc, &accounts, &format!("{context} undo")).await;
                doc.redo().await.unwrap();
                assert_matches_rebuild(&doc, &accounts, &format!("{context} redo")).await;
            }
        }

        while doc.undo_caption().is_some_and(|caption| caption != "Setup") {
            doc.undo().await.unwrap();
        }
        assert_matches_rebuild(&doc, &accounts, &format!("seed {seed} unwound")).await;
        assert!(doc.transactions().is_empty(), "seed {seed}");
        assert_eq!(doc.net_worth(), Money::ZERO, "seed {seed}");
    }
}
