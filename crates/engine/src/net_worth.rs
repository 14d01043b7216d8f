use std::collections::HashMap;

use uuid::Uuid;

use crate::{Account, Ledger, Money};

/// Sum of the balances of every open account.
///
/// Contributions are cached per account so a change notification only
/// touches the accounts it references. The total wraps while accounts are
/// refreshed one at a time and is exact once all of them are.
#[derive(Clone, Debug, Default)]
pub struct NetWorth {
    contributions: HashMap<Uuid, Money>,
    total: Money,
}

impl NetWorth {
    pub fn total(&self) -> Money {
        self.total
    }

    pub fn contribution(&self, account_id: Uuid) -> Money {
        self.contributions
            .get(&account_id)
            .copied()
            .unwrap_or_default()
    }

    /// Refresh one account. A missing or closed account contributes nothing.
    pub(crate) fn refresh(&mut self, account_id: Uuid, account: Option<&Account>, ledger: Option<&Ledger>) {
        let previous = self.contributions.remove(&account_id).unwrap_or_default();
        self.total = self.total.wrapping_sub(previous);
        let Some(account) = account.filter(|account| !account.closed) else {
            return;
        };
        let balance = ledger.map_or(Money::ZERO, Ledger::balance);
        self.contributions.insert(account.id, balance);
        self.total = self.total.wrapping_add(balance);
    }
}
