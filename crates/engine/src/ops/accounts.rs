use tracing::debug;
use uuid::Uuid;

use crate::{
    Account, AccountKind, EngineError, EntityKey, EntityStore, ResultEngine,
    util::normalize_required_name,
};

use super::Document;

impl<S: EntityStore> Document<S> {
    /// Add a new, open account. Names are unique, case-insensitively.
    pub fn new_account(&mut self, name: &str, kind: AccountKind) -> ResultEngine<Uuid> {
        let name = normalize_required_name(name, "account")?;
        self.ensure_unique_account_name(&name, None)?;
        let account = Account::new(name, kind);
        debug!(account_id = %account.id, "account staged");
        self.insert(account)
    }

    pub fn rename_account(&mut self, account_id: Uuid, name: &str) -> ResultEngine<()> {
        let name = normalize_required_name(name, "account")?;
        self.ensure_unique_account_name(&name, Some(account_id))?;
        let mut account = self.require_account(account_id)?.clone();
        account.name = name;
        self.update(account)
    }

    /// Closed accounts keep their ledger but leave the net worth.
    pub fn set_account_closed(&mut self, account_id: Uuid, closed: bool) -> ResultEngine<()> {
        let mut account = self.require_account(account_id)?.clone();
        account.closed = closed;
        self.update(account)
    }

    pub fn set_account_currency(
        &mut self,
        account_id: Uuid,
        currency_asset_id: Option<Uuid>,
    ) -> ResultEngine<()> {
        let mut account = self.require_account(account_id)?.clone();
        account.currency_asset_id = currency_asset_id;
        self.update(account)
    }

    /// Delete an account. Accounts still referenced by a transaction or a
    /// transfer split are rejected at commit.
    pub fn delete_account(&mut self, account_id: Uuid) -> ResultEngine<()> {
        self.require_account(account_id)?;
        self.delete(EntityKey::account(account_id))?;
        Ok(())
    }

    /// Find an account by name, case-insensitively.
    pub fn account_by_name(&self, name: &str) -> Option<&Account> {
        let name = name.trim().to_lowercase();
        self.accounts()
            .into_iter()
            .find(|account| account.name.to_lowercase() == name)
    }

    fn ensure_unique_account_name(&self, name: &str, except: Option<Uuid>) -> ResultEngine<()> {
        if self
            .account_by_name(name)
            .is_some_and(|account| Some(account.id) != except)
        {
            return Err(EngineError::ExistingKey(name.to_string()));
        }
        Ok(())
    }
}
