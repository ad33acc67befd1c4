use anyhow::Context;
use chrono::Utc;
use log::info;

use crate::{
    board::models::Identity,
    db::{Database, NewAccount, StoredAccount},
    error::{FocusError, FocusResult},
};

const ENABLE_LOGS: bool = true;

use crate::log_error;

/// Stored accounts with at most one active at any time.
#[derive(Clone)]
pub struct AccountRepository {
    db: Database,
}

impl AccountRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Most recently used first.
    pub async fn get_all(&self) -> Vec<StoredAccount> {
        self.db.list_accounts().await.unwrap_or_else(|err| {
            log_error!("Failed to list accounts: {err:#}");
            Vec::new()
        })
    }

    pub async fn get_active(&self) -> Option<StoredAccount> {
        self.db.get_active_account().await.unwrap_or_else(|err| {
            log_error!("Failed to load active account: {err:#}");
            None
        })
    }

    pub async fn get_by_id(&self, account_id: &str) -> Option<StoredAccount> {
        self.db.get_account(account_id).await.unwrap_or_else(|err| {
            log_error!("Failed to load account {account_id}: {err:#}");
            None
        })
    }

    /// Store credentials keyed by slug. Does not activate.
    pub async fn add(&self, account: NewAccount) -> FocusResult<StoredAccount> {
        if account.account_id().is_empty() {
            return Err(FocusError::validation("account slug is required"));
        }

        let stored = self
            .db
            .upsert_account(&account, Utc::now())
            .await
            .with_context(|| format!("failed to store account {}", account.slug))?;
        Ok(stored)
    }

    /// Clear every active flag and set it on `account_id`, atomically.
    pub async fn set_active(&self, account_id: &str) -> FocusResult<()> {
        let found = self
            .db
            .set_active_account(account_id, Utc::now())
            .await
            .with_context(|| format!("failed to activate account {account_id}"))?;

        if !found {
            return Err(FocusError::not_found(format!("account {account_id}")));
        }
        info!("Switched active account to {account_id}");
        Ok(())
    }

    /// Remove the account row. Its sessions stay in storage, out of view.
    pub async fn remove(&self, account_id: &str) -> FocusResult<()> {
        self.db
            .delete_account(account_id)
            .await
            .with_context(|| format!("failed to remove account {account_id}"))?;
        Ok(())
    }

    /// Store every account a validated token can reach. The first one is
    /// activated only when nothing is active yet (first-time setup).
    pub async fn register_identity(
        &self,
        token: &str,
        identity: &Identity,
    ) -> FocusResult<Vec<StoredAccount>> {
        if identity.accounts.is_empty() {
            return Err(FocusError::validation(
                "token is valid but has no accessible accounts",
            ));
        }

        let mut stored = Vec::with_capacity(identity.accounts.len());
        for remote in &identity.accounts {
            let account = self
                .add(NewAccount {
                    token: token.to_string(),
                    slug: remote.slug.clone(),
                    user_id: remote.user.id.clone(),
                    name: remote.name.clone(),
                })
                .await?;
            stored.push(account);
        }

        if self.get_active().await.is_none() {
            if let Some(first) = stored.first() {
                self.set_active(&first.id).await?;
            }
        }

        let mut refreshed = Vec::with_capacity(stored.len());
        for account in &stored {
            if let Some(account) = self.get_by_id(&account.id).await {
                refreshed.push(account);
            }
        }
        Ok(refreshed)
    }
}
