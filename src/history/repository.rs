//! Session Repository: account-scoped access to stored sessions.
//!
//! Every query resolves the active account first and filters by it; account
//! rows can disappear while their sessions stay, so nothing here assumes the
//! `account_id` on a session still points at a live account.
//!
//! Storage failures on reads are logged and come back as empty results.
//! Writes return their error so the caller can retry instead of losing data.

use anyhow::Context;
use chrono::{Local, NaiveDate, TimeZone};

use crate::{
    db::{Database, Session},
    error::FocusResult,
};

use super::aggregate::SessionView;

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

#[derive(Clone)]
pub struct SessionRepository {
    db: Database,
}

impl SessionRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn active_account_id(&self) -> Option<String> {
        match self.db.get_active_account().await {
            Ok(account) => account.map(|account| account.id),
            Err(err) => {
                log_error!("Failed to resolve active account: {err:#}");
                None
            }
        }
    }

    /// Sessions for `account_id`, or for the active account when `None`.
    /// Newest `start_time` first.
    pub async fn get_all(&self, account_id: Option<&str>) -> Vec<Session> {
        let account_id = match account_id {
            Some(id) => id.to_string(),
            None => match self.active_account_id().await {
                Some(id) => id,
                None => return Vec::new(),
            },
        };

        self.db
            .list_sessions_for_account(&account_id)
            .await
            .unwrap_or_else(|err| {
                log_error!("Failed to list sessions for {account_id}: {err:#}");
                Vec::new()
            })
    }

    pub async fn get_by_id(&self, session_id: &str) -> Option<Session> {
        self.db.get_session(session_id).await.unwrap_or_else(|err| {
            log_error!("Failed to load session {session_id}: {err:#}");
            None
        })
    }

    /// Upsert by id. No validation happens here.
    pub async fn save(&self, session: &Session) -> FocusResult<()> {
        self.db
            .upsert_session(session)
            .await
            .with_context(|| format!("failed to save session {}", session.id))?;
        Ok(())
    }

    pub async fn delete(&self, session_id: &str) -> FocusResult<()> {
        self.db
            .delete_session(session_id)
            .await
            .with_context(|| format!("failed to delete session {session_id}"))?;
        Ok(())
    }

    /// Delete every session of the active account and nothing else.
    pub async fn delete_all(&self) -> FocusResult<usize> {
        let Some(account_id) = self.active_account_id().await else {
            return Ok(0);
        };

        let deleted = self
            .db
            .delete_sessions_for_account(&account_id)
            .await
            .with_context(|| format!("failed to delete sessions for {account_id}"))?;
        log_info!("Deleted {deleted} sessions for account {account_id}");
        Ok(deleted)
    }

    pub async fn get_unsynced(&self) -> Vec<Session> {
        let Some(account_id) = self.active_account_id().await else {
            return Vec::new();
        };

        self.db
            .list_unsynced_sessions(&account_id)
            .await
            .unwrap_or_else(|err| {
                log_error!("Failed to list unsynced sessions: {err:#}");
                Vec::new()
            })
    }

    pub async fn mark_as_synced(&self, session_id: &str) -> FocusResult<()> {
        self.db
            .mark_session_synced(session_id)
            .await
            .with_context(|| format!("failed to mark session {session_id} as synced"))?;
        Ok(())
    }

    pub async fn get_by_card(&self, card_id: &str) -> Vec<Session> {
        let Some(account_id) = self.active_account_id().await else {
            return Vec::new();
        };

        self.db
            .list_sessions_for_card(&account_id, card_id)
            .await
            .unwrap_or_else(|err| {
                log_error!("Failed to list sessions for card {card_id}: {err:#}");
                Vec::new()
            })
    }

    /// Seconds already logged on a card; seeds `previous_elapsed` for a new focus.
    pub async fn total_for_card(&self, card_id: &str) -> u64 {
        self.get_by_card(card_id)
            .await
            .iter()
            .fold(0u64, |acc, session| acc.saturating_add(session.duration))
    }

    pub async fn get_by_date(&self, date: NaiveDate) -> Vec<Session> {
        self.get_by_date_in(date, &Local).await
    }

    pub async fn get_by_date_in<Tz>(&self, date: NaiveDate, tz: &Tz) -> Vec<Session>
    where
        Tz: TimeZone + Sync,
    {
        let mut sessions = self.get_all(None).await;
        sessions.retain(|session| session.start_time.with_timezone(tz).date_naive() == date);
        sessions
    }

    /// Delete the stored sessions behind a history row. A merged row removes
    /// every member listed in `merged_ids`, in one transaction.
    pub async fn delete_view_record(&self, view: &SessionView) -> FocusResult<usize> {
        let ids = view.underlying_ids();
        let deleted = self
            .db
            .delete_sessions(ids)
            .await
            .with_context(|| format!("failed to delete history row {}", view.session.id))?;
        Ok(deleted)
    }

    /// Hand sessions written before account scoping to the active account.
    pub async fn adopt_unscoped_sessions(&self) -> FocusResult<usize> {
        let account = self
            .db
            .get_active_account()
            .await
            .context("failed to resolve active account")?;
        let Some(account) = account else {
            return Ok(0);
        };

        let adopted = self
            .db
            .adopt_unscoped_sessions(&account.id, &account.user_id)
            .await
            .context("failed to adopt unscoped sessions")?;
        if adopted > 0 {
            log_info!("Assigned {adopted} legacy sessions to account {}", account.id);
        }
        Ok(adopted)
    }
}
