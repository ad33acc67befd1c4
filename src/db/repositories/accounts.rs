use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_epoch_ms, to_epoch_ms},
    models::{NewAccount, StoredAccount},
};

const ACCOUNT_COLUMNS: &str = "id, token, slug, user_id, name, is_active, last_used";

fn row_to_account(row: &Row) -> Result<StoredAccount> {
    let last_used: i64 = row.get("last_used")?;

    Ok(StoredAccount {
        id: row.get("id")?,
        token: row.get("token")?,
        slug: row.get("slug")?,
        user_id: row.get("user_id")?,
        name: row.get("name")?,
        is_active: row.get("is_active")?,
        last_used: parse_epoch_ms(last_used, "last_used")?,
    })
}

fn query_accounts(conn: &rusqlite::Connection, sql: &str) -> Result<Vec<StoredAccount>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;
    let mut accounts = Vec::new();
    while let Some(row) = rows.next()? {
        accounts.push(row_to_account(row)?);
    }
    Ok(accounts)
}

impl Database {
    /// Most recently used first.
    pub async fn list_accounts(&self) -> Result<Vec<StoredAccount>> {
        self.execute(|conn| {
            query_accounts(
                conn,
                &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY last_used DESC, id ASC"),
            )
        })
        .await
    }

    pub async fn get_active_account(&self) -> Result<Option<StoredAccount>> {
        self.execute(|conn| {
            let mut accounts = query_accounts(
                conn,
                &format!(
                    "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE is_active = 1 ORDER BY last_used DESC"
                ),
            )?;
            Ok(if accounts.is_empty() {
                None
            } else {
                Some(accounts.swap_remove(0))
            })
        })
        .await
    }

    pub async fn get_account(&self, account_id: &str) -> Result<Option<StoredAccount>> {
        let account_id = account_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"
            ))?;
            let account = stmt
                .query_row(params![account_id], |row| Ok(row_to_account(row)))
                .optional()?
                .transpose()?;
            Ok(account)
        })
        .await
    }

    /// Insert or refresh credentials for a slug. Never changes `is_active`.
    pub async fn upsert_account(
        &self,
        account: &NewAccount,
        now: DateTime<Utc>,
    ) -> Result<StoredAccount> {
        let record = account.clone();
        self.execute(move |conn| {
            let id = record.account_id();
            if id.is_empty() {
                bail!("account slug is required");
            }

            conn.execute(
                "INSERT INTO accounts (id, token, slug, user_id, name, is_active, last_used)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                     token = excluded.token,
                     slug = excluded.slug,
                     user_id = excluded.user_id,
                     name = excluded.name,
                     last_used = excluded.last_used",
                params![
                    id,
                    record.token,
                    record.slug,
                    record.user_id,
                    record.name,
                    to_epoch_ms(&now),
                ],
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"
            ))?;
            let stored = stmt.query_row(params![id], |row| Ok(row_to_account(row)))??;
            Ok(stored)
        })
        .await
    }

    /// Make `account_id` the only active account.
    ///
    /// Clearing and setting happen in one transaction; if the target row does
    /// not exist the transaction rolls back and the previous active account
    /// stays active. Returns whether the target existed.
    pub async fn set_active_account(&self, account_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let account_id = account_id.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("UPDATE accounts SET is_active = 0 WHERE is_active = 1", [])?;
            let rows_affected = tx.execute(
                "UPDATE accounts SET is_active = 1, last_used = ?1 WHERE id = ?2",
                params![to_epoch_ms(&now), account_id],
            )?;

            if rows_affected == 0 {
                tx.rollback()?;
                return Ok(false);
            }

            tx.commit()?;
            Ok(true)
        })
        .await
    }

    /// Deletes the account row only; its sessions stay behind.
    pub async fn delete_account(&self, account_id: &str) -> Result<usize> {
        let account_id = account_id.to_string();
        self.execute(move |conn| {
            let rows_affected =
                conn.execute("DELETE FROM accounts WHERE id = ?1", params![account_id])?;
            Ok(rows_affected)
        })
        .await
    }
}
