use anyhow::Result;
use rusqlite::{params, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_epoch_ms, parse_optional_epoch_ms, to_epoch_ms, to_i64, to_u64},
    models::Session,
};

const SESSION_COLUMNS: &str = "id, account_id, user_id, card_id, card_title, card_number, board_id, board_name, start_time, end_time, duration, notes, synced";

fn row_to_session(row: &Row) -> Result<Session> {
    let start_time: i64 = row.get("start_time")?;
    let end_time: Option<i64> = row.get("end_time")?;
    let duration: i64 = row.get("duration")?;
    let account_id: Option<String> = row.get("account_id")?;
    let user_id: Option<String> = row.get("user_id")?;

    Ok(Session {
        id: row.get("id")?,
        account_id: account_id.unwrap_or_default(),
        user_id: user_id.unwrap_or_default(),
        card_id: row.get("card_id")?,
        card_title: row.get("card_title")?,
        card_number: row.get("card_number")?,
        board_id: row.get("board_id")?,
        board_name: row.get("board_name")?,
        start_time: parse_epoch_ms(start_time, "start_time")?,
        end_time: parse_optional_epoch_ms(end_time, "end_time")?,
        duration: to_u64(duration, "duration")?,
        notes: row.get("notes")?,
        synced: row.get("synced")?,
    })
}

fn collect_sessions(rows: &mut rusqlite::Rows<'_>) -> Result<Vec<Session>> {
    let mut sessions = Vec::new();
    while let Some(row) = rows.next()? {
        sessions.push(row_to_session(row)?);
    }
    Ok(sessions)
}

impl Database {
    /// Insert or replace by id.
    pub async fn upsert_session(&self, session: &Session) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, account_id, user_id, card_id, card_title, card_number, board_id, board_name, start_time, end_time, duration, notes, synced)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(id) DO UPDATE SET
                     account_id = excluded.account_id,
                     user_id = excluded.user_id,
                     card_id = excluded.card_id,
                     card_title = excluded.card_title,
                     card_number = excluded.card_number,
                     board_id = excluded.board_id,
                     board_name = excluded.board_name,
                     start_time = excluded.start_time,
                     end_time = excluded.end_time,
                     duration = excluded.duration,
                     notes = excluded.notes,
                     synced = excluded.synced",
                params![
                    record.id,
                    record.account_id,
                    record.user_id,
                    record.card_id,
                    record.card_title,
                    record.card_number,
                    record.board_id,
                    record.board_name,
                    to_epoch_ms(&record.start_time),
                    record.end_time.as_ref().map(to_epoch_ms),
                    to_i64(record.duration)?,
                    record.notes,
                    record.synced,
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"
            ))?;

            let session = stmt
                .query_row(params![session_id], |row| Ok(row_to_session(row)))
                .optional()?
                .transpose()?;

            Ok(session)
        })
        .await
    }

    /// Sessions owned by `account_id`, newest start first.
    pub async fn list_sessions_for_account(&self, account_id: &str) -> Result<Vec<Session>> {
        let account_id = account_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE account_id = ?1
                 ORDER BY start_time DESC"
            ))?;
            let mut rows = stmt.query(params![account_id])?;
            collect_sessions(&mut rows)
        })
        .await
    }

    pub async fn list_unsynced_sessions(&self, account_id: &str) -> Result<Vec<Session>> {
        let account_id = account_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE account_id = ?1 AND synced = 0
                 ORDER BY start_time DESC"
            ))?;
            let mut rows = stmt.query(params![account_id])?;
            collect_sessions(&mut rows)
        })
        .await
    }

    pub async fn list_sessions_for_card(
        &self,
        account_id: &str,
        card_id: &str,
    ) -> Result<Vec<Session>> {
        let account_id = account_id.to_string();
        let card_id = card_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE account_id = ?1 AND card_id = ?2
                 ORDER BY start_time DESC"
            ))?;
            let mut rows = stmt.query(params![account_id, card_id])?;
            collect_sessions(&mut rows)
        })
        .await
    }

    /// Idempotent: a missing id is not an error.
    pub async fn delete_session(&self, session_id: &str) -> Result<usize> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let rows_affected =
                conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
            Ok(rows_affected)
        })
        .await
    }

    /// Delete several sessions in one transaction.
    pub async fn delete_sessions(&self, session_ids: Vec<String>) -> Result<usize> {
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let mut deleted = 0;
            {
                let mut stmt = tx.prepare("DELETE FROM sessions WHERE id = ?1")?;
                for id in &session_ids {
                    deleted += stmt.execute(params![id])?;
                }
            }
            tx.commit()?;
            Ok(deleted)
        })
        .await
    }

    pub async fn delete_sessions_for_account(&self, account_id: &str) -> Result<usize> {
        let account_id = account_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "DELETE FROM sessions WHERE account_id = ?1",
                params![account_id],
            )?;
            Ok(rows_affected)
        })
        .await
    }

    pub async fn mark_session_synced(&self, session_id: &str) -> Result<usize> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE sessions SET synced = 1 WHERE id = ?1",
                params![session_id],
            )?;
            Ok(rows_affected)
        })
        .await
    }

    /// Assign sessions that predate account scoping to `account_id`.
    pub async fn adopt_unscoped_sessions(&self, account_id: &str, user_id: &str) -> Result<usize> {
        let account_id = account_id.to_string();
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE sessions
                 SET account_id = ?1,
                     user_id = COALESCE(NULLIF(user_id, ''), ?2)
                 WHERE account_id IS NULL OR account_id = ''",
                params![account_id, user_id],
            )?;
            Ok(rows_affected)
        })
        .await
    }
}
