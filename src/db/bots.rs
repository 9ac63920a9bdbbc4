//! Bot document persistence.
//!
//! One row per (user, bot). Both write paths upsert with merge semantics:
//! a status write must never clear the meeting URL written at launch, and
//! a status arriving before the launch row exists still lands.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use serde::Serialize;

/// A bot document from the database.
#[derive(Debug, Clone, Serialize)]
pub struct BotRow {
    pub bot_id: String,
    pub meeting_url: Option<String>,
    pub status: Option<String>,
    pub status_changed_at: Option<String>,
    pub created_at: String,
}

/// Repository for bot documents.
pub struct BotRepository;

impl BotRepository {
    /// Insert the launch-time document, updating the meeting URL if the
    /// row already exists.
    pub fn upsert(conn: &Connection, user_id: &str, bot_id: &str, meeting_url: &str) -> Result<()> {
        conn.execute(
            "INSERT INTO bots (user_id, bot_id, meeting_url) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id, bot_id) DO UPDATE SET meeting_url = excluded.meeting_url",
            params![user_id, bot_id, meeting_url],
        )
        .context("Failed to upsert bot document")?;
        Ok(())
    }

    /// Merge a status change into the document; other columns keep their
    /// values. A missing changed_at keeps the previous one.
    pub fn set_status(
        conn: &Connection,
        user_id: &str,
        bot_id: &str,
        status: &str,
        changed_at: Option<&str>,
    ) -> Result<()> {
        conn.execute(
            "INSERT INTO bots (user_id, bot_id, status, status_changed_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, bot_id) DO UPDATE SET
                 status = excluded.status,
                 status_changed_at = COALESCE(excluded.status_changed_at, bots.status_changed_at)",
            params![user_id, bot_id, status, changed_at],
        )
        .context("Failed to merge bot status")?;
        Ok(())
    }

    /// Get a bot document by (user, bot).
    pub fn get(conn: &Connection, user_id: &str, bot_id: &str) -> Result<Option<BotRow>> {
        let mut stmt = conn
            .prepare(
                "SELECT bot_id, meeting_url, status, status_changed_at, created_at \
                 FROM bots WHERE user_id = ?1 AND bot_id = ?2",
            )
            .context("Failed to prepare bot query")?;

        let mut rows = stmt
            .query_map(params![user_id, bot_id], |row| {
                Ok(BotRow {
                    bot_id: row.get(0)?,
                    meeting_url: row.get(1)?,
                    status: row.get(2)?,
                    status_changed_at: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })
            .context("Failed to query bot document")?;

        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// List a user's bot documents, newest first.
    pub fn list_for_user(conn: &Connection, user_id: &str) -> Result<Vec<BotRow>> {
        let mut stmt = conn
            .prepare(
                "SELECT bot_id, meeting_url, status, status_changed_at, created_at \
                 FROM bots WHERE user_id = ?1 ORDER BY created_at DESC, bot_id",
            )
            .context("Failed to prepare bots list query")?;

        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok(BotRow {
                    bot_id: row.get(0)?,
                    meeting_url: row.get(1)?,
                    status: row.get(2)?,
                    status_changed_at: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })
            .context("Failed to list bot documents")?;

        let mut bots = Vec::new();
        for row in rows {
            bots.push(row?);
        }

        Ok(bots)
    }
}
