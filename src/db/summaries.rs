//! Meeting summary persistence.
//!
//! Append-only history per (user, bot); attendees and transcription are
//! stored as JSON text columns.

use anyhow::{Context, Result};
use rusqlite::{params, types::Type, Connection};
use serde::Serialize;

/// A persisted meeting summary.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRow {
    pub id: i64,
    pub bot_id: String,
    pub attendees: serde_json::Value,
    pub transcription: Vec<String>,
    pub summary: String,
    pub mp4_url: String,
    pub created_at: String,
}

/// Fields of a summary about to be written.
#[derive(Debug, Clone)]
pub struct NewSummary {
    pub attendees: serde_json::Value,
    pub transcription: Vec<String>,
    pub summary: String,
    pub mp4_url: String,
}

/// Repository for meeting summaries.
pub struct SummaryRepository;

impl SummaryRepository {
    /// Append a summary record. Returns the new row ID.
    pub fn append(
        conn: &Connection,
        user_id: &str,
        bot_id: &str,
        record: &NewSummary,
    ) -> Result<i64> {
        let attendees =
            serde_json::to_string(&record.attendees).context("Failed to encode attendees")?;
        let transcription = serde_json::to_string(&record.transcription)
            .context("Failed to encode transcription")?;
        conn.execute(
            "INSERT INTO summaries (user_id, bot_id, attendees, transcription, summary, mp4_url) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user_id,
                bot_id,
                attendees,
                transcription,
                record.summary,
                record.mp4_url,
            ],
        )
        .context("Failed to insert summary")?;

        Ok(conn.last_insert_rowid())
    }

    /// Get a summary by ID.
    pub fn get(conn: &Connection, id: i64) -> Result<Option<SummaryRow>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, bot_id, attendees, transcription, summary, mp4_url, created_at \
                 FROM summaries WHERE id = ?1",
            )
            .context("Failed to prepare summary query")?;

        let mut rows = stmt
            .query_map(params![id], Self::map_row)
            .context("Failed to query summary")?;

        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// List a bot's summaries, oldest first.
    pub fn list_for_bot(conn: &Connection, user_id: &str, bot_id: &str) -> Result<Vec<SummaryRow>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, bot_id, attendees, transcription, summary, mp4_url, created_at \
                 FROM summaries WHERE user_id = ?1 AND bot_id = ?2 ORDER BY id",
            )
            .context("Failed to prepare summaries list query")?;

        let rows = stmt
            .query_map(params![user_id, bot_id], Self::map_row)
            .context("Failed to list summaries")?;

        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?);
        }

        Ok(summaries)
    }

    /// The most recent summary across all of a user's bots.
    pub fn latest_for_user(conn: &Connection, user_id: &str) -> Result<Option<SummaryRow>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, bot_id, attendees, transcription, summary, mp4_url, created_at \
                 FROM summaries WHERE user_id = ?1 ORDER BY created_at DESC, id DESC LIMIT 1",
            )
            .context("Failed to prepare latest summary query")?;

        let mut rows = stmt
            .query_map(params![user_id], Self::map_row)
            .context("Failed to query latest summary")?;

        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SummaryRow> {
        let attendees: String = row.get(2)?;
        let transcription: String = row.get(3)?;
        Ok(SummaryRow {
            id: row.get(0)?,
            bot_id: row.get(1)?,
            attendees: serde_json::from_str(&attendees).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e))
            })?,
            transcription: serde_json::from_str(&transcription).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e))
            })?,
            summary: row.get(4)?,
            mp4_url: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}
