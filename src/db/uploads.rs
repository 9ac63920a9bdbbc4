//! Transcription upload persistence.
//!
//! Records for audio files submitted directly to `/transcribe`, outside any
//! meeting bot flow.

use anyhow::{Context, Result};
use rusqlite::{params, types::Type, Connection};
use serde::Serialize;

/// A persisted upload record.
#[derive(Debug, Clone, Serialize)]
pub struct UploadRow {
    pub id: i64,
    pub file_name: String,
    pub media_path: String,
    pub transcription: Vec<String>,
    pub summary: String,
    pub created_at: String,
}

/// Fields of an upload about to be written.
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub file_name: String,
    pub media_path: String,
    pub transcription: Vec<String>,
    pub summary: String,
}

/// Repository for upload records.
pub struct UploadRepository;

impl UploadRepository {
    /// Insert a new upload record. Returns the new row ID.
    pub fn insert(conn: &Connection, user_id: &str, upload: &NewUpload) -> Result<i64> {
        let transcription = serde_json::to_string(&upload.transcription)
            .context("Failed to encode transcription")?;
        conn.execute(
            "INSERT INTO uploads (user_id, file_name, media_path, transcription, summary) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user_id,
                upload.file_name,
                upload.media_path,
                transcription,
                upload.summary,
            ],
        )
        .context("Failed to insert upload")?;

        Ok(conn.last_insert_rowid())
    }

    /// Get one of a user's uploads by ID.
    pub fn get(conn: &Connection, user_id: &str, id: i64) -> Result<Option<UploadRow>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, file_name, media_path, transcription, summary, created_at \
                 FROM uploads WHERE user_id = ?1 AND id = ?2",
            )
            .context("Failed to prepare upload query")?;

        let mut rows = stmt
            .query_map(params![user_id, id], Self::map_row)
            .context("Failed to query upload")?;

        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// List a user's uploads, newest first.
    pub fn list_for_user(conn: &Connection, user_id: &str) -> Result<Vec<UploadRow>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, file_name, media_path, transcription, summary, created_at \
                 FROM uploads WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
            )
            .context("Failed to prepare uploads list query")?;

        let rows = stmt
            .query_map(params![user_id], Self::map_row)
            .context("Failed to list uploads")?;

        let mut uploads = Vec::new();
        for row in rows {
            uploads.push(row?);
        }

        Ok(uploads)
    }

    /// Delete one of a user's uploads. Returns whether a row was removed.
    pub fn delete(conn: &Connection, user_id: &str, id: i64) -> Result<bool> {
        let changed = conn
            .execute(
                "DELETE FROM uploads WHERE user_id = ?1 AND id = ?2",
                params![user_id, id],
            )
            .context("Failed to delete upload")?;
        Ok(changed > 0)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UploadRow> {
        let transcription: String = row.get(3)?;
        Ok(UploadRow {
            id: row.get(0)?,
            file_name: row.get(1)?,
            media_path: row.get(2)?,
            transcription: serde_json::from_str(&transcription).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e))
            })?,
            summary: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}
