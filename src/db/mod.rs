//! SQLite-backed persistence.
//!
//! One repository per table, raw SQL with rusqlite, no ORM. Async callers
//! go through [`Store`], which pushes work onto the blocking pool and
//! serializes access to the single connection.

mod bots;
mod summaries;
mod uploads;

pub use bots::{BotRepository, BotRow};
pub use summaries::{NewSummary, SummaryRepository, SummaryRow};
pub use uploads::{NewUpload, UploadRepository, UploadRow};

use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::Connection;

pub fn init_db() -> Result<Connection> {
    let db_path = crate::global::db_file()?;

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let conn = Connection::open(&db_path).context("Failed to open database connection")?;

    migrate(&conn)?;

    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    // One row per (user, bot); status and meeting_url are written with
    // merge semantics so neither write path clears the other's column.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS bots (
            user_id TEXT NOT NULL,
            bot_id TEXT NOT NULL,
            meeting_url TEXT,
            status TEXT,
            status_changed_at TEXT,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (user_id, bot_id)
        )",
        [],
    )
    .context("Failed to create bots table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS summaries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            bot_id TEXT NOT NULL,
            attendees TEXT NOT NULL,
            transcription TEXT NOT NULL,
            summary TEXT NOT NULL,
            mp4_url TEXT NOT NULL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )
    .context("Failed to create summaries table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_summaries_bot ON summaries(user_id, bot_id)",
        [],
    )
    .context("Failed to create summaries bot index")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_summaries_created_at ON summaries(created_at DESC)",
        [],
    )
    .context("Failed to create summaries created_at index")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS uploads (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            file_name TEXT NOT NULL,
            media_path TEXT NOT NULL,
            transcription TEXT NOT NULL,
            summary TEXT NOT NULL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )
    .context("Failed to create uploads table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_uploads_user ON uploads(user_id)",
        [],
    )
    .context("Failed to create uploads user index")?;

    Ok(())
}

/// Shared handle to the service database.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Opens the database at its default location and migrates it.
    pub fn open_default() -> Result<Self> {
        Ok(Self::from_connection(init_db()?))
    }

    /// Fresh in-memory database, migrated.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        migrate(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            f(&conn)
        })
        .await
        .context("Database task panicked")?
    }

    /// Creates or refreshes the bot document written at launch time.
    pub async fn register_bot(
        &self,
        user_id: &str,
        bot_id: &str,
        meeting_url: &str,
    ) -> Result<()> {
        let user_id = user_id.to_string();
        let bot_id = bot_id.to_string();
        let meeting_url = meeting_url.to_string();
        self.with_conn(move |conn| BotRepository::upsert(conn, &user_id, &bot_id, &meeting_url))
            .await
    }

    /// Merges a status change into the bot document.
    pub async fn set_bot_status(
        &self,
        user_id: &str,
        bot_id: &str,
        status: &str,
        changed_at: Option<String>,
    ) -> Result<()> {
        let user_id = user_id.to_string();
        let bot_id = bot_id.to_string();
        let status = status.to_string();
        self.with_conn(move |conn| {
            BotRepository::set_status(conn, &user_id, &bot_id, &status, changed_at.as_deref())
        })
        .await
    }

    pub async fn get_bot(&self, user_id: &str, bot_id: &str) -> Result<Option<BotRow>> {
        let user_id = user_id.to_string();
        let bot_id = bot_id.to_string();
        self.with_conn(move |conn| BotRepository::get(conn, &user_id, &bot_id))
            .await
    }

    pub async fn list_bots(&self, user_id: &str) -> Result<Vec<BotRow>> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| BotRepository::list_for_user(conn, &user_id))
            .await
    }

    /// Appends a meeting summary record and returns it as stored.
    pub async fn append_summary(
        &self,
        user_id: &str,
        bot_id: &str,
        record: NewSummary,
    ) -> Result<SummaryRow> {
        let user_id = user_id.to_string();
        let bot_id = bot_id.to_string();
        self.with_conn(move |conn| {
            let id = SummaryRepository::append(conn, &user_id, &bot_id, &record)?;
            SummaryRepository::get(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("Summary {} vanished after insert", id))
        })
        .await
    }

    pub async fn list_summaries(&self, user_id: &str, bot_id: &str) -> Result<Vec<SummaryRow>> {
        let user_id = user_id.to_string();
        let bot_id = bot_id.to_string();
        self.with_conn(move |conn| SummaryRepository::list_for_bot(conn, &user_id, &bot_id))
            .await
    }

    pub async fn latest_summary(&self, user_id: &str) -> Result<Option<SummaryRow>> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| SummaryRepository::latest_for_user(conn, &user_id))
            .await
    }

    /// Appends an upload record and returns it as stored.
    pub async fn add_upload(&self, user_id: &str, upload: NewUpload) -> Result<UploadRow> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let id = UploadRepository::insert(conn, &user_id, &upload)?;
            UploadRepository::get(conn, &user_id, id)?
                .ok_or_else(|| anyhow::anyhow!("Upload {} vanished after insert", id))
        })
        .await
    }

    pub async fn list_uploads(&self, user_id: &str) -> Result<Vec<UploadRow>> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| UploadRepository::list_for_user(conn, &user_id))
            .await
    }

    /// Returns whether a row was actually deleted.
    pub async fn delete_upload(&self, user_id: &str, upload_id: i64) -> Result<bool> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| UploadRepository::delete(conn, &user_id, upload_id))
            .await
    }
}
