//! SQLite-based email storage

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use rusqlite::{Connection, OptionalExtension, Params, Row, params};
use rusqlite_migration::{M, Migrations};

use super::traits::{BulkDeleteReport, EmailNotFoundError, EmailStore, SaveOutcome};
use crate::models::{Email, MessageId, SortOrder, StoredEmail};

/// Database migrations
///
/// Each migration is applied in order. The user_version pragma tracks which
/// migrations have been applied.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Initial schema
        M::up(
            r#"
            CREATE TABLE emails (
                id TEXT PRIMARY KEY,
                from_address TEXT NOT NULL,
                subject TEXT,
                body TEXT,
                date_received TEXT,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX idx_emails_from ON emails(from_address);
            CREATE INDEX idx_emails_date ON emails(date_received);
            CREATE INDEX idx_emails_created_at ON emails(created_at DESC);
            "#,
        ),
        // Migration 2: Chronological sort key derived from date_received
        M::up(
            r#"
            ALTER TABLE emails ADD COLUMN date_sort_key TEXT;

            CREATE INDEX idx_emails_date_sort_key ON emails(date_sort_key);
            "#,
        ),
    ])
}

/// Expands to the five sorted variants of a query, indexed by [`sort_index`]
macro_rules! sorted_queries {
    ($base:literal) => {
        [
            concat!(
                $base,
                " ORDER BY date_sort_key IS NULL, date_sort_key DESC, date_received DESC, rowid DESC"
            ),
            concat!(
                $base,
                " ORDER BY date_sort_key IS NULL, date_sort_key ASC, date_received ASC, rowid ASC"
            ),
            concat!(
                $base,
                " ORDER BY from_address ASC, date_sort_key IS NULL, date_sort_key DESC, date_received DESC, rowid DESC"
            ),
            concat!(
                $base,
                " ORDER BY from_address DESC, date_sort_key IS NULL, date_sort_key DESC, date_received DESC, rowid DESC"
            ),
            concat!($base, " ORDER BY created_at DESC, rowid DESC"),
        ]
    };
}

const SELECT_ALL: [&str; 5] =
    sorted_queries!("SELECT id, from_address, subject, body, date_received FROM emails");

const SELECT_BY_FROM: [&str; 5] = sorted_queries!(
    "SELECT id, from_address, subject, body, date_received FROM emails
     WHERE from_address LIKE ?1 ESCAPE '\\'"
);

const UPSERT_EMAIL: &str = "
    INSERT INTO emails (id, from_address, subject, body, date_received, date_sort_key)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
    ON CONFLICT (id) DO UPDATE SET
        from_address = excluded.from_address,
        subject = excluded.subject,
        body = excluded.body,
        date_received = excluded.date_received,
        date_sort_key = excluded.date_sort_key";

fn sort_index(sort: SortOrder) -> usize {
    match sort {
        SortOrder::DateNewest => 0,
        SortOrder::DateOldest => 1,
        SortOrder::SenderAsc => 2,
        SortOrder::SenderDesc => 3,
        SortOrder::Inserted => 4,
    }
}

/// Build a LIKE pattern matching `needle` as a literal substring
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn row_to_email(row: &Row<'_>) -> rusqlite::Result<Email> {
    Ok(Email {
        id: MessageId::new(row.get::<_, String>(0)?),
        from: row.get(1)?,
        subject: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        body: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        date: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
    })
}

/// SQLite-based email storage
///
/// A single connection behind a mutex; the store can be shared across
/// threads and other processes may open the same file.
pub struct SqliteEmailStore {
    conn: Mutex<Connection>,
}

impl SqliteEmailStore {
    /// Open (or create) the database at `db_path` and run migrations
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        // WAL lets readers proceed while a sync is writing
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        conn.execute_batch(
            r#"
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -16000;
            PRAGMA temp_store = MEMORY;
            "#,
        )?;
        conn.busy_timeout(Duration::from_secs(5))?;

        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn query_emails(&self, sql: &str, params: impl Params) -> Result<Vec<Email>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(sql)?;
        let emails = stmt
            .query_map(params, row_to_email)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read emails")?;
        Ok(emails)
    }
}

impl EmailStore for SqliteEmailStore {
    fn save_emails(&self, emails: &[Email]) -> Result<SaveOutcome> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .context("Failed to begin save transaction")?;
        let mut outcome = SaveOutcome::default();

        {
            let mut exists_stmt =
                tx.prepare_cached("SELECT EXISTS(SELECT 1 FROM emails WHERE id = ?1)")?;
            let mut upsert_stmt = tx.prepare_cached(UPSERT_EMAIL)?;

            for email in emails {
                let existed: bool = exists_stmt
                    .query_row([email.id.as_str()], |row| row.get(0))
                    .with_context(|| format!("Failed to save email {}", email.id))?;

                upsert_stmt
                    .execute(params![
                        email.id.as_str(),
                        email.from,
                        email.subject,
                        email.body,
                        email.date,
                        email.date_sort_key(),
                    ])
                    .with_context(|| format!("Failed to save email {}", email.id))?;

                if existed {
                    outcome.updated += 1;
                } else {
                    outcome.inserted += 1;
                }
            }
        }

        tx.commit().context("Failed to commit saved emails")?;
        debug!(
            "Saved {} emails ({} new, {} updated)",
            outcome.total(),
            outcome.inserted,
            outcome.updated
        );
        Ok(outcome)
    }

    fn get_all_emails(&self, sort: SortOrder) -> Result<Vec<Email>> {
        self.query_emails(SELECT_ALL[sort_index(sort)], [])
    }

    fn get_emails_by_from(&self, from: &str, sort: SortOrder) -> Result<Vec<Email>> {
        self.query_emails(SELECT_BY_FROM[sort_index(sort)], [like_pattern(from)])
    }

    fn get_all_senders(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare_cached("SELECT DISTINCT from_address FROM emails ORDER BY from_address")?;
        let senders = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()
            .context("Failed to read senders")?;
        Ok(senders)
    }

    fn get_email(&self, id: &MessageId) -> Result<Option<StoredEmail>> {
        let conn = self.conn.lock().unwrap();
        let row: Option<(Email, String)> = conn
            .query_row(
                "SELECT id, from_address, subject, body, date_received, created_at
                 FROM emails WHERE id = ?1",
                [id.as_str()],
                |row| Ok((row_to_email(row)?, row.get(5)?)),
            )
            .optional()
            .with_context(|| format!("Failed to load email {}", id))?;

        let Some((email, created_at)) = row else {
            return Ok(None);
        };

        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .with_context(|| format!("Invalid created_at for email {}: {}", id, created_at))?
            .with_timezone(&Utc);

        Ok(Some(StoredEmail { email, created_at }))
    }

    fn count_emails(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM emails", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn delete_email(&self, id: &MessageId) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn
            .execute("DELETE FROM emails WHERE id = ?1", [id.as_str()])
            .with_context(|| format!("Failed to delete email {}", id))?;

        if deleted == 0 {
            return Err(EmailNotFoundError(id.clone()).into());
        }
        Ok(())
    }

    fn delete_emails(&self, ids: &[MessageId]) -> Result<BulkDeleteReport> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached("DELETE FROM emails WHERE id = ?1")?;
        let mut report = BulkDeleteReport::default();

        for id in ids {
            match stmt.execute([id.as_str()]) {
                Ok(0) => report.not_found.push(id.clone()),
                Ok(n) => report.deleted += n,
                Err(e) => {
                    warn!("Failed to delete email {}: {}", id, e);
                    report.failed.push((id.clone(), e.to_string()));
                }
            }
        }

        debug!(
            "Bulk delete: {} deleted, {} not found, {} failed",
            report.deleted,
            report.not_found.len(),
            report.failed.len()
        );
        Ok(report)
    }

    fn delete_emails_by_sender(&self, sender: &str) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn
            .execute(
                "DELETE FROM emails WHERE from_address LIKE ?1 ESCAPE '\\'",
                [like_pattern(sender)],
            )
            .with_context(|| format!("Failed to delete emails from {}", sender))?;
        Ok(deleted)
    }
}
