//! SQLite bookmark mirror.
//!
//! The bookmark CRUD collaborator pushes lifecycle events at the API; this
//! mirror keeps the snapshot the core needs for the worker's pre-send
//! recheck, the reconciliation sweep, and the daily digest. The core never
//! mutates reminder fields here except through those event handlers.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use linkmind_core::{Bookmark, BookmarkRepo, LinkMindError, ReminderInterval, Result};

const BOOKMARK_COLUMNS: &str =
    "id, user_id, url, title, reminder_interval, next_reminder_at, is_read, created_at";

/// Event-fed mirror of bookmark state, implementing `BookmarkRepo`.
pub struct SqliteBookmarkRepo {
    conn: Mutex<Connection>,
}

impl SqliteBookmarkRepo {
    /// Open or create the mirror at the given path. May share a database
    /// file with the task store; each struct holds its own connection.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LinkMindError::Store(format!("Create store dir: {e}")))?;
        }
        let conn = Connection::open(path)
            .map_err(|e| LinkMindError::Store(format!("DB open: {e}")))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))
            .map_err(db_err)?;
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory mirror for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| LinkMindError::Store(format!("DB open: {e}")))?;
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn migrate(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS bookmarks (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                url TEXT NOT NULL,
                title TEXT,
                reminder_interval TEXT NOT NULL DEFAULT '1d',
                next_reminder_at TEXT NOT NULL,
                is_read INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_bookmarks_unread_due
                ON bookmarks(is_read, next_reminder_at);
            ",
        )
        .map_err(|e| LinkMindError::Store(format!("Migration: {e}")))?;
        Ok(())
    }

    /// Insert or replace a bookmark snapshot (created event).
    pub fn upsert_bookmark(&self, bookmark: &Bookmark, now: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO bookmarks
             (id, user_id, url, title, reminder_interval, next_reminder_at, is_read, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                bookmark.id,
                bookmark.user_id,
                bookmark.url,
                bookmark.title,
                bookmark.reminder_interval.as_str(),
                ts(bookmark.next_reminder_at),
                bookmark.is_read as i32,
                ts(bookmark.created_at),
                ts(now),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// Mark read. Returns false if the bookmark is unknown.
    pub fn set_read(&self, bookmark_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE bookmarks SET is_read = 1, updated_at = ?1 WHERE id = ?2",
                params![ts(now), bookmark_id],
            )
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    /// Mark unread with a freshly computed reminder time.
    pub fn set_unread(
        &self,
        bookmark_id: &str,
        next_reminder_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE bookmarks SET is_read = 0, next_reminder_at = ?1, updated_at = ?2
                 WHERE id = ?3",
                params![ts(next_reminder_at), ts(now), bookmark_id],
            )
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    /// Change the interval and its recomputed reminder time.
    pub fn set_interval(
        &self,
        bookmark_id: &str,
        interval: ReminderInterval,
        next_reminder_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE bookmarks
                 SET reminder_interval = ?1, next_reminder_at = ?2, updated_at = ?3
                 WHERE id = ?4",
                params![interval.as_str(), ts(next_reminder_at), ts(now), bookmark_id],
            )
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    /// Remove a deleted bookmark. Idempotent.
    pub fn remove(&self, bookmark_id: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute("DELETE FROM bookmarks WHERE id = ?1", params![bookmark_id])
            .map_err(db_err)?;
        Ok(changed > 0)
    }
}

#[async_trait]
impl BookmarkRepo for SqliteBookmarkRepo {
    async fn get(&self, bookmark_id: &str) -> Result<Option<Bookmark>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!("SELECT {BOOKMARK_COLUMNS} FROM bookmarks WHERE id = ?1"),
            params![bookmark_id],
            bookmark_from_row,
        )
        .optional()
        .map_err(db_err)
    }

    async fn unread_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Bookmark>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {BOOKMARK_COLUMNS} FROM bookmarks
                 WHERE is_read = 0 AND next_reminder_at <= ?1
                 ORDER BY next_reminder_at ASC"
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![ts(now)], bookmark_from_row)
            .map_err(db_err)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    async fn unread_by_user(&self) -> Result<HashMap<String, Vec<Bookmark>>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {BOOKMARK_COLUMNS} FROM bookmarks
                 WHERE is_read = 0
                 ORDER BY user_id, created_at"
            ))
            .map_err(db_err)?;
        let rows = stmt.query_map([], bookmark_from_row).map_err(db_err)?;

        let mut by_user: HashMap<String, Vec<Bookmark>> = HashMap::new();
        for bookmark in rows.filter_map(|r| r.ok()) {
            by_user
                .entry(bookmark.user_id.clone())
                .or_default()
                .push(bookmark);
        }
        Ok(by_user)
    }
}

fn db_err(e: rusqlite::Error) -> LinkMindError {
    LinkMindError::Store(e.to_string())
}

fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn bookmark_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Bookmark> {
    let interval: String = row.get(4)?;
    let next_reminder_at: String = row.get(5)?;
    let created_at: String = row.get(7)?;
    Ok(Bookmark {
        id: row.get(0)?,
        user_id: row.get(1)?,
        url: row.get(2)?,
        title: row.get(3)?,
        reminder_interval: ReminderInterval::parse(&interval),
        next_reminder_at: parse_ts(&next_reminder_at),
        is_read: row.get::<_, i32>(6)? != 0,
        created_at: parse_ts(&created_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn bookmark(id: &str, user: &str, due: DateTime<Utc>) -> Bookmark {
        Bookmark {
            id: id.into(),
            user_id: user.into(),
            url: format!("https://example.com/{id}"),
            title: Some(format!("Article {id}")),
            reminder_interval: ReminderInterval::OneDay,
            next_reminder_at: due,
            is_read: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn roundtrip_and_read_flag() {
        let repo = SqliteBookmarkRepo::open_in_memory().unwrap();
        let now = Utc::now();
        repo.upsert_bookmark(&bookmark("b1", "u1", now + Duration::days(1)), now)
            .unwrap();

        let loaded = repo.get("b1").await.unwrap().unwrap();
        assert_eq!(loaded.user_id, "u1");
        assert_eq!(loaded.reminder_interval, ReminderInterval::OneDay);
        assert!(!loaded.is_read);

        assert!(repo.set_read("b1", now).unwrap());
        assert!(repo.get("b1").await.unwrap().unwrap().is_read);
        assert!(!repo.set_read("missing", now).unwrap());
    }

    #[tokio::test]
    async fn overdue_query_filters_read_and_future() {
        let repo = SqliteBookmarkRepo::open_in_memory().unwrap();
        let now = Utc::now();
        repo.upsert_bookmark(&bookmark("past", "u1", now - Duration::hours(2)), now)
            .unwrap();
        repo.upsert_bookmark(&bookmark("later", "u1", now - Duration::hours(1)), now)
            .unwrap();
        repo.upsert_bookmark(&bookmark("future", "u1", now + Duration::hours(1)), now)
            .unwrap();
        repo.set_read("later", now).unwrap();

        let overdue = repo.unread_overdue(now).await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, "past");
    }

    #[tokio::test]
    async fn unread_grouped_by_user_and_delete() {
        let repo = SqliteBookmarkRepo::open_in_memory().unwrap();
        let now = Utc::now();
        repo.upsert_bookmark(&bookmark("a", "u1", now), now).unwrap();
        repo.upsert_bookmark(&bookmark("b", "u1", now), now).unwrap();
        repo.upsert_bookmark(&bookmark("c", "u2", now), now).unwrap();

        let by_user = repo.unread_by_user().await.unwrap();
        assert_eq!(by_user["u1"].len(), 2);
        assert_eq!(by_user["u2"].len(), 1);

        assert!(repo.remove("c").unwrap());
        assert!(!repo.remove("c").unwrap());
        assert!(repo.get("c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn interval_change_updates_due_time() {
        let repo = SqliteBookmarkRepo::open_in_memory().unwrap();
        let now = Utc::now();
        repo.upsert_bookmark(&bookmark("b1", "u1", now + Duration::days(1)), now)
            .unwrap();

        let next = now + Duration::weeks(1);
        assert!(repo
            .set_interval("b1", ReminderInterval::OneWeek, next, now)
            .unwrap());
        let loaded = repo.get("b1").await.unwrap().unwrap();
        assert_eq!(loaded.reminder_interval, ReminderInterval::OneWeek);
        assert_eq!(loaded.next_reminder_at, next);
    }
}
