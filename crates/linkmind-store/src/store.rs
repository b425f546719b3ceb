//! SQLite-backed task store.
//!
//! The one-live-task-per-bookmark invariant is enforced by the database
//! (partial unique index), and every mutation is either a single statement
//! or a transaction, so racing gateway calls and worker claims serialize
//! to a deterministic last-write-wins outcome.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use linkmind_core::{LinkMindError, Result, SendOutcome};

use crate::task::{BackoffPolicy, ReminderTask, TaskState};

const TASK_COLUMNS: &str = "id, bookmark_id, user_id, due_at, state, attempt, \
     claim_token, claimed_at, last_error, created_at, updated_at";

/// Durable store of `ReminderTask` records.
pub struct TaskStore {
    conn: Mutex<Connection>,
}

impl TaskStore {
    /// Open or create the task database at the given path.
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

    /// In-memory store for tests.
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
            CREATE TABLE IF NOT EXISTS reminder_tasks (
                id TEXT PRIMARY KEY,
                bookmark_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                due_at TEXT NOT NULL,
                state TEXT NOT NULL DEFAULT 'scheduled',
                attempt INTEGER NOT NULL DEFAULT 0,
                claim_token TEXT,
                claimed_at TEXT,
                last_error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- The core invariant: at most one live task per bookmark.
            CREATE UNIQUE INDEX IF NOT EXISTS idx_tasks_live_bookmark
                ON reminder_tasks(bookmark_id)
                WHERE state IN ('scheduled', 'claimed');

            CREATE INDEX IF NOT EXISTS idx_tasks_due
                ON reminder_tasks(state, due_at);
            ",
        )
        .map_err(|e| LinkMindError::Store(format!("Migration: {e}")))?;
        Ok(())
    }

    /// Atomically replace any live task for the bookmark with a fresh
    /// Scheduled one. Racing upserts for the same bookmark serialize:
    /// whichever lands last wins, never two live tasks.
    pub fn upsert(
        &self,
        bookmark_id: &str,
        user_id: &str,
        due_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<ReminderTask> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(db_err)?;

        tx.execute(
            "UPDATE reminder_tasks
             SET state = 'cancelled', claim_token = NULL, claimed_at = NULL, updated_at = ?1
             WHERE bookmark_id = ?2 AND state IN ('scheduled', 'claimed')",
            params![ts(now), bookmark_id],
        )
        .map_err(db_err)?;

        let task = ReminderTask::new(bookmark_id, user_id, due_at, now);
        tx.execute(
            "INSERT INTO reminder_tasks
             (id, bookmark_id, user_id, due_at, state, attempt, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 'scheduled', 0, ?5, ?5)",
            params![task.id, task.bookmark_id, task.user_id, ts(task.due_at), ts(now)],
        )
        .map_err(db_err)?;

        tx.commit().map_err(db_err)?;
        tracing::debug!("📌 Task scheduled for bookmark {bookmark_id}, due {due_at}");
        Ok(task)
    }

    /// Cancel any live task for the bookmark. Idempotent: no-op when none
    /// exists. Returns how many tasks were cancelled (0 or 1).
    pub fn cancel(&self, bookmark_id: &str, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let cancelled = conn
            .execute(
                "UPDATE reminder_tasks
                 SET state = 'cancelled', claim_token = NULL, claimed_at = NULL, updated_at = ?1
                 WHERE bookmark_id = ?2 AND state IN ('scheduled', 'claimed')",
                params![ts(now), bookmark_id],
            )
            .map_err(db_err)?;
        if cancelled > 0 {
            tracing::debug!("🗑️ Task cancelled for bookmark {bookmark_id}");
        }
        Ok(cancelled)
    }

    /// Claim up to `limit` due tasks, oldest due first, moving each to
    /// Claimed with a fresh token. A task already Claimed by another
    /// worker is never returned (the per-id CAS guard on state).
    pub fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ReminderTask>> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(db_err)?;

        let ids: Vec<String> = {
            let mut stmt = tx
                .prepare(
                    "SELECT id FROM reminder_tasks
                     WHERE state = 'scheduled' AND due_at <= ?1
                     ORDER BY due_at ASC
                     LIMIT ?2",
                )
                .map_err(db_err)?;
            let rows = stmt
                .query_map(params![ts(now), limit as i64], |row| row.get(0))
                .map_err(db_err)?;
            rows.filter_map(|r| r.ok()).collect()
        };

        let mut claimed = Vec::with_capacity(ids.len());
        for id in ids {
            let token = uuid::Uuid::new_v4().to_string();
            let changed = tx
                .execute(
                    "UPDATE reminder_tasks
                     SET state = 'claimed', claim_token = ?1, claimed_at = ?2, updated_at = ?2
                     WHERE id = ?3 AND state = 'scheduled'",
                    params![token, ts(now), id],
                )
                .map_err(db_err)?;
            if changed == 1 {
                if let Some(task) = Self::fetch(&tx, &id)? {
                    claimed.push(task);
                }
            }
        }

        tx.commit().map_err(db_err)?;
        Ok(claimed)
    }

    /// Record the dispatch outcome for a claimed task.
    ///
    /// Fails with `StaleClaim` when the presented token no longer matches —
    /// the claim was superseded by a reschedule, cancel, or expiry reclaim,
    /// and the caller must treat the task as already resolved elsewhere.
    pub fn complete(
        &self,
        task_id: &str,
        claim_token: &str,
        outcome: &SendOutcome,
        now: DateTime<Utc>,
        backoff: &BackoffPolicy,
    ) -> Result<TaskState> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(db_err)?;

        let row: Option<(String, Option<String>, u32)> = tx
            .query_row(
                "SELECT state, claim_token, attempt FROM reminder_tasks WHERE id = ?1",
                params![task_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(db_err)?;

        let Some((state, stored_token, attempt)) = row else {
            return Err(LinkMindError::NotFound(format!("task {task_id}")));
        };
        if state != "claimed" || stored_token.as_deref() != Some(claim_token) {
            return Err(LinkMindError::StaleClaim);
        }

        let new_state = match outcome {
            SendOutcome::Delivered => {
                tx.execute(
                    "UPDATE reminder_tasks
                     SET state = 'delivered', claim_token = NULL, claimed_at = NULL,
                         last_error = NULL, updated_at = ?1
                     WHERE id = ?2",
                    params![ts(now), task_id],
                )
                .map_err(db_err)?;
                TaskState::Delivered
            }
            SendOutcome::Retryable(reason) if attempt + 1 < backoff.max_attempts => {
                let next_due = now + backoff.delay(attempt);
                tx.execute(
                    "UPDATE reminder_tasks
                     SET state = 'scheduled', claim_token = NULL, claimed_at = NULL,
                         attempt = ?1, due_at = ?2, last_error = ?3, updated_at = ?4
                     WHERE id = ?5",
                    params![attempt + 1, ts(next_due), reason, ts(now), task_id],
                )
                .map_err(db_err)?;
                TaskState::Scheduled
            }
            SendOutcome::Retryable(reason) | SendOutcome::Terminal(reason) => {
                tx.execute(
                    "UPDATE reminder_tasks
                     SET state = 'failed', claim_token = NULL, claimed_at = NULL,
                         attempt = ?1, last_error = ?2, updated_at = ?3
                     WHERE id = ?4",
                    params![attempt + 1, reason, ts(now), task_id],
                )
                .map_err(db_err)?;
                TaskState::Failed
            }
        };

        tx.commit().map_err(db_err)?;
        Ok(new_state)
    }

    /// Return tasks whose claim has outlived `claim_timeout` to Scheduled.
    /// No attempt increment: no dispatch outcome was ever observed.
    pub fn reclaim_expired(&self, now: DateTime<Utc>, claim_timeout: Duration) -> Result<usize> {
        let cutoff = now - claim_timeout;
        let conn = self.conn.lock().unwrap();
        let reclaimed = conn
            .execute(
                "UPDATE reminder_tasks
                 SET state = 'scheduled', claim_token = NULL, claimed_at = NULL, updated_at = ?1
                 WHERE state = 'claimed' AND claimed_at <= ?2",
                params![ts(now), ts(cutoff)],
            )
            .map_err(db_err)?;
        if reclaimed > 0 {
            tracing::warn!("♻️ Reclaimed {reclaimed} expired claim(s)");
        }
        Ok(reclaimed)
    }

    /// Most recent task for a bookmark, live preferred — backs the
    /// UI "reminder pending / delivered / failed" status query.
    pub fn status(&self, bookmark_id: &str) -> Result<Option<ReminderTask>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!(
                "SELECT {TASK_COLUMNS} FROM reminder_tasks
                 WHERE bookmark_id = ?1
                 ORDER BY (state IN ('scheduled', 'claimed')) DESC, updated_at DESC
                 LIMIT 1"
            ),
            params![bookmark_id],
            task_from_row,
        )
        .optional()
        .map_err(db_err)
    }

    /// The live (Scheduled or Claimed) task for a bookmark, if any.
    pub fn live_task(&self, bookmark_id: &str) -> Result<Option<ReminderTask>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            &format!(
                "SELECT {TASK_COLUMNS} FROM reminder_tasks
                 WHERE bookmark_id = ?1 AND state IN ('scheduled', 'claimed')"
            ),
            params![bookmark_id],
            task_from_row,
        )
        .optional()
        .map_err(db_err)
    }

    /// Fetch one task by id.
    pub fn get(&self, task_id: &str) -> Result<Option<ReminderTask>> {
        let conn = self.conn.lock().unwrap();
        Self::fetch(&conn, task_id)
    }

    /// Drop terminal tasks last touched before `cutoff` (audit window end).
    pub fn purge_terminal(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let purged = conn
            .execute(
                "DELETE FROM reminder_tasks
                 WHERE state IN ('delivered', 'failed', 'cancelled') AND updated_at <= ?1",
                params![ts(cutoff)],
            )
            .map_err(db_err)?;
        if purged > 0 {
            tracing::debug!("🧹 Purged {purged} terminal task(s)");
        }
        Ok(purged)
    }

    fn fetch(conn: &Connection, task_id: &str) -> Result<Option<ReminderTask>> {
        conn.query_row(
            &format!("SELECT {TASK_COLUMNS} FROM reminder_tasks WHERE id = ?1"),
            params![task_id],
            task_from_row,
        )
        .optional()
        .map_err(db_err)
    }
}

fn db_err(e: rusqlite::Error) -> LinkMindError {
    LinkMindError::Store(e.to_string())
}

/// Fixed-width RFC 3339 so stored timestamps compare lexicographically
/// and round-trip without precision loss.
fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn task_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReminderTask> {
    let due_at: String = row.get(3)?;
    let state: String = row.get(4)?;
    let claimed_at: Option<String> = row.get(7)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;
    Ok(ReminderTask {
        id: row.get(0)?,
        bookmark_id: row.get(1)?,
        user_id: row.get(2)?,
        due_at: parse_ts(&due_at),
        state: TaskState::parse(&state),
        attempt: row.get(5)?,
        claim_token: row.get(6)?,
        claimed_at: claimed_at.as_deref().map(parse_ts),
        last_error: row.get(8)?,
        created_at: parse_ts(&created_at),
        updated_at: parse_ts(&updated_at),
    })
}
