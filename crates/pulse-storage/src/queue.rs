use crate::error::Result;
use crate::DurableQueue;
use pulse_common::types::{MetricRecord, SequenceId};
use rusqlite::{params, Connection, Transaction};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const QUEUE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS metrics (
    sequence_id INTEGER PRIMARY KEY AUTOINCREMENT,
    captured_at INTEGER NOT NULL,
    payload TEXT NOT NULL
);
";

/// SQLite-backed [`DurableQueue`].
///
/// One connection guarded by a mutex; every operation runs as a single
/// statement or a single transaction while holding it.
pub struct SqliteQueue {
    path: PathBuf,
    conn: Mutex<Connection>,
    max_pending: Option<usize>,
}

impl SqliteQueue {
    /// Opens (or creates) the queue database at `path`, creating missing
    /// parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        // FULL: a committed enqueue must survive power loss, not just a crash.
        conn.execute_batch("PRAGMA synchronous=FULL;")?;
        conn.execute_batch(QUEUE_SCHEMA)?;
        tracing::info!(path = %path.display(), "Opened metric queue");
        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
            max_pending: None,
        })
    }

    /// Caps the number of pending records. Once the cap is reached every
    /// enqueue evicts the oldest records to make room. `None` (the default)
    /// keeps everything until it is purged.
    pub fn with_max_pending(mut self, max_pending: Option<usize>) -> Self {
        self.max_pending = max_pending.filter(|max| *max > 0);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checkpoints the WAL into the main database file and closes the
    /// connection.
    pub fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        conn.close().map_err(|(_, e)| e)?;
        tracing::info!(path = %self.path.display(), "Closed metric queue");
        Ok(())
    }

    /// Lock the connection, recovering from a poisoned Mutex if necessary.
    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Deletes the oldest rows so that at most `max` remain.
fn evict_oldest(tx: &Transaction<'_>, max: usize) -> Result<usize> {
    let count: i64 = tx.query_row("SELECT COUNT(*) FROM metrics", [], |row| row.get(0))?;
    let excess = count - i64::try_from(max).unwrap_or(i64::MAX);
    if excess <= 0 {
        return Ok(0);
    }
    let evicted = tx.execute(
        "DELETE FROM metrics WHERE sequence_id IN
            (SELECT sequence_id FROM metrics ORDER BY sequence_id ASC LIMIT ?1)",
        params![excess],
    )?;
    Ok(evicted)
}

impl DurableQueue for SqliteQueue {
    fn enqueue(&self, payload: &Value, captured_at: i64) -> Result<SequenceId> {
        let text = serde_json::to_string(payload)?;
        let mut conn = self.lock_conn();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO metrics (captured_at, payload) VALUES (?1, ?2)",
            params![captured_at, text],
        )?;
        let sequence_id = tx.last_insert_rowid();
        let evicted = match self.max_pending {
            Some(max) => evict_oldest(&tx, max)?,
            None => 0,
        };
        tx.commit()?;

        if evicted > 0 {
            tracing::warn!(
                evicted,
                max_pending = self.max_pending.unwrap_or_default(),
                "Queue full, dropped oldest undelivered records"
            );
        }
        Ok(sequence_id)
    }

    fn read_all(&self) -> Result<Vec<MetricRecord>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare_cached(
            "SELECT sequence_id, captured_at, payload FROM metrics ORDER BY sequence_id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let sequence_id: i64 = row.get(0)?;
            let captured_at: i64 = row.get(1)?;
            let payload: String = row.get(2)?;
            Ok((sequence_id, captured_at, payload))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (sequence_id, captured_at, text) = row?;
            match serde_json::from_str(&text) {
                Ok(payload) => records.push(MetricRecord {
                    sequence_id,
                    captured_at,
                    payload,
                }),
                Err(e) => {
                    tracing::error!(sequence_id, error = %e, "Skipping undecodable queued record");
                }
            }
        }
        Ok(records)
    }

    fn purge(&self, ids: &[SequenceId]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut conn = self.lock_conn();
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare_cached("DELETE FROM metrics WHERE sequence_id = ?1")?;
            for id in ids {
                removed += stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    fn pending_count(&self) -> Result<u64> {
        let conn = self.lock_conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM metrics", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}
