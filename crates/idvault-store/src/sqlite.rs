//! SQLite implementation of the Ledger trait.
//!
//! Writes are appended to `ledger_entries`, so history comes for free and
//! the current value of a key is simply its highest-seq row. rusqlite is
//! bundled and wrapped in async via `tokio::task::spawn_blocking`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use idvault_core::now_millis;

use crate::error::{Result, StoreError};
use crate::migration;
use crate::selector::Selector;
use crate::traits::{HistoryEntry, Ledger, TxId};

/// SQLite-backed ledger.
///
/// Thread-safe via an internal Mutex. All operations run on the blocking
/// pool to avoid stalling the async runtime.
pub struct SqliteLedger {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedger {
    /// Open a ledger database at `path`, creating and migrating it as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory ledger. Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {e}")),
                ))
            })?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn append(conn: &Connection, key: &str, value: Option<&[u8]>) -> Result<TxId> {
    conn.execute(
        "INSERT INTO ledger_entries (key, value, tombstone, timestamp) VALUES (?1, ?2, ?3, ?4)",
        params![key, value, value.is_none(), now_millis()],
    )?;
    Ok(TxId(conn.last_insert_rowid() as u64))
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryEntry> {
    let seq: i64 = row.get("seq")?;
    let tombstone: bool = row.get("tombstone")?;
    let value: Option<Vec<u8>> = row.get("value")?;
    Ok(HistoryEntry {
        tx_id: TxId(seq as u64),
        value: if tombstone { None } else { Some(value.unwrap_or_default()) },
        timestamp: row.get("timestamp")?,
    })
}

#[async_trait]
impl Ledger for SqliteLedger {
    async fn put(&self, key: &str, value: &[u8]) -> Result<TxId> {
        let key = key.to_string();
        let value = value.to_vec();
        self.blocking(move |conn| append(conn, &key, Some(&value)))
            .await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let key = key.to_string();
        self.blocking(move |conn| {
            let latest: Option<(bool, Option<Vec<u8>>)> = conn
                .query_row(
                    "SELECT tombstone, value FROM ledger_entries
                     WHERE key = ?1 ORDER BY seq DESC LIMIT 1",
                    params![key],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            Ok(match latest {
                Some((false, value)) => Some(value.unwrap_or_default()),
                _ => None,
            })
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<TxId> {
        let key = key.to_string();
        self.blocking(move |conn| append(conn, &key, None)).await
    }

    async fn history(&self, key: &str) -> Result<Vec<HistoryEntry>> {
        let key = key.to_string();
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT seq, value, tombstone, timestamp FROM ledger_entries
                 WHERE key = ?1 ORDER BY seq ASC",
            )?;
            let entries = stmt
                .query_map(params![key], row_to_entry)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(entries)
        })
        .await
    }

    async fn rich_query(&self, selector: &Selector) -> Result<Vec<(String, Vec<u8>)>> {
        let selector = selector.clone();
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT e.key, e.value FROM ledger_entries e
                 JOIN (SELECT key, MAX(seq) AS seq FROM ledger_entries GROUP BY key) last
                   ON e.seq = last.seq
                 WHERE e.tombstone = 0
                 ORDER BY e.key",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<Vec<u8>>>(1)?))
            })?;

            let mut hits = Vec::new();
            for row in rows {
                let (key, value) = row?;
                let value = value.unwrap_or_default();
                if selector.matches_bytes(&value) {
                    hits.push((key, value));
                }
            }
            Ok(hits)
        })
        .await
    }
}
