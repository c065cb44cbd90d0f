//! SQLite-backed locator store.
//!
//! One table holds every namespace. Recency is a store-wide sequence
//! number bumped on each upsert, so ordering survives clock skew between
//! writers. The database runs in WAL mode with a busy timeout, which lets
//! concurrent test processes share one file.

use super::{LocatorStore, StoreError, StoreHandle, DEFAULT_NAMESPACE};
use crate::locator::{LocatorIdentity, LocatorRecord, Selector};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// How long a writer waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS locator_records (
        namespace   TEXT NOT NULL,
        identity    TEXT NOT NULL,
        strategy    TEXT NOT NULL,
        expression  TEXT NOT NULL,
        seq         INTEGER NOT NULL,
        recorded_at TEXT NOT NULL,
        PRIMARY KEY (namespace, identity, strategy)
    );
    CREATE INDEX IF NOT EXISTS idx_locator_records_recency
        ON locator_records(namespace, identity, seq DESC);
";

const UPSERT: &str = "
    INSERT INTO locator_records (namespace, identity, strategy, expression, seq, recorded_at)
    VALUES (?1, ?2, ?3, ?4, (SELECT COALESCE(MAX(seq), 0) + 1 FROM locator_records), ?5)
    ON CONFLICT(namespace, identity, strategy) DO UPDATE SET
        expression  = excluded.expression,
        seq         = excluded.seq,
        recorded_at = excluded.recorded_at
";

/// Locator store persisted in a SQLite file
#[derive(Debug)]
pub struct SqliteLocatorStore {
    path: PathBuf,
    namespace: String,
    schema_ready: AtomicBool,
}

impl SqliteLocatorStore {
    /// Store at `path` in the default namespace. The file is created lazily.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_namespace(path, DEFAULT_NAMESPACE)
    }

    /// Store at `path` in `namespace`
    #[must_use]
    pub fn with_namespace(path: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            namespace: namespace.into(),
            schema_ready: AtomicBool::new(false),
        }
    }

    /// Database file location
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        if !self.schema_ready.load(Ordering::Acquire) {
            let mode: String =
                conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
            debug!(path = %self.path.display(), journal_mode = %mode, "initialising locator store");
            conn.execute_batch(SCHEMA)?;
            self.schema_ready.store(true, Ordering::Release);
        }
        Ok(conn)
    }
}

impl LocatorStore for SqliteLocatorStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn open(&self) -> Result<Box<dyn StoreHandle + '_>, StoreError> {
        Ok(Box::new(SqliteHandle {
            conn: self.connect()?,
            namespace: &self.namespace,
        }))
    }
}

struct SqliteHandle<'a> {
    conn: Connection,
    namespace: &'a str,
}

fn upsert(
    conn: &Connection,
    namespace: &str,
    identity: &LocatorIdentity,
    selector: &Selector,
) -> Result<(), StoreError> {
    conn.prepare_cached(UPSERT)?.execute(params![
        namespace,
        identity.as_str(),
        selector.tag(),
        selector.expression(),
        Utc::now().to_rfc3339(),
    ])?;
    Ok(())
}

impl StoreHandle for SqliteHandle<'_> {
    fn put(&mut self, identity: &LocatorIdentity, selector: &Selector) -> Result<(), StoreError> {
        upsert(&self.conn, self.namespace, identity, selector)
    }

    fn put_all(
        &mut self,
        identity: &LocatorIdentity,
        selectors: &[Selector],
    ) -> Result<(), StoreError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        for selector in selectors.iter().rev() {
            upsert(&tx, self.namespace, identity, selector)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn get_all(&self, identity: &LocatorIdentity) -> Result<Vec<LocatorRecord>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT strategy, expression, recorded_at FROM locator_records
             WHERE namespace = ?1 AND identity = ?2
             ORDER BY seq DESC",
        )?;
        let rows = stmt
            .query_map(params![self.namespace, identity.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut records = Vec::with_capacity(rows.len());
        for (strategy, expression, recorded_at) in rows {
            let Some(selector) = Selector::from_tag(&strategy, expression) else {
                warn!(identity = %identity, strategy = %strategy, "skipping stored record with unknown strategy");
                continue;
            };
            let recorded_at = DateTime::parse_from_rfc3339(&recorded_at)
                .map_err(|e| StoreError::InvalidRecord {
                    identity: identity.to_string(),
                    message: format!("bad timestamp {recorded_at:?}: {e}"),
                })?
                .with_timezone(&Utc);
            records.push(LocatorRecord {
                selector,
                recorded_at,
            });
        }
        Ok(records)
    }

    fn identities(&self) -> Result<Vec<LocatorIdentity>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT DISTINCT identity FROM locator_records WHERE namespace = ?1 ORDER BY identity",
        )?;
        let ids = stmt
            .query_map(params![self.namespace], |row| row.get::<_, String>(0))?
            .map(|id| id.map(LocatorIdentity::from_raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn remove(&mut self, identity: &LocatorIdentity) -> Result<usize, StoreError> {
        Ok(self.conn.execute(
            "DELETE FROM locator_records WHERE namespace = ?1 AND identity = ?2",
            params![self.namespace, identity.as_str()],
        )?)
    }

    fn close(self: Box<Self>) -> Result<(), StoreError> {
        let handle = *self;
        handle.conn.close().map_err(|(_, e)| StoreError::Sqlite(e))
    }
}
