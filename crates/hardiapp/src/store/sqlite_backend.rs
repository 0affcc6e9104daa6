use super::backend::{Cancel, Operation, StorageBackend, TxMode};
use super::{LEGACY_FILE_NAME, TABLE_NAME};
use crate::error::{HardiError, Result};
use rusqlite::{
    params, Connection, ErrorCode, InterruptHandle, OptionalExtension, TransactionBehavior,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(2);

/// SQLite-backed storage: one database file, one table, one row per logical key.
///
/// A fresh connection is opened for every transaction and dropped when the
/// transaction finishes, whatever the outcome.
///
/// Lock waits are bounded by the busy timeout, which should stay below the
/// adapter's transaction timeout.
pub struct SqliteBackend {
    db_path: PathBuf,
    legacy_path: PathBuf,
    busy_timeout: Duration,
    running: Mutex<Option<InterruptHandle>>,
}

impl SqliteBackend {
    pub fn new(data_dir: &Path, db_file: &str) -> Self {
        Self {
            db_path: data_dir.join(db_file),
            legacy_path: data_dir.join(LEGACY_FILE_NAME),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            running: Mutex::new(None),
        }
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn legacy_path(&self) -> &Path {
        &self.legacy_path
    }

    fn connect(&self) -> Result<Connection> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).map_err(HardiError::Io)?;
            }
        }
        let conn = Connection::open(&self.db_path).map_err(open_error)?;
        conn.busy_timeout(self.busy_timeout).map_err(open_error)?;
        Ok(conn)
    }

    fn bootstrap(conn: &Connection) -> Result<()> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {TABLE_NAME} (
                key   TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            );"
        ))
        .map_err(open_error)
    }

    fn set_running(&self, handle: Option<InterruptHandle>) {
        *self.running.lock().unwrap_or_else(PoisonError::into_inner) = handle;
    }

    fn run(
        conn: &mut Connection,
        mode: TxMode,
        op: &Operation,
        cancel: &Cancel,
    ) -> Result<Option<String>> {
        let behavior = match mode {
            TxMode::ReadOnly => TransactionBehavior::Deferred,
            TxMode::ReadWrite => TransactionBehavior::Immediate,
        };
        let tx = conn.transaction_with_behavior(behavior)?;
        // The lock may have been granted after the deadline.
        cancel.check()?;

        let result = match op {
            Operation::Get(key) => tx
                .query_row(
                    &format!("SELECT value FROM {TABLE_NAME} WHERE key = ?1"),
                    params![key],
                    |row| row.get::<_, String>(0),
                )
                .optional()?,
            Operation::Put(key, value) => {
                tx.execute(
                    &format!(
                        "INSERT INTO {TABLE_NAME} (key, value) VALUES (?1, ?2)
                         ON CONFLICT(key) DO UPDATE SET value = excluded.value"
                    ),
                    params![key, value],
                )?;
                None
            }
            Operation::Clear => {
                tx.execute(&format!("DELETE FROM {TABLE_NAME}"), [])?;
                None
            }
        };

        // Dropping an uncommitted transaction rolls it back.
        cancel.check()?;
        tx.commit()?;
        Ok(result)
    }
}

fn open_error(err: rusqlite::Error) -> HardiError {
    HardiError::StoreOpen(err.to_string())
}

fn classify(err: HardiError) -> HardiError {
    match err {
        HardiError::Transaction(rusqlite::Error::SqliteFailure(e, msg))
            if e.code == ErrorCode::OperationInterrupted =>
        {
            HardiError::Aborted(msg.unwrap_or_else(|| "interrupted".to_string()))
        }
        other => other,
    }
}

impl StorageBackend for SqliteBackend {
    fn execute(&self, mode: TxMode, op: &Operation, cancel: &Cancel) -> Result<Option<String>> {
        if mode == TxMode::ReadOnly && op.is_write() {
            return Err(HardiError::Aborted(format!(
                "{} is not allowed in a read-only transaction",
                op.name()
            )));
        }

        let mut conn = self.connect()?;
        self.set_running(Some(conn.get_interrupt_handle()));
        let result = Self::bootstrap(&conn)
            .and_then(|()| Self::run(&mut conn, mode, op, cancel))
            .map_err(classify);
        self.set_running(None);
        drop(conn);
        result
    }

    fn interrupt(&self) {
        if let Some(handle) = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            handle.interrupt();
        }
    }

    fn read_legacy(&self) -> Result<Option<String>> {
        if !self.legacy_path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.legacy_path).map_err(HardiError::Io)?;
        Ok(Some(content))
    }

    fn remove_legacy(&self) -> Result<()> {
        if self.legacy_path.exists() {
            fs::remove_file(&self.legacy_path).map_err(HardiError::Io)?;
        }
        Ok(())
    }
}
