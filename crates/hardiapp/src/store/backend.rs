use crate::error::{HardiError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Whether a transaction may modify the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxMode {
    ReadOnly,
    ReadWrite,
}

/// The single operation a transaction carries out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Read the value stored under a key.
    Get(String),
    /// Insert or replace the value under a key.
    Put(String, String),
    /// Remove every slot.
    Clear,
}

impl Operation {
    pub fn is_write(&self) -> bool {
        !matches!(self, Operation::Get(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Get(_) => "get",
            Operation::Put(_, _) => "put",
            Operation::Clear => "clear",
        }
    }
}

/// Raised by the adapter once a transaction has outlived its timeout.
///
/// Backends check it after acquiring their locks and again right before
/// committing, so a cancelled transaction always rolls back.
#[derive(Debug, Clone, Default)]
pub struct Cancel(Arc<AtomicBool>);

impl Cancel {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Aborted)` once cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(HardiError::Aborted(
                "transaction cancelled after its timeout".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

/// Abstract interface for raw durable I/O.
///
/// This trait handles the "how" of storage (SQLite vs memory), while the
/// [`StoreAdapter`](super::adapter::StoreAdapter) adds the async boundary and the
/// timeout guard on top. Methods are blocking and are always called from a
/// blocking thread.
pub trait StorageBackend: Send + Sync + 'static {
    /// Run `op` in one transaction of the given mode.
    ///
    /// Must return only after the transaction has committed. `Get` returns the
    /// stored value (or `None`), writes return `None`. Once `cancel` is raised
    /// the transaction must not commit, and the call must return within a
    /// bounded time.
    fn execute(&self, mode: TxMode, op: &Operation, cancel: &Cancel) -> Result<Option<String>>;

    /// Best-effort: cut short the statement running right now, if any.
    fn interrupt(&self) {}

    /// Read the pre-migration flat blob, if one exists.
    fn read_legacy(&self) -> Result<Option<String>>;

    /// Remove the pre-migration flat blob. Missing is not an error.
    fn remove_legacy(&self) -> Result<()>;
}
