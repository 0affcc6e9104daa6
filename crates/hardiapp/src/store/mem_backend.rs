use super::backend::{Cancel, Operation, StorageBackend, TxMode};
use crate::error::{HardiError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Default)]
struct MemState {
    slots: HashMap<String, String>,
    legacy: Option<String>,
    writes: Vec<Operation>,
    stall: Option<Duration>,
    fail_open: bool,
    fail_writes: bool,
}

/// In-memory storage backend for testing.
///
/// Cloning yields another handle onto the same state, so a test can keep one
/// handle for inspection after moving the other into a repository. Uses a
/// `Mutex` rather than `RefCell` because the adapter calls it from blocking
/// worker threads.
#[derive(Clone, Default)]
pub struct MemBackend {
    state: Arc<Mutex<MemState>>,
    reads: Arc<AtomicUsize>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seed a slot as if it had been written by an earlier run.
    pub fn with_slot(self, key: &str, value: &str) -> Self {
        self.lock().slots.insert(key.to_string(), value.to_string());
        self
    }

    /// Seed the pre-migration flat blob.
    pub fn with_legacy(self, value: &str) -> Self {
        self.lock().legacy = Some(value.to_string());
        self
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.lock().fail_writes = simulate;
    }

    /// Make every transaction fail as if the store could not be opened.
    pub fn set_simulate_open_error(&self, simulate: bool) {
        self.lock().fail_open = simulate;
    }

    /// Make every transaction hang for `stall` before committing, like a
    /// connection waiting on a lock. Interrupts do not cut the stall short.
    pub fn set_stall(&self, stall: Option<Duration>) {
        self.lock().stall = stall;
    }

    pub fn slot(&self, key: &str) -> Option<String> {
        self.lock().slots.get(key).cloned()
    }

    pub fn legacy(&self) -> Option<String> {
        self.lock().legacy.clone()
    }

    /// Every committed write, oldest first.
    pub fn writes(&self) -> Vec<Operation> {
        self.lock().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.lock().writes.len()
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl StorageBackend for MemBackend {
    fn execute(&self, mode: TxMode, op: &Operation, cancel: &Cancel) -> Result<Option<String>> {
        let (stall, fail_open, fail_writes) = {
            let state = self.lock();
            (state.stall, state.fail_open, state.fail_writes)
        };

        if fail_open {
            return Err(HardiError::StoreOpen("Simulated open error".to_string()));
        }
        if mode == TxMode::ReadOnly && op.is_write() {
            return Err(HardiError::Aborted(format!(
                "{} is not allowed in a read-only transaction",
                op.name()
            )));
        }
        if let Some(stall) = stall {
            std::thread::sleep(stall);
        }
        cancel.check()?;
        if op.is_write() && fail_writes {
            return Err(HardiError::Aborted("Simulated write error".to_string()));
        }

        let mut state = self.lock();
        match op {
            Operation::Get(key) => {
                self.reads.fetch_add(1, Ordering::SeqCst);
                Ok(state.slots.get(key).cloned())
            }
            Operation::Put(key, value) => {
                state.slots.insert(key.clone(), value.clone());
                state.writes.push(op.clone());
                Ok(None)
            }
            Operation::Clear => {
                state.slots.clear();
                state.writes.push(op.clone());
                Ok(None)
            }
        }
    }

    fn read_legacy(&self) -> Result<Option<String>> {
        Ok(self.lock().legacy.clone())
    }

    fn remove_legacy(&self) -> Result<()> {
        self.lock().legacy = None;
        Ok(())
    }
}
