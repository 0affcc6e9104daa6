use super::backend::{Cancel, Operation, StorageBackend, TxMode};
use crate::error::{HardiError, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Async boundary over a blocking [`StorageBackend`].
///
/// Every call runs exactly one backend transaction on the blocking pool and
/// resolves once the backend reports the commit. If the transaction neither
/// commits nor fails within the timeout, it is cancelled and interrupted, and
/// the call waits for it to roll back before failing with
/// [`HardiError::Timeout`]. A call never returns while its transaction is still
/// running, so callers that await one call before the next never have two in
/// flight.
#[derive(Clone)]
pub struct StoreAdapter {
    backend: Arc<dyn StorageBackend>,
    timeout: Duration,
}

impl StoreAdapter {
    pub fn new<B: StorageBackend>(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            timeout: DEFAULT_TRANSACTION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn run_transaction(&self, mode: TxMode, op: Operation) -> Result<Option<String>> {
        let name = op.name();
        let result = self
            .blocking(move |backend, cancel| backend.execute(mode, &op, cancel))
            .await;
        match &result {
            Ok(_) => debug!(op = name, ?mode, "transaction committed"),
            Err(err) => warn!(op = name, ?mode, error = %err, "transaction failed"),
        }
        result
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        self.run_transaction(TxMode::ReadOnly, Operation::Get(key.to_string()))
            .await
    }

    pub async fn put(&self, key: &str, value: String) -> Result<()> {
        self.run_transaction(TxMode::ReadWrite, Operation::Put(key.to_string(), value))
            .await
            .map(|_| ())
    }

    pub async fn clear(&self) -> Result<()> {
        self.run_transaction(TxMode::ReadWrite, Operation::Clear)
            .await
            .map(|_| ())
    }

    pub async fn read_legacy(&self) -> Result<Option<String>> {
        self.blocking(|backend, _| backend.read_legacy()).await
    }

    pub async fn remove_legacy(&self) -> Result<()> {
        self.blocking(|backend, _| backend.remove_legacy()).await
    }

    async fn blocking<T, F>(&self, task: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn StorageBackend, &Cancel) -> Result<T> + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let cancel = Cancel::default();
        let token = cancel.clone();
        let mut handle = tokio::task::spawn_blocking(move || task(backend.as_ref(), &token));

        match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(task_failed(join_err)),
            Err(_) => {
                cancel.cancel();
                self.backend.interrupt();
                // Still running, typically waiting on a lock. Past this point it
                // fails its pre-commit check; wait for it to finish.
                match handle.await {
                    Ok(Ok(value)) => {
                        warn!(timeout = ?self.timeout, "transaction committed after its timeout");
                        Ok(value)
                    }
                    Ok(Err(err)) => {
                        debug!(error = %err, "timed-out transaction rolled back");
                        Err(HardiError::Timeout(self.timeout))
                    }
                    Err(join_err) => Err(task_failed(join_err)),
                }
            }
        }
    }
}

fn task_failed(err: tokio::task::JoinError) -> HardiError {
    HardiError::Aborted(format!("store task failed: {err}"))
}
