//! # Save Scheduler
//!
//! Mutations never wait for the disk. Each one sends a `Dirty` signal to a single
//! background task, the only code that ever talks to the [`StoreAdapter`].
//!
//! ## Debounce
//!
//! A `Dirty` signal arms a deadline one debounce window away; another signal
//! before the deadline pushes it back. When the deadline passes the task takes a
//! snapshot of the cache *at that moment* and writes it. A burst of N mutations
//! therefore costs one write, and that write carries the state after the Nth.
//!
//! ## Ordering
//!
//! The task handles one command at a time and awaits each durable operation
//! before reading the next command. There is never more than one transaction in
//! flight and writes land in the order their snapshots were taken.
//!
//! ## Failure
//!
//! A failed background write is logged and forgotten; the next signal writes a
//! fresh snapshot. `Flush` and `Reset` report their outcome to the caller.
//!
//! ## Damaged Data
//!
//! When the stored dataset could not be read in full, `Preserve` makes the next
//! write first copy whatever the durable slot holds to [`BACKUP_KEY`]. The slot
//! is not overwritten until that copy has committed. `Reset` drops the request
//! together with everything else in the store.
//!
//! ## Shutdown
//!
//! When every [`SaveScheduler`] handle is gone the task writes any pending
//! snapshot and exits.

use super::adapter::StoreAdapter;
use super::{BACKUP_KEY, DATA_KEY};
use crate::cache::Cache;
use crate::error::{HardiError, Result};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// What the durable store held when it was first read.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Loaded {
    pub primary: Option<String>,
    pub legacy: Option<String>,
}

enum Command {
    Dirty,
    Preserve,
    Load(oneshot::Sender<Result<Loaded>>),
    Flush(oneshot::Sender<Result<()>>),
    Reset(oneshot::Sender<Result<()>>),
}

enum Event {
    Fire,
    Received(Option<Command>),
}

/// Handle onto the save worker. Cheap to clone.
#[derive(Clone)]
pub struct SaveScheduler {
    tx: mpsc::UnboundedSender<Command>,
}

impl SaveScheduler {
    pub(crate) fn spawn(
        adapter: StoreAdapter,
        cache: Cache,
        debounce: Duration,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Worker {
            adapter,
            cache,
            debounce,
            rx,
            unsaved: false,
            preserve: false,
        };
        let handle = tokio::spawn(worker.run());
        (Self { tx }, handle)
    }

    /// Fire-and-forget: ask for the cache to be written after the debounce window.
    pub fn schedule_save(&self) {
        if self.tx.send(Command::Dirty).is_err() {
            warn!("save requested after the save worker stopped");
        }
    }

    /// Keep the current durable slot under [`BACKUP_KEY`] before it is next
    /// overwritten.
    pub fn preserve_original(&self) {
        if self.tx.send(Command::Preserve).is_err() {
            warn!("backup requested after the save worker stopped");
        }
    }

    /// Read the durable slot, falling back to the legacy blob when it is empty.
    pub async fn load(&self) -> Result<Loaded> {
        self.request(Command::Load).await
    }

    /// Write any pending or previously failed snapshot now.
    pub async fn flush(&self) -> Result<()> {
        self.request(Command::Flush).await
    }

    /// Drop the legacy blob, clear the store and write the current cache,
    /// overriding any armed debounce.
    pub async fn reset(&self) -> Result<()> {
        self.request(Command::Reset).await
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<T>>) -> Command,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(make(reply))
            .map_err(|_| HardiError::WorkerClosed)?;
        response.await.map_err(|_| HardiError::WorkerClosed)?
    }
}

struct Worker {
    adapter: StoreAdapter,
    cache: Cache,
    debounce: Duration,
    rx: mpsc::UnboundedReceiver<Command>,
    // Set when the last background write failed and nothing has succeeded since.
    unsaved: bool,
    // Back up the durable slot before the next write.
    preserve: bool,
}

impl Worker {
    async fn run(mut self) {
        let mut deadline: Option<Instant> = None;

        loop {
            let event = match deadline {
                Some(at) => tokio::select! {
                    _ = sleep_until(at) => Event::Fire,
                    cmd = self.rx.recv() => Event::Received(cmd),
                },
                None => Event::Received(self.rx.recv().await),
            };

            match event {
                Event::Fire => {
                    deadline = None;
                    self.save_in_background().await;
                }
                Event::Received(Some(Command::Dirty)) => {
                    debug!(debounce = ?self.debounce, "save scheduled");
                    deadline = Some(Instant::now() + self.debounce);
                }
                Event::Received(Some(Command::Preserve)) => {
                    self.preserve = true;
                }
                Event::Received(Some(Command::Load(reply))) => {
                    let _ = reply.send(self.load().await);
                }
                Event::Received(Some(Command::Flush(reply))) => {
                    let pending = deadline.take().is_some() || self.unsaved;
                    let result = if pending { self.save().await } else { Ok(()) };
                    let _ = reply.send(result);
                }
                Event::Received(Some(Command::Reset(reply))) => {
                    deadline = None;
                    let _ = reply.send(self.reset().await);
                }
                Event::Received(None) => {
                    if deadline.take().is_some() || self.unsaved {
                        self.save_in_background().await;
                    }
                    debug!("save worker stopped");
                    break;
                }
            }
        }
    }

    async fn save(&mut self) -> Result<()> {
        let result = self.write_snapshot().await;
        self.unsaved = result.is_err();
        result
    }

    async fn write_snapshot(&mut self) -> Result<()> {
        if self.preserve {
            self.back_up_primary().await?;
            self.preserve = false;
        }
        let snapshot = self.cache.snapshot();
        let json = serde_json::to_string(snapshot.as_ref())?;
        let bytes = json.len();
        self.adapter.put(DATA_KEY, json).await?;
        debug!(bytes, records = snapshot.record_count(), "snapshot saved");
        Ok(())
    }

    async fn back_up_primary(&self) -> Result<()> {
        if let Some(original) = self.adapter.get(DATA_KEY).await? {
            let bytes = original.len();
            self.adapter.put(BACKUP_KEY, original).await?;
            warn!(key = BACKUP_KEY, bytes, "kept the previous stored data as a backup");
        }
        Ok(())
    }

    async fn save_in_background(&mut self) {
        if let Err(err) = self.save().await {
            error!(error = %err, "background save failed");
        }
    }

    async fn load(&self) -> Result<Loaded> {
        let primary = self.adapter.get(DATA_KEY).await?;
        if primary.is_some() {
            return Ok(Loaded {
                primary,
                legacy: None,
            });
        }

        let legacy = match self.adapter.read_legacy().await {
            Ok(legacy) => legacy,
            Err(err) => {
                warn!(error = %err, "could not read legacy data");
                None
            }
        };
        Ok(Loaded { primary, legacy })
    }

    async fn reset(&mut self) -> Result<()> {
        if let Err(err) = self.adapter.remove_legacy().await {
            warn!(error = %err, "could not remove legacy data");
        }
        self.adapter.clear().await?;
        self.preserve = false;
        self.save().await?;
        info!("store cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AppData, Currency, Purchase, Shop};
    use crate::store::backend::Operation;
    use crate::store::mem_backend::MemBackend;
    use chrono::NaiveDate;
    use std::sync::Arc;

    const WINDOW: Duration = Duration::from_millis(40);

    fn start(backend: &MemBackend) -> (SaveScheduler, Cache, JoinHandle<()>) {
        let cache = Cache::default();
        let (scheduler, handle) =
            SaveScheduler::spawn(StoreAdapter::new(backend.clone()), cache.clone(), WINDOW);
        (scheduler, cache, handle)
    }

    fn add_purchase(cache: &Cache, name: &str) {
        cache.update(|data| {
            Arc::make_mut(data).purchases.insert(
                0,
                Purchase {
                    id: name.to_string(),
                    date: NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
                    product_name: name.to_string(),
                    quantity: 1,
                    total_cost: 1.0,
                    currency: Currency::Iqd,
                    store: Shop::Shoes,
                    timestamp: 1,
                },
            )
        });
    }

    fn stored(backend: &MemBackend) -> AppData {
        AppData::from_json(&backend.slot(DATA_KEY).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_burst_coalesces_into_one_write() {
        let backend = MemBackend::new();
        let (scheduler, cache, _handle) = start(&backend);

        for name in ["a", "b", "c", "d"] {
            add_purchase(&cache, name);
            scheduler.schedule_save();
        }
        tokio::time::sleep(WINDOW * 5).await;

        assert_eq!(backend.write_count(), 1);
        assert_eq!(stored(&backend), *cache.snapshot());
        assert_eq!(stored(&backend).purchases.len(), 4);
    }

    #[tokio::test]
    async fn test_flush_writes_pending_snapshot_immediately() {
        let backend = MemBackend::new();
        let (scheduler, cache, _handle) = start(&backend);

        add_purchase(&cache, "a");
        scheduler.schedule_save();
        scheduler.flush().await.unwrap();

        assert_eq!(backend.write_count(), 1);
        // The armed deadline was consumed by the flush.
        tokio::time::sleep(WINDOW * 3).await;
        assert_eq!(backend.write_count(), 1);
    }

    #[tokio::test]
    async fn test_flush_without_changes_does_not_write() {
        let backend = MemBackend::new();
        let (scheduler, _cache, _handle) = start(&backend);

        scheduler.flush().await.unwrap();
        assert_eq!(backend.write_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_write_does_not_block_later_writes() {
        let backend = MemBackend::new();
        let (scheduler, cache, _handle) = start(&backend);

        backend.set_simulate_write_error(true);
        add_purchase(&cache, "a");
        scheduler.schedule_save();
        tokio::time::sleep(WINDOW * 3).await;
        assert_eq!(backend.write_count(), 0);

        backend.set_simulate_write_error(false);
        add_purchase(&cache, "b");
        scheduler.schedule_save();
        tokio::time::sleep(WINDOW * 3).await;

        assert_eq!(backend.write_count(), 1);
        assert_eq!(stored(&backend).purchases.len(), 2);
    }

    #[tokio::test]
    async fn test_flush_retries_after_failed_background_write() {
        let backend = MemBackend::new();
        let (scheduler, cache, _handle) = start(&backend);

        backend.set_simulate_write_error(true);
        add_purchase(&cache, "a");
        scheduler.schedule_save();
        tokio::time::sleep(WINDOW * 3).await;

        backend.set_simulate_write_error(false);
        scheduler.flush().await.unwrap();
        assert_eq!(stored(&backend).purchases.len(), 1);
    }

    #[tokio::test]
    async fn test_dropping_scheduler_flushes_pending_snapshot() {
        let backend = MemBackend::new();
        let (scheduler, cache, handle) = start(&backend);

        add_purchase(&cache, "a");
        scheduler.schedule_save();
        drop(scheduler);
        handle.await.unwrap();

        assert_eq!(backend.write_count(), 1);
    }

    #[tokio::test]
    async fn test_reset_clears_then_writes_and_cancels_pending() {
        let backend = MemBackend::new().with_legacy("{\"sales\":[]}");
        let (scheduler, cache, _handle) = start(&backend);

        add_purchase(&cache, "a");
        scheduler.schedule_save();
        cache.replace(AppData::default());
        scheduler.reset().await.unwrap();

        let writes = backend.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0], Operation::Clear);
        assert!(matches!(writes[1], Operation::Put(ref key, _) if key == DATA_KEY));
        assert_eq!(stored(&backend), AppData::default());
        assert_eq!(backend.legacy(), None);

        tokio::time::sleep(WINDOW * 3).await;
        assert_eq!(backend.write_count(), 2);
    }

    #[tokio::test]
    async fn test_preserve_backs_up_slot_before_overwriting() {
        let backend = MemBackend::new().with_slot(DATA_KEY, "{\"sales\": \"damaged\"}");
        let (scheduler, cache, _handle) = start(&backend);

        scheduler.preserve_original();
        add_purchase(&cache, "a");
        scheduler.schedule_save();
        scheduler.flush().await.unwrap();

        assert_eq!(
            backend.slot(BACKUP_KEY).as_deref(),
            Some("{\"sales\": \"damaged\"}")
        );
        assert_eq!(stored(&backend).purchases.len(), 1);

        // Only the first write after the request takes a backup.
        add_purchase(&cache, "b");
        scheduler.schedule_save();
        scheduler.flush().await.unwrap();
        let backups = backend
            .writes()
            .into_iter()
            .filter(|op| matches!(op, Operation::Put(key, _) if key == BACKUP_KEY))
            .count();
        assert_eq!(backups, 1);
    }

    #[tokio::test]
    async fn test_failed_backup_keeps_slot_untouched() {
        let backend = MemBackend::new().with_slot(DATA_KEY, "{\"sales\": \"damaged\"}");
        let (scheduler, cache, _handle) = start(&backend);

        scheduler.preserve_original();
        backend.set_simulate_write_error(true);
        add_purchase(&cache, "a");
        scheduler.schedule_save();
        tokio::time::sleep(WINDOW * 3).await;
        assert_eq!(
            backend.slot(DATA_KEY).as_deref(),
            Some("{\"sales\": \"damaged\"}")
        );

        backend.set_simulate_write_error(false);
        scheduler.flush().await.unwrap();
        assert_eq!(
            backend.slot(BACKUP_KEY).as_deref(),
            Some("{\"sales\": \"damaged\"}")
        );
        assert_eq!(stored(&backend).purchases.len(), 1);
    }

    #[tokio::test]
    async fn test_load_falls_back_to_legacy() {
        let backend = MemBackend::new().with_legacy("{\"sales\":[]}");
        let (scheduler, _cache, _handle) = start(&backend);

        let loaded = scheduler.load().await.unwrap();
        assert_eq!(loaded.primary, None);
        assert_eq!(loaded.legacy.as_deref(), Some("{\"sales\":[]}"));
    }

    #[tokio::test]
    async fn test_load_prefers_primary_slot() {
        let backend = MemBackend::new()
            .with_slot(DATA_KEY, "{\"sales\":[]}")
            .with_legacy("{\"ignored\":true}");
        let (scheduler, _cache, _handle) = start(&backend);

        let loaded = scheduler.load().await.unwrap();
        assert_eq!(loaded.primary.as_deref(), Some("{\"sales\":[]}"));
        assert_eq!(loaded.legacy, None);
    }
}
