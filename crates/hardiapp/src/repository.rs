//! # Repository
//!
//! The in-memory dataset and every operation the UI performs on it.
//!
//! Each operation follows the same shape:
//!
//! 1. make sure the dataset has been loaded (once per repository),
//! 2. change the cache synchronously, under its lock,
//! 3. ask the save worker to persist it later,
//! 4. return the result without waiting for the disk.
//!
//! The in-memory step never awaits, so two mutations cannot interleave and a
//! caller always observes its own change on the next read.
//!
//! Unknown ids are not errors: deletes report [`Outcome::NotFound`] and
//! [`Repository::add_debt_payment`] returns `None`. In both cases the dataset
//! instance is left untouched and no save is scheduled.

use crate::cache::Cache;
use crate::error::Result;
use crate::migrate;
use crate::model::{
    new_id, next_code, now_millis, AppData, Debt, DebtStatus, NewDebt, NewPayment, NewPurchase,
    NewSale, Payment, Purchase, Sale, DEBT_CODE_PREFIX, SALE_CODE_PREFIX,
};
use crate::store::adapter::{StoreAdapter, DEFAULT_TRANSACTION_TIMEOUT};
use crate::store::backend::StorageBackend;
use crate::store::worker::{SaveScheduler, DEFAULT_DEBOUNCE};
use crate::transfer::{self, Snapshot};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepositorySettings {
    pub debounce: Duration,
    pub transaction_timeout: Duration,
}

impl Default for RepositorySettings {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            transaction_timeout: DEFAULT_TRANSACTION_TIMEOUT,
        }
    }
}

/// Result of a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Removed,
    NotFound,
}

/// Handle onto one installation's data. Clones share the same cache and worker.
#[derive(Clone)]
pub struct Repository {
    inner: Arc<Inner>,
}

struct Inner {
    cache: Cache,
    initialized: OnceCell<()>,
    saver: SaveScheduler,
    worker: JoinHandle<()>,
}

impl Repository {
    /// Start the save worker for `backend`. Must be called from inside a Tokio
    /// runtime. Nothing is read until the first operation.
    pub fn open<B: StorageBackend>(backend: B, settings: RepositorySettings) -> Self {
        let cache = Cache::default();
        let adapter = StoreAdapter::new(backend).with_timeout(settings.transaction_timeout);
        let (saver, worker) = SaveScheduler::spawn(adapter, cache.clone(), settings.debounce);
        Self {
            inner: Arc::new(Inner {
                cache,
                initialized: OnceCell::new(),
                saver,
                worker,
            }),
        }
    }

    /// Load the dataset on first call; later calls return immediately.
    /// Concurrent first calls share a single durable read.
    pub async fn ensure_initialized(&self) {
        self.inner
            .initialized
            .get_or_init(|| async {
                let (data, source) = migrate::resolve(self.inner.saver.load().await);
                info!(?source, records = data.record_count(), "data initialized");
                self.inner.cache.replace(data);
                if source.keeps_original() {
                    self.inner.saver.preserve_original();
                }
                if source.should_persist() {
                    self.inner.saver.schedule_save();
                }
            })
            .await;
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.initialized()
    }

    pub async fn get_app_data(&self) -> Arc<AppData> {
        self.ensure_initialized().await;
        self.inner.cache.snapshot()
    }

    pub async fn add_sale(&self, input: NewSale) -> Result<Sale> {
        input.validate()?;
        self.ensure_initialized().await;

        let sale = self.inner.cache.update(|data| {
            let data = Arc::make_mut(data);
            let code = next_code(
                SALE_CODE_PREFIX,
                input.date,
                data.sales.iter().map(|s| s.code.as_str()),
            );
            let sale = Sale {
                id: new_id(),
                code,
                date: input.date,
                amount: input.amount,
                currency: input.currency,
                note: input.note,
                store: input.store,
                timestamp: now_millis(),
            };
            data.sales.insert(0, sale.clone());
            sale
        });

        debug!(id = %sale.id, code = %sale.code, "sale added");
        self.inner.saver.schedule_save();
        Ok(sale)
    }

    pub async fn add_purchase(&self, input: NewPurchase) -> Result<Purchase> {
        input.validate()?;
        self.ensure_initialized().await;

        let purchase = Purchase {
            id: new_id(),
            date: input.date,
            product_name: input.product_name,
            quantity: input.quantity,
            total_cost: input.total_cost,
            currency: input.currency,
            store: input.store,
            timestamp: now_millis(),
        };
        self.inner
            .cache
            .update(|data| Arc::make_mut(data).purchases.insert(0, purchase.clone()));

        debug!(id = %purchase.id, "purchase added");
        self.inner.saver.schedule_save();
        Ok(purchase)
    }

    pub async fn add_debt(&self, input: NewDebt) -> Result<Debt> {
        input.validate()?;
        self.ensure_initialized().await;

        let debt = self.inner.cache.update(|data| {
            let data = Arc::make_mut(data);
            let code = next_code(
                DEBT_CODE_PREFIX,
                input.created_date,
                data.debts.iter().map(|d| d.code.as_str()),
            );
            let debt = Debt {
                id: new_id(),
                code,
                kind: input.kind,
                person_name: input.person_name,
                phone: input.phone,
                total_amount: input.total_amount,
                currency: input.currency,
                created_date: input.created_date,
                due_date: input.due_date,
                status: DebtStatus::Unpaid,
                payments: Vec::new(),
                note: input.note,
                store: input.store,
                timestamp: now_millis(),
            };
            data.debts.insert(0, debt.clone());
            debt
        });

        debug!(id = %debt.id, code = %debt.code, "debt added");
        self.inner.saver.schedule_save();
        Ok(debt)
    }

    /// Append a payment to a debt and re-derive its status. The payment takes
    /// the debt's currency.
    pub async fn add_debt_payment(&self, debt_id: &str, input: NewPayment) -> Result<Option<Debt>> {
        input.validate()?;
        self.ensure_initialized().await;

        let updated = self.inner.cache.update(|data| {
            let index = data.debts.iter().position(|d| d.id == debt_id)?;
            let debt = &mut Arc::make_mut(data).debts[index];
            debt.payments.push(Payment {
                id: new_id(),
                date: input.date,
                amount: input.amount,
                currency: debt.currency,
                note: input.note,
            });
            debt.refresh_status();
            Some(debt.clone())
        });

        match &updated {
            Some(debt) => {
                debug!(id = %debt.id, status = ?debt.status, "payment added");
                self.inner.saver.schedule_save();
            }
            None => debug!(id = debt_id, "payment for unknown debt ignored"),
        }
        Ok(updated)
    }

    pub async fn delete_sale(&self, id: &str) -> Result<Outcome> {
        self.delete_where(
            id,
            "sale",
            |data| data.sales.iter().position(|s| s.id == id),
            |data, index| {
                data.sales.remove(index);
            },
        )
        .await
    }

    pub async fn delete_purchase(&self, id: &str) -> Result<Outcome> {
        self.delete_where(
            id,
            "purchase",
            |data| data.purchases.iter().position(|p| p.id == id),
            |data, index| {
                data.purchases.remove(index);
            },
        )
        .await
    }

    /// Removes the debt together with its payments.
    pub async fn delete_debt(&self, id: &str) -> Result<Outcome> {
        self.delete_where(
            id,
            "debt",
            |data| data.debts.iter().position(|d| d.id == id),
            |data, index| {
                data.debts.remove(index);
            },
        )
        .await
    }

    async fn delete_where(
        &self,
        id: &str,
        kind: &str,
        find: impl FnOnce(&AppData) -> Option<usize>,
        remove: impl FnOnce(&mut AppData, usize),
    ) -> Result<Outcome> {
        self.ensure_initialized().await;

        // `make_mut` only runs once the record is known to exist, so a miss
        // leaves the shared instance alone.
        let outcome = self.inner.cache.update(|data| match find(data) {
            Some(index) => {
                remove(Arc::make_mut(data), index);
                Outcome::Removed
            }
            None => Outcome::NotFound,
        });

        match outcome {
            Outcome::Removed => {
                debug!(id, kind, "record deleted");
                self.inner.saver.schedule_save();
            }
            Outcome::NotFound => debug!(id, kind, "delete of unknown record ignored"),
        }
        Ok(outcome)
    }

    /// Pretty-printed copy of the whole dataset with a dated file name.
    pub async fn export_snapshot(&self) -> Result<Snapshot> {
        let data = self.get_app_data().await;
        transfer::encode(&data)
    }

    /// Write an export into `dir` and return the file's path.
    pub async fn export_to(&self, dir: &Path) -> Result<PathBuf> {
        let snapshot = self.export_snapshot().await?;
        let path = dir.join(&snapshot.file_name);
        tokio::fs::create_dir_all(dir).await?;
        tokio::fs::write(&path, &snapshot.bytes).await?;
        info!(path = %path.display(), "data exported");
        Ok(path)
    }

    /// Replace the whole dataset with an exported document. On any error the
    /// current dataset is kept.
    pub async fn import_snapshot(&self, bytes: &[u8]) -> Result<()> {
        let data = transfer::decode(bytes)?;
        self.claim_initialization().await;

        info!(records = data.record_count(), "data imported");
        self.inner.cache.replace(data);
        self.inner.saver.schedule_save();
        Ok(())
    }

    pub async fn import_file(&self, path: &Path) -> Result<()> {
        let bytes = tokio::fs::read(path).await?;
        self.import_snapshot(&bytes).await
    }

    /// Empty the dataset and the durable store, including the legacy slot.
    /// Resolves once the store holds the empty dataset.
    pub async fn clear_all_data(&self) -> Result<()> {
        self.claim_initialization().await;
        self.inner.cache.replace(AppData::default());
        self.inner.saver.reset().await
    }

    /// Write any pending change now.
    pub async fn flush(&self) -> Result<()> {
        self.inner.saver.flush().await
    }

    /// Flush and, if this is the last handle, wait for the save worker to stop.
    pub async fn close(self) -> Result<()> {
        self.flush().await?;
        if let Ok(inner) = Arc::try_unwrap(self.inner) {
            let Inner { saver, worker, .. } = inner;
            drop(saver);
            if let Err(err) = worker.await {
                debug!(error = %err, "save worker ended abnormally");
            }
        }
        Ok(())
    }

    /// Mark the repository initialized without loading, for operations that
    /// are about to replace the whole dataset. Waits if a load is in progress.
    async fn claim_initialization(&self) {
        if self.inner.initialized.set(()).is_err() {
            self.ensure_initialized().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HardiError;
    use crate::model::{Currency, DebtKind, Shop};
    use crate::store::mem_backend::MemBackend;
    use crate::store::{BACKUP_KEY, DATA_KEY};
    use crate::test_utils::TestEnv;
    use chrono::NaiveDate;

    const WINDOW: Duration = Duration::from_millis(40);

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn open(backend: &MemBackend) -> Repository {
        Repository::open(
            backend.clone(),
            RepositorySettings {
                debounce: WINDOW,
                ..Default::default()
            },
        )
    }

    fn new_sale(date: &str, amount: f64) -> NewSale {
        NewSale {
            date: day(date),
            amount,
            currency: Currency::Iqd,
            note: None,
            store: Shop::Shoes,
        }
    }

    fn new_debt(total: f64) -> NewDebt {
        NewDebt {
            kind: DebtKind::OwedToUs,
            person_name: "Ahmed".to_string(),
            phone: Some("0750 000 0000".to_string()),
            total_amount: total,
            currency: Currency::Usd,
            created_date: day("2026-01-10"),
            due_date: None,
            note: None,
            store: Shop::Clothes,
        }
    }

    fn payment(amount: f64) -> NewPayment {
        NewPayment {
            date: day("2026-01-11"),
            amount,
            note: None,
        }
    }

    #[tokio::test]
    async fn test_initialization_reads_once_and_keeps_instance() {
        let backend = MemBackend::new();
        let repo = open(&backend);

        let first = repo.get_app_data().await;
        let second = repo.get_app_data().await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(backend.read_count(), 1);
        assert!(repo.is_initialized());
    }

    #[tokio::test]
    async fn test_concurrent_first_access_shares_one_read() {
        let backend = MemBackend::new();
        let repo = open(&backend);

        let (a, b) = tokio::join!(repo.get_app_data(), repo.get_app_data());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(backend.read_count(), 1);
    }

    #[tokio::test]
    async fn test_add_sale_assigns_identity_and_returns_before_saving() {
        let backend = MemBackend::new();
        let repo = open(&backend);

        let first = repo.add_sale(new_sale("2026-01-10", 25000.0)).await.unwrap();
        let second = repo.add_sale(new_sale("2026-01-10", 5000.0)).await.unwrap();

        assert_eq!(first.code, "SL-20260110-001");
        assert_eq!(second.code, "SL-20260110-002");
        assert_ne!(first.id, second.id);
        assert!(first.timestamp > 0);

        // Nothing hits the store until the window passes.
        assert_eq!(backend.write_count(), 0);
        let data = repo.get_app_data().await;
        assert_eq!(data.sales[0].id, second.id);
        assert_eq!(data.sales[1].id, first.id);
    }

    #[tokio::test]
    async fn test_burst_of_mutations_is_one_write_with_final_state() {
        let backend = MemBackend::new();
        let repo = open(&backend);

        for amount in [1.0, 2.0, 3.0] {
            repo.add_sale(new_sale("2026-01-10", amount)).await.unwrap();
        }
        tokio::time::sleep(WINDOW * 5).await;

        assert_eq!(backend.write_count(), 1);
        let stored = AppData::from_json(&backend.slot(DATA_KEY).unwrap()).unwrap();
        assert_eq!(stored, *repo.get_app_data().await);
    }

    #[tokio::test]
    async fn test_debt_payments_derive_status_and_inherit_currency() {
        let backend = MemBackend::new();
        let repo = open(&backend);

        let debt = repo.add_debt(new_debt(100.0)).await.unwrap();
        assert_eq!(debt.code, "DB-20260110-001");
        assert_eq!(debt.status, DebtStatus::Unpaid);
        assert!(debt.payments.is_empty());

        let partial = repo
            .add_debt_payment(&debt.id, payment(40.0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(partial.status, DebtStatus::Partial);
        assert_eq!(partial.payments[0].currency, Currency::Usd);

        let paid = repo
            .add_debt_payment(&debt.id, payment(60.0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(paid.status, DebtStatus::Paid);
        assert_eq!(paid.remaining(), 0.0);

        let stored = repo.get_app_data().await;
        assert_eq!(stored.find_debt(&debt.id), Some(&paid));
    }

    #[tokio::test]
    async fn test_payment_for_unknown_debt_is_a_no_op() {
        let backend = MemBackend::new();
        let repo = open(&backend);
        repo.add_debt(new_debt(100.0)).await.unwrap();
        repo.flush().await.unwrap();

        let before = repo.get_app_data().await;
        let result = repo.add_debt_payment("missing", payment(10.0)).await.unwrap();
        assert!(result.is_none());
        assert!(Arc::ptr_eq(&before, &repo.get_app_data().await));

        tokio::time::sleep(WINDOW * 3).await;
        assert_eq!(backend.write_count(), 1);
    }

    #[tokio::test]
    async fn test_delete_unknown_id_leaves_instance_untouched() {
        let backend = MemBackend::new();
        let repo = open(&backend);
        repo.add_sale(new_sale("2026-01-10", 1.0)).await.unwrap();
        repo.flush().await.unwrap();

        let before = repo.get_app_data().await;
        assert_eq!(repo.delete_sale("nope").await.unwrap(), Outcome::NotFound);
        assert_eq!(repo.delete_purchase("nope").await.unwrap(), Outcome::NotFound);
        assert_eq!(repo.delete_debt("nope").await.unwrap(), Outcome::NotFound);
        assert!(Arc::ptr_eq(&before, &repo.get_app_data().await));

        tokio::time::sleep(WINDOW * 3).await;
        assert_eq!(backend.write_count(), 1);
    }

    #[tokio::test]
    async fn test_delete_removes_record_and_snapshot_is_unchanged() {
        let backend = MemBackend::new();
        let repo = open(&backend);
        let sale = repo.add_sale(new_sale("2026-01-10", 1.0)).await.unwrap();

        let before = repo.get_app_data().await;
        assert_eq!(repo.delete_sale(&sale.id).await.unwrap(), Outcome::Removed);

        assert_eq!(before.sales.len(), 1);
        assert!(repo.get_app_data().await.sales.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_input_does_not_touch_cache() {
        let backend = MemBackend::new();
        let repo = open(&backend);
        let before = repo.get_app_data().await;

        let result = repo
            .add_purchase(NewPurchase {
                date: day("2026-01-10"),
                product_name: "Boots".to_string(),
                quantity: 0,
                total_cost: 10.0,
                currency: Currency::Usd,
                store: Shop::Shoes,
            })
            .await;
        assert!(matches!(result, Err(HardiError::InvalidInput(_))));
        assert!(Arc::ptr_eq(&before, &repo.get_app_data().await));
    }

    #[tokio::test]
    async fn test_failed_load_falls_back_without_saving() {
        let backend = MemBackend::new();
        backend.set_simulate_open_error(true);
        let repo = open(&backend);

        let data = repo.get_app_data().await;
        assert_eq!(*data, AppData::default());

        backend.set_simulate_open_error(false);
        tokio::time::sleep(WINDOW * 3).await;
        assert_eq!(backend.write_count(), 0);
    }

    #[tokio::test]
    async fn test_zero_total_debt_starts_unpaid() {
        let backend = MemBackend::new();
        let repo = open(&backend);

        let debt = repo.add_debt(new_debt(0.0)).await.unwrap();
        assert_eq!(debt.status, DebtStatus::Unpaid);

        let paid = repo
            .add_debt_payment(&debt.id, payment(0.0))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(paid.status, DebtStatus::Paid);
    }

    #[tokio::test]
    async fn test_null_amount_in_store_does_not_lose_other_records() {
        let backend = MemBackend::new().with_slot(
            DATA_KEY,
            r#"{"sales": [
                {"id": "keep", "code": "SL-20260101-001", "date": "2026-01-01", "amount": 700, "currency": "USD", "timestamp": 1},
                {"id": "nan", "code": "SL-20260101-002", "date": "2026-01-01", "amount": null, "currency": "USD", "timestamp": 2}
            ]}"#,
        );
        let repo = open(&backend);

        assert_eq!(repo.get_app_data().await.sales.len(), 2);
        repo.add_sale(new_sale("2026-01-10", 1.0)).await.unwrap();
        repo.close().await.unwrap();

        let stored = AppData::from_json(&backend.slot(DATA_KEY).unwrap()).unwrap();
        let ids: Vec<&str> = stored.sales.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains(&"keep"));
        assert!(ids.contains(&"nan"));
        assert_eq!(backend.slot(BACKUP_KEY), None);
    }

    #[tokio::test]
    async fn test_skipped_records_are_backed_up_before_saving() {
        let original = r#"{"sales": [
            {"id": "keep", "code": "SL-20260101-001", "date": "2026-01-01", "amount": 700, "currency": "USD"},
            {"id": "broken", "amount": 5}
        ]}"#;
        let backend = MemBackend::new().with_slot(DATA_KEY, original);
        let repo = open(&backend);

        let data = repo.get_app_data().await;
        assert_eq!(data.sales.len(), 1);
        repo.close().await.unwrap();

        assert_eq!(backend.slot(BACKUP_KEY).as_deref(), Some(original));
        let stored = AppData::from_json(&backend.slot(DATA_KEY).unwrap()).unwrap();
        assert_eq!(stored.sales[0].id, "keep");
    }

    #[tokio::test]
    async fn test_unreadable_store_is_backed_up_before_first_change_is_saved() {
        let original = r#"{"sales": "not a list"}"#;
        let backend = MemBackend::new().with_slot(DATA_KEY, original);
        let repo = open(&backend);

        assert_eq!(*repo.get_app_data().await, AppData::default());
        tokio::time::sleep(WINDOW * 3).await;
        assert_eq!(backend.write_count(), 0);

        repo.add_sale(new_sale("2026-01-10", 1.0)).await.unwrap();
        repo.close().await.unwrap();

        assert_eq!(backend.slot(BACKUP_KEY).as_deref(), Some(original));
        let stored = AppData::from_json(&backend.slot(DATA_KEY).unwrap()).unwrap();
        assert_eq!(stored.sales.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_load_keeps_stored_data_as_backup() {
        let original = r#"{"sales": [{"id": "keep", "code": "SL-20260101-001", "date": "2026-01-01", "amount": 700, "currency": "USD"}]}"#;
        let backend = MemBackend::new().with_slot(DATA_KEY, original);
        backend.set_simulate_open_error(true);
        let repo = open(&backend);

        assert_eq!(*repo.get_app_data().await, AppData::default());
        backend.set_simulate_open_error(false);
        repo.add_sale(new_sale("2026-01-10", 1.0)).await.unwrap();
        repo.close().await.unwrap();

        assert_eq!(backend.slot(BACKUP_KEY).as_deref(), Some(original));
    }

    #[tokio::test]
    async fn test_import_does_not_read_the_store() {
        let backend = MemBackend::new().with_slot(
            DATA_KEY,
            r#"{"sales":[{"id":"old","code":"SL-1","date":"2026-01-01","amount":1,"currency":"USD"}]}"#,
        );
        let repo = open(&backend);

        repo.import_snapshot(br#"{"sales": []}"#).await.unwrap();
        assert_eq!(backend.read_count(), 0);
        assert!(repo.get_app_data().await.sales.is_empty());
        assert_eq!(backend.read_count(), 0);
    }

    #[tokio::test]
    async fn test_rejected_import_keeps_cache() {
        let backend = MemBackend::new();
        let repo = open(&backend);
        repo.add_sale(new_sale("2026-01-10", 1.0)).await.unwrap();
        let before = repo.get_app_data().await;

        let result = repo.import_snapshot(br#"{"purchases": []}"#).await;
        assert!(matches!(result, Err(HardiError::InvalidSnapshot(_))));
        assert!(Arc::ptr_eq(&before, &repo.get_app_data().await));
    }

    #[tokio::test]
    async fn test_close_writes_pending_changes() {
        let backend = MemBackend::new();
        let repo = Repository::open(
            backend.clone(),
            RepositorySettings {
                debounce: Duration::from_secs(60),
                ..Default::default()
            },
        );
        repo.add_sale(new_sale("2026-01-10", 1.0)).await.unwrap();
        repo.close().await.unwrap();

        let stored = AppData::from_json(&backend.slot(DATA_KEY).unwrap()).unwrap();
        assert_eq!(stored.sales.len(), 1);
    }

    #[tokio::test]
    async fn test_data_survives_reopen_on_sqlite() {
        let env = TestEnv::new();

        let repo = env.open();
        let debt = repo.add_debt(new_debt(250.0)).await.unwrap();
        repo.add_debt_payment(&debt.id, payment(50.0)).await.unwrap();
        let expected = repo.get_app_data().await;
        repo.close().await.unwrap();

        let reopened = env.open();
        assert_eq!(reopened.get_app_data().await, expected);
        reopened.close().await.unwrap();
    }
}
