//! # Storage Layer
//!
//! This module owns everything between the in-memory cache and the disk.
//!
//! ## Memory-First Architecture
//!
//! Hardi keeps a split model:
//! 1. **Truth while running**: the in-memory cache held by the repository.
//! 2. **Durable copy**: one SQLite database holding the whole dataset as a single
//!    JSON blob.
//!
//! The durable copy always lags the cache by at most one debounce window plus the
//! time spent waiting for earlier writes. A crash inside that window loses the most
//! recent burst of changes, never older data.
//!
//! ## Layers
//!
//! - [`backend::StorageBackend`]: blocking, one-transaction-per-call raw I/O.
//!   - [`sqlite_backend::SqliteBackend`]: production implementation.
//!   - [`mem_backend::MemBackend`]: for testing logic without touching the disk.
//! - [`adapter::StoreAdapter`]: moves backend calls onto the blocking pool and
//!   enforces the per-transaction timeout.
//! - [`worker`]: the save scheduler. A single task owns the adapter; every durable
//!   operation goes through it, so at most one is in flight and writes land in
//!   the order their snapshots were taken.
//!
//! ## Transaction Rules
//!
//! - A connection is opened per transaction and released on every path.
//! - A call resolves only after the commit, never on the statement's own
//!   acknowledgment.
//! - Open failures, statement errors, aborts and timeouts are distinct
//!   [`HardiError`](crate::error::HardiError) variants.
//!
//! ## Storage Layout
//!
//! ```text
//! <data_dir>/
//! ├── hardi_store.db          # table app_data_store, key "main_data"
//! │                           # (plus "main_data_backup" after a damaged read)
//! ├── hardi_store_db_v3.json  # legacy flat blob, read once on first start
//! └── hardi.toml              # optional configuration
//! ```
//!
//! Every save rewrites the whole blob. That is fine for a shop's worth of records
//! (hundreds to low thousands) and keeps each save a single atomic transaction.

pub mod adapter;
pub mod backend;
pub mod mem_backend;
pub mod sqlite_backend;
pub mod worker;

/// Table holding one row per logical key.
pub const TABLE_NAME: &str = "app_data_store";

/// The one key that holds the serialized dataset.
pub const DATA_KEY: &str = "main_data";

/// Where the previous value of [`DATA_KEY`] is kept when it could not be read
/// in full and is about to be overwritten.
pub const BACKUP_KEY: &str = "main_data_backup";

/// Default database file inside the data directory.
pub const DEFAULT_DB_FILE: &str = "hardi_store.db";

/// Pre-migration flat storage, read once and never written again.
pub const LEGACY_FILE_NAME: &str = "hardi_store_db_v3.json";
