//! # hardiapp
//!
//! The bookkeeping core of hardi: sales, inventory purchases and debts for a
//! shop with two branches (clothes and shoes), kept entirely on the local
//! machine.
//!
//! ## Architecture
//!
//! ```text
//! caller ──► Repository ──(Dirty)──► save worker ──► StoreAdapter ──► SQLite
//!               │                         ▲
//!               └──── in-memory cache ────┘ (snapshot on save)
//! ```
//!
//! - [`repository`]: the in-memory dataset and every operation on it. Mutations
//!   never wait for the disk.
//! - [`store`]: the durable side: backends, the async adapter with its
//!   transaction timeout, and the debounced save worker.
//! - [`migrate`]: picks the starting dataset (stored, legacy or empty).
//! - [`transfer`]: export files and import validation.
//! - [`summary`]: dashboard figures.
//! - [`init`] and [`config`]: wiring a repository to a data directory.
//!
//! ## Quick Start
//!
//! ```ignore
//! let ctx = hardiapp::init::initialize(None)?;
//! let sale = ctx.repo.add_sale(new_sale).await?;
//! let data = ctx.repo.get_app_data().await;
//! ctx.repo.close().await?;
//! ```

pub(crate) mod cache;
pub mod config;
pub mod error;
pub mod init;
pub mod migrate;
pub mod model;
pub mod repository;
pub mod store;
pub mod summary;
pub mod transfer;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use error::{HardiError, Result};
pub use model::{
    AppData, Currency, Debt, DebtKind, DebtStatus, NewDebt, NewPayment, NewPurchase, NewSale,
    Payment, Purchase, Sale, Shop,
};
pub use repository::{Outcome, Repository, RepositorySettings};
