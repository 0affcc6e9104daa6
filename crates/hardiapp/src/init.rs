//! # Setting Up a Context
//!
//! Everything a collaborator needs to start working lives in one [`HardiContext`]:
//! the resolved data directory, the loaded [`HardiConfig`] and an open
//! [`Repository`] backed by SQLite.
//!
//! ## Data Directory Resolution
//!
//! 1. An explicit `data_override` (the CLI's `--data-dir`).
//! 2. The `HARDI_DATA` environment variable, mainly for tests.
//! 3. The OS-appropriate data directory via the `directories` crate.
//!
//! The directory is created on first write, not here.

use crate::config::{HardiConfig, CONFIG_FILE_NAME};
use crate::error::{HardiError, Result};
use crate::repository::Repository;
use crate::store::sqlite_backend::SqliteBackend;
use clapfig::{Clapfig, SearchMode, SearchPath};
use directories::ProjectDirs;
use std::path::PathBuf;
use tracing::debug;

pub const DATA_DIR_ENV: &str = "HARDI_DATA";

pub struct HardiContext {
    pub repo: Repository,
    pub config: HardiConfig,
    pub data_dir: PathBuf,
}

pub fn resolve_data_dir(data_override: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = data_override {
        return Ok(path);
    }
    if let Some(path) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    ProjectDirs::from("com", "hardi", "hardi")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| HardiError::StoreOpen("could not determine a data directory".to_string()))
}

pub fn load_config(data_dir: &std::path::Path) -> HardiConfig {
    Clapfig::builder()
        .app_name("hardi")
        .file_name(CONFIG_FILE_NAME)
        .search_paths(vec![SearchPath::Path(data_dir.to_path_buf())])
        .search_mode(SearchMode::Merge)
        .load()
        .unwrap_or_default()
}

/// Resolve the data directory, load configuration and open the repository.
///
/// Must be called from inside a Tokio runtime: the repository starts its save
/// worker immediately. Stored data is read lazily on the first operation.
pub fn initialize(data_override: Option<PathBuf>) -> Result<HardiContext> {
    let data_dir = resolve_data_dir(data_override)?;
    let config = load_config(&data_dir);
    let backend =
        SqliteBackend::new(&data_dir, config.db_file()).with_busy_timeout(config.busy_timeout());
    debug!(
        data_dir = %data_dir.display(),
        db = %backend.db_path().display(),
        "opening repository"
    );
    let repo = Repository::open(backend, config.repository_settings());

    Ok(HardiContext {
        repo,
        config,
        data_dir,
    })
}
