use crate::repository::{Repository, RepositorySettings};
use crate::store::sqlite_backend::SqliteBackend;
use crate::store::DEFAULT_DB_FILE;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

/// Short enough to keep tests fast, long enough to coalesce a burst.
pub const TEST_DEBOUNCE: Duration = Duration::from_millis(40);

pub struct TestEnv {
    // Kept so the directory lives as long as the test.
    pub _temp_dir: TempDir,
    pub root: PathBuf,
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        Self {
            _temp_dir: temp_dir,
            root,
        }
    }

    pub fn backend(&self) -> SqliteBackend {
        SqliteBackend::new(&self.root, DEFAULT_DB_FILE)
    }

    pub fn settings() -> RepositorySettings {
        RepositorySettings {
            debounce: TEST_DEBOUNCE,
            ..Default::default()
        }
    }

    /// A fresh repository over this directory's database.
    pub fn open(&self) -> Repository {
        Repository::open(self.backend(), Self::settings())
    }
}
