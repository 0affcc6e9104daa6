//! # Configuration
//!
//! Hardi configuration is managed by [`clapfig`], which handles layered loading
//! from a TOML file, environment variables, and programmatic overrides.
//!
//! ## Resolution
//!
//! 1. **Environment variables**: `HARDI__DEBOUNCE_MS`, `HARDI__DB_FILE`, etc.
//! 2. **Data-directory config**: `<data_dir>/hardi.toml`.
//! 3. **Compiled defaults**: built-in fallbacks via `#[config(default = ...)]`.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `debounce_ms` | `500` | Quiet period after the last change before it is saved |
//! | `transaction_timeout_ms` | `5000` | Limit for a single store transaction |
//! | `db_file` | `hardi_store.db` | Database file inside the data directory |

use crate::repository::RepositorySettings;
use crate::store::DEFAULT_DB_FILE;
use confique::Config;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "hardi.toml";

/// Configuration for hardi, stored in `hardi.toml`.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HardiConfig {
    /// Milliseconds to wait after the last change before saving.
    #[config(default = 500)]
    pub debounce_ms: u64,

    /// Milliseconds a single store transaction may take before it is aborted.
    #[config(default = 5000)]
    pub transaction_timeout_ms: u64,

    /// Database file name, relative to the data directory.
    #[config(default = "hardi_store.db")]
    pub db_file: String,
}

impl Default for HardiConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            transaction_timeout_ms: 5000,
            db_file: DEFAULT_DB_FILE.to_string(),
        }
    }
}

impl HardiConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Never zero: a zero timeout would fail every transaction.
    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.transaction_timeout_ms.max(1))
    }

    /// How long SQLite waits on a locked database: half the transaction
    /// timeout, so a lock wait always ends before the deadline does.
    pub fn busy_timeout(&self) -> Duration {
        self.transaction_timeout() / 2
    }

    /// The configured file name, or the default when blank.
    pub fn db_file(&self) -> &str {
        let name = self.db_file.trim();
        if name.is_empty() {
            DEFAULT_DB_FILE
        } else {
            name
        }
    }

    pub fn repository_settings(&self) -> RepositorySettings {
        RepositorySettings {
            debounce: self.debounce(),
            transaction_timeout: self.transaction_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HardiConfig::default();
        assert_eq!(config.debounce(), Duration::from_millis(500));
        assert_eq!(config.transaction_timeout(), Duration::from_secs(5));
        assert_eq!(config.db_file(), "hardi_store.db");
        assert_eq!(config.repository_settings(), RepositorySettings::default());
    }

    #[test]
    fn test_blank_db_file_uses_default() {
        let config = HardiConfig {
            db_file: "  ".to_string(),
            ..Default::default()
        };
        assert_eq!(config.db_file(), DEFAULT_DB_FILE);
    }

    #[test]
    fn test_zero_timeout_is_clamped() {
        let config = HardiConfig {
            transaction_timeout_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.transaction_timeout(), Duration::from_millis(1));
    }

    #[test]
    fn test_busy_timeout_stays_below_transaction_timeout() {
        let config = HardiConfig {
            transaction_timeout_ms: 300,
            ..Default::default()
        };
        assert_eq!(config.busy_timeout(), Duration::from_millis(150));
        let defaults = HardiConfig::default();
        assert!(defaults.busy_timeout() < defaults.transaction_timeout());
    }

    #[test]
    fn test_parses_from_toml() {
        let config: HardiConfig = toml::from_str(
            r#"
            debounce_ms = 50
            transaction_timeout_ms = 250
            db_file = "shop.db"
            "#,
        )
        .unwrap();
        assert_eq!(config.debounce(), Duration::from_millis(50));
        assert_eq!(config.transaction_timeout(), Duration::from_millis(250));
        assert_eq!(config.db_file(), "shop.db");
    }
}
