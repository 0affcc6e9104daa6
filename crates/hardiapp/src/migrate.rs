//! Choosing the starting dataset on first access.
//!
//! Priority: the durable slot, then the legacy flat blob, then an empty dataset.
//! Whatever is chosen goes through [`AppData::decode`], which repairs missing
//! stores and sequences, skips unreadable records and re-derives debt status.
//!
//! A durable slot that could not be read in full is never simply overwritten:
//! [`Source::keeps_original`] tells the repository to have it backed up first.

use crate::error::Result;
use crate::model::AppData;
use crate::store::worker::Loaded;
use tracing::{error, warn};

/// Where the starting dataset came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// The durable slot written by an earlier run.
    Store,
    /// The durable slot, minus records that could not be read.
    Repaired,
    /// The pre-migration flat blob.
    Legacy,
    /// Nothing stored yet (or unreadable legacy data): an empty dataset.
    Defaults,
    /// The store or its slot could not be read; running on an empty dataset.
    Fallback,
}

impl Source {
    /// Whether the chosen dataset should be written back right away. A fallback
    /// is not, so an unreadable store is left as it was until the next change.
    pub fn should_persist(self) -> bool {
        !matches!(self, Source::Fallback)
    }

    /// Whether the durable slot must be backed up before its next overwrite.
    pub fn keeps_original(self) -> bool {
        matches!(self, Source::Repaired | Source::Fallback)
    }
}

pub fn resolve(loaded: Result<Loaded>) -> (AppData, Source) {
    let loaded = match loaded {
        Ok(loaded) => loaded,
        Err(err) => {
            error!(error = %err, "could not read store, starting empty");
            return (AppData::default(), Source::Fallback);
        }
    };

    if let Some(text) = loaded.primary {
        return match AppData::decode_str(&text) {
            Ok(decoded) if decoded.dropped == 0 => (decoded.data, Source::Store),
            Ok(decoded) => {
                warn!(
                    dropped = decoded.dropped,
                    "some stored records are unreadable and were skipped"
                );
                (decoded.data, Source::Repaired)
            }
            Err(err) => {
                error!(error = %err, "stored data is unreadable, starting empty");
                (AppData::default(), Source::Fallback)
            }
        };
    }

    if let Some(text) = loaded.legacy {
        match AppData::from_json(&text) {
            Ok(data) => return (data, Source::Legacy),
            Err(err) => warn!(error = %err, "ignoring malformed legacy data"),
        }
    }

    (AppData::default(), Source::Defaults)
}
