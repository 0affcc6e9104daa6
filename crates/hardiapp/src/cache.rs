use crate::model::AppData;
use std::sync::{Arc, PoisonError, RwLock};

/// The in-memory dataset, shared between the repository and the save worker.
///
/// The dataset lives behind an `Arc` and is mutated copy-on-write: a snapshot
/// handed out by [`Cache::snapshot`] is never changed afterwards, because the
/// next mutation clones the data first if anyone still holds the old one. The
/// lock is only held for the synchronous body of a mutation.
#[derive(Clone, Default)]
pub(crate) struct Cache {
    inner: Arc<RwLock<Arc<AppData>>>,
}

impl Cache {
    pub fn snapshot(&self) -> Arc<AppData> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    pub fn replace(&self, data: AppData) -> Arc<AppData> {
        let fresh = Arc::new(data);
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::clone(&fresh);
        fresh
    }

    /// Run `f` with exclusive access. `f` decides whether to touch the data
    /// (via `Arc::make_mut`), so a no-op leaves the current instance in place.
    pub fn update<R>(&self, f: impl FnOnce(&mut Arc<AppData>) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}
