//! Clearable-cache capability.
//!
//! Repositories that hold per-session data implement [`Clearable`] and
//! register with the expiration monitor; expiration drains the registry so no
//! cache outlives the session it was filled for. This is an explicit
//! capability check, not runtime introspection: a cache either registers or
//! it does not.

use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// A cache that can be invalidated when the session ends.
pub trait Clearable: Send + Sync {
    /// Stable name used in logs.
    fn name(&self) -> &str;

    /// Drops all cached data. Must be safe to call when already empty.
    fn clear(&self);
}

#[derive(Default)]
pub struct CacheRegistry {
    entries: Mutex<Vec<Arc<dyn Clearable>>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, cache: Arc<dyn Clearable>) {
        debug!(cache = cache.name(), "Clearable cache registered");
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(cache);
    }

    /// Clears every registered cache. Registrations are kept; the same caches
    /// are cleared again on the next expiration.
    pub fn clear_all(&self) {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        for cache in entries.iter() {
            info!(cache = cache.name(), "Clearing cache on session end");
            cache.clear();
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().expect("lock").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingCache {
        clears: AtomicUsize,
    }

    impl Clearable for CountingCache {
        fn name(&self) -> &str {
            "counting"
        }

        fn clear(&self) {
            self.clears.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn clear_all_reaches_every_registration() {
        let registry = CacheRegistry::new();
        let a = Arc::new(CountingCache {
            clears: AtomicUsize::new(0),
        });
        let b = Arc::new(CountingCache {
            clears: AtomicUsize::new(0),
        });
        registry.register(a.clone());
        registry.register(b.clone());

        registry.clear_all();
        registry.clear_all();

        assert_eq!(registry.len(), 2);
        assert_eq!(a.clears.load(Ordering::SeqCst), 2);
        assert_eq!(b.clears.load(Ordering::SeqCst), 2);
    }
}
