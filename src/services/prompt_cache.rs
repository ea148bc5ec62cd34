use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};

use lru::LruCache;
use tracing::warn;

/// Bounded in-memory cache of enhanced prompts with strict LRU eviction.
///
/// `get` and `set` promote the entry to most recently used. `has` only peeks.
pub struct PromptCache {
    entries: Mutex<LruCache<String, String>>,
}

impl PromptCache {
    pub const DEFAULT_CAPACITY: usize = 50;

    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Cache key for a description and optional animation details.
    #[must_use]
    pub fn key(description: &str, details: &str) -> String {
        format!("{description}|{details}")
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.lock("get").get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.lock("set").put(key.into(), value.into());
    }

    pub fn has(&self, key: &str) -> bool {
        self.lock("has").contains(key)
    }

    pub fn clear(&self) {
        self.lock("clear").clear();
    }

    pub fn len(&self) -> usize {
        self.lock("len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock("capacity").cap().get()
    }

    fn lock(&self, op: &'static str) -> MutexGuard<'_, LruCache<String, String>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(op, "Recovered from poisoned prompt cache lock");
                poisoned.into_inner()
            }
        }
    }
}

impl Default for PromptCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
