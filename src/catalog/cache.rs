//! External key/value cache collaborator

use std::collections::HashMap;
use std::sync::Mutex;

/// Key/value cache store the schema catalog persists metadata into
///
/// Keys are scoped by category; this crate uses the
/// [`CACHE_CATEGORY`](super::CACHE_CATEGORY) category with keys
/// `<schema>..tables`, `<schema>.<table>` and `<schema>..refs`.
/// Reads and writes are not transactionally isolated: a racing reader may
/// see a slightly stale checksum, which self-heals on the next refresh.
pub trait CacheStore {
    fn get(&self, category: &str, key: &str) -> Option<Vec<u8>>;

    /// `expires` is a hint in seconds; stores without expiry support may
    /// ignore it
    fn put(&self, category: &str, key: &str, bytes: Vec<u8>, expires: Option<u64>);

    fn invalidate(&self, category: &str, key: &str);
}

/// Process-local cache store for embedding and tests; ignores expiry
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, category: &str, key: &str) -> Option<Vec<u8>> {
        self.entries
            .lock()
            .unwrap()
            .get(&(category.to_string(), key.to_string()))
            .cloned()
    }

    fn put(&self, category: &str, key: &str, bytes: Vec<u8>, _expires: Option<u64>) {
        self.entries
            .lock()
            .unwrap()
            .insert((category.to_string(), key.to_string()), bytes);
    }

    fn invalidate(&self, category: &str, key: &str) {
        self.entries
            .lock()
            .unwrap()
            .remove(&(category.to_string(), key.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_cache_roundtrip() {
        let cache = MemoryCache::new();
        cache.put("cat", "key", b"value".to_vec(), None);
        assert_eq!(cache.get("cat", "key"), Some(b"value".to_vec()));
        assert_eq!(cache.get("cat", "other"), None);

        cache.invalidate("cat", "key");
        assert_eq!(cache.get("cat", "key"), None);
    }
}
