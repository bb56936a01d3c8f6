use crate::service::QueryResultData;
use lru::LruCache;
use pivot_protocol::JaqlQuery;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Mutex;

const QUERY_CACHE_CAPACITY: usize = 16;

/// Client-side result cache behind the `use_cache` flag.
///
/// Keyed by a digest of the canonical JAQL body with the per-submission
/// guid blanked out, so a resubmitted identical query hits regardless of
/// its fresh guid. Stores immutable snapshots; pagination always goes to
/// the live session, never the cache.
pub(crate) struct QueryCache {
    inner: Mutex<LruCache<String, QueryResultData>>,
}

impl QueryCache {
    pub(crate) fn new() -> Self {
        let capacity =
            NonZeroUsize::new(QUERY_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub(crate) fn get(&self, jaql: &JaqlQuery) -> Option<QueryResultData> {
        let key = cache_key(jaql);
        let mut cache = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.get(&key).cloned()
    }

    pub(crate) fn put(&self, jaql: &JaqlQuery, result: QueryResultData) {
        let key = cache_key(jaql);
        let mut cache = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        cache.put(key, result);
    }
}

fn cache_key(jaql: &JaqlQuery) -> String {
    let mut canonical = jaql.clone();
    canonical.query_guid = String::new();
    let body = serde_json::to_string(&canonical).unwrap_or_default();
    let digest = Sha256::digest(body.as_bytes());
    format!("{digest:x}")
}
