//! Component C — Schema Cache.
//!
//! Caches the resolved, ordered column list for a `(descriptor, table)`
//! pair so repeat requests against the same table skip backend metadata
//! queries. Entries are installed atomically on a concurrent miss via
//! `moka`'s `try_get_with`, the same compute-if-absent primitive the
//! connection registry uses for context installation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::error::AppError;
use crate::model::SchemaMap;

pub struct SchemaCache {
    cache: Cache<String, Arc<SchemaMap>>,
}

impl SchemaCache {
    pub fn new(capacity: u64, ttl_secs: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();
        Self { cache }
    }

    /// Returns the cached schema for `descriptor_key:table`, loading it via
    /// `loader` on miss. Concurrent first-touches for the same key share a
    /// single introspection call.
    pub async fn get_or_load<F, Fut>(
        &self,
        descriptor_key: &str,
        table: &str,
        loader: F,
    ) -> Result<Arc<SchemaMap>, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<SchemaMap, AppError>>,
    {
        let key = format!("{descriptor_key}:{table}");
        self.cache
            .try_get_with(key, async move {
                tracing::debug!(table, "schema cache miss");
                loader().await.map(Arc::new)
            })
            .await
            .map_err(|e| (*e).clone())
    }

    /// Evicts every entry belonging to `descriptor_key` (called after
    /// `update_descriptor`/`delete_descriptor` so stale column lists don't
    /// survive a connection change).
    pub fn invalidate_descriptor(&self, descriptor_key: &str) {
        let prefix = format!("{descriptor_key}:");
        self.cache
            .invalidate_entries_if(move |key, _| key.starts_with(&prefix))
            .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ColumnHandle;
    use crate::value::CanonicalType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_schema() -> SchemaMap {
        SchemaMap::new(vec![ColumnHandle {
            name: "id".to_string(),
            sql_type: "int4".to_string(),
            data_class: CanonicalType::Integer,
        }])
    }

    #[tokio::test]
    async fn loads_once_and_reuses_cached_entry() {
        let cache = SchemaCache::new(1000, 600);
        let hits = AtomicUsize::new(0);

        let a = cache
            .get_or_load("desc1", "users", || async {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(sample_schema())
            })
            .await
            .unwrap();
        assert!(a.contains("id"));

        let b = cache
            .get_or_load("desc1", "users", || async {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(sample_schema())
            })
            .await
            .unwrap();
        assert!(b.contains("id"));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_tables_load_independently() {
        let cache = SchemaCache::new(1000, 600);
        cache
            .get_or_load("desc1", "users", || async { Ok(sample_schema()) })
            .await
            .unwrap();
        cache
            .get_or_load("desc1", "orders", || async { Ok(sample_schema()) })
            .await
            .unwrap();
        assert_eq!(cache.cache.entry_count(), 2);
    }

    #[tokio::test]
    async fn invalidate_descriptor_drops_only_its_entries() {
        let cache = SchemaCache::new(1000, 600);
        cache
            .get_or_load("desc1", "users", || async { Ok(sample_schema()) })
            .await
            .unwrap();
        cache
            .get_or_load("desc2", "users", || async { Ok(sample_schema()) })
            .await
            .unwrap();

        cache.invalidate_descriptor("desc1");
        cache.cache.run_pending_tasks().await;
        assert_eq!(cache.cache.entry_count(), 1);
    }
}
