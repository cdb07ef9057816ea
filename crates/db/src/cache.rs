//! Reference data caching using Moka.
//!
//! Projects, budget items, suppliers and workers change rarely and are read
//! on every matrix and dashboard request. Their query results are cached
//! process-wide; payment tables always go to the store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::sync::Cache;
use obrafin_shared::config::CacheConfig;

use crate::store::{Datastore, Filter, Record, Row, SelectQuery, StoreError};
use crate::tables;

/// Default cache capacity (number of entries).
const DEFAULT_CACHE_CAPACITY: u64 = 256;

/// Default time-to-live for cache entries (10 minutes).
const DEFAULT_TTL_SECS: u64 = 600;

/// Cache of reference query results, keyed by [`SelectQuery::cache_key`].
#[derive(Clone)]
pub struct QueryCache {
    rows: Cache<String, Arc<Vec<Row>>>,
    counts: Cache<String, u64>,
}

impl QueryCache {
    /// Creates a cache with default settings: 256 entries, 10 minute TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DEFAULT_CACHE_CAPACITY, DEFAULT_TTL_SECS)
    }

    /// Creates a cache with custom capacity and TTL.
    #[must_use]
    pub fn with_config(max_capacity: u64, ttl_secs: u64) -> Self {
        let ttl = Duration::from_secs(ttl_secs);
        Self {
            rows: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
            counts: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Creates a cache from the `cache` configuration section.
    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::with_config(config.max_capacity, config.ttl_secs)
    }

    /// Whether results of `query` may be cached.
    #[must_use]
    pub fn is_cacheable(query: &SelectQuery) -> bool {
        tables::is_reference(query.table_name())
    }

    /// Cached rows of `query`.
    #[must_use]
    pub fn rows(&self, query: &SelectQuery) -> Option<Arc<Vec<Row>>> {
        if !Self::is_cacheable(query) {
            return None;
        }
        self.rows.get(&query.cache_key())
    }

    /// Caches the rows of `query`; ignored for non-reference tables.
    pub fn store_rows(&self, query: &SelectQuery, rows: Arc<Vec<Row>>) {
        if Self::is_cacheable(query) {
            self.rows.insert(query.cache_key(), rows);
        }
    }

    /// Cached row count of `query`.
    #[must_use]
    pub fn count(&self, query: &SelectQuery) -> Option<u64> {
        if !Self::is_cacheable(query) {
            return None;
        }
        self.counts.get(&query.unbounded().cache_key())
    }

    /// Caches the row count of `query`; ignored for non-reference tables.
    pub fn store_count(&self, query: &SelectQuery, count: u64) {
        if Self::is_cacheable(query) {
            self.counts.insert(query.unbounded().cache_key(), count);
        }
    }

    /// Drops every entry read from `table`.
    pub fn invalidate_table(&self, table: &str) {
        let prefix = format!("{table}|");
        let stale: Vec<Arc<String>> = self
            .rows
            .iter()
            .map(|(key, _)| key)
            .chain(self.counts.iter().map(|(key, _)| key))
            .filter(|key| key.starts_with(&prefix))
            .collect();
        for key in stale {
            self.rows.invalidate(key.as_str());
            self.counts.invalidate(key.as_str());
        }
    }

    /// Invalidates all cached entries.
    pub fn invalidate_all(&self) {
        self.rows.invalidate_all();
        self.counts.invalidate_all();
    }

    /// Returns the number of cached row sets.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.rows.entry_count()
    }

    /// Runs cache maintenance tasks.
    pub fn run_pending_tasks(&self) {
        self.rows.run_pending_tasks();
        self.counts.run_pending_tasks();
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("entry_count", &self.rows.entry_count())
            .finish_non_exhaustive()
    }
}

/// Datastore decorator serving reference reads from a [`QueryCache`].
#[derive(Debug)]
pub struct CachingStore<S> {
    inner: S,
    cache: Arc<QueryCache>,
    invalidate_on_write: bool,
}

impl<S: Datastore> CachingStore<S> {
    /// Wraps `inner`.
    #[must_use]
    pub const fn new(inner: S, cache: Arc<QueryCache>, invalidate_on_write: bool) -> Self {
        Self {
            inner,
            cache,
            invalidate_on_write,
        }
    }

    /// The shared cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// The wrapped store.
    #[must_use]
    pub const fn inner(&self) -> &S {
        &self.inner
    }

    fn written(&self, table: &str) {
        if self.invalidate_on_write && tables::is_reference(table) {
            tracing::debug!(table, "Invalidating cached reference data");
            self.cache.invalidate_table(table);
        }
    }
}

#[async_trait]
impl<S: Datastore> Datastore for CachingStore<S> {
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Row>, StoreError> {
        if let Some(rows) = self.cache.rows(query) {
            tracing::debug!(table = query.table_name(), "Reference cache hit");
            return Ok(rows.as_ref().clone());
        }
        let rows = self.inner.select(query).await?;
        self.cache.store_rows(query, Arc::new(rows.clone()));
        Ok(rows)
    }

    async fn count(&self, query: &SelectQuery) -> Result<u64, StoreError> {
        if let Some(count) = self.cache.count(query) {
            return Ok(count);
        }
        let count = self.inner.count(query).await?;
        self.cache.store_count(query, count);
        Ok(count)
    }

    async fn insert(&self, table: &str, records: Vec<Record>) -> Result<Vec<Row>, StoreError> {
        let rows = self.inner.insert(table, records).await?;
        self.written(table);
        Ok(rows)
    }

    async fn update(
        &self,
        table: &str,
        patch: Record,
        filters: &[Filter],
    ) -> Result<u64, StoreError> {
        let touched = self.inner.update(table, patch, filters).await?;
        self.written(table);
        Ok(touched)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64, StoreError> {
        let removed = self.inner.delete(table, filters).await?;
        self.written(table);
        Ok(removed)
    }

    async fn upsert(
        &self,
        table: &str,
        records: Vec<Record>,
        conflict: &[&str],
    ) -> Result<u64, StoreError> {
        let written = self.inner.upsert(table, records, conflict).await?;
        self.written(table);
        Ok(written)
    }
}
