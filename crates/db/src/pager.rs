//! Paged reads.
//!
//! Hosted Postgres APIs cap the rows returned per request, so every source
//! query is read page by page with `range(offset, limit)` and checked
//! against the store's own row count. The cap may sit below the configured
//! page size, so a short page never ends the read: the offset moves by the
//! rows actually received.

use obrafin_shared::types::PageRequest;
use serde::de::DeserializeOwned;

use crate::store::{Datastore, Row, SelectQuery, StoreError, decode_rows};

/// Restartable sequence of row batches over an ordered query.
pub struct Pager<'a> {
    store: &'a dyn Datastore,
    query: SelectQuery,
    page: PageRequest,
    expected: Option<u64>,
    fetched: u64,
    done: bool,
}

impl<'a> Pager<'a> {
    /// Creates a pager asking for `page_size` rows per batch.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidQuery` if `query` has no sort key, since
    /// offsets over an unordered result may skip or repeat rows.
    pub fn new(
        store: &'a dyn Datastore,
        query: &SelectQuery,
        page_size: u32,
    ) -> Result<Self, StoreError> {
        if !query.is_ordered() {
            return Err(StoreError::InvalidQuery(format!(
                "paged read of {} needs an order",
                query.table_name()
            )));
        }
        Ok(Self {
            store,
            query: query.unbounded(),
            page: PageRequest::first(page_size),
            expected: None,
            fetched: 0,
            done: false,
        })
    }

    /// Stops once `expected` rows were read, saving the final empty page.
    #[must_use]
    pub const fn expecting(mut self, expected: u64) -> Self {
        self.expected = Some(expected);
        self
    }

    /// Next batch, or `None` after an empty page or the expected row count.
    pub async fn next_page(&mut self) -> Result<Option<Vec<Row>>, StoreError> {
        if self.done || self.expected.is_some_and(|n| self.fetched >= n) {
            return Ok(None);
        }

        let query = self.query.clone().range(self.fetched, self.page.limit());
        let rows = self.store.select(&query).await?;
        if rows.is_empty() {
            self.done = true;
            return Ok(None);
        }
        self.fetched += u64::try_from(rows.len()).unwrap_or(u64::MAX);
        Ok(Some(rows))
    }

    /// Starts over from the first row.
    pub fn restart(&mut self) {
        self.fetched = 0;
        self.done = false;
    }

    /// Rows returned so far.
    #[must_use]
    pub const fn fetched(&self) -> u64 {
        self.fetched
    }
}

/// Reads every row of `query` and decodes it into `T`.
///
/// # Errors
///
/// Returns the first failing page's error; no partial result is returned.
/// Returns `StoreError::Incomplete` if the pages run out before the rows
/// the store counts.
pub async fn fetch_all<T: DeserializeOwned>(
    store: &dyn Datastore,
    query: &SelectQuery,
    page_size: u32,
) -> Result<Vec<T>, StoreError> {
    let expected = store.count(query).await?;
    let mut pager = Pager::new(store, query, page_size)?.expecting(expected);

    let mut rows = Vec::new();
    while let Some(batch) = pager.next_page().await? {
        rows.extend(batch);
    }

    let fetched = pager.fetched();
    if fetched < expected {
        return Err(StoreError::Incomplete {
            table: query.table_name().to_string(),
            expected,
            fetched,
        });
    }
    if fetched > expected {
        tracing::warn!(
            table = query.table_name(),
            expected,
            fetched,
            "Table grew while it was being read"
        );
    }

    decode_rows(query.table_name(), rows)
}
