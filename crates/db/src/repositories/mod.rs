//! Repository abstractions for data access.
//!
//! Repositories read through a shared [`StoreHandle`] and hand typed records
//! to the pure services in `obrafin-core`; they own the I/O around those
//! services: paged reads, timeouts, per-order locking and logging.

pub mod budget;
pub mod dashboard;
pub mod payment;
pub mod reference;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use obrafin_shared::config::DatastoreConfig;
use serde::de::DeserializeOwned;

use crate::pager;
use crate::store::{self, Datastore, SelectQuery, StoreError};

pub use budget::{BudgetRepoError, BudgetRepository};
pub use dashboard::DashboardRepository;
pub use payment::{
    AbonoReceipt, BatchClearReport, PaymentRepoError, PaymentRepository, RefusedClear,
};
pub use reference::ReferenceRepository;

/// Datastore plus the paging and timeout settings every repository uses.
#[derive(Clone)]
pub struct StoreHandle {
    store: Arc<dyn Datastore>,
    page_size: u32,
    timeout: Duration,
}

impl StoreHandle {
    /// Creates a handle configured from the `datastore` section.
    #[must_use]
    pub fn new(store: Arc<dyn Datastore>, config: &DatastoreConfig) -> Self {
        Self::with_settings(store, config.page_size, Duration::from_secs(config.timeout_secs))
    }

    /// Creates a handle with explicit settings.
    #[must_use]
    pub const fn with_settings(
        store: Arc<dyn Datastore>,
        page_size: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            page_size,
            timeout,
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &dyn Datastore {
        self.store.as_ref()
    }

    /// Reads every row of `query`, page by page.
    pub async fn fetch_all<T: DeserializeOwned>(
        &self,
        query: &SelectQuery,
    ) -> Result<Vec<T>, StoreError> {
        pager::fetch_all(self.store(), query, self.page_size).await
    }

    /// Runs a group of calls under the configured timeout.
    pub async fn within<T, E, F>(&self, calls: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<StoreError>,
    {
        store::within(self.timeout, calls).await
    }
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("page_size", &self.page_size)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
