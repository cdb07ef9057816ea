//! Reference data: projects, budget items, suppliers and workers.
//!
//! Reads go through the store like any other; when the store is a
//! `CachingStore` they are served from the reference cache.

use obrafin_core::normalize::ItemCatalog;
use obrafin_core::records::{BudgetItem, Project, Supplier, Worker};

use super::StoreHandle;
use crate::store::{SelectQuery, StoreError};
use crate::tables;

/// Reference data repository.
#[derive(Debug, Clone)]
pub struct ReferenceRepository {
    handle: StoreHandle,
}

impl ReferenceRepository {
    /// Creates a new reference repository.
    #[must_use]
    pub const fn new(handle: StoreHandle) -> Self {
        Self { handle }
    }

    /// Every project, active or not.
    pub async fn projects(&self) -> Result<Vec<Project>, StoreError> {
        self.handle
            .fetch_all(&SelectQuery::table(tables::PROJECTS).order("id", false))
            .await
    }

    /// Every budget item.
    pub async fn items(&self) -> Result<Vec<BudgetItem>, StoreError> {
        self.handle
            .fetch_all(&SelectQuery::table(tables::ITEMS).order("id", false))
            .await
    }

    /// Item lookup built from [`Self::items`].
    pub async fn catalog(&self) -> Result<ItemCatalog, StoreError> {
        Ok(ItemCatalog::new(&self.items().await?))
    }

    /// Every supplier.
    pub async fn suppliers(&self) -> Result<Vec<Supplier>, StoreError> {
        self.handle
            .fetch_all(&SelectQuery::table(tables::SUPPLIERS).order("id", false))
            .await
    }

    /// Active workers.
    pub async fn workers(&self) -> Result<Vec<Worker>, StoreError> {
        let workers: Vec<Worker> = self
            .handle
            .fetch_all(
                &SelectQuery::table(tables::WORKERS)
                    .order("nombre", false)
                    .order("id", false),
            )
            .await?;
        Ok(workers.into_iter().filter(|w| w.active).collect())
    }
}
