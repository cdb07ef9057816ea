//! Datastore layer for Obrafin.
//!
//! This crate provides:
//! - The [`Datastore`] contract with a Postgres (`SeaORM`) and an in-memory
//!   implementation
//! - Paged reads with a completeness check
//! - The reference data cache
//! - Repositories wrapping the `obrafin-core` services
//! - Database migrations

pub mod cache;
pub mod error;
pub mod memory;
pub mod migration;
pub mod pager;
pub mod repositories;
pub mod sea_store;
pub mod store;
pub mod tables;

pub use cache::{CachingStore, QueryCache};
pub use memory::MemoryStore;
pub use pager::{Pager, fetch_all};
pub use repositories::{
    BudgetRepository, DashboardRepository, PaymentRepository, ReferenceRepository, StoreHandle,
};
pub use sea_store::SeaStore;
pub use store::{Datastore, FieldValue, Filter, Record, Row, SelectQuery, StoreError};

use std::time::Duration;

use obrafin_shared::config::DatabaseConfig;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}

/// Establishes a connection pool sized from the `database` section.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect_pool(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);
    Database::connect(options).await
}
