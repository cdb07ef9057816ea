//! Shared types, errors, and configuration for Obrafin.
//!
//! This crate provides common types used across all other crates:
//! - Paging requests for datastore range queries
//! - Application-wide error types
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::AppError;
