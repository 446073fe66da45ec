//! Local observation store
//!
//! Append-only SQLite table keyed by (deviceId, timestamp). Re-saving a
//! key is reported as [`SaveOutcome::AlreadyExists`], which is what makes
//! provider redelivery harmless.
//!
//! [`SaveOutcome::AlreadyExists`]: wxb_core::SaveOutcome::AlreadyExists

pub mod client;
pub mod queries;
pub mod schema;

pub use client::*;
pub use queries::*;
pub use schema::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Source table has no deviceId column; a device id override is required")]
    MissingDeviceId,
}

pub type StoreResult<T> = Result<T, StoreError>;
