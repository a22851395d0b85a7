//! Persistence ports for settings and synchronized users.
//!
//! Storage is an external concern: these traits only describe the CRUD
//! operations the crate needs, [`mem`] holds in-memory implementations.

pub mod mem;

use async_trait::async_trait;
use validator::ValidationErrors;

use crate::settings::DirectorySettings;
use crate::user::DirectoryUserRecord;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors returned by a store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("validation error occurred")]
    Validation(#[from] ValidationErrors),

    #[error("store backend failed")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Port for directory settings, keyed by domain.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get(&self, domain: &str) -> Result<Option<DirectorySettings>>;

    async fn list(&self) -> Result<Vec<DirectorySettings>>;

    /// Normalize, validate, then create or replace settings. Returns
    /// the stored value.
    async fn save(&self, settings: DirectorySettings) -> Result<DirectorySettings>;

    async fn delete(&self, domain: &str) -> Result<bool>;
}

/// Whether an upsert created or replaced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Created,
    Updated,
    Unchanged,
}

/// Port for synchronized users, keyed by username.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get(&self, username: &str) -> Result<Option<DirectoryUserRecord>>;

    async fn list(&self) -> Result<Vec<DirectoryUserRecord>>;

    async fn upsert(&self, record: DirectoryUserRecord) -> Result<Upsert>;

    async fn delete(&self, username: &str) -> Result<bool>;
}
