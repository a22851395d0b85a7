//! In-memory stores.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use validator::Validate;

use crate::database::{Result, SettingsRepository, Upsert, UserRepository};
use crate::settings::DirectorySettings;
use crate::user::DirectoryUserRecord;

/// Settings kept in memory, ordered by domain.
#[derive(Debug, Default)]
pub struct MemorySettings {
    settings: RwLock<BTreeMap<String, DirectorySettings>>,
}

#[async_trait]
impl SettingsRepository for MemorySettings {
    async fn get(&self, domain: &str) -> Result<Option<DirectorySettings>> {
        Ok(self.settings.read().await.get(domain.trim()).cloned())
    }

    async fn list(&self) -> Result<Vec<DirectorySettings>> {
        Ok(self.settings.read().await.values().cloned().collect())
    }

    async fn save(&self, mut settings: DirectorySettings) -> Result<DirectorySettings> {
        settings.normalize();
        settings.validate()?;

        self.settings
            .write()
            .await
            .insert(settings.domain.clone(), settings.clone());

        tracing::debug!(domain = %settings.domain, "directory settings saved");
        Ok(settings)
    }

    async fn delete(&self, domain: &str) -> Result<bool> {
        Ok(self.settings.write().await.remove(domain.trim()).is_some())
    }
}

/// Users kept in memory, ordered by username.
#[derive(Debug, Default)]
pub struct MemoryUsers {
    users: RwLock<BTreeMap<String, DirectoryUserRecord>>,
}

#[async_trait]
impl UserRepository for MemoryUsers {
    async fn get(&self, username: &str) -> Result<Option<DirectoryUserRecord>> {
        Ok(self.users.read().await.get(username).cloned())
    }

    async fn list(&self) -> Result<Vec<DirectoryUserRecord>> {
        Ok(self.users.read().await.values().cloned().collect())
    }

    async fn upsert(&self, record: DirectoryUserRecord) -> Result<Upsert> {
        let mut users = self.users.write().await;

        let outcome = match users.get(&record.username) {
            None => Upsert::Created,
            Some(current) if *current == record => return Ok(Upsert::Unchanged),
            Some(_) => Upsert::Updated,
        };
        users.insert(record.username.clone(), record);

        Ok(outcome)
    }

    async fn delete(&self, username: &str) -> Result<bool> {
        Ok(self.users.write().await.remove(username).is_some())
    }
}
