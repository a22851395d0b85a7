//! Entry point tying settings, login resolution, connections and
//! searches together.

use serde_json::Value;

use crate::database::{StoreError, Upsert, UserRepository};
use crate::error::DirectoryError;
use crate::identity::Principal;
use crate::ldap::{
    AccountFilter, Connector, DirectoryConnection, SearchRequest, UserSearch,
};
use crate::settings::{Credentials, DirectorySettings};
use crate::user::{DirectoryUserRecord, USER_ATTRIBUTES};

/// Errors raised while synchronizing users.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error("cannot store synchronized user: {0}")]
    Store(#[from] StoreError),
}

/// Outcome of [`Directory::sync_users`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SyncReport {
    /// Entries returned by the directory.
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    /// Entries without any account name, plus unchanged records.
    pub skipped: usize,
}

/// Directory access over a [`Connector`].
///
/// Settings are passed to every call, so one instance serves any number
/// of domains. Each call opens its own connection.
#[derive(Debug, Clone, Default)]
pub struct Directory<C> {
    connector: C,
}

impl<C: Connector> Directory<C> {
    /// Create a new [`Directory`].
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Open an authenticated connection. `login` overrides the service
    /// account stored in `settings`.
    pub async fn open(
        &self,
        settings: &DirectorySettings,
        login: Option<&Credentials>,
    ) -> crate::Result<DirectoryConnection> {
        DirectoryConnection::open(&self.connector, settings, login).await
    }

    /// Check a user's credentials with a bind, then release the
    /// connection.
    pub async fn authenticate(
        &self,
        settings: &DirectorySettings,
        username: &str,
        password: &str,
    ) -> crate::Result<Principal> {
        let login = Credentials::new(username, password);
        let connection = self.open(settings, Some(&login)).await?;
        let principal = connection.principal().clone();
        connection.close().await;

        Ok(principal)
    }

    /// Start a lazy paged search for persons.
    ///
    /// The search base is derived from the principal the connection is
    /// bound as: the domain of `login` when given, otherwise the domain
    /// of the service account stored in `settings`. An empty `attributes`
    /// list requests every attribute.
    pub async fn search_users(
        &self,
        settings: &DirectorySettings,
        login: Option<&Credentials>,
        accounts: &AccountFilter,
        attributes: &[String],
    ) -> crate::Result<UserSearch> {
        let connection = self.open(settings, login).await?;

        let base = match connection.search_base() {
            Ok(base) => base,
            Err(err) => {
                connection.close().await;
                return Err(err);
            },
        };

        let request = SearchRequest::new(base, accounts)
            .with_attributes(attributes.iter().cloned());
        Ok(UserSearch::new(connection, request))
    }

    /// Same as [`Directory::search_users`] with untyped account names.
    /// They are validated before any connection is attempted.
    pub async fn search_users_matching(
        &self,
        settings: &DirectorySettings,
        login: Option<&Credentials>,
        accounts: Option<&Value>,
        attributes: &[String],
    ) -> crate::Result<UserSearch> {
        let accounts = AccountFilter::from_value(accounts)?;
        self.search_users(settings, login, &accounts, attributes)
            .await
    }

    /// Copy persons into `users`, one page at a time.
    pub async fn sync_users(
        &self,
        settings: &DirectorySettings,
        login: Option<&Credentials>,
        accounts: &AccountFilter,
        users: &dyn UserRepository,
    ) -> Result<SyncReport, SyncError> {
        let attributes = USER_ATTRIBUTES.map(str::to_owned);
        let mut search = self
            .search_users(settings, login, accounts, &attributes)
            .await?;
        let mut report = SyncReport::default();

        while let Some(entry) = search.next().await? {
            report.fetched += 1;

            let Some(record) = DirectoryUserRecord::from_entry(&entry) else {
                tracing::debug!(dn = %entry.dn, "entry without account name");
                report.skipped += 1;
                continue;
            };

            match users.upsert(record).await {
                Ok(Upsert::Created) => report.created += 1,
                Ok(Upsert::Updated) => report.updated += 1,
                Ok(Upsert::Unchanged) => report.skipped += 1,
                Err(err) => {
                    search.close().await;
                    return Err(err.into());
                },
            }
        }

        tracing::info!(
            domain = %settings.domain,
            fetched = report.fetched,
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            "users synchronized"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::database::mem::MemoryUsers;
    use crate::error::ErrorKind;
    use crate::ldap::testing::MockDirectory;

    fn settings() -> DirectorySettings {
        DirectorySettings::new("dc01.corp.example.com")
            .with_credentials(r"corp.example.com\svc", "secret")
    }

    struct FailingUsers;

    #[async_trait]
    impl UserRepository for FailingUsers {
        async fn get(
            &self,
            _: &str,
        ) -> crate::database::Result<Option<DirectoryUserRecord>> {
            Ok(None)
        }

        async fn list(&self) -> crate::database::Result<Vec<DirectoryUserRecord>> {
            Ok(Vec::new())
        }

        async fn upsert(
            &self,
            _: DirectoryUserRecord,
        ) -> crate::database::Result<Upsert> {
            Err(StoreError::Backend("disk full".into()))
        }

        async fn delete(&self, _: &str) -> crate::database::Result<bool> {
            Ok(false)
        }
    }

    #[tokio::test]
    async fn test_authenticate() {
        let mock = MockDirectory::new(0).with_password("hunter2");
        let directory = Directory::new(mock.clone());

        let principal = directory
            .authenticate(&settings(), r"CORP\bob", "hunter2")
            .await
            .unwrap();
        assert_eq!(principal.as_str(), "bob@CORP");
        assert_eq!(mock.opens(), 1);
        assert_eq!(mock.closes(), 1);

        let err = directory
            .authenticate(&settings(), r"CORP\bob", "wrong")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
        assert_eq!(mock.opens(), 2);
        assert_eq!(mock.closes(), 2);
    }

    #[tokio::test]
    async fn test_search_base_follows_login() {
        let mock = MockDirectory::new(1);
        let directory = Directory::new(mock.clone());
        let login = Credentials::new(r"emea.example.org\alice", "secret");

        let search = directory
            .search_users(&settings(), Some(&login), &AccountFilter::All, &[])
            .await
            .unwrap();
        assert_eq!(search.request().base, "dc=emea,dc=example,dc=org");
        search.collect().await.unwrap();

        let search = directory
            .search_users(&settings(), None, &AccountFilter::All, &[])
            .await
            .unwrap();
        assert_eq!(search.request().base, "dc=corp,dc=example,dc=com");
        search.close().await;

        assert_eq!(
            mock.bases(),
            vec!["dc=emea,dc=example,dc=org".to_owned()]
        );
        assert_eq!(mock.closes(), 2);
    }

    #[tokio::test]
    async fn test_search_users_with_attributes() {
        let mock = MockDirectory::new(3);
        let directory = Directory::new(mock.clone());

        let entries = directory
            .search_users(
                &settings(),
                None,
                &AccountFilter::accounts(["user1"]),
                &["mail".to_owned()],
            )
            .await
            .unwrap()
            .collect()
            .await
            .unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(
            mock.filters(),
            vec!["(&(objectClass=person)(|(sAMAccountName=user1)))".to_owned()]
        );
        assert_eq!(mock.closes(), 1);
    }

    #[tokio::test]
    async fn test_search_users_matching_rejects_scalars() {
        let mock = MockDirectory::new(3);
        let directory = Directory::new(mock.clone());

        let err = directory
            .search_users_matching(&settings(), None, Some(&json!("bob")), &[])
            .await
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(mock.opens(), 0);

        let search = directory
            .search_users_matching(&settings(), None, Some(&json!(null)), &[])
            .await
            .unwrap();
        assert_eq!(search.request().filter, "(objectClass=person)");
        search.close().await;
        assert_eq!(mock.closes(), 1);
    }

    #[tokio::test]
    async fn test_sync_users() {
        let mock = MockDirectory::new(750);
        let directory = Directory::new(mock.clone());
        let users = MemoryUsers::default();

        let report = directory
            .sync_users(&settings(), None, &AccountFilter::All, &users)
            .await
            .unwrap();
        assert_eq!(
            report,
            SyncReport {
                fetched: 750,
                created: 750,
                updated: 0,
                skipped: 0,
            }
        );

        let user = users.get("user0").await.unwrap().unwrap();
        assert_eq!(user.organizational_unit.as_deref(), Some("Staff"));
        assert_eq!(user.account_control, Some(512));

        let report = directory
            .sync_users(&settings(), None, &AccountFilter::All, &users)
            .await
            .unwrap();
        assert_eq!(report.skipped, 750);
        assert_eq!(mock.opens(), 2);
        assert_eq!(mock.closes(), 2);
    }

    #[tokio::test]
    async fn test_sync_users_store_failure() {
        let mock = MockDirectory::new(10);
        let directory = Directory::new(mock.clone());

        let err = directory
            .sync_users(&settings(), None, &AccountFilter::All, &FailingUsers)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Store(_)));
        assert_eq!(mock.closes(), 1);
    }

    #[tokio::test]
    async fn test_sync_users_directory_failure() {
        let mock = MockDirectory::new(10).unreachable();
        let directory = Directory::new(mock);
        let users = MemoryUsers::default();

        let err = directory
            .sync_users(&settings(), None, &AccountFilter::All, &users)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::Directory(DirectoryError::Connectivity { .. })
        ));
        assert!(users.list().await.unwrap().is_empty());
    }
}
