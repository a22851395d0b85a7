//! adsync authenticates users against, and synchronizes user records
//! from, LDAP directories such as Active Directory.
//!
//! ```no_run
//! use adsync::{AccountFilter, Directory, DirectorySettings, Ldap3Connector};
//!
//! # async fn run() -> adsync::Result<()> {
//! let settings = DirectorySettings::new("dc01.corp.example.com")
//!     .with_credentials(r"corp.example.com\svc", "secret");
//! let directory = Directory::new(Ldap3Connector::default());
//!
//! let mut search = directory
//!     .search_users(&settings, None, &AccountFilter::All, &[])
//!     .await?;
//! while let Some(entry) = search.next().await? {
//!     println!("{}", entry.dn);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod database;
pub mod directory;
pub mod error;
pub mod identity;
pub mod ldap;
pub mod settings;
pub mod telemetry;
pub mod user;

pub use directory::{Directory, SyncError, SyncReport};
pub use error::{DirectoryError, ErrorKind, Result};
pub use identity::{Principal, derive_search_base, resolve_principal};
pub use ldap::{
    AccountFilter, DirectoryConnection, DirectoryEntry, Ldap3Connector,
    UserSearch,
};
pub use settings::{Credentials, DirectorySettings};
pub use user::{DirectoryUserRecord, UserAccountControl};
