//! LDAP support.
//!
//! [`Connector`] and [`Session`] are the only place where the wire
//! protocol is touched; [`Ldap3Connector`] implements them with `ldap3`.

mod connection;
mod entry;
mod search;
#[cfg(test)]
pub(crate) mod testing;
mod transport;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

pub use connection::DirectoryConnection;
pub use entry::{DirectoryEntry, SearchItem};
pub use search::{AccountFilter, PAGE_SIZE, SearchRequest, UserSearch};
pub use transport::Ldap3Connector;

use crate::error::Result;
use crate::settings::DirectorySettings;

/// OID of the simple paged results control (RFC 2696).
pub const PAGED_RESULTS_OID: &str = "1.2.840.113556.1.4.319";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Address of a directory server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
}

impl Endpoint {
    /// LDAP URL of this endpoint.
    pub fn url(&self) -> String {
        let scheme = if self.use_tls { "ldaps" } else { "ldap" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }
}

impl From<&DirectorySettings> for Endpoint {
    fn from(settings: &DirectorySettings) -> Self {
        Self {
            host: settings.domain.trim().to_owned(),
            port: settings.port,
            use_tls: settings.use_tls,
        }
    }
}

/// Transport timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Timeout of DNS resolution, TCP connect and TLS handshake.
    pub connect_timeout: Duration,
    /// Timeout of each bind or search round-trip.
    pub operation_timeout: Option<Duration>,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            operation_timeout: None,
        }
    }
}

/// One page returned by a paged search round-trip.
#[derive(Debug, Default)]
pub struct Page {
    pub items: Vec<SearchItem>,
    /// Empty once the server has no more pages.
    pub cookie: Vec<u8>,
}

/// Published capabilities read from the root DSE.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServerInfo {
    pub dns_host_name: Option<String>,
    pub default_naming_context: Option<String>,
    pub naming_contexts: Vec<String>,
    pub supported_ldap_version: Vec<String>,
    pub supported_controls: Vec<String>,
}

impl ServerInfo {
    /// Whether the server advertises the paged results control.
    pub fn supports_paging(&self) -> bool {
        self.supported_controls
            .iter()
            .any(|oid| oid == PAGED_RESULTS_OID)
    }
}

/// Opens raw sessions to a directory server.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a socket to `endpoint`. No bind is performed.
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Session>>;
}

/// Raw, exclusively owned session to a directory server.
#[async_trait]
pub trait Session: Send {
    /// Simple bind with a principal name and its password.
    async fn bind(&mut self, principal: &str, password: &str) -> Result<()>;

    /// Read the root DSE.
    async fn server_info(&mut self) -> Result<ServerInfo>;

    /// Issue one paged search round-trip, continuing from `cookie`.
    async fn search_page(
        &mut self,
        request: &SearchRequest,
        cookie: &[u8],
    ) -> Result<Page>;

    /// Release the session.
    async fn unbind(&mut self) -> Result<()>;
}
