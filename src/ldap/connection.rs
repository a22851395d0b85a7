//! Authenticated connection to a directory server.

use crate::error::{DirectoryError, Result};
use crate::identity::{Principal, derive_search_base, resolve_principal};
use crate::ldap::{Connector, Endpoint, Page, SearchRequest, ServerInfo, Session};
use crate::settings::{Credentials, DirectorySettings};

/// Bound session, exclusively owned by the call that opened it.
///
/// The session is released by [`DirectoryConnection::close`]. A
/// connection dropped while still open is released on the current Tokio
/// runtime instead.
pub struct DirectoryConnection {
    session: Option<Box<dyn Session>>,
    endpoint: Endpoint,
    principal: Principal,
    server_info: Option<ServerInfo>,
}

impl DirectoryConnection {
    /// Connect to the server described by `settings` and bind.
    ///
    /// `login` overrides the service account stored in `settings`. A
    /// login that cannot be resolved to a principal, or an empty
    /// password, fails with [`DirectoryError::Authentication`]: no
    /// anonymous bind is ever attempted.
    pub async fn open(
        connector: &dyn Connector,
        settings: &DirectorySettings,
        login: Option<&Credentials>,
    ) -> Result<Self> {
        let credentials = login
            .filter(|c| !c.username().is_empty())
            .cloned()
            .or_else(|| settings.credentials())
            .ok_or_else(|| {
                DirectoryError::authentication(format!(
                    "no login given and no service account stored for {settings}"
                ))
            })?;

        let principal = resolve_principal(Some(credentials.username()))
            .ok_or_else(|| {
                DirectoryError::authentication(format!(
                    "login {:?} must be user@domain or DOMAIN\\user",
                    credentials.username()
                ))
            })?;

        if credentials.password().is_empty() {
            return Err(DirectoryError::authentication(format!(
                "empty password for {principal}"
            )));
        }

        let endpoint = Endpoint::from(settings);
        let mut session = connector.connect(&endpoint).await?;

        if let Err(err) = session.bind(principal.as_str(), credentials.password()).await {
            metrics::counter!("directory_binds_total", "outcome" => "failure")
                .increment(1);
            tracing::info!(url = %endpoint.url(), %principal, error = %err, "bind failed");

            if let Err(err) = session.unbind().await {
                tracing::debug!(error = %err, "unbind after failed bind");
            }
            return Err(err);
        }

        metrics::counter!("directory_binds_total", "outcome" => "success")
            .increment(1);
        tracing::info!(url = %endpoint.url(), %principal, "directory bound");

        let server_info = match session.server_info().await {
            Ok(info) => {
                if !info.supports_paging() {
                    tracing::warn!(
                        url = %endpoint.url(),
                        "server does not advertise paged results"
                    );
                }
                Some(info)
            },
            Err(err) => {
                tracing::debug!(error = %err, "root DSE is not readable");
                None
            },
        };

        Ok(Self {
            session: Some(session),
            endpoint,
            principal,
            server_info,
        })
    }

    /// Principal the connection is bound as.
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Root DSE read at bind time, when the server published it.
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// Search base derived from the bound principal, which is the login
    /// override when one was given to [`DirectoryConnection::open`].
    pub fn search_base(&self) -> Result<String> {
        derive_search_base(&self.principal)
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub(crate) async fn search_page(
        &mut self,
        request: &SearchRequest,
        cookie: &[u8],
    ) -> Result<Page> {
        let session = self.session.as_mut().ok_or_else(|| {
            DirectoryError::DirectoryUnavailable("connection is closed".into())
        })?;

        session.search_page(request, cookie).await
    }

    /// Unbind and release the session.
    pub async fn close(mut self) {
        self.release().await;
    }

    pub(crate) async fn release(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(err) = session.unbind().await {
                tracing::debug!(error = %err, "unbind failed, socket dropped");
            }

            metrics::counter!("directory_connections_released_total", "path" => "close")
                .increment(1);
            tracing::debug!(url = %self.endpoint.url(), "connection released");
        }
    }
}

impl Drop for DirectoryConnection {
    fn drop(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        metrics::counter!("directory_connections_released_total", "path" => "drop")
            .increment(1);
        tracing::warn!(url = %self.endpoint.url(), "connection dropped while open");

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = session.unbind().await {
                        tracing::debug!(error = %err, "deferred unbind failed");
                    }
                });
            },
            Err(_) => {
                tracing::warn!("no runtime available, socket closed without unbind")
            },
        }
    }
}
