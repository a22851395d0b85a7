//! `ldap3` implementation of the transport.

use std::time::Duration;

use async_trait::async_trait;
use ldap3::controls::{Control, ControlType, PagedResults, RawControl};
use ldap3::{
    Ldap, LdapConnAsync, LdapConnSettings, LdapError, LdapResult, ResultEntry,
    Scope, SearchEntry, SearchResult, parse_refs,
};

use crate::error::{DirectoryError, Result};
use crate::ldap::{
    ConnectionOptions, Connector, DirectoryEntry, Endpoint, Page, SearchItem,
    SearchRequest, ServerInfo, Session,
};

/// `busy` and `unavailable` result codes.
const UNAVAILABLE_CODES: [u32; 2] = [51, 52];

const ROOT_DSE_ATTRIBUTES: [&str; 5] = [
    "dnsHostName",
    "defaultNamingContext",
    "namingContexts",
    "supportedLDAPVersion",
    "supportedControl",
];

/// Connector opening `ldap3` connections.
#[derive(Debug, Clone, Default)]
pub struct Ldap3Connector {
    options: ConnectionOptions,
}

impl Ldap3Connector {
    /// Create a new [`Ldap3Connector`].
    pub fn new(options: ConnectionOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Connector for Ldap3Connector {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Session>> {
        let url = endpoint.url();
        let settings =
            LdapConnSettings::new().set_conn_timeout(self.options.connect_timeout);

        tracing::debug!(%url, "connecting to directory server");

        let (conn, ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|err| DirectoryError::connectivity(&url, err))?;
        ldap3::drive!(conn);

        Ok(Box::new(Ldap3Session {
            ldap,
            url,
            timeout: self.options.operation_timeout,
        }))
    }
}

struct Ldap3Session {
    ldap: Ldap,
    url: String,
    timeout: Option<Duration>,
}

impl Ldap3Session {
    /// Handle for the next operation, with its timeout applied.
    fn ldap(&mut self) -> &mut Ldap {
        if let Some(timeout) = self.timeout {
            self.ldap.with_timeout(timeout);
        }
        &mut self.ldap
    }

    fn transport_error(&self, err: LdapError) -> DirectoryError {
        DirectoryError::connectivity(&self.url, err)
    }
}

#[async_trait]
impl Session for Ldap3Session {
    async fn bind(&mut self, principal: &str, password: &str) -> Result<()> {
        let result = self
            .ldap()
            .simple_bind(principal, password)
            .await
            .map_err(|err| self.transport_error(err))?;

        bind_outcome(&result)
    }

    async fn server_info(&mut self) -> Result<ServerInfo> {
        let (entries, _) = self
            .ldap()
            .search("", Scope::Base, "(objectClass=*)", ROOT_DSE_ATTRIBUTES.to_vec())
            .await
            .and_then(SearchResult::success)
            .map_err(|err| self.transport_error(err))?;

        let Some(entry) = entries.into_iter().next() else {
            return Ok(ServerInfo::default());
        };
        let entry = DirectoryEntry::from(SearchEntry::construct(entry));

        Ok(ServerInfo {
            dns_host_name: entry.first("dnsHostName").map(str::to_owned),
            default_naming_context: entry
                .first("defaultNamingContext")
                .map(str::to_owned),
            naming_contexts: entry.values("namingContexts").to_vec(),
            supported_ldap_version: entry.values("supportedLDAPVersion").to_vec(),
            supported_controls: entry.values("supportedControl").to_vec(),
        })
    }

    async fn search_page(
        &mut self,
        request: &SearchRequest,
        cookie: &[u8],
    ) -> Result<Page> {
        let control = PagedResults {
            size: request.page_size,
            cookie: cookie.to_vec(),
        };

        let SearchResult(entries, result) = self
            .ldap()
            .with_controls(vec![RawControl::from(control)])
            .search(
                &request.base,
                Scope::Subtree,
                &request.filter,
                request.attributes.clone(),
            )
            .await
            .map_err(|err| self.transport_error(err))?;

        search_outcome(&result, &request.base)?;
        let cookie = page_cookie(&result);

        let items = entries
            .into_iter()
            .filter(|entry| !entry.is_intermediate())
            .map(into_item)
            .collect();

        Ok(Page { items, cookie })
    }

    async fn unbind(&mut self) -> Result<()> {
        self.ldap
            .unbind()
            .await
            .map_err(|err| self.transport_error(err))
    }
}

/// Map the result of a simple bind.
fn bind_outcome(result: &LdapResult) -> Result<()> {
    match result.rc {
        0 => Ok(()),
        rc if UNAVAILABLE_CODES.contains(&rc) => {
            Err(DirectoryError::DirectoryUnavailable(format!(
                "bind refused with code {rc}: {}",
                result.text
            )))
        },
        rc => Err(DirectoryError::authentication(format!(
            "bind rejected with code {rc}: {}",
            result.text
        ))),
    }
}

/// Map the result of one search page.
fn search_outcome(result: &LdapResult, base: &str) -> Result<()> {
    if result.rc != 0 {
        return Err(DirectoryError::DirectoryUnavailable(format!(
            "search under {base} failed with code {}: {}",
            result.rc, result.text
        )));
    }
    Ok(())
}

/// Cookie of the paged results response control. Empty when the server
/// has no more pages or sent no such control.
fn page_cookie(result: &LdapResult) -> Vec<u8> {
    result
        .ctrls
        .iter()
        .find_map(|ctrl| match ctrl {
            Control(Some(ControlType::PagedResults), raw) => {
                Some(raw.parse::<PagedResults>().cookie)
            },
            _ => None,
        })
        .unwrap_or_default()
}

fn into_item(entry: ResultEntry) -> SearchItem {
    if entry.is_ref() {
        SearchItem::Reference(parse_refs(entry.0))
    } else {
        SearchItem::Entry(SearchEntry::construct(entry).into())
    }
}
