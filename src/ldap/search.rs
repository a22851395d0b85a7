//! Paged person search.

use std::collections::VecDeque;

use ldap3::ldap_escape;
use serde_json::Value;

use crate::error::{DirectoryError, Result};
use crate::ldap::{DirectoryConnection, DirectoryEntry, Page, SearchItem};

/// Maximum number of entries requested per page.
pub const PAGE_SIZE: i32 = 500;

const PERSON_FILTER: &str = "(objectClass=person)";
const ALL_ATTRIBUTES: &str = "*";

/// Accounts a search is restricted to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AccountFilter {
    /// Every person below the search base.
    #[default]
    All,
    /// Persons whose `sAMAccountName` is listed.
    Accounts(Vec<String>),
}

impl AccountFilter {
    /// Restrict to `accounts`. An empty list matches every person.
    pub fn accounts<I, S>(accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let accounts: Vec<String> = accounts.into_iter().map(Into::into).collect();

        if accounts.is_empty() {
            Self::All
        } else {
            Self::Accounts(accounts)
        }
    }

    /// Build from an untyped value, e.g. read from configuration.
    ///
    /// Absent, `null` and `[]` match every person. A list holds account
    /// names, numbers are accepted and stringified. Anything else fails
    /// with [`DirectoryError::InvalidArgument`].
    pub fn from_value(value: Option<&Value>) -> Result<Self> {
        match value {
            None | Some(Value::Null) => Ok(Self::All),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(name) => Ok(name.clone()),
                    Value::Number(number) => Ok(number.to_string()),
                    other => Err(DirectoryError::InvalidArgument(format!(
                        "account name must be a string, got {other}"
                    ))),
                })
                .collect::<Result<Vec<_>>>()
                .map(Self::accounts),
            Some(other) => Err(DirectoryError::InvalidArgument(format!(
                "accounts must be a list of account names, got {other}"
            ))),
        }
    }

    /// LDAP filter string.
    pub fn to_filter(&self) -> String {
        match self {
            Self::All => PERSON_FILTER.to_owned(),
            Self::Accounts(accounts) => {
                let names: String = accounts
                    .iter()
                    .map(|name| format!("(sAMAccountName={})", ldap_escape(name.trim())))
                    .collect();

                format!("(&{PERSON_FILTER}(|{names}))")
            },
        }
    }
}

/// Subtree search sent to the server, page after page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub base: String,
    pub filter: String,
    pub attributes: Vec<String>,
    pub page_size: i32,
}

impl SearchRequest {
    /// Create a new [`SearchRequest`] returning every attribute.
    pub fn new(base: impl Into<String>, accounts: &AccountFilter) -> Self {
        Self {
            base: base.into(),
            filter: accounts.to_filter(),
            attributes: vec![ALL_ATTRIBUTES.to_owned()],
            page_size: PAGE_SIZE,
        }
    }

    /// Update requested attributes. No attribute means all of them.
    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = attributes.into_iter().map(Into::into).collect();

        if self.attributes.is_empty() {
            self.attributes.push(ALL_ATTRIBUTES.to_owned());
        }
        self
    }
}

/// One-shot lazy sequence of matching entries.
///
/// At most one page is buffered. The connection is released as soon as
/// the last page has been read, a page fails, or the search is closed.
/// Dropping an unfinished search releases it too.
pub struct UserSearch {
    connection: Option<DirectoryConnection>,
    request: SearchRequest,
    buffer: VecDeque<DirectoryEntry>,
    /// `None` once the server returned its last page.
    cookie: Option<Vec<u8>>,
    pages: usize,
    references: usize,
}

impl UserSearch {
    /// Start a search over `connection`, which the search now owns.
    pub fn new(connection: DirectoryConnection, request: SearchRequest) -> Self {
        tracing::debug!(
            base = %request.base,
            filter = %request.filter,
            "starting paged search"
        );

        Self {
            connection: Some(connection),
            request,
            buffer: VecDeque::new(),
            cookie: Some(Vec::new()),
            pages: 0,
            references: 0,
        }
    }

    pub fn request(&self) -> &SearchRequest {
        &self.request
    }

    /// Number of pages fetched so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    /// Number of continuation references dropped so far.
    pub fn references_skipped(&self) -> usize {
        self.references
    }

    /// Next matching entry, fetching a new page when needed.
    pub async fn next(&mut self) -> Result<Option<DirectoryEntry>> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                return Ok(Some(entry));
            }

            let Some(cookie) = self.cookie.take() else {
                self.finish().await;
                return Ok(None);
            };
            let Some(connection) = self.connection.as_mut() else {
                return Ok(None);
            };

            match connection.search_page(&self.request, &cookie).await {
                Ok(page) => self.absorb(page),
                Err(err) => {
                    tracing::warn!(
                        base = %self.request.base,
                        page = self.pages + 1,
                        error = %err,
                        "paged search failed"
                    );
                    self.finish().await;
                    return Err(err);
                },
            }
        }
    }

    /// Drain the remaining entries.
    pub async fn collect(mut self) -> Result<Vec<DirectoryEntry>> {
        let mut entries = Vec::new();
        while let Some(entry) = self.next().await? {
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Abandon the search and release its connection.
    pub async fn close(mut self) {
        self.finish().await;
    }

    fn absorb(&mut self, page: Page) {
        self.pages += 1;
        metrics::counter!("directory_search_pages_total").increment(1);

        let mut entries = 0;
        for item in page.items {
            match item {
                SearchItem::Entry(entry) => {
                    entries += 1;
                    self.buffer.push_back(entry);
                },
                SearchItem::Reference(urls) => {
                    self.references += 1;
                    metrics::counter!("directory_search_references_total").increment(1);
                    tracing::trace!(?urls, "skipping continuation reference");
                },
            }
        }
        metrics::counter!("directory_search_entries_total").increment(entries);
        tracing::debug!(page = self.pages, entries, "page received");

        if !page.cookie.is_empty() {
            self.cookie = Some(page.cookie);
        }
    }

    async fn finish(&mut self) {
        self.buffer.clear();
        self.cookie = None;

        if let Some(connection) = self.connection.take() {
            connection.close().await;
            tracing::info!(
                base = %self.request.base,
                pages = self.pages,
                references = self.references,
                "paged search finished"
            );
        }
    }
}
