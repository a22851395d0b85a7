//! Scripted in-memory directory used by tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{DirectoryError, Result};
use crate::ldap::{
    Connector, DirectoryEntry, Endpoint, PAGED_RESULTS_OID, Page, SearchItem,
    SearchRequest, ServerInfo, Session,
};

#[derive(Default)]
struct State {
    entries: usize,
    password: String,
    references: bool,
    unreachable: bool,
    without_paging: bool,
    hidden_root_dse: bool,
    fail_on_page: Option<usize>,
    opens: AtomicUsize,
    closes: AtomicUsize,
    pages: AtomicUsize,
    binds: Mutex<Vec<String>>,
    requests: Mutex<Vec<SearchRequest>>,
}

/// Directory holding `entries` persons, accepting any principal bound
/// with the configured password.
#[derive(Clone)]
pub(crate) struct MockDirectory {
    state: Arc<State>,
}

impl MockDirectory {
    pub fn new(entries: usize) -> Self {
        Self {
            state: Arc::new(State {
                entries,
                password: "secret".into(),
                ..Default::default()
            }),
        }
    }

    fn state_mut(&mut self) -> &mut State {
        Arc::get_mut(&mut self.state).expect("configure before use")
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.state_mut().password = password.into();
        self
    }

    /// Add a continuation reference to every page.
    pub fn with_references(mut self) -> Self {
        self.state_mut().references = true;
        self
    }

    /// Leave the paged results control out of the root DSE.
    pub fn without_paging(mut self) -> Self {
        self.state_mut().without_paging = true;
        self
    }

    /// Make reading the root DSE fail.
    pub fn hide_root_dse(mut self) -> Self {
        self.state_mut().hidden_root_dse = true;
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.state_mut().unreachable = true;
        self
    }

    /// Make the n-th page request (1-based) fail.
    pub fn fail_on_page(mut self, page: usize) -> Self {
        self.state_mut().fail_on_page = Some(page);
        self
    }

    pub fn opens(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    pub fn pages(&self) -> usize {
        self.state.pages.load(Ordering::SeqCst)
    }

    pub fn binds(&self) -> Vec<String> {
        self.state.binds.lock().unwrap().clone()
    }

    pub fn filters(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.filter).collect()
    }

    pub fn bases(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.base).collect()
    }

    pub fn page_sizes(&self) -> Vec<i32> {
        self.requests().into_iter().map(|r| r.page_size).collect()
    }

    fn requests(&self) -> Vec<SearchRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Let deferred releases scheduled on the runtime complete.
    pub async fn wait_for_closes(&self, closes: usize) {
        for _ in 0..100 {
            if self.closes() >= closes {
                return;
            }
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl Connector for MockDirectory {
    async fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Session>> {
        if self.state.unreachable {
            return Err(DirectoryError::connectivity(
                endpoint.url(),
                std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            ));
        }

        self.state.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockSession {
    state: Arc<State>,
}

fn person(index: usize) -> DirectoryEntry {
    DirectoryEntry::new(format!(
        "CN=user{index},OU=Staff,DC=corp,DC=example,DC=com"
    ))
    .with_attr("sAMAccountName", format!("user{index}"))
    .with_attr("userPrincipalName", format!("user{index}@corp.example.com"))
    .with_attr("mail", format!("user{index}@example.com"))
    .with_attr("userAccountControl", "512")
}

#[async_trait]
impl Session for MockSession {
    async fn bind(&mut self, principal: &str, password: &str) -> Result<()> {
        self.state.binds.lock().unwrap().push(principal.to_owned());

        if password != self.state.password {
            return Err(DirectoryError::authentication(
                "bind rejected with code 49",
            ));
        }
        Ok(())
    }

    async fn server_info(&mut self) -> Result<ServerInfo> {
        if self.state.hidden_root_dse {
            return Err(DirectoryError::DirectoryUnavailable(
                "root DSE read failed with code 50".into(),
            ));
        }

        let supported_controls = if self.state.without_paging {
            Vec::new()
        } else {
            vec![PAGED_RESULTS_OID.to_owned()]
        };

        Ok(ServerInfo {
            supported_controls,
            supported_ldap_version: vec!["3".into()],
            ..Default::default()
        })
    }

    async fn search_page(
        &mut self,
        request: &SearchRequest,
        cookie: &[u8],
    ) -> Result<Page> {
        let page = self.state.pages.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.requests.lock().unwrap().push(request.clone());

        if self.state.fail_on_page == Some(page) {
            return Err(DirectoryError::DirectoryUnavailable(
                "search failed with code 51".into(),
            ));
        }

        let offset = match cookie {
            [] => 0,
            bytes => {
                let bytes: [u8; 8] = bytes.try_into().unwrap();
                u64::from_be_bytes(bytes) as usize
            },
        };
        let end = (offset + request.page_size as usize).min(self.state.entries);

        let mut items: Vec<SearchItem> =
            (offset..end).map(|i| SearchItem::Entry(person(i))).collect();
        if self.state.references {
            items.insert(
                items.len() / 2,
                SearchItem::Reference(vec![
                    "ldap://ForestDnsZones.corp.example.com/DC=corp".into(),
                ]),
            );
        }

        let cookie = if end < self.state.entries {
            (end as u64).to_be_bytes().to_vec()
        } else {
            Vec::new()
        };

        Ok(Page { items, cookie })
    }

    async fn unbind(&mut self) -> Result<()> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
