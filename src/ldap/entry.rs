//! Search results.

use std::collections::HashMap;

use ldap3::SearchEntry;
use serde::Serialize;

/// Entry matched by a search.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attrs: HashMap<String, Vec<String>>,
    #[serde(skip)]
    pub bin_attrs: HashMap<String, Vec<Vec<u8>>>,
}

impl DirectoryEntry {
    /// Create a new [`DirectoryEntry`] without attributes.
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            ..Default::default()
        }
    }

    /// Add a value to a textual attribute.
    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attrs
            .entry(name.to_owned())
            .or_default()
            .push(value.into());
        self
    }

    /// Every value of an attribute. Names are compared without case, as
    /// LDAP does.
    pub fn values(&self, name: &str) -> &[String] {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
            .unwrap_or_default()
    }

    /// First value of an attribute.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(String::as_str)
    }
}

impl From<SearchEntry> for DirectoryEntry {
    fn from(entry: SearchEntry) -> Self {
        Self {
            dn: entry.dn,
            attrs: entry.attrs,
            bin_attrs: entry.bin_attrs,
        }
    }
}

/// Item of a search response, tagged by its protocol type.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchItem {
    Entry(DirectoryEntry),
    /// Continuation reference (`searchResRef`) pointing elsewhere.
    Reference(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ignores_case() {
        let entry = DirectoryEntry::new("CN=Alice,OU=Staff,DC=corp,DC=local")
            .with_attr("sAMAccountName", "alice")
            .with_attr("proxyAddresses", "smtp:a@corp.local")
            .with_attr("proxyAddresses", "smtp:alice@corp.local");

        assert_eq!(entry.first("samaccountname"), Some("alice"));
        assert_eq!(entry.values("PROXYADDRESSES").len(), 2);
        assert_eq!(entry.first("mail"), None);
        assert!(entry.values("mail").is_empty());
    }
}
