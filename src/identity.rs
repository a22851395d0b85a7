//! Login identifier resolution.
//!
//! Turns the loosely formatted logins administrators type
//! (`user@domain` or `DOMAIN\user`) into a principal name the directory
//! accepts for a simple bind, and derives the search base from it.

use std::fmt;

use crate::error::{DirectoryError, Result};

const UPN_SEPARATOR: char = '@';
const DOWN_LEVEL_SEPARATOR: char = '\\';

/// Separators accepted in a login identifier.
pub const SEPARATORS: [char; 2] = [UPN_SEPARATOR, DOWN_LEVEL_SEPARATOR];

/// Value object of a resolved `user@domain` principal name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Principal(String);

impl Principal {
    /// Domain portion of the principal, i.e. the part following the
    /// first `@`.
    pub fn domain(&self) -> Option<&str> {
        self.0.split(UPN_SEPARATOR).nth(1)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Principal {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Resolve a raw login into a [`Principal`].
///
/// Returns `None` for an absent or empty login and for a login without
/// any separator: such a login cannot be bound.
///
/// ```
/// use adsync::identity::resolve_principal;
///
/// let principal = resolve_principal(Some(r"CORP\alice")).unwrap();
/// assert_eq!(principal.as_str(), "alice@CORP");
/// ```
pub fn resolve_principal(login: Option<&str>) -> Option<Principal> {
    let login = login.filter(|l| !l.is_empty())?;

    if login.contains(UPN_SEPARATOR) {
        Some(Principal(login.to_owned()))
    } else if login.contains(DOWN_LEVEL_SEPARATOR) {
        // `a\b\c` becomes `c@b@a`, every part is reversed.
        let parts: Vec<&str> = login.split(DOWN_LEVEL_SEPARATOR).rev().collect();
        Some(Principal(parts.join("@")))
    } else {
        None
    }
}

/// Derive the distinguished name used as search base from the domain
/// portion of a principal.
///
/// `alice@corp.example.com` gives `dc=corp,dc=example,dc=com`.
pub fn derive_search_base(principal: &Principal) -> Result<String> {
    let domain = principal.domain().ok_or_else(|| {
        DirectoryError::InvalidArgument(format!(
            "principal {principal} has no domain portion"
        ))
    })?;

    let base: String = domain
        .split('.')
        .map(|label| format!("dc={label},"))
        .collect();

    Ok(base.strip_suffix(',').unwrap_or(&base).to_owned())
}
