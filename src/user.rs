//! Directory user representation.

mod account_control;

use serde::{Deserialize, Serialize};

pub use account_control::{DESCRIPTIONS, UserAccountControl};

use crate::ldap::DirectoryEntry;

/// Attributes read from a person entry.
pub const USER_ATTRIBUTES: [&str; 4] = [
    "sAMAccountName",
    "userPrincipalName",
    "mail",
    "userAccountControl",
];

/// User record synchronized from the directory.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryUserRecord {
    pub username: String,
    pub mail: Option<String>,
    pub organizational_unit: Option<String>,
    pub user_principal_name: Option<String>,
    pub sam_account_name: Option<String>,
    /// Raw `userAccountControl` value.
    pub account_control: Option<u32>,
}

impl DirectoryUserRecord {
    /// Map a search entry into a record.
    ///
    /// `username` is the `sAMAccountName`, or the `userPrincipalName`
    /// when the former is missing. Entries with neither are not users.
    pub fn from_entry(entry: &DirectoryEntry) -> Option<Self> {
        let owned = |name: &str| entry.first(name).map(str::to_owned);

        let sam_account_name = owned("sAMAccountName");
        let user_principal_name = owned("userPrincipalName");
        let username = sam_account_name
            .clone()
            .or_else(|| user_principal_name.clone())?;

        Some(Self {
            username,
            mail: owned("mail"),
            organizational_unit: organizational_unit(&entry.dn),
            user_principal_name,
            sam_account_name,
            account_control: entry
                .first("userAccountControl")
                .and_then(UserAccountControl::parse)
                .map(|uac| uac.bits()),
        })
    }

    /// Decoded `userAccountControl` flags.
    pub fn account_control(&self) -> Option<UserAccountControl> {
        self.account_control.map(UserAccountControl::decode)
    }

    /// Whether the directory marks this account as disabled.
    pub fn is_disabled(&self) -> bool {
        self.account_control()
            .is_some_and(|uac| uac.is_disabled())
    }
}

/// Value of the first `OU=` component of a distinguished name.
fn organizational_unit(dn: &str) -> Option<String> {
    split_rdns(dn)
        .into_iter()
        .filter_map(|rdn| rdn.trim().split_once('='))
        .find(|(kind, _)| kind.trim().eq_ignore_ascii_case("ou"))
        .map(|(_, value)| unescape_value(value.trim()))
}

/// Split a DN on the commas that are not escaped (RFC 4514).
fn split_rdns(dn: &str) -> Vec<&str> {
    let mut rdns = Vec::new();
    let mut start = 0;
    let mut escaped = false;

    for (index, byte) in dn.bytes().enumerate() {
        match byte {
            _ if escaped => escaped = false,
            b'\\' => escaped = true,
            b',' => {
                rdns.push(&dn[start..index]);
                start = index + 1;
            },
            _ => {},
        }
    }
    rdns.push(&dn[start..]);

    rdns
}

/// Decode `\,`-style and `\2C`-style escapes of an attribute value.
fn unescape_value(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index] != b'\\' || index + 1 == bytes.len() {
            decoded.push(bytes[index]);
            index += 1;
            continue;
        }

        let hex = bytes
            .get(index + 1..index + 3)
            .and_then(|pair| std::str::from_utf8(pair).ok())
            .and_then(|pair| u8::from_str_radix(pair, 16).ok());
        match hex {
            Some(byte) => {
                decoded.push(byte);
                index += 3;
            },
            None => {
                decoded.push(bytes[index + 1]);
                index += 2;
            },
        }
    }

    String::from_utf8_lossy(&decoded).into_owned()
}
