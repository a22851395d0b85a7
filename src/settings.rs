//! Directory settings.

use std::fmt;

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};
use zeroize::Zeroizing;

use crate::identity::SEPARATORS;

pub const DEFAULT_PORT: u16 = 389;

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.starts_with(SEPARATORS) || username.ends_with(SEPARATORS) {
        return Err(ValidationError::new("username").with_message(
            "Username should not start or end with '@' or '\\'.".into(),
        ));
    }

    if !username.contains(SEPARATORS) {
        return Err(ValidationError::new("username")
            .with_message("Username should contain '@' or '\\'.".into()));
    }

    Ok(())
}

/// Connection settings of one directory server.
///
/// `domain` identifies the settings. Credentials are all-or-nothing:
/// settings without a username are only used to authenticate users
/// with their own login.
#[derive(Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct DirectorySettings {
    /// Domain controller hostname.
    #[validate(length(min = 1, message = "Domain controller is required."))]
    pub domain: String,
    /// Service account, `user@domain` or `DOMAIN\user`.
    #[validate(custom(function = "validate_username"))]
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, skip_serializing)]
    pub password: Option<Zeroizing<String>>,
    #[validate(range(min = 1, message = "Port must be positive."))]
    #[serde(default = "default_port")]
    pub port: u16,
    /// Connect with `ldaps://`.
    #[serde(default, alias = "ssl")]
    pub use_tls: bool,
}

impl DirectorySettings {
    /// Create a new [`DirectorySettings`] without credentials.
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            username: None,
            password: None,
            port: DEFAULT_PORT,
            use_tls: false,
        }
    }

    /// Update stored service account.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(Zeroizing::new(password.into()));
        self
    }

    /// Update `port`.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Update `use_tls`.
    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    /// Normalize values before they are stored.
    ///
    /// Trims `domain` and `username`. An empty username becomes absent
    /// and clears the password as well.
    pub fn normalize(&mut self) {
        self.domain = self.domain.trim().to_owned();
        self.username = self
            .username
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_owned);

        if self.username.is_none() {
            self.password = None;
        }
    }

    /// Stored service account, if any.
    pub fn credentials(&self) -> Option<Credentials> {
        self.username.as_ref().map(|username| Credentials {
            username: username.clone(),
            password: self.password.clone().unwrap_or_default(),
        })
    }
}

impl fmt::Debug for DirectorySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectorySettings")
            .field("domain", &self.domain)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("port", &self.port)
            .field("use_tls", &self.use_tls)
            .finish()
    }
}

impl fmt::Display for DirectorySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.domain)
    }
}

/// Login and password pair used to bind.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: Zeroizing<String>,
}

impl Credentials {
    /// Create a new [`Credentials`].
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Zeroizing::new(password.into()),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}
