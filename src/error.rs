//! Error handler for adsync.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DirectoryError>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Enum representing directory-side errors.
///
/// Transport errors from `ldap3` never leak out of this enum: callers
/// branch on [`DirectoryError::kind`].
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("cannot reach directory server {address}: {source}")]
    Connectivity {
        address: String,
        #[source]
        source: BoxError,
    },

    #[error("authentication failed: {reason}")]
    Authentication { reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("directory unavailable: {0}")]
    DirectoryUnavailable(String),
}

/// Fieldless view of a [`DirectoryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connectivity,
    Authentication,
    InvalidArgument,
    DirectoryUnavailable,
}

impl DirectoryError {
    /// Create a [`DirectoryError::Connectivity`] from any transport error.
    pub fn connectivity<E>(address: impl Into<String>, err: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Connectivity {
            address: address.into(),
            source: err.into(),
        }
    }

    /// Create a [`DirectoryError::Authentication`].
    pub fn authentication(reason: impl Into<String>) -> Self {
        Self::Authentication {
            reason: reason.into(),
        }
    }

    /// Stable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connectivity { .. } => ErrorKind::Connectivity,
            Self::Authentication { .. } => ErrorKind::Authentication,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::DirectoryUnavailable(_) => ErrorKind::DirectoryUnavailable,
        }
    }
}
