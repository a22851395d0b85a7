//! Configuration manager for adsync.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ldap::{AccountFilter, ConnectionOptions};
use crate::settings::DirectorySettings;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_CONNECT_TIMEOUT: u64 = 10;

/// Errors raised while reading the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot open configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed configuration file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Default `tracing` filter, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub telemetry: Telemetry,
    #[serde(default)]
    pub connection: Connection,
    /// Directory servers to work with.
    #[serde(default)]
    pub directories: Vec<DirectorySettings>,
    #[serde(default)]
    pub sync: Synchronization,
    #[serde(skip)]
    path: PathBuf,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_owned()
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            telemetry: Telemetry::default(),
            connection: Connection::default(),
            directories: Vec::new(),
            sync: Synchronization::default(),
            path: PathBuf::new(),
        }
    }
}

/// Logs and metrics export.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// OTLP (gRPC) endpoint receiving logs.
    pub otlp_endpoint: Option<String>,
    /// File receiving Prometheus metrics when the run ends.
    pub metrics_path: Option<PathBuf>,
}

/// Transport timeouts, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    pub operation_timeout: Option<u64>,
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT
}

impl Default for Connection {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            operation_timeout: None,
        }
    }
}

impl Connection {
    pub fn options(&self) -> ConnectionOptions {
        ConnectionOptions {
            connect_timeout: Duration::from_secs(self.connect_timeout),
            operation_timeout: self.operation_timeout.map(Duration::from_secs),
        }
    }
}

/// What `sync` copies.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synchronization {
    /// Account names, or nothing to copy every person. Kept untyped
    /// until it is turned into an [`AccountFilter`].
    #[serde(default)]
    pub accounts: Option<Value>,
    /// Attributes printed by `search`. Empty means all of them.
    #[serde(default)]
    pub attributes: Vec<String>,
}

impl Synchronization {
    pub fn accounts(&self) -> crate::Result<AccountFilter> {
        AccountFilter::from_value(self.accounts.as_ref())
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location. Falls back to the default configuration.
    pub fn read(self) -> Self {
        let (config, err) = self.read_or_default();
        if let Some(err) = err {
            tracing::error!(error = %err, path = %config.path.display(), "cannot read configuration");
        }
        config
    }

    /// Same as [`Configuration::read`], returning the error instead of
    /// logging it. Used before the logger is installed.
    pub fn read_or_default(self) -> (Self, Option<ConfigError>) {
        match self.try_read() {
            Ok(config) => (config, None),
            Err(err) => (self.fallback(), Some(err)),
        }
    }

    /// Same as [`Configuration::read`] without fallback.
    pub fn try_read(&self) -> Result<Self, ConfigError> {
        let file_path = if self.path.is_file() {
            self.path.as_path()
        } else {
            Path::new(DEFAULT_CONFIG_PATH)
        };

        let file = File::open(file_path)?;
        let mut config: Configuration = serde_yaml::from_reader(file)?;
        config.path = file_path.to_path_buf();

        Ok(config)
    }

    /// Return a default configuration as fallback.
    fn fallback(&self) -> Self {
        Self {
            path: self.path.clone(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;

    const CONFIG: &str = r#"
log_level: debug
telemetry:
  metrics_path: /var/lib/node_exporter/adsync.prom
connection:
  operation_timeout: 30
directories:
  - domain: dc01.corp.example.com
    username: CORP\svc
    password: secret
    ssl: true
    port: 636
  - domain: dc02.corp.example.com
sync:
  accounts: [alice, 1001]
  attributes: [mail]
"#;

    fn write_config(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "adsync-{}-{name}.yaml",
            std::process::id()
        ));
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_read() {
        let path = write_config("read", CONFIG);
        let config = Configuration::default().path(path.clone()).read();

        assert_eq!(config.log_level, "debug");
        assert_eq!(
            config.telemetry.metrics_path,
            Some(PathBuf::from("/var/lib/node_exporter/adsync.prom"))
        );
        assert_eq!(
            config.connection.options(),
            ConnectionOptions {
                connect_timeout: Duration::from_secs(10),
                operation_timeout: Some(Duration::from_secs(30)),
            }
        );

        assert_eq!(config.directories.len(), 2);
        let first = &config.directories[0];
        assert_eq!(first.username.as_deref(), Some(r"CORP\svc"));
        assert!(first.use_tls);
        assert_eq!(first.port, 636);
        assert_eq!(config.directories[1].port, 389);
        assert!(config.directories[1].username.is_none());

        assert_eq!(config.sync.accounts, Some(json!(["alice", 1001])));
        assert_eq!(
            config.sync.accounts().unwrap(),
            AccountFilter::Accounts(vec!["alice".into(), "1001".into()])
        );
        assert_eq!(config.sync.attributes, vec!["mail"]);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_scalar_accounts() {
        let path = write_config("scalar", "sync:\n  accounts: alice\n");
        let config = Configuration::default().path(path.clone()).read();

        let err = config.sync.accounts().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_fallback() {
        let path = write_config("malformed", "directories: 12\n");
        let config = Configuration::default().path(path.clone());

        assert!(matches!(config.try_read(), Err(ConfigError::Yaml(_))));
        let (fallback, err) = config.clone().read_or_default();
        assert!(matches!(err, Some(ConfigError::Yaml(_))));
        assert!(fallback.directories.is_empty());

        let config = config.read();
        assert_eq!(config.log_level, "info");
        assert!(config.directories.is_empty());
        assert_eq!(config.sync.accounts().unwrap(), AccountFilter::All);

        std::fs::remove_file(path).unwrap();
    }
}
