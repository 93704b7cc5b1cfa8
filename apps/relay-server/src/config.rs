//! Relay server configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use relay_core::InvoiceLayout;
use relay_db::DbConfig;

/// Where refreshes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshSource {
    /// Nothing configured; refreshes fail.
    None,
    /// Path to a SQL script run against the buffer.
    Script(PathBuf),
    /// Exporter program and its arguments, split on whitespace.
    Command { program: String, args: Vec<String> },
}

/// Relay server configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Listen address
    pub bind_addr: IpAddr,

    /// HTTP port
    pub http_port: u16,

    /// SQLite buffer database path
    pub database_path: String,

    /// Pool size
    pub db_max_connections: u32,

    /// Active invoice layout
    pub invoice_layout: InvoiceLayout,

    /// Refresh source
    pub refresh: RefreshSource,

    /// Bound on one refresh
    pub refresh_timeout: Duration,

    /// Include raw error text in failure envelopes
    pub expose_error_details: bool,
}

impl RelayConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns the raw value of a
    /// variable or `None` when it is unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str, default: &str| -> String {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let script = lookup("RELAY_REFRESH_SCRIPT").filter(|v| !v.trim().is_empty());
        let command = lookup("RELAY_REFRESH_COMMAND").and_then(|line| {
            let mut parts = line.split_whitespace().map(str::to_string);
            let program = parts.next()?;
            Some(RefreshSource::Command {
                program,
                args: parts.collect(),
            })
        });

        let refresh = match (script, command) {
            (Some(_), Some(_)) => return Err(ConfigError::ConflictingRefreshSources),
            (Some(path), None) => RefreshSource::Script(PathBuf::from(path.trim())),
            (None, Some(command)) => command,
            (None, None) => RefreshSource::None,
        };

        let config = RelayConfig {
            bind_addr: value("RELAY_BIND_ADDR", "0.0.0.0")
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("RELAY_BIND_ADDR".to_string()))?,

            http_port: value("RELAY_HTTP_PORT", "8080")
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("RELAY_HTTP_PORT".to_string()))?,

            database_path: value("RELAY_DATABASE_PATH", "./relay.db"),

            db_max_connections: value("RELAY_DB_MAX_CONNECTIONS", "5")
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue("RELAY_DB_MAX_CONNECTIONS".to_string()))?,

            invoice_layout: value("RELAY_INVOICE_LAYOUT", "rows")
                .parse()
                .map_err(|_| ConfigError::InvalidValue("RELAY_INVOICE_LAYOUT".to_string()))?,

            refresh,

            refresh_timeout: value("RELAY_REFRESH_TIMEOUT_SECS", "300")
                .trim()
                .parse()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::InvalidValue("RELAY_REFRESH_TIMEOUT_SECS".to_string()))?,

            expose_error_details: parse_flag(&value("RELAY_EXPOSE_ERROR_DETAILS", "false"))
                .ok_or_else(|| ConfigError::InvalidValue("RELAY_EXPOSE_ERROR_DETAILS".to_string()))?,
        };

        if config.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("RELAY_DB_MAX_CONNECTIONS".to_string()));
        }

        if config.refresh_timeout.is_zero() {
            return Err(ConfigError::InvalidValue("RELAY_REFRESH_TIMEOUT_SECS".to_string()));
        }

        Ok(config)
    }

    /// Address the HTTP server listens on.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.http_port)
    }

    /// Database configuration derived from this config.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path)
            .max_connections(self.db_max_connections)
            .invoice_layout(self.invoice_layout)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("RELAY_REFRESH_SCRIPT and RELAY_REFRESH_COMMAND are mutually exclusive")]
    ConflictingRefreshSources,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = RelayConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:8080");
        assert_eq!(config.database_path, "./relay.db");
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.invoice_layout, InvoiceLayout::Rows);
        assert_eq!(config.refresh, RefreshSource::None);
        assert_eq!(config.refresh_timeout, Duration::from_secs(300));
        assert!(!config.expose_error_details);
    }

    #[test]
    fn test_overrides() {
        let config = RelayConfig::from_lookup(lookup(&[
            ("RELAY_BIND_ADDR", "127.0.0.1"),
            ("RELAY_HTTP_PORT", "9000"),
            ("RELAY_INVOICE_LAYOUT", "normalized"),
            ("RELAY_REFRESH_COMMAND", " erp-export --target buffer "),
            ("RELAY_REFRESH_TIMEOUT_SECS", "30"),
            ("RELAY_EXPOSE_ERROR_DETAILS", "true"),
        ]))
        .unwrap();

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:9000");
        assert_eq!(config.invoice_layout, InvoiceLayout::Normalized);
        assert_eq!(
            config.refresh,
            RefreshSource::Command {
                program: "erp-export".to_string(),
                args: vec!["--target".to_string(), "buffer".to_string()],
            }
        );
        assert_eq!(config.refresh_timeout, Duration::from_secs(30));
        assert!(config.expose_error_details);
    }

    #[test]
    fn test_invalid_values() {
        for (key, raw) in [
            ("RELAY_HTTP_PORT", "eighty"),
            ("RELAY_BIND_ADDR", "localhost:80"),
            ("RELAY_INVOICE_LAYOUT", "columns"),
            ("RELAY_DB_MAX_CONNECTIONS", "0"),
            ("RELAY_REFRESH_TIMEOUT_SECS", "0"),
            ("RELAY_EXPOSE_ERROR_DETAILS", "maybe"),
        ] {
            match RelayConfig::from_lookup(lookup(&[(key, raw)])) {
                Err(ConfigError::InvalidValue(name)) => assert_eq!(name, key),
                other => panic!("{}={} should be rejected, got {:?}", key, raw, other),
            }
        }
    }

    #[test]
    fn test_refresh_sources_are_exclusive() {
        let result = RelayConfig::from_lookup(lookup(&[
            ("RELAY_REFRESH_SCRIPT", "./refresh.sql"),
            ("RELAY_REFRESH_COMMAND", "erp-export"),
        ]));
        assert!(matches!(result, Err(ConfigError::ConflictingRefreshSources)));

        let config =
            RelayConfig::from_lookup(lookup(&[("RELAY_REFRESH_SCRIPT", "./refresh.sql")])).unwrap();
        assert_eq!(config.refresh, RefreshSource::Script(PathBuf::from("./refresh.sql")));

        let config =
            RelayConfig::from_lookup(lookup(&[("RELAY_REFRESH_COMMAND", "   ")])).unwrap();
        assert_eq!(config.refresh, RefreshSource::None);
    }
}
