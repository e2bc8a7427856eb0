//! Configuration loading and representation.
//!
//! Everything comes from environment variables; unset variables fall back to
//! defaults, malformed ones are errors.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use splitfund_observability::LogFormat;

pub const BIND_ADDR_VAR: &str = "SPLITFUND_BIND_ADDR";
pub const JOURNAL_PATH_VAR: &str = "SPLITFUND_JOURNAL_PATH";
pub const LOG_FORMAT_VAR: &str = "SPLITFUND_LOG_FORMAT";

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5500";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Journal file for the durable event store; in-memory when `None`.
    pub journal_path: Option<PathBuf>,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup (tests pass a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let bind_raw = get(BIND_ADDR_VAR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.trim().parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
            var: BIND_ADDR_VAR,
            value: bind_raw.clone(),
            reason: e.to_string(),
        })?;

        let log_format = match get(LOG_FORMAT_VAR) {
            None => LogFormat::default(),
            Some(raw) => raw.parse().map_err(|e: splitfund_observability::ParseLogFormatError| {
                ConfigError::Invalid {
                    var: LOG_FORMAT_VAR,
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?,
        };

        Ok(Self {
            bind_addr,
            journal_path: get(JOURNAL_PATH_VAR).map(|p| PathBuf::from(p.trim())),
            log_format,
        })
    }
}
