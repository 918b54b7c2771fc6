use std::env;
use std::net::SocketAddr;

use crate::error::ConfigError;

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Server settings, read from `TIMETABLING_BIND` and `TIMETABLING_LOG`.
/// `RUST_LOG` still overrides the log filter at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub log_filter: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        ServerConfig::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind = lookup("TIMETABLING_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr = bind
            .parse()
            .map_err(|source| ConfigError::BindAddr {
                value: bind.clone(),
                source,
            })?;
        let log_filter =
            lookup("TIMETABLING_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        Ok(ServerConfig {
            bind_addr,
            log_filter,
        })
    }
}
