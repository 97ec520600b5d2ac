//! Server configuration.

use std::net::SocketAddr;

use thiserror::Error;

pub const ENV_BIND_ADDR: &str = "AUTOFLOW_BIND_ADDR";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiConfigError {
    #[error("{ENV_BIND_ADDR}: invalid socket address {0:?}")]
    InvalidBindAddr(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ApiConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApiConfigError> {
        let raw = lookup(ENV_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw
            .trim()
            .parse()
            .map_err(|_| ApiConfigError::InvalidBindAddr(raw.clone()))?;
        Ok(Self { bind_addr })
    }
}
