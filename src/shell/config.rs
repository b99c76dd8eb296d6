use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_GRAPHQL_PATH: &str = "/graphql";
pub const DEFAULT_GRAPHQL_URL: &str = "http://localhost:4000/graphql";
pub const DEFAULT_GRAPHQL_ACCEPT: &str = "text/event-stream";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid PORT {0:?}")]
    InvalidPort(String),

    #[error("invalid HOST {0:?}")]
    InvalidHost(String),

    #[error("GRAPHQL_PATH must start with '/', got {0:?}")]
    InvalidPath(String),
}

/// Loads `.env` into the process environment and returns its path, if there
/// is one.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub host: IpAddr,
    pub port: u16,
    pub graphql_path: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host = match lookup("HOST") {
            Some(host) => host.parse().map_err(|_| ConfigError::InvalidHost(host))?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };
        let port = match lookup("PORT") {
            Some(port) => port.parse().map_err(|_| ConfigError::InvalidPort(port))?,
            None => DEFAULT_PORT,
        };
        let graphql_path = lookup("GRAPHQL_PATH").unwrap_or_else(|| DEFAULT_GRAPHQL_PATH.into());
        if !graphql_path.starts_with('/') {
            return Err(ConfigError::InvalidPath(graphql_path));
        }

        Ok(Self {
            host,
            port,
            graphql_path,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerConfig {
    pub graphql_url: String,
    pub accept: String,
}

impl ConsumerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            graphql_url: lookup("GRAPHQL_URL").unwrap_or_else(|| DEFAULT_GRAPHQL_URL.into()),
            accept: lookup("GRAPHQL_ACCEPT").unwrap_or_else(|| DEFAULT_GRAPHQL_ACCEPT.into()),
        }
    }
}
