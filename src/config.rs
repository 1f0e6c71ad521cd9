//! Server configuration from environment variables

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::state::DEFAULT_OUTBOX_CAPACITY;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_STATIC_DIR: &str = "public";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is not valid: {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind_addr: IpAddr,
    pub port: u16,
    /// Origins allowed to open a socket. Empty means any origin.
    pub allowed_origins: Vec<String>,
    /// Deadline for a single socket write
    pub write_timeout: Duration,
    /// Frames a connection may have queued before it is dropped
    pub outbox_capacity: usize,
    pub static_dir: PathBuf,
    /// Snapshot loaded at startup and written on shutdown
    pub state_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            allowed_origins: Vec::new(),
            write_timeout: Duration::from_millis(DEFAULT_WRITE_TIMEOUT_MS),
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            state_file: None,
        }
    }
}

/// Read a variable, treating unset and blank the same
fn var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parsed<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match var(name) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var: name, value }),
        None => Ok(None),
    }
}

impl Config {
    /// Load config from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let allowed_origins = var("QUIZHUB_ALLOWED_ORIGINS")
            .map(|list| {
                list.split(',')
                    .map(|o| o.trim().trim_end_matches('/').to_string())
                    .filter(|o| !o.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let outbox_capacity = match parsed::<usize>("QUIZHUB_OUTBOX_CAPACITY")? {
            Some(0) => {
                return Err(ConfigError::Invalid {
                    var: "QUIZHUB_OUTBOX_CAPACITY",
                    value: "0".to_string(),
                })
            }
            Some(n) => n,
            None => defaults.outbox_capacity,
        };

        Ok(Self {
            bind_addr: parsed("QUIZHUB_BIND_ADDR")?.unwrap_or(defaults.bind_addr),
            port: parsed("QUIZHUB_PORT")?.unwrap_or(defaults.port),
            allowed_origins,
            write_timeout: parsed("QUIZHUB_WRITE_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.write_timeout),
            outbox_capacity,
            static_dir: var("QUIZHUB_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            state_file: var("QUIZHUB_STATE_FILE").map(PathBuf::from),
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}
