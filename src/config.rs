//! Server configuration.
//!
//! [`ServerConfig`] holds everything the server needs at startup. The binary
//! fills it from command-line flags; tests build it directly.

use crate::storage::ExpiryConfig;
use crate::{DEFAULT_HOST, DEFAULT_PORT};
use std::path::PathBuf;
use std::time::Duration;

/// Default directory for `dump.rdb`
pub const DEFAULT_DATA_DIR: &str = "data";

/// Default time between background snapshots
pub const DEFAULT_SNAPSHOT_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on (0 picks a free port)
    pub port: u16,
    /// Directory holding the snapshot file
    pub data_dir: PathBuf,
    /// Time between background snapshots
    pub snapshot_interval: Duration,
    /// Load a snapshot on startup and save one periodically and on shutdown
    pub persistence: bool,
    /// Expiry sweeper tuning
    pub sweep: ExpiryConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            persistence: true,
            sweep: ExpiryConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_address(), "127.0.0.1:6379");
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.snapshot_interval, Duration::from_secs(30));
        assert!(config.persistence);
    }
}
