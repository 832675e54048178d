//! Daemon collaborator interface.
//!
//! The wallet never talks to the network itself. Anything that can serve
//! blocks, heights and a fee (an HTTP node client, a blockchain cache API,
//! [`crate::mock_daemon::MockDaemon`]) implements [`Daemon`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::types::Block;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DaemonType {
    ConventionalDaemon,
    BlockchainCacheApi,
}

/// Where the daemon is and what the handshake found out about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonConnectionInfo {
    pub host: String,
    pub port: u16,
    pub daemon_type: DaemonType,
    /// False until a handshake confirmed `daemon_type`.
    pub daemon_type_determined: bool,
    pub ssl: bool,
    /// False until a handshake confirmed `ssl`.
    pub ssl_determined: bool,
}

impl DaemonConnectionInfo {
    /// Provisional info for a daemon that has not been contacted yet.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            daemon_type: DaemonType::ConventionalDaemon,
            daemon_type_determined: false,
            ssl: false,
            ssl_determined: false,
        }
    }

    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self.ssl_determined = true;
        self
    }

    pub fn with_daemon_type(mut self, daemon_type: DaemonType) -> Self {
        self.daemon_type = daemon_type;
        self.daemon_type_determined = true;
        self
    }

    /// Forgets what a previous handshake determined.
    pub fn reset_detection(&mut self) {
        self.daemon_type_determined = false;
        self.ssl_determined = false;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonEvent {
    Connect,
    Disconnect,
}

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("daemon at {host}:{port} is unreachable")]
    Unreachable { host: String, port: u16 },

    #[error("invalid daemon response: {0}")]
    InvalidResponse(String),

    #[error("daemon has not been initialised")]
    NotInitialised,
}

#[async_trait]
pub trait Daemon: Send + Sync {
    /// Contacts the daemon, determines ssl and type, and loads heights and fee.
    async fn init(&self) -> Result<(), DaemonError>;

    /// Refreshes heights and fee.
    async fn update_daemon_info(&self) -> Result<(), DaemonError>;

    /// Up to `count` consecutive blocks starting at `start_height`. An empty
    /// result means the daemon has nothing past `start_height - 1` yet.
    async fn get_blocks(&self, start_height: u64, count: u64) -> Result<Vec<Block>, DaemonError>;

    fn subscribe(&self) -> broadcast::Receiver<DaemonEvent>;

    fn connection_info(&self) -> DaemonConnectionInfo;

    /// `("", 0)` until the daemon has reported a fee.
    fn node_fee(&self) -> (String, u64);

    fn local_height(&self) -> u64;

    fn network_height(&self) -> u64;
}
