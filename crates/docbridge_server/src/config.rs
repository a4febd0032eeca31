//! Server configuration.

use docbridge_protocol::MAX_FRAME_SIZE;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the DocBridge server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Root directory holding one subdirectory per database. `None` keeps
    /// every database in memory.
    pub data_dir: Option<PathBuf>,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Requests running longer are logged as slow. Their response is still
    /// sent once the handler finishes.
    pub request_timeout: Duration,
    /// Largest request frame accepted.
    pub max_frame_size: usize,
    /// Whether logins may create databases that do not exist yet.
    pub allow_create_database: bool,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            data_dir: None,
            max_connections: 256,
            request_timeout: Duration::from_secs(30),
            max_frame_size: MAX_FRAME_SIZE,
            allow_create_database: true,
        }
    }

    /// Sets the data directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Sets the maximum concurrent connections.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the slow-request threshold.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the largest accepted frame.
    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Controls whether logins may create databases.
    pub fn with_allow_create_database(mut self, allow: bool) -> Self {
        self.allow_create_database = allow;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], docbridge_core::DEFAULT_PORT)))
    }
}
