//! Client configuration.

use docbridge_protocol::MAX_FRAME_SIZE;
use std::time::Duration;

/// Configuration for a remote client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Time allowed for establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Time allowed for one request/response round trip.
    pub request_timeout: Duration,
    /// Ask the server to create the database on login.
    pub create_db_if_missing: bool,
    /// Largest response frame accepted.
    pub max_frame_size: usize,
}

impl ClientConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            create_db_if_missing: true,
            max_frame_size: MAX_FRAME_SIZE,
        }
    }

    /// Sets the connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets whether login may create the database.
    #[must_use]
    pub const fn create_db_if_missing(mut self, value: bool) -> Self {
        self.create_db_if_missing = value;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}
