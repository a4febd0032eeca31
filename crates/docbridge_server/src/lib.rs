//! # DocBridge Server
//!
//! TCP server that hosts embedded DocBridge databases for remote clients.
//!
//! This crate provides:
//! - A tokio listener with one task per connection
//! - Login sessions bound to a named database
//! - Dispatch of every protocol request onto the embedded engine
//! - A background server for tests and in-process use
//!
//! # Architecture
//!
//! The server uses the same engine as embedded mode (no external
//! database). Each database name maps to a subdirectory of the data
//! directory, or to memory when no data directory is configured.
//!
//! Connections that exceed `max_connections` wait in the accept loop until
//! a slot frees up.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod background;
mod config;
mod error;
mod handler;
mod server;

pub use background::BackgroundServer;
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{RpcServer, Session};
pub use server::DocServer;
