//! # DocBridge Client
//!
//! Blocking client for DocBridge servers reached through `cproto://` DSNs.
//!
//! The client mirrors the embedded engine's operations. Requests travel
//! over a [`Transport`]; [`TcpTransport`] is the production one.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod error;
mod transport;

pub use client::{Client, RemoteItem};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use transport::{TcpTransport, Transport};
