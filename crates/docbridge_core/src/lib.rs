//! # DocBridge Core
//!
//! Embedded document engine behind the DocBridge bridge.
//!
//! This crate provides:
//! - Namespaces of JSON documents with hash, tree and composite indexes
//! - Item validation against index field types
//! - A SQL subset compiled into structured queries
//! - Query execution with index-assisted filtering
//! - Per-namespace append-only logs for persistence
//!
//! The remote server embeds this engine too, so its error kinds, index
//! definitions and result types are shared by every DocBridge crate.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod database;
mod dir;
pub mod document;
mod dsn;
mod error;
pub mod index;
mod item;
mod key;
pub mod log;
mod namespace;
pub mod query;
mod results;

pub use config::{ConnectOpts, StorageOpts, StorageType};
pub use database::Database;
pub use dir::{StorageDir, NAMESPACE_LOG_EXT};
pub use dsn::{Dsn, BUILTIN_SCHEME, CPROTO_SCHEME, DEFAULT_PORT};
pub use error::{CoreError, CoreResult, ErrorKind};
pub use index::{CollateMode, FieldType, IndexDef, IndexOpts, IndexType};
pub use item::{Item, ItemModifyMode, Schema};
pub use key::KeyValue;
pub use namespace::{validate_name, Namespace};
pub use query::{Condition, CondOp, Query, Statement, UpdateAction, UpdateQuery};
pub use results::{QueryResults, ResultItem};
