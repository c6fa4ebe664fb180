//! # vivace-mysql
//!
//! A small synchronous MySQL client with a per-configuration instance
//! registry, built for long-lived server-side helpers rather than pools.
//!
//! ## Features
//! - **One connection per configuration**: The [`Registry`] deduplicates
//!   clients by a fingerprint of the configuration, so every caller with
//!   the same settings shares one connection.
//! - **Reconnect on use**: Every statement and transaction operation
//!   checks the connection first and reopens it when it is gone.
//! - **Prepared statements**: Positional `?` placeholders over the binary
//!   protocol, with native integer binding and stringified everything else.
//! - **Typed results or legacy swallow-and-log**: Operations return
//!   `Result` by default; [`ErrorPolicy::LogAndContinue`] restores the
//!   old log-and-return-empty contract.

pub mod protocol;
pub mod codec;
pub mod auth;
pub mod connection;
pub mod types;
pub mod error;
pub mod row;
pub mod sink;
pub mod statement;
pub mod client;
pub mod registry;

pub use client::{Client, ErrorPolicy};
pub use codec::ColumnDesc;
pub use connection::{Config, Connection, ConnectionState, QueryResult, DEFAULT_CHARSET};
pub use error::{Error, Result};
pub use protocol::ColumnType;
pub use registry::{Registry, SharedClient};
pub use row::Row;
pub use sink::{FileSink, LogSink, NullSink};
pub use statement::Statement;
pub use types::{Param, ToParam, Value};
