//! `cassia`: the wire codec and connection state machine for Cassandra's
//! native CQL binary protocol (v3/v4).
//!
//! This crate speaks the protocol on a single socket: framing, typed-value
//! encoding, request/response correlation, the prepared-statement lifecycle
//! and paging/consistency semantics. It does not pool connections, discover
//! cluster topology, route by token, or retry a request against a different
//! node — those are a driver layer built on top of a [`query::Session`].
//!
//! ```no_run
//! # #[cfg(feature = "tokio")]
//! # async fn go() -> cassia::Result<()> {
//! use cassia::{options::ConnectOptions, query::{Params, Session}};
//!
//! let session = Session::connect(ConnectOptions::new("127.0.0.1", 9042)).await?;
//! let statement = session.prepare("SELECT * FROM system.local").await?;
//! let rows = session.execute(&statement, Params::new()).await?;
//! # let _ = rows;
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(feature = "tokio"), allow(dead_code))]

pub mod auth;
#[cfg(feature = "tokio")]
pub mod connection;
pub mod error;
pub mod frame;
mod macros;
pub mod message;
pub mod options;
pub mod protocol;
#[cfg(feature = "tokio")]
pub mod query;
pub mod result;
#[cfg(feature = "tokio")]
pub mod statement;
pub mod value;

#[cfg(feature = "tokio")]
pub use connection::Connection;
pub use error::{Error, ErrorKind, Result};
pub use options::ConnectOptions;
#[cfg(feature = "tokio")]
pub use query::Session;
pub use value::Value;
