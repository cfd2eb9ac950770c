//! Event Console engine channel
//!
//! Async client for the engine's status socket (Unix or TCP). Implements
//! [`ec_rules::EngineControl`] so the rule editor can reset counters,
//! switch replication modes and copy rules from a central site.

mod client;
mod connection;
mod endpoint;
mod error;

pub use client::{syslog_message, EventConsoleClient, DEFAULT_IO_TIMEOUT_SECS};
pub use connection::EngineConnection;
pub use endpoint::Endpoint;
pub use error::{ClientError, Result};
