//! Shared basics for the Event Console rule tooling
//!
//! - layered settings (`config`)
//! - logging setup (`logging`)
//! - serde helpers for tolerant rule pack files (`serde_helpers`)

pub mod config;
pub mod error;
pub mod logging;
pub mod serde_helpers;

pub use config::{load_settings, EcSettings, EngineSettings, LogSettings, PathSettings};
pub use error::{Error, Result};
pub use logging::{init_logging, parse_level, LogConfig};
