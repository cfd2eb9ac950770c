//! Seam to the live Event Console engine
//!
//! The editor signals side effects (counter resets, mode switches) and
//! fetches replicated rules through this trait. The socket client lives
//! in the `ec-client` crate; tests use in-memory doubles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::stats::RuleHits;
use crate::types::RulePackRef;

/// Replication role of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicationMode {
    Master,
    /// Replica following a central site; local rules are not used
    Sync,
    /// Replica that took over processing
    Takeover,
    /// Engine not reachable
    Stopped,
}

impl ReplicationMode {
    /// Local rule edits do not reach the running engine in this mode
    pub fn is_replica(self) -> bool {
        matches!(self, ReplicationMode::Sync | ReplicationMode::Takeover)
    }

    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "sync" => ReplicationMode::Sync,
            "takeover" => ReplicationMode::Takeover,
            "master" => ReplicationMode::Master,
            _ => ReplicationMode::Stopped,
        }
    }
}

impl fmt::Display for ReplicationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Master => "master",
            Self::Sync => "sync",
            Self::Takeover => "takeover",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Mode a replica can be switched to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchMode {
    Sync,
    Takeover,
}

impl SwitchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SwitchMode::Sync => "sync",
            SwitchMode::Takeover => "takeover",
        }
    }
}

/// Commands and queries the editor needs from the engine
#[async_trait]
pub trait EngineControl: Send + Sync {
    /// Reset hit counters of one rule, or of all rules
    async fn reset_counters(&self, rule_id: Option<&str>) -> Result<()>;

    async fn switch_mode(&self, mode: SwitchMode) -> Result<()>;

    /// Rule packs held by the engine (`REPLICATE 0`)
    async fn replicate(&self) -> Result<Vec<RulePackRef>>;

    /// Current replication role; `Stopped` when the engine is unreachable
    async fn replication_mode(&self) -> ReplicationMode;

    async fn rule_hits(&self) -> Result<RuleHits>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode() {
        assert_eq!(ReplicationMode::parse("sync"), ReplicationMode::Sync);
        assert_eq!(ReplicationMode::parse("takeover\n"), ReplicationMode::Takeover);
        assert_eq!(ReplicationMode::parse("master"), ReplicationMode::Master);
        assert_eq!(ReplicationMode::parse(""), ReplicationMode::Stopped);
        assert!(ReplicationMode::Takeover.is_replica());
        assert!(!ReplicationMode::Master.is_replica());
    }
}
