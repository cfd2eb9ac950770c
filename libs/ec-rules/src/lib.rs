//! Event Console rule packs
//!
//! Rule pack library for the Event Console providing:
//! - Rule pack model with MKP packaging states
//! - Rule matching against syslog-style events, with match groups
//! - Outcome classification and text rewriting
//! - Event simulation over the whole rule set
//! - Persistent store and mutation API with single-use transactions
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────┐
//! │ RuleEditor  │────▶│ RulePackStore│     │ MkpRepository│
//! │ (mutations) │     │ (rules.json) │     │ (exports)   │
//! └─────────────┘     └──────────────┘     └─────────────┘
//!        │                                        ▲
//!        ▼                                        │
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────┐
//! │EngineControl│     │  Simulator   │────▶│ RuleMatcher │
//! │ (ec-client) │     │ (per event)  │     │  + rewrite  │
//! └─────────────┘     └──────────────┘     └─────────────┘
//! ```

pub mod editor;
pub mod engine;
mod error;
pub mod matcher;
pub mod mkp;
pub mod pattern;
pub mod rewrite;
pub mod simulator;
pub mod stats;
pub mod store;
pub mod transaction;
pub mod types;
pub mod validation;

// Re-export public API
pub use editor::{Applied, Mutation, RuleEditor, RulePackProperties, REPLICA_WARNING};
pub use engine::{EngineControl, ReplicationMode, SwitchMode};
pub use error::{Result, RuleError};
pub use matcher::{
    AlwaysActive, MatchContext, MatchGroups, MatchResult, RuleMatcher, StaticTimePeriods,
    TimePeriods,
};
pub use mkp::{MkpIndex, MkpRepository, PackageManifest};
pub use rewrite::{classify, Classification};
pub use simulator::{simulate, Outcome, PackReport, PackSummary, RuleVerdict, SimulationReport};
pub use stats::{search, summarize, PackRow, RuleHits, SearchHit};
pub use store::{RulePackStore, RULES_FILE};
pub use transaction::TransactionLedger;

// Re-export rule types for convenience
pub use types::{
    default_rule_pack, Event, MonitoringState, Rule, RulePackRef, RulePackSpec, RulePackType,
    RuleState,
};
