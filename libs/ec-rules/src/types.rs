//! Rule pack data model
//!
//! Core types shared by the matcher, the store and the editor:
//! - RulePackSpec / Rule: the persisted classification rules
//! - RulePackRef: an owned pack or a proxy for a pack provided by an MKP
//! - RulePackType: packaging state derived from a pack and the MKP index
//! - Event: the message fed into matching and the simulator

use chrono::{DateTime, Utc};
use common::serde_helpers::{
    bool_true, deserialize_bool_flexible, deserialize_optional_nonempty, is_false,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::error::{Result, RuleError};
use crate::mkp::{MkpIndex, MkpRepository};

// ============================================================================
// Rule Pack
// ============================================================================

/// A named, ordered collection of rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulePackSpec {
    /// Unique identifier across the store
    pub id: String,

    pub title: String,

    /// When set, none of the rules of this pack are evaluated
    #[serde(default, deserialize_with = "deserialize_bool_flexible")]
    pub disabled: bool,

    /// Customer scope (multi-tenant editions)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_nonempty"
    )]
    pub customer: Option<String>,

    /// Rules in matching order
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RulePackSpec {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            disabled: false,
            customer: None,
            rules: Vec::new(),
        }
    }

    /// Position of a rule within this pack
    pub fn rule_index(&self, rule_id: &str) -> Option<usize> {
        self.rules.iter().position(|r| r.id == rule_id)
    }
}

/// Sample pack created for a fresh installation
pub fn default_rule_pack(rules: Vec<Rule>) -> RulePackSpec {
    RulePackSpec {
        id: "default".to_string(),
        title: "Default rule pack".to_string(),
        disabled: false,
        customer: None,
        rules,
    }
}

// ============================================================================
// Rule
// ============================================================================

/// A single classification rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique identifier across the whole store
    pub id: String,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_nonempty"
    )]
    pub description: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_nonempty"
    )]
    pub comment: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_nonempty"
    )]
    pub docu_url: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "is_false",
        deserialize_with = "deserialize_bool_flexible"
    )]
    pub disabled: bool,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_optional_nonempty"
    )]
    pub customer: Option<String>,

    // ---- outcome ----
    /// `true` drops the message, `"skip_pack"` skips the rest of the pack
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_drop"
    )]
    pub drop: Option<DropMode>,

    #[serde(default)]
    pub state: RuleState,

    #[serde(default)]
    pub sl: ServiceLevelSpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_groups: Option<ContactGroups>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,

    #[serde(default = "bool_true")]
    pub actions_in_downtime: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cancel_actions: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_action_phases: Option<CancelActionPhases>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub autodelete: bool,

    // ---- aggregation ----
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<CountSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<ExpectSpec>,

    /// Delay event creation (seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub livetime: Option<Livetime>,

    // ---- conditions ----
    /// Message text, case-insensitive infix regex
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub match_text: Option<String>,

    /// Sites this rule applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_site: Option<Vec<String>>,

    /// Host name, case-insensitive complete match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_host: Option<String>,

    /// Source network `a.b.c.d/bits`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_ipaddress: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_application: Option<String>,

    /// Syslog priority range, either direction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_priority: Option<(u8, u8)>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_facility: Option<u8>,

    /// Service level range, either direction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_sl: Option<(u32, u32)>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_timeperiod: Option<String>,

    // ---- cancelling ----
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_ok: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_application: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_priority: Option<(u8, u8)>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub invert_matching: bool,

    // ---- rewriting ----
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_application: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_comment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_contact: Option<String>,
}

impl Rule {
    /// Rule with only an id set; state is taken from the syslog priority
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: None,
            comment: None,
            docu_url: None,
            disabled: false,
            customer: None,
            drop: None,
            state: RuleState::default(),
            sl: ServiceLevelSpec::default(),
            contact_groups: None,
            actions: Vec::new(),
            actions_in_downtime: true,
            cancel_actions: Vec::new(),
            cancel_action_phases: None,
            autodelete: false,
            count: None,
            expect: None,
            delay: None,
            livetime: None,
            match_text: None,
            match_site: None,
            match_host: None,
            match_ipaddress: None,
            match_application: None,
            match_priority: None,
            match_facility: None,
            match_sl: None,
            match_timeperiod: None,
            match_ok: None,
            cancel_application: None,
            cancel_priority: None,
            invert_matching: false,
            set_text: None,
            set_host: None,
            set_application: None,
            set_comment: None,
            set_contact: None,
        }
    }

    /// Whether any cancelling condition is configured
    pub fn has_cancel_condition(&self) -> bool {
        self.match_ok.is_some() || self.cancel_application.is_some() || self.cancel_priority.is_some()
    }

    /// All rewrite templates with their field names
    pub fn rewrite_fields(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("set_text", self.set_text.as_deref()),
            ("set_host", self.set_host.as_deref()),
            ("set_application", self.set_application.as_deref()),
            ("set_comment", self.set_comment.as_deref()),
            ("set_contact", self.set_contact.as_deref()),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
    }
}

// ============================================================================
// Outcome types
// ============================================================================

/// Drop directive of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropMode {
    /// Discard the message and stop rule processing
    Drop,
    /// Skip the remaining rules of the current pack
    SkipPack,
}

impl Serialize for DropMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            DropMode::Drop => serializer.serialize_bool(true),
            DropMode::SkipPack => serializer.serialize_str("skip_pack"),
        }
    }
}

/// `false`/missing -> None, `true` -> Drop, `"skip_pack"` -> SkipPack
fn deserialize_drop<'de, D>(deserializer: D) -> std::result::Result<Option<DropMode>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        String(String),
    }

    match Option::<BoolOrString>::deserialize(deserializer)? {
        None | Some(BoolOrString::Bool(false)) => Ok(None),
        Some(BoolOrString::Bool(true)) => Ok(Some(DropMode::Drop)),
        Some(BoolOrString::String(s)) if s == "skip_pack" => Ok(Some(DropMode::SkipPack)),
        Some(BoolOrString::String(s)) => Err(D::Error::custom(format!(
            "Invalid drop value '{}', expected true, false or \"skip_pack\"",
            s
        ))),
    }
}

/// Monitoring state of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MonitoringState {
    Ok = 0,
    Warn = 1,
    Crit = 2,
    Unknown = 3,
}

impl MonitoringState {
    pub fn code(self) -> i8 {
        self as i8
    }

    pub fn from_code(code: i8) -> Option<Self> {
        match code {
            0 => Some(Self::Ok),
            1 => Some(Self::Warn),
            2 => Some(Self::Crit),
            3 => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for MonitoringState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "OK",
            Self::Warn => "WARN",
            Self::Crit => "CRIT",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// State assigned to events created by a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RuleStateRepr", into = "RuleStateRepr")]
pub enum RuleState {
    Fixed(MonitoringState),
    /// Derived from the syslog priority (`-1` on the wire)
    FromSyslog,
    /// First pattern (CRIT, WARN, OK) matching the text wins, else UNKNOWN
    TextPattern(TextPatterns),
}

impl Default for RuleState {
    fn default() -> Self {
        Self::FromSyslog
    }
}

/// Text patterns of a `TextPattern` state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPatterns {
    #[serde(rename = "2", default, skip_serializing_if = "Option::is_none")]
    pub crit: Option<String>,
    #[serde(rename = "1", default, skip_serializing_if = "Option::is_none")]
    pub warn: Option<String>,
    #[serde(rename = "0", default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<String>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RuleStateRepr {
    Code(i8),
    Pattern { text_pattern: TextPatterns },
}

impl TryFrom<RuleStateRepr> for RuleState {
    type Error = String;

    fn try_from(repr: RuleStateRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            RuleStateRepr::Code(-1) => Ok(RuleState::FromSyslog),
            RuleStateRepr::Code(code) => MonitoringState::from_code(code)
                .map(RuleState::Fixed)
                .ok_or_else(|| format!("Invalid state {}, expected -1..3", code)),
            RuleStateRepr::Pattern { text_pattern } => Ok(RuleState::TextPattern(text_pattern)),
        }
    }
}

impl From<RuleState> for RuleStateRepr {
    fn from(state: RuleState) -> Self {
        match state {
            RuleState::Fixed(s) => RuleStateRepr::Code(s.code()),
            RuleState::FromSyslog => RuleStateRepr::Code(-1),
            RuleState::TextPattern(text_pattern) => RuleStateRepr::Pattern { text_pattern },
        }
    }
}

/// Service level assigned by a rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLevelSpec {
    #[serde(default)]
    pub value: u32,
    #[serde(default)]
    pub precedence: SlPrecedence,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlPrecedence {
    /// Keep the service level carried by the message
    #[default]
    Message,
    /// Always use the rule's service level
    Rule,
}

/// Contact groups attached to events of hosts unknown to the monitoring
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactGroups {
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default = "bool_true")]
    pub notify: bool,
    #[serde(default)]
    pub precedence: ContactPrecedence,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactPrecedence {
    #[default]
    Host,
    Rule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelActionPhases {
    Always,
    Open,
}

// ============================================================================
// Aggregation
// ============================================================================

/// Count messages in an interval before an event is created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountSpec {
    pub count: u32,
    /// Counting period (seconds)
    #[serde(default = "default_count_period")]
    pub period: u64,
    #[serde(default)]
    pub algorithm: CountAlgorithm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count_duration: Option<u64>,
    #[serde(default)]
    pub count_ack: bool,
    #[serde(default = "bool_true")]
    pub separate_host: bool,
    #[serde(default = "bool_true")]
    pub separate_application: bool,
    #[serde(default = "bool_true")]
    pub separate_match_groups: bool,
}

fn default_count_period() -> u64 {
    86400
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountAlgorithm {
    #[default]
    Interval,
    Tokenbucket,
    Dynabucket,
}

/// Expect a number of messages per interval, create an event otherwise
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectSpec {
    /// Interval length (seconds)
    pub interval: u64,
    /// Alignment offset for day/week intervals (hours)
    #[serde(default)]
    pub offset_hours: i32,
    pub count: u32,
    #[serde(default)]
    pub merge: ExpectMerge,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectMerge {
    /// Merge into an open, unacknowledged event
    #[default]
    Open,
    /// Merge into acknowledged events too
    Acked { reset_ack: bool },
    Never,
}

/// Automatic expiry of events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Livetime {
    pub seconds: u64,
    #[serde(default)]
    pub phases: Vec<LivetimePhase>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LivetimePhase {
    Open,
    Ack,
}

// ============================================================================
// Pack references and packaging state
// ============================================================================

/// A stored rule pack: owned inline, or a proxy for an MKP-provided pack
///
/// A proxy is dereferenced explicitly with [`RulePackRef::resolve`]; its id
/// is always available without loading the packaged copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RulePackRefRepr", into = "RulePackRefRepr")]
pub enum RulePackRef {
    Owned(RulePackSpec),
    MkpProxy {
        id: String,
        cached: Option<RulePackSpec>,
    },
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RulePackRefRepr {
    Proxy { mkp_proxy: String },
    Owned(RulePackSpec),
}

impl From<RulePackRefRepr> for RulePackRef {
    fn from(repr: RulePackRefRepr) -> Self {
        match repr {
            RulePackRefRepr::Proxy { mkp_proxy } => RulePackRef::proxy(mkp_proxy),
            RulePackRefRepr::Owned(spec) => RulePackRef::Owned(spec),
        }
    }
}

impl From<RulePackRef> for RulePackRefRepr {
    fn from(pack: RulePackRef) -> Self {
        match pack {
            RulePackRef::Owned(spec) => RulePackRefRepr::Owned(spec),
            RulePackRef::MkpProxy { id, .. } => RulePackRefRepr::Proxy { mkp_proxy: id },
        }
    }
}

impl RulePackRef {
    /// Unresolved proxy for the MKP-provided pack `id`
    pub fn proxy(id: impl Into<String>) -> Self {
        RulePackRef::MkpProxy {
            id: id.into(),
            cached: None,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            RulePackRef::Owned(spec) => &spec.id,
            RulePackRef::MkpProxy { id, .. } => id,
        }
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self, RulePackRef::MkpProxy { .. })
    }

    /// Pack content when it is available without I/O
    pub fn loaded(&self) -> Option<&RulePackSpec> {
        match self {
            RulePackRef::Owned(spec) => Some(spec),
            RulePackRef::MkpProxy { cached, .. } => cached.as_ref(),
        }
    }

    /// Pack content, loading the packaged copy of a proxy on first use
    pub fn resolve(&mut self, repository: &MkpRepository) -> Result<&RulePackSpec> {
        match self {
            RulePackRef::Owned(spec) => Ok(spec),
            RulePackRef::MkpProxy { id, cached } => {
                if cached.is_none() {
                    *cached = Some(repository.load_rule_pack(id)?);
                }
                cached
                    .as_ref()
                    .ok_or_else(|| RuleError::NotFound(format!("rule pack {}", id)))
            },
        }
    }

    /// Mutable pack content: the owned pack or the loaded copy of a proxy
    pub fn loaded_mut(&mut self) -> Option<&mut RulePackSpec> {
        match self {
            RulePackRef::Owned(spec) => Some(spec),
            RulePackRef::MkpProxy { cached, .. } => cached.as_mut(),
        }
    }

    /// Mutable access to an owned pack; proxies must be overridden first
    pub fn owned_mut(&mut self) -> Result<&mut RulePackSpec> {
        match self {
            RulePackRef::Owned(spec) => Ok(spec),
            RulePackRef::MkpProxy { id, .. } => Err(RuleError::InvalidState(format!(
                "Rule pack {} is provided by an extension package and cannot be edited directly",
                id
            ))),
        }
    }
}

/// Packaging state of a rule pack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RulePackType {
    /// Plain pack owned by the store
    Internal,
    /// Owned by the store and exported for packaging
    Exported,
    /// Provided by an installed package, not edited locally
    UnmodifiedMkp,
    /// Provided by a package and overridden by a local copy
    ModifiedMkp,
}

impl RulePackType {
    /// Packaging state of `pack`, computed without dereferencing proxies
    pub fn type_of(pack: &RulePackRef, index: &MkpIndex) -> Self {
        match pack {
            RulePackRef::MkpProxy { id, .. } => match index.package_of(id) {
                Some(_) => RulePackType::UnmodifiedMkp,
                None => RulePackType::Exported,
            },
            RulePackRef::Owned(spec) => {
                if index.contains(&spec.id) {
                    RulePackType::ModifiedMkp
                } else {
                    RulePackType::Internal
                }
            },
        }
    }
}

impl fmt::Display for RulePackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Internal => "internal",
            Self::Exported => "exported",
            Self::UnmodifiedMkp => "unmodified_mkp",
            Self::ModifiedMkp => "modified_mkp",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Event
// ============================================================================

/// A message as seen by the rule matcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    pub text: String,
    pub host: String,
    pub ipaddress: String,
    pub application: String,
    /// Syslog priority 0 (emerg) .. 7 (debug)
    pub priority: u8,
    /// Syslog facility 0..31
    pub facility: u8,
    /// Service level carried by the message
    pub sl: Option<u32>,
    /// Site that received the message; the local site when unset
    pub site: Option<String>,
    /// Contact carried by the message
    pub contact: Option<String>,
    pub time: DateTime<Utc>,
}

impl Default for Event {
    fn default() -> Self {
        Self {
            text: String::new(),
            host: String::new(),
            ipaddress: String::new(),
            application: String::new(),
            priority: 5,
            facility: 1,
            sl: None,
            site: None,
            contact: None,
            time: Utc::now(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rule_wire_format() {
        let rule: Rule = serde_json::from_value(json!({
            "id": "ora",
            "match": "ORA-\\d+",
            "state": 2,
            "drop": "skip_pack",
            "match_priority": [0, 3],
            "sl": {"value": 10, "precedence": "rule"}
        }))
        .unwrap();

        assert_eq!(rule.match_text.as_deref(), Some("ORA-\\d+"));
        assert_eq!(rule.state, RuleState::Fixed(MonitoringState::Crit));
        assert_eq!(rule.drop, Some(DropMode::SkipPack));
        assert_eq!(rule.match_priority, Some((0, 3)));
        assert_eq!(rule.sl.precedence, SlPrecedence::Rule);
        assert!(rule.actions_in_downtime);

        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(value["drop"], json!("skip_pack"));
        assert_eq!(value["state"], json!(2));
        assert!(value.get("disabled").is_none());
    }

    #[test]
    fn test_drop_and_state_variants() {
        let rule: Rule = serde_json::from_value(json!({"id": "a", "drop": false})).unwrap();
        assert_eq!(rule.drop, None);
        assert_eq!(rule.state, RuleState::FromSyslog);

        let rule: Rule = serde_json::from_value(json!({"id": "b", "drop": true})).unwrap();
        assert_eq!(serde_json::to_value(&rule).unwrap()["drop"], json!(true));

        let rule: Rule = serde_json::from_value(json!({
            "id": "c",
            "state": {"text_pattern": {"2": "fatal", "0": "recovered"}}
        }))
        .unwrap();
        match &rule.state {
            RuleState::TextPattern(p) => {
                assert_eq!(p.crit.as_deref(), Some("fatal"));
                assert_eq!(p.warn, None);
            },
            other => panic!("unexpected state {:?}", other),
        }

        assert!(serde_json::from_value::<Rule>(json!({"id": "d", "state": 7})).is_err());
        assert!(serde_json::from_value::<Rule>(json!({"id": "e", "drop": "sometimes"})).is_err());
    }

    #[test]
    fn test_rule_pack_ref_wire_format() {
        let packs: Vec<RulePackRef> = serde_json::from_value(json!([
            {"mkp_proxy": "vendor"},
            {"id": "local", "title": "Local", "disabled": "no", "rules": []}
        ]))
        .unwrap();

        assert!(packs[0].is_proxy());
        assert_eq!(packs[0].id(), "vendor");
        assert!(packs[0].loaded().is_none());
        assert_eq!(packs[1].loaded().unwrap().title, "Local");

        let cached = RulePackRef::MkpProxy {
            id: "vendor".into(),
            cached: Some(RulePackSpec::new("vendor", "Vendor")),
        };
        assert_eq!(
            serde_json::to_value(&cached).unwrap(),
            json!({"mkp_proxy": "vendor"})
        );
    }

    #[test]
    fn test_type_of() {
        let mut index = MkpIndex::default();
        index.insert("exported", None);
        index.insert("vendor", Some("vendor-pkg".to_string()));

        let owned = RulePackRef::Owned(RulePackSpec::new("local", "Local"));
        assert_eq!(RulePackType::type_of(&owned, &index), RulePackType::Internal);

        let proxy = RulePackRef::proxy("exported");
        assert_eq!(RulePackType::type_of(&proxy, &index), RulePackType::Exported);

        let proxy = RulePackRef::proxy("vendor");
        assert_eq!(RulePackType::type_of(&proxy, &index), RulePackType::UnmodifiedMkp);

        let modified = RulePackRef::Owned(RulePackSpec::new("vendor", "Vendor"));
        assert_eq!(RulePackType::type_of(&modified, &index), RulePackType::ModifiedMkp);
    }

    #[test]
    fn test_owned_mut_rejects_proxy() {
        let mut proxy = RulePackRef::proxy("vendor");
        assert!(matches!(proxy.owned_mut(), Err(RuleError::InvalidState(_))));
        assert_eq!(default_rule_pack(vec![]).id, "default");
    }
}
