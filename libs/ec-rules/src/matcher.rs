//! Rule matching predicate
//!
//! `RuleMatcher::matches` decides whether one rule of one pack applies to
//! an event. The result is either a success (with the cancelling flag and
//! the regex groups of the match) or a failure carrying a human readable
//! reason, used by the simulator to explain non-matches.
//!
//! Order of evaluation:
//! 1. pack / rule enabled, customer scope
//! 2. generic conditions (site, host, source IP, facility, service level,
//!    time period)
//! 3. syslog priority (positive and cancelling range)
//! 4. application and message groups
//! 5. cancelling outcome, else creating outcome
//! 6. `invert_matching` negates the whole result

use std::net::IpAddr;
use tracing::trace;

use crate::error::Result;
use crate::pattern::{match_optional, MatchMode, MatchPattern};
use crate::types::{Event, Rule, RulePackSpec};

/// Customer scope that applies to every site
pub const SCOPE_GLOBAL: &str = "global";

// ============================================================================
// Context
// ============================================================================

/// Time period lookup used by `match_timeperiod`
pub trait TimePeriods: Send + Sync {
    fn is_active(&self, name: &str) -> bool;
}

/// Treats every time period as active
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysActive;

impl TimePeriods for AlwaysActive {
    fn is_active(&self, _name: &str) -> bool {
        true
    }
}

/// Time periods with a fixed active set
#[derive(Debug, Clone, Default)]
pub struct StaticTimePeriods {
    pub active: Vec<String>,
}

impl TimePeriods for StaticTimePeriods {
    fn is_active(&self, name: &str) -> bool {
        self.active.iter().any(|p| p == name)
    }
}

/// Site the matcher runs on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchContext {
    pub site_id: String,
    /// Customer of the site; `None` disables customer scoping
    pub site_customer: Option<String>,
}

// ============================================================================
// Results
// ============================================================================

/// Regex groups collected while matching
///
/// `None` means the condition is not configured or did not match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchGroups {
    pub message: Option<Vec<String>>,
    pub message_ok: Option<Vec<String>>,
    pub syslog_application: Option<Vec<String>>,
    pub syslog_application_ok: Option<Vec<String>>,
}

impl MatchGroups {
    /// Groups shown for a match: the cancelling text groups of a
    /// cancelling match, the message groups otherwise
    pub fn decisive(&self, cancelling: bool) -> &[String] {
        let groups = if cancelling {
            self.message_ok.as_ref().or(self.message.as_ref())
        } else {
            self.message.as_ref()
        };
        groups.map(Vec::as_slice).unwrap_or(&[])
    }

    /// Named group sets for `$MATCH_GROUPS_<NAME>_<n>$` placeholders
    pub fn named(&self) -> [(&'static str, Option<&Vec<String>>); 4] {
        [
            ("MATCH_GROUPS_MESSAGE", self.message.as_ref()),
            ("MATCH_GROUPS_MESSAGE_OK", self.message_ok.as_ref()),
            ("MATCH_GROUPS_SYSLOG_APPLICATION", self.syslog_application.as_ref()),
            ("MATCH_GROUPS_SYSLOG_APPLICATION_OK", self.syslog_application_ok.as_ref()),
        ]
    }
}

/// Outcome of matching one rule against one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResult {
    Success {
        /// The event closes a previously opened event
        cancelling: bool,
        groups: MatchGroups,
    },
    Failure {
        reason: String,
    },
}

impl MatchResult {
    fn failure(reason: impl Into<String>) -> Self {
        MatchResult::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, MatchResult::Success { .. })
    }
}

// ============================================================================
// Compiled rule
// ============================================================================

/// Match values of a rule, compiled once
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub match_text: Option<MatchPattern>,
    pub match_ok: Option<MatchPattern>,
    pub match_host: Option<MatchPattern>,
    pub match_application: Option<MatchPattern>,
    pub cancel_application: Option<MatchPattern>,
}

impl CompiledRule {
    pub fn compile(rule: &Rule) -> Result<Self> {
        fn field(key: &str, value: &Option<String>, mode: MatchMode) -> Result<Option<MatchPattern>> {
            match value {
                Some(v) => MatchPattern::compile(key, v, mode),
                None => Ok(None),
            }
        }

        Ok(Self {
            match_text: field("match", &rule.match_text, MatchMode::Infix)?,
            match_ok: field("match_ok", &rule.match_ok, MatchMode::Infix)?,
            match_host: field("match_host", &rule.match_host, MatchMode::Complete)?,
            match_application: field("match_application", &rule.match_application, MatchMode::Infix)?,
            cancel_application: field(
                "cancel_application",
                &rule.cancel_application,
                MatchMode::Infix,
            )?,
        })
    }
}

// ============================================================================
// Matcher
// ============================================================================

struct PriorityMatch {
    has_match: bool,
    has_canceling_match: bool,
}

/// Rule matcher bound to a site and a time period source
pub struct RuleMatcher<'a> {
    context: &'a MatchContext,
    time_periods: &'a dyn TimePeriods,
}

impl<'a> RuleMatcher<'a> {
    pub fn new(context: &'a MatchContext, time_periods: &'a dyn TimePeriods) -> Self {
        Self {
            context,
            time_periods,
        }
    }

    /// Match `rule` of `pack` against `event`
    ///
    /// A rule whose match values do not compile never matches.
    pub fn matches(&self, pack: &RulePackSpec, rule: &Rule, event: &Event) -> MatchResult {
        match CompiledRule::compile(rule) {
            Ok(compiled) => self.matches_compiled(pack, rule, &compiled, event),
            Err(e) => MatchResult::failure(format!("The rule cannot be used: {}", e)),
        }
    }

    pub fn matches_compiled(
        &self,
        pack: &RulePackSpec,
        rule: &Rule,
        compiled: &CompiledRule,
        event: &Event,
    ) -> MatchResult {
        if pack.disabled {
            return MatchResult::failure("The rule pack is disabled");
        }
        if rule.disabled {
            return MatchResult::failure("The rule is disabled");
        }
        if !self.customer_matches(pack, rule) {
            return MatchResult::failure("Wrong customer");
        }

        trace!("Trying rule {}/{}", pack.id, rule.id);
        let result = self.matches_non_inverted(rule, compiled, event);

        if !rule.invert_matching {
            return result;
        }
        match result {
            MatchResult::Failure { .. } => {
                trace!("Rule would not match, but due to inverted matching does");
                MatchResult::Success {
                    cancelling: false,
                    groups: MatchGroups::default(),
                }
            },
            MatchResult::Success { .. } => {
                trace!("Rule would match, but due to inverted matching does not");
                MatchResult::failure("The rule would match, but matching is inverted")
            },
        }
    }

    fn customer_matches(&self, pack: &RulePackSpec, rule: &Rule) -> bool {
        let Some(site_customer) = self.context.site_customer.as_deref() else {
            return true;
        };
        let rule_customer = pack
            .customer
            .as_deref()
            .or(rule.customer.as_deref())
            .unwrap_or(SCOPE_GLOBAL);
        rule_customer == SCOPE_GLOBAL || rule_customer == site_customer
    }

    fn matches_non_inverted(
        &self,
        rule: &Rule,
        compiled: &CompiledRule,
        event: &Event,
    ) -> MatchResult {
        if let Some(reason) = self.generic_failure(rule, compiled, event) {
            return MatchResult::failure(reason);
        }

        let priority = determine_match_priority(rule, event.priority);
        if !priority.has_match && !priority.has_canceling_match {
            return MatchResult::failure(format!(
                "Did not match because of wrong syslog priority {}",
                event.priority
            ));
        }

        let mut groups = MatchGroups::default();

        // Syslog application, only when one of the application conditions is set
        if compiled.match_application.is_some() || compiled.cancel_application.is_some() {
            if let Some(p) = &compiled.match_application {
                groups.syslog_application = p.captures(&event.application, MatchMode::Infix);
            }
            if let Some(p) = &compiled.cancel_application {
                groups.syslog_application_ok = p.captures(&event.application, MatchMode::Infix);
            }
            if groups.syslog_application.is_none() && groups.syslog_application_ok.is_none() {
                return MatchResult::failure("Did not match, syslog application does not match");
            }
        }

        // Message text, always active
        groups.message = match_optional(compiled.match_text.as_ref(), &event.text, MatchMode::Infix);
        if let Some(p) = &compiled.match_ok {
            groups.message_ok = p.captures(&event.text, MatchMode::Infix);
        }
        if groups.message.is_none() && groups.message_ok.is_none() {
            return MatchResult::failure("Did not match, message text does not match");
        }

        let has_canceling_condition = compiled.match_ok.is_some()
            || compiled.cancel_application.is_some()
            || rule.cancel_priority.is_some();

        if has_canceling_condition
            && (compiled.match_ok.is_none() || groups.message_ok.is_some())
            && (compiled.cancel_application.is_none() || groups.syslog_application_ok.is_some())
            && (rule.cancel_priority.is_none() || priority.has_canceling_match)
        {
            trace!("Found cancelling event");
            return MatchResult::Success {
                cancelling: true,
                groups,
            };
        }

        let application_ok =
            compiled.match_application.is_none() || groups.syslog_application.is_some();
        if groups.message.is_some() && application_ok && priority.has_match {
            trace!("Found new event");
            return MatchResult::Success {
                cancelling: false,
                groups,
            };
        }

        let mut reasons = Vec::new();
        if groups.message.is_none() {
            reasons.push("wrong message");
        }
        if !application_ok {
            reasons.push("wrong syslog application");
        }
        if !priority.has_match {
            reasons.push("wrong syslog priority");
        }
        if has_canceling_condition {
            if compiled.match_ok.is_some() && groups.message_ok.is_none() {
                reasons.push("wrong cancelling message");
            }
            if compiled.cancel_application.is_some() && groups.syslog_application_ok.is_none() {
                reasons.push("wrong cancelling syslog application");
            }
            if rule.cancel_priority.is_some() && !priority.has_canceling_match {
                reasons.push("wrong cancel priority");
            }
        }
        MatchResult::failure(format!(
            "Did not create or cancel an event because of {}",
            reasons.join(", ")
        ))
    }

    /// Reason why a generic condition fails, `None` when all hold
    fn generic_failure(&self, rule: &Rule, compiled: &CompiledRule, event: &Event) -> Option<String> {
        if let Some(sites) = &rule.match_site {
            let site = event.site.as_deref().unwrap_or(&self.context.site_id);
            if !sites.iter().any(|s| s == site) {
                return Some(format!("The rule does not apply to site {}", site));
            }
        }

        if let Some(host) = &compiled.match_host {
            if host.captures(&event.host, MatchMode::Complete).is_none() {
                return Some(format!(
                    "Did not match because of wrong host '{}' (need '{}')",
                    event.host,
                    host.as_str()
                ));
            }
        }

        let network = rule.match_ipaddress.as_deref().unwrap_or("0.0.0.0/0");
        if !match_ip_network(network, &event.ipaddress) {
            return Some(format!(
                "Did not match because of wrong source IP address '{}' (need '{}')",
                event.ipaddress, network
            ));
        }

        if let Some(facility) = rule.match_facility {
            if event.facility != facility {
                return Some(format!(
                    "Did not match because of wrong syslog facility {} (need {})",
                    event.facility, facility
                ));
            }
        }

        if let Some((from, to)) = rule.match_sl {
            let (from, to) = if from > to { (to, from) } else { (from, to) };
            let sl = event.sl.unwrap_or(0);
            if sl < from || sl > to {
                return Some(format!(
                    "Did not match because of wrong service level {} (need {}..{})",
                    sl, from, to
                ));
            }
        }

        if let Some(period) = &rule.match_timeperiod {
            if !self.time_periods.is_active(period) {
                return Some(format!(
                    "Did not match, because timeperiod {} is not active",
                    period
                ));
            }
        }

        None
    }
}

fn in_sorted_range((a, b): (u8, u8), value: u8) -> bool {
    let (from, to) = if a > b { (b, a) } else { (a, b) };
    from <= value && value <= to
}

fn determine_match_priority(rule: &Rule, priority: u8) -> PriorityMatch {
    PriorityMatch {
        has_match: rule
            .match_priority
            .is_none_or(|range| in_sorted_range(range, priority)),
        has_canceling_match: rule
            .cancel_priority
            .is_some_and(|range| in_sorted_range(range, priority)),
    }
}

// ============================================================================
// IP networks
// ============================================================================

/// Parse `address[/bits]`; bits default to the full address length
pub fn parse_ip_network(text: &str) -> Option<(IpAddr, u8)> {
    let text = text.trim();
    let (addr, bits) = match text.split_once('/') {
        Some((addr, bits)) => (addr, Some(bits)),
        None => (text, None),
    };
    let addr: IpAddr = addr.trim().parse().ok()?;
    let max_bits = if addr.is_ipv4() { 32 } else { 128 };
    let bits = match bits {
        Some(b) => b.trim().parse::<u8>().ok()?,
        None => max_bits,
    };
    (bits <= max_bits).then_some((addr, bits))
}

/// Whether `address` lies within `network`
///
/// A zero-bit network matches anything, even an empty address; an
/// unparsable address never matches.
pub fn match_ip_network(network: &str, address: &str) -> bool {
    let Some((net, bits)) = parse_ip_network(network) else {
        return false;
    };
    if bits == 0 {
        return true;
    }
    let Ok(addr) = address.trim().parse::<IpAddr>() else {
        return false;
    };

    match (net, addr) {
        (IpAddr::V4(net), IpAddr::V4(addr)) => {
            let mask = u32::MAX << (32 - u32::from(bits));
            (u32::from(net) & mask) == (u32::from(addr) & mask)
        },
        (IpAddr::V6(net), IpAddr::V6(addr)) => {
            let mask = u128::MAX << (128 - u32::from(bits));
            (u128::from(net) & mask) == (u128::from(addr) & mask)
        },
        _ => false,
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::types::RulePackSpec;

    fn context() -> MatchContext {
        MatchContext {
            site_id: "central".to_string(),
            site_customer: None,
        }
    }

    fn event(text: &str) -> Event {
        Event {
            text: text.to_string(),
            host: "db1".to_string(),
            ipaddress: "10.1.2.3".to_string(),
            application: "oracle".to_string(),
            priority: 4,
            facility: 1,
            ..Event::default()
        }
    }

    fn run(rule: &Rule, event: &Event) -> MatchResult {
        let ctx = context();
        let matcher = RuleMatcher::new(&ctx, &AlwaysActive);
        matcher.matches(&RulePackSpec::new("p", "P"), rule, event)
    }

    #[test]
    fn test_rule_without_conditions_matches() {
        let result = run(&Rule::new("any"), &event("whatever"));
        assert_eq!(
            result,
            MatchResult::Success {
                cancelling: false,
                groups: MatchGroups {
                    message: Some(vec![]),
                    ..MatchGroups::default()
                }
            }
        );
    }

    #[test]
    fn test_message_groups() {
        let mut rule = Rule::new("ora");
        rule.match_text = Some("ORA-(\\d+)".into());
        match run(&rule, &event("ora-600 error")) {
            MatchResult::Success { cancelling, groups } => {
                assert!(!cancelling);
                assert_eq!(groups.decisive(false), &["600".to_string()]);
            },
            other => panic!("unexpected {:?}", other),
        }
        assert!(!run(&rule, &event("all fine")).is_success());
    }

    #[test]
    fn test_cancelling_match() {
        let mut rule = Rule::new("link");
        rule.match_text = Some("link down".into());
        rule.match_ok = Some("link (up)".into());

        match run(&rule, &event("eth0: link up")) {
            MatchResult::Success { cancelling, groups } => {
                assert!(cancelling);
                assert_eq!(groups.decisive(true), &["up".to_string()]);
            },
            other => panic!("unexpected {:?}", other),
        }
        match run(&rule, &event("eth0: link down")) {
            MatchResult::Success { cancelling, .. } => assert!(!cancelling),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_cancel_priority_requires_all_cancel_conditions() {
        let mut rule = Rule::new("prio");
        rule.match_priority = Some((0, 3));
        rule.cancel_priority = Some((7, 5));

        let mut e = event("x");
        e.priority = 6;
        assert_eq!(
            run(&rule, &e),
            MatchResult::Success {
                cancelling: true,
                groups: MatchGroups {
                    message: Some(vec![]),
                    ..MatchGroups::default()
                }
            }
        );

        e.priority = 4;
        assert!(matches!(run(&rule, &e), MatchResult::Failure { .. }));

        // reversed range direction is accepted
        e.priority = 2;
        rule.match_priority = Some((3, 0));
        assert!(matches!(
            run(&rule, &e),
            MatchResult::Success { cancelling: false, .. }
        ));
    }

    #[test]
    fn test_application_conditions() {
        let mut rule = Rule::new("app");
        rule.match_application = Some("sshd".into());
        match run(&rule, &event("login")) {
            MatchResult::Failure { reason } => assert!(reason.contains("syslog application")),
            other => panic!("unexpected {:?}", other),
        }

        rule.cancel_application = Some("oracle".into());
        assert!(matches!(
            run(&rule, &event("login")),
            MatchResult::Success { cancelling: true, .. }
        ));
    }

    #[test]
    fn test_generic_conditions() {
        let mut rule = Rule::new("generic");
        rule.match_host = Some("DB.".into());
        assert!(run(&rule, &event("x")).is_success());

        rule.match_ipaddress = Some("10.1.0.0/16".into());
        assert!(run(&rule, &event("x")).is_success());
        rule.match_ipaddress = Some("10.2.0.0/16".into());
        assert!(!run(&rule, &event("x")).is_success());
        rule.match_ipaddress = None;

        rule.match_facility = Some(4);
        assert!(!run(&rule, &event("x")).is_success());
        rule.match_facility = None;

        rule.match_sl = Some((20, 10));
        let mut e = event("x");
        assert!(!run(&rule, &e).is_success());
        e.sl = Some(15);
        assert!(run(&rule, &e).is_success());
        rule.match_sl = None;

        rule.match_site = Some(vec!["branch".into()]);
        assert!(!run(&rule, &e).is_success());
        e.site = Some("branch".into());
        assert!(run(&rule, &e).is_success());
    }

    #[test]
    fn test_timeperiod() {
        let mut rule = Rule::new("tp");
        rule.match_timeperiod = Some("workhours".into());
        let ctx = context();
        let periods = StaticTimePeriods::default();
        let matcher = RuleMatcher::new(&ctx, &periods);
        let result = matcher.matches(&RulePackSpec::new("p", "P"), &rule, &event("x"));
        assert!(matches!(result, MatchResult::Failure { reason } if reason.contains("workhours")));

        let periods = StaticTimePeriods {
            active: vec!["workhours".into()],
        };
        let matcher = RuleMatcher::new(&ctx, &periods);
        assert!(matcher
            .matches(&RulePackSpec::new("p", "P"), &rule, &event("x"))
            .is_success());
    }

    #[test]
    fn test_inverted_matching() {
        let mut rule = Rule::new("inv");
        rule.match_text = Some("(error)".into());
        rule.invert_matching = true;

        assert_eq!(
            run(&rule, &event("all good")),
            MatchResult::Success {
                cancelling: false,
                groups: MatchGroups::default()
            }
        );
        assert!(!run(&rule, &event("an error")).is_success());
    }

    #[test]
    fn test_disabled_and_customer() {
        let mut pack = RulePackSpec::new("p", "P");
        let rule = Rule::new("r");
        let ctx = MatchContext {
            site_id: "central".into(),
            site_customer: Some("acme".into()),
        };
        let matcher = RuleMatcher::new(&ctx, &AlwaysActive);
        assert!(matcher.matches(&pack, &rule, &event("x")).is_success());

        pack.customer = Some("other".into());
        assert_eq!(
            matcher.matches(&pack, &rule, &event("x")),
            MatchResult::Failure {
                reason: "Wrong customer".into()
            }
        );

        pack.customer = Some("acme".into());
        pack.disabled = true;
        assert!(!matcher.matches(&pack, &rule, &event("x")).is_success());
    }

    #[test]
    fn test_ip_networks() {
        assert!(match_ip_network("0.0.0.0/0", ""));
        assert!(match_ip_network("192.168.1.7", "192.168.1.7"));
        assert!(!match_ip_network("192.168.1.7", "192.168.1.8"));
        assert!(match_ip_network("192.168.0.0/23", "192.168.1.200"));
        assert!(!match_ip_network("192.168.0.0/24", "not-an-ip"));
        assert!(match_ip_network("2001:db8::/32", "2001:db8::1"));
        assert!(!match_ip_network("2001:db8::/32", "10.0.0.1"));
        assert!(parse_ip_network("10.0.0.0/33").is_none());
    }
}
