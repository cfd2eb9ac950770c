//! Classification and rewriting of matched events
//!
//! After a rule opened an event, the event gets its monitoring state and
//! service level and the rule's `set_*` templates are applied. Templates
//! may refer to the original value (`\0`), to message groups (`\1`..`\9`)
//! and to named groups (`$MATCH_GROUPS_MESSAGE_1$`,
//! `$MATCH_GROUPS_SYSLOG_APPLICATION_1$`, ...).

use serde::Serialize;

use crate::error::Result;
use crate::matcher::MatchGroups;
use crate::pattern::{MatchMode, MatchPattern};
use crate::types::{Event, MonitoringState, Rule, RuleState, SlPrecedence};

/// Event fields after classification and rewriting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub state: MonitoringState,
    pub sl: u32,
    pub text: String,
    pub host: String,
    /// Host before `set_host` rewrote it
    pub orig_host: Option<String>,
    pub application: String,
    pub comment: Option<String>,
    pub contact: Option<String>,
}

/// State for an event created by `rule`
pub fn monitoring_state(state: &RuleState, event: &Event) -> Result<MonitoringState> {
    match state {
        RuleState::Fixed(s) => Ok(*s),
        RuleState::FromSyslog => Ok(match event.priority {
            p if p >= 5 => MonitoringState::Ok,
            p if p < 4 => MonitoringState::Crit,
            _ => MonitoringState::Warn,
        }),
        RuleState::TextPattern(patterns) => {
            let candidates = [
                (MonitoringState::Crit, &patterns.crit),
                (MonitoringState::Warn, &patterns.warn),
                (MonitoringState::Ok, &patterns.ok),
            ];
            for (state, pattern) in candidates {
                let Some(value) = pattern else { continue };
                let Some(compiled) = MatchPattern::compile("state", value, MatchMode::Infix)? else {
                    continue;
                };
                if compiled.captures(&event.text, MatchMode::Infix).is_some() {
                    return Ok(state);
                }
            }
            Ok(MonitoringState::Unknown)
        },
    }
}

/// Apply `rule` to a matched `event`
pub fn classify(rule: &Rule, event: &Event, groups: &MatchGroups) -> Result<Classification> {
    let state = monitoring_state(&rule.state, event)?;

    let sl = match (event.sl, rule.sl.precedence) {
        (Some(sl), SlPrecedence::Message) => sl,
        _ => rule.sl.value,
    };

    let comment = rule
        .set_comment
        .as_deref()
        .map(|t| replace_groups(t, &event.text, groups));

    let text = match &rule.set_text {
        Some(t) => replace_groups(t, &event.text, groups),
        None => event.text.clone(),
    };

    let (host, orig_host) = match &rule.set_host {
        Some(t) => (
            replace_groups(t, &event.host, groups),
            Some(event.host.clone()),
        ),
        None => (event.host.clone(), None),
    };

    let application = match &rule.set_application {
        Some(t) => replace_groups(t, &event.application, groups),
        None => event.application.clone(),
    };

    let contact = match (&event.contact, &rule.set_contact) {
        (Some(contact), _) => Some(contact.clone()),
        (None, Some(t)) => Some(replace_groups(t, "", groups)),
        (None, None) => None,
    };

    Ok(Classification {
        state,
        sl,
        text,
        host,
        orig_host,
        application,
        comment,
        contact,
    })
}

/// Expand group references in a rewrite template
/// Higher group numbers go first so `\1` never eats the prefix of `\10`.
/// Higher group numbers go first so `\\1` never eats the prefix of `\\10`.
pub fn replace_groups(template: &str, original: &str, groups: &MatchGroups) -> String {
    let mut text = template.replace("\\0", original);

    if let Some(message) = &groups.message {
        for (nr, group) in message.iter().enumerate().rev() {
            text = text.replace(&format!("\\{}", nr + 1), group);
        }
    }

    for (prefix, values) in groups.named() {
        let Some(values) = values else { continue };
        for (idx, value) in values.iter().enumerate().rev() {
            text = text.replace(&format!("${}_{}$", prefix, idx + 1), value);
        }
    }

    text
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::types::{ServiceLevelSpec, TextPatterns};

    fn event(text: &str, priority: u8) -> Event {
        Event {
            text: text.to_string(),
            host: "db1".to_string(),
            application: "oracle".to_string(),
            priority,
            ..Event::default()
        }
    }

    #[test]
    fn test_state_from_syslog() {
        let s = RuleState::FromSyslog;
        assert_eq!(monitoring_state(&s, &event("", 6)).unwrap(), MonitoringState::Ok);
        assert_eq!(monitoring_state(&s, &event("", 5)).unwrap(), MonitoringState::Ok);
        assert_eq!(monitoring_state(&s, &event("", 4)).unwrap(), MonitoringState::Warn);
        assert_eq!(monitoring_state(&s, &event("", 3)).unwrap(), MonitoringState::Crit);
    }

    #[test]
    fn test_state_from_text_pattern() {
        let s = RuleState::TextPattern(TextPatterns {
            crit: Some("fatal".into()),
            warn: Some("warn.*disk".into()),
            ok: Some("".into()),
        });
        assert_eq!(monitoring_state(&s, &event("FATAL: x", 5)).unwrap(), MonitoringState::Crit);
        assert_eq!(monitoring_state(&s, &event("Warning: disk", 5)).unwrap(), MonitoringState::Warn);
        assert_eq!(monitoring_state(&s, &event("hello", 5)).unwrap(), MonitoringState::Unknown);
    }

    #[test]
    fn test_replace_groups() {
        let groups = MatchGroups {
            message: Some(vec!["600".into(), "db".into()]),
            syslog_application: Some(vec!["ora".into()]),
            ..MatchGroups::default()
        };
        assert_eq!(
            replace_groups("\\0 [code \\1 on \\2]", "orig", &groups),
            "orig [code 600 on db]"
        );
        assert_eq!(
            replace_groups(
                "$MATCH_GROUPS_MESSAGE_1$/$MATCH_GROUPS_SYSLOG_APPLICATION_1$/$MATCH_GROUPS_MESSAGE_OK_1$",
                "",
                &groups
            ),
            "600/ora/$MATCH_GROUPS_MESSAGE_OK_1$"
        );
    }

    #[test]
    fn test_replace_groups_beyond_nine() {
        let groups = MatchGroups {
            message: Some((1..=11).map(|nr| format!("g{}", nr)).collect()),
            ..MatchGroups::default()
        };
        assert_eq!(
            replace_groups("\\10-\\1-\\11", "", &groups),
            "g10-g1-g11"
        );
    }

    #[test]
    fn test_classify_rewrites() {
        let mut rule = Rule::new("r");
        rule.state = RuleState::Fixed(MonitoringState::Crit);
        rule.sl = ServiceLevelSpec {
            value: 20,
            precedence: SlPrecedence::Message,
        };
        rule.set_host = Some("\\2.example.com".into());
        rule.set_text = Some("Oracle error \\1".into());
        rule.set_contact = Some("dba-\\2".into());

        let groups = MatchGroups {
            message: Some(vec!["600".into(), "prod".into()]),
            ..MatchGroups::default()
        };
        let mut e = event("ORA-600 on prod", 5);
        let c = classify(&rule, &e, &groups).unwrap();
        assert_eq!(c.state, MonitoringState::Crit);
        assert_eq!(c.sl, 20);
        assert_eq!(c.host, "prod.example.com");
        assert_eq!(c.orig_host.as_deref(), Some("db1"));
        assert_eq!(c.text, "Oracle error 600");
        assert_eq!(c.contact.as_deref(), Some("dba-prod"));

        e.sl = Some(5);
        e.contact = Some("oncall".into());
        let c = classify(&rule, &e, &groups).unwrap();
        assert_eq!(c.sl, 5);
        assert_eq!(c.contact.as_deref(), Some("oncall"));

        rule.sl.precedence = SlPrecedence::Rule;
        assert_eq!(classify(&rule, &e, &groups).unwrap().sl, 20);
    }
}
