//! Edit-time validation of rules and rule packs
//!
//! Every check reports a user error attached to the offending field.
//! Validation runs before a mutation touches the store.

use regex::Regex;

use crate::error::{Result, RuleError};
use crate::matcher::{parse_ip_network, CompiledRule};
use crate::pattern::{MatchMode, MatchPattern};
use crate::types::{Rule, RulePackRef, RulePackSpec, RuleState};

/// Maximum number of subgroups in the `match` expression
pub const MAX_MATCH_GROUPS: usize = 9;

/// Ids use letters, digits, `_` and `-`
pub fn validate_id(field: &str, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(RuleError::user(field, "Please specify an ID."));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(RuleError::user(
            field,
            format!(
                "The ID \"{}\" contains invalid characters. Only letters, digits, \"_\" and \"-\" are allowed.",
                id
            ),
        ));
    }
    Ok(())
}

/// Number of subgroups of the `match` expression
pub fn match_group_count(rule: &Rule) -> Result<usize> {
    match rule.match_text.as_deref().map(str::trim) {
        None | Some("") => Ok(0),
        Some(text) => Regex::new(text)
            .map(|re| re.captures_len().saturating_sub(1))
            .map_err(|_| RuleError::user("match", "Invalid regular expression")),
    }
}

/// Check a rule on its own
pub fn validate_rule(rule: &Rule) -> Result<()> {
    validate_id("id", &rule.id)?;

    let num_groups = match_group_count(rule)?;
    if num_groups > MAX_MATCH_GROUPS {
        return Err(RuleError::user(
            "match",
            "Your matching text has too many regular expression subgroups. Only nine are allowed.",
        ));
    }

    // All match values must compile the way the matcher uses them
    CompiledRule::compile(rule)?;
    if let RuleState::TextPattern(patterns) = &rule.state {
        for value in [&patterns.crit, &patterns.warn, &patterns.ok].into_iter().flatten() {
            MatchPattern::compile("state", value, MatchMode::Infix)?;
        }
    }

    if let Some(network) = &rule.match_ipaddress {
        if parse_ip_network(network).is_none() {
            return Err(RuleError::user(
                "match_ipaddress",
                format!("Invalid IP network \"{}\"", network),
            ));
        }
    }

    if rule.count.is_some() && rule.expect.is_some() {
        return Err(RuleError::user(
            "expect",
            "You cannot use counting and expecting at the same time in the same rule.",
        ));
    }
    if rule.expect.is_some() && rule.delay.is_some() {
        return Err(RuleError::user(
            "expect",
            "You cannot use expecting and delay at the same time in the same rule.",
        ));
    }

    // Replacement references must not exceed the subgroups of `match`
    for nr in ((num_groups + 1)..=MAX_MATCH_GROUPS).rev() {
        let reference = format!("\\{}", nr);
        for (name, value) in rule.rewrite_fields() {
            if value.contains(&reference) {
                return Err(RuleError::user(
                    name,
                    format!(
                        "You are using the replacement reference \\{}, but your match text has only {} subgroups.",
                        nr, num_groups
                    ),
                ));
            }
        }
    }

    Ok(())
}

/// A new rule id must not exist in any pack of the store
pub fn validate_new_rule_id(packs: &[RulePackRef], id: &str) -> Result<()> {
    for pack in packs.iter().filter_map(RulePackRef::loaded) {
        if pack.rules.iter().any(|r| r.id == id) {
            return Err(RuleError::user(
                "id",
                format!("A rule with this ID already exists in rule pack {}.", pack.title),
            ));
        }
    }
    Ok(())
}

/// An edit must keep the rule id
pub fn validate_rule_edit(old: &Rule, new: &Rule) -> Result<()> {
    if old.id != new.id {
        return Err(RuleError::user(
            "id",
            "It is not allowed to change the ID of an existing rule.",
        ));
    }
    Ok(())
}

/// Check pack properties; `editing` is the index of the pack being edited
pub fn validate_rule_pack(
    spec: &RulePackSpec,
    packs: &[RulePackRef],
    editing: Option<usize>,
) -> Result<()> {
    validate_id("id", &spec.id)?;
    if spec.title.trim().is_empty() {
        return Err(RuleError::user("title", "Please specify a title."));
    }

    let collides = packs
        .iter()
        .enumerate()
        .any(|(nr, p)| Some(nr) != editing && p.id() == spec.id);
    if collides {
        return Err(RuleError::user("id", "A rule pack with this ID already exists."));
    }
    Ok(())
}

/// Packs that are not internal keep their id and title
pub fn validate_fixed_identity(old: &RulePackSpec, new: &RulePackSpec) -> Result<()> {
    if old.id != new.id {
        return Err(RuleError::user(
            "id",
            "The ID of a packaged or exported rule pack cannot be changed.",
        ));
    }
    if old.title != new.title {
        return Err(RuleError::user(
            "title",
            "The title of a packaged or exported rule pack cannot be changed.",
        ));
    }
    Ok(())
}
