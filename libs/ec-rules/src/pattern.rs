//! Match values of rules
//!
//! A match value is either a plain text, compared case-insensitively, or a
//! regular expression when it contains regex metacharacters. Empty values
//! mean "no condition" and compile to `None`.

use regex::{Regex, RegexBuilder};

use crate::error::{Result, RuleError};

/// Characters that turn a match value into a regular expression
const REGEX_CHARS: &[char] = &[
    '.', '?', '*', '+', '^', '$', '|', '[', ']', '(', ')', '{', '}', '\\',
];

/// Whether `value` is treated as a regular expression
pub fn is_regex(value: &str) -> bool {
    value.contains(REGEX_CHARS)
}

/// How a pattern is applied to a text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Pattern may match anywhere in the text
    Infix,
    /// Pattern must cover the whole text
    Complete,
}

/// Compiled match value
#[derive(Debug, Clone)]
pub enum MatchPattern {
    /// Lower-cased plain text
    Literal(String),
    Regex(Regex),
}

impl MatchPattern {
    /// Compile the match value of rule field `key`
    ///
    /// Leading `.*` of `match` and `match_ok` are redundant for an infix
    /// search and are removed (`.*?` is kept).
    pub fn compile(key: &str, value: &str, mode: MatchMode) -> Result<Option<Self>> {
        let mut value = value.trim();
        if key == "match" || key == "match_ok" {
            while value.starts_with(".*") && !value.starts_with(".*?") {
                value = &value[2..];
            }
        }

        if value.is_empty() {
            return Ok(None);
        }

        if !is_regex(value) {
            return Ok(Some(MatchPattern::Literal(value.to_lowercase())));
        }

        let source = match mode {
            MatchMode::Infix => value.to_string(),
            MatchMode::Complete => format!("^(?:{})$", value),
        };
        RegexBuilder::new(&source)
            .case_insensitive(true)
            .build()
            .map(|re| Some(MatchPattern::Regex(re)))
            .map_err(|e| RuleError::user(key, format!("Invalid regular expression: {}", e)))
    }

    /// Number of capture groups
    pub fn group_count(&self) -> usize {
        match self {
            MatchPattern::Literal(_) => 0,
            MatchPattern::Regex(re) => re.captures_len().saturating_sub(1),
        }
    }

    /// Match groups when `text` matches, `None` otherwise
    ///
    /// Groups that did not participate in the match are empty strings.
    pub fn captures(&self, text: &str, mode: MatchMode) -> Option<Vec<String>> {
        match self {
            MatchPattern::Literal(literal) => {
                let text = text.to_lowercase();
                let matched = match mode {
                    MatchMode::Infix => text.contains(literal.as_str()),
                    MatchMode::Complete => text == *literal,
                };
                matched.then(Vec::new)
            },
            MatchPattern::Regex(re) => re.captures(text).map(|caps| {
                caps.iter()
                    .skip(1)
                    .map(|g| g.map(|m| m.as_str().to_string()).unwrap_or_default())
                    .collect()
            }),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            MatchPattern::Literal(literal) => literal,
            MatchPattern::Regex(re) => re.as_str(),
        }
    }
}

/// Match an optional value: no condition always matches without groups
pub fn match_optional(
    pattern: Option<&MatchPattern>,
    text: &str,
    mode: MatchMode,
) -> Option<Vec<String>> {
    match pattern {
        None => Some(Vec::new()),
        Some(p) => p.captures(text, mode),
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    fn compile(key: &str, value: &str, mode: MatchMode) -> MatchPattern {
        MatchPattern::compile(key, value, mode).unwrap().unwrap()
    }

    #[test]
    fn test_literal_matching() {
        let p = compile("match", "Disk Full", MatchMode::Infix);
        assert!(matches!(p, MatchPattern::Literal(_)));
        assert_eq!(p.captures("ALERT: disk full on /var", MatchMode::Infix), Some(vec![]));
        assert_eq!(p.captures("disk ok", MatchMode::Infix), None);

        let host = compile("match_host", "DB1", MatchMode::Complete);
        assert!(host.captures("db1", MatchMode::Complete).is_some());
        assert!(host.captures("db10", MatchMode::Complete).is_none());
    }

    #[test]
    fn test_regex_groups() {
        let p = compile("match", "ORA-(\\d+)( fatal)?", MatchMode::Infix);
        assert_eq!(p.group_count(), 2);
        assert_eq!(
            p.captures("ora-600 error", MatchMode::Infix),
            Some(vec!["600".to_string(), String::new()])
        );
    }

    #[test]
    fn test_complete_regex_is_anchored() {
        let p = compile("match_host", "db.", MatchMode::Complete);
        assert!(p.captures("DB1", MatchMode::Complete).is_some());
        assert!(p.captures("xdb1", MatchMode::Complete).is_none());
        let any = compile("match_host", ".*", MatchMode::Complete);
        assert!(any.captures("anything", MatchMode::Complete).is_some());
    }

    #[test]
    fn test_leading_wildcards_and_empty() {
        assert!(MatchPattern::compile("match", "  ", MatchMode::Infix).unwrap().is_none());
        assert!(MatchPattern::compile("match", ".*.*", MatchMode::Infix).unwrap().is_none());

        let p = compile("match", ".*foo", MatchMode::Infix);
        assert_eq!(p.as_str(), "foo");
        let lazy = compile("match", ".*?foo", MatchMode::Infix);
        assert_eq!(lazy.as_str(), ".*?foo");
        let app = compile("match_application", ".*foo", MatchMode::Infix);
        assert_eq!(app.as_str(), ".*foo");
    }

    #[test]
    fn test_invalid_regex_names_field() {
        match MatchPattern::compile("match_ok", "(unclosed", MatchMode::Infix) {
            Err(RuleError::User { field, message }) => {
                assert_eq!(field, "match_ok");
                assert!(message.starts_with("Invalid regular expression"));
            },
            other => panic!("unexpected {:?}", other),
        }
    }
}
