//! Shared Serde helpers
//!
//! Rule pack files are written by several generations of tooling, so a few
//! fields accept more than one input shape:
//! - booleans as `true`/`false`, `0`/`1` or `"yes"`/`"no"`
//! - optional strings where `""` or whitespace means "not set"

use serde::{Deserialize, Deserializer};

// ============================================================================
// Default Value Functions (for serde #[serde(default = "...")] attributes)
// ============================================================================

/// Default value: true
pub fn bool_true() -> bool {
    true
}

/// Skip predicate for `#[serde(skip_serializing_if = "...")]` on flags
pub fn is_false(value: &bool) -> bool {
    !*value
}

// ============================================================================
// Custom Deserializers
// ============================================================================

/// Custom deserializer for boolean fields that supports multiple input formats
///
/// - JSON boolean: true, false
/// - JSON integer: 0 (false), 1 (true)
/// - string: "1"/"0", "true"/"false", "yes"/"no" (case-insensitive)
pub fn deserialize_bool_flexible<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrStringOrInt {
        Bool(bool),
        Int(i64),
        String(String),
    }

    match BoolOrStringOrInt::deserialize(deserializer)? {
        BoolOrStringOrInt::Bool(b) => Ok(b),
        BoolOrStringOrInt::Int(i) => match i {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(D::Error::custom(format!(
                "Invalid integer value {}, expected 0 or 1",
                i
            ))),
        },
        BoolOrStringOrInt::String(s) => {
            let t = s.trim();
            if t == "1" || t.eq_ignore_ascii_case("true") || t.eq_ignore_ascii_case("yes") {
                Ok(true)
            } else if t.is_empty()
                || t == "0"
                || t.eq_ignore_ascii_case("false")
                || t.eq_ignore_ascii_case("no")
            {
                Ok(false)
            } else {
                Err(D::Error::custom(format!(
                    "Invalid boolean value '{}', expected true/false, yes/no or 1/0",
                    s
                )))
            }
        },
    }
}

/// Optional string where an empty or whitespace-only value becomes `None`
///
/// Use together with `#[serde(default)]` so that a missing key is `None` too.
pub fn deserialize_optional_nonempty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Flags {
        #[serde(default, deserialize_with = "deserialize_bool_flexible")]
        disabled: bool,
        #[serde(default, deserialize_with = "deserialize_optional_nonempty")]
        comment: Option<String>,
    }

    #[test]
    fn test_bool_flexible() {
        let f: Flags = serde_json::from_str(r#"{"disabled": "yes"}"#).unwrap();
        assert!(f.disabled);
        let f: Flags = serde_json::from_str(r#"{"disabled": 0}"#).unwrap();
        assert!(!f.disabled);
        let f: Flags = serde_json::from_str(r#"{}"#).unwrap();
        assert!(!f.disabled);
        assert!(serde_json::from_str::<Flags>(r#"{"disabled": "maybe"}"#).is_err());
    }

    #[test]
    fn test_optional_nonempty() {
        let f: Flags = serde_json::from_str(r#"{"comment": "  "}"#).unwrap();
        assert_eq!(f.comment, None);
        let f: Flags = serde_json::from_str(r#"{"comment": "db team"}"#).unwrap();
        assert_eq!(f.comment.as_deref(), Some("db team"));
        let f: Flags = serde_json::from_str(r#"{"comment": null}"#).unwrap();
        assert_eq!(f.comment, None);
    }
}
