//! Terminal output and input helpers

use anyhow::{Context, Result};
use colored::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{BufRead, Write};
use std::path::Path;

use ec_client::ClientError;
use ec_rules::{Applied, RuleError, RulePackType};
use errors::{EcErrorTrait, ErrorInfo};

use crate::context::CliContext;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Report the result of a mutation
pub fn print_applied(applied: &Applied) {
    match applied {
        Applied::Replayed => {
            println!("{} Transaction was already applied", "SKIP".yellow());
        },
        Applied::Done { message, warning } => {
            println!("{} {}", "OK".bright_green(), message);
            if let Some(warning) = warning {
                println!("{} {}", "WARN".yellow(), warning);
            }
        },
    }
}

fn domain_error(err: &anyhow::Error) -> Option<&dyn EcErrorTrait> {
    err.chain().find_map(|cause| {
        cause
            .downcast_ref::<RuleError>()
            .map(|e| e as &dyn EcErrorTrait)
            .or_else(|| cause.downcast_ref::<ClientError>().map(|e| e as &dyn EcErrorTrait))
    })
}

/// Caller facing description of a failed command
pub fn error_info(err: &anyhow::Error) -> ErrorInfo {
    let full = format!("{:#}", err);
    match domain_error(err) {
        Some(domain) => {
            let info = domain.to_error_info();
            if full == info.message {
                info
            } else {
                info.with_details(full)
            }
        },
        None => ErrorInfo::new(full),
    }
}

/// Log and print a failed command, as JSON with `--json`
pub fn report_error(err: &anyhow::Error, json: bool) {
    let level = domain_error(err).map_or(tracing::Level::ERROR, |e| e.log_level());
    if level == tracing::Level::ERROR {
        tracing::error!("Command failed: {:#}", err);
    } else if level == tracing::Level::WARN {
        tracing::warn!("Command failed: {:#}", err);
    } else {
        tracing::info!("Command failed: {:#}", err);
    }

    let info = error_info(err);
    if json {
        match serde_json::to_string_pretty(&info) {
            Ok(text) => eprintln!("{}", text),
            Err(_) => eprintln!("{} {}", "ERROR".red(), info.message),
        }
        return;
    }

    let message = info.details.as_deref().unwrap_or(&info.message);
    eprintln!("{} [{}] {}", "ERROR".red(), info.code, message);
    let mut fields: Vec<_> = info.field_errors.iter().collect();
    fields.sort();
    for (field, messages) in fields {
        for message in messages {
            eprintln!("  {} {}", format!("{}:", field).bright_yellow(), message);
        }
    }
}

pub fn type_label(pack_type: RulePackType) -> ColoredString {
    match pack_type {
        RulePackType::Internal => "internal".normal(),
        RulePackType::Exported => "exported".bright_cyan(),
        RulePackType::UnmodifiedMkp => "mkp".bright_blue(),
        RulePackType::ModifiedMkp => "mkp (modified)".yellow(),
    }
}

/// Ask before a destructive operation unless `--yes` was given
pub fn confirm(ctx: &CliContext, question: &str) -> Result<bool> {
    if ctx.assume_yes {
        return Ok(true);
    }
    print!("{} {} [y/N] ", "?".bright_yellow(), question);
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Read a JSON or YAML document, chosen by file extension
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    let value = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid YAML in {}", path.display()))?,
        _ => serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?,
    };
    Ok(value)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use ec_rules::{Rule, RuleState};

    #[test]
    fn test_is_yes() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes("\n"));
        assert!(!is_yes("no"));
    }

    #[test]
    fn test_read_rule_documents() {
        let dir = tempfile::TempDir::new().unwrap();
        let yaml = dir.path().join("rule.yaml");
        std::fs::write(&yaml, "id: ora\nmatch: 'ORA-\\d+'\nstate: 2\n").unwrap();
        let rule: Rule = read_document(&yaml).unwrap();
        assert_eq!(rule.id, "ora");
        assert_eq!(rule.match_text.as_deref(), Some("ORA-\\d+"));
        assert!(matches!(rule.state, RuleState::Fixed(_)));

        let json = dir.path().join("rule.json");
        std::fs::write(&json, r#"{"id": "pg", "state": -1}"#).unwrap();
        let rule: Rule = read_document(&json).unwrap();
        assert_eq!(rule.state, RuleState::FromSyslog);

        std::fs::write(&json, "{").unwrap();
        assert!(read_document::<Rule>(&json).is_err());
    }

    #[test]
    fn test_error_info_keeps_offending_field() {
        let err = anyhow::Error::from(RuleError::user(
            "set_text",
            "You are using the replacement reference \\2, but your match text has only 1 subgroups.",
        ));
        let info = error_info(&err);
        assert_eq!(info.code, "VALIDATION_ERROR");
        assert!(info.details.is_none());
        assert_eq!(info.field_errors["set_text"].len(), 1);
        assert!(info.field_errors["set_text"][0].contains("replacement reference"));

        let json = serde_json::to_value(&info).unwrap();
        assert!(json["field_errors"]["set_text"].is_array());
    }

    #[test]
    fn test_error_info_through_context() {
        let err = anyhow::Error::from(RuleError::NotFound("Rule pack net".into()))
            .context("Cannot delete rule pack");
        let info = error_info(&err);
        assert_eq!(info.code, "NOT_FOUND");
        assert_eq!(
            info.details.as_deref(),
            Some("Cannot delete rule pack: Rule pack net does not exist")
        );

        let err = anyhow::Error::from(ClientError::Timeout("Connection to tmp/run/mkeventd/status timed out".into()));
        assert_eq!(error_info(&err).code, "TIMEOUT");

        let err = anyhow::anyhow!("No rule with id ora");
        let info = error_info(&err);
        assert_eq!(info.code, "INTERNAL_ERROR");
        assert_eq!(info.message, "No rule with id ora");
    }
}
