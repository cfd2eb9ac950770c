//! Rule management commands
//!
//! Rules are addressed by pack ID and rule ID; new and changed rules are
//! read from JSON or YAML files in the rule pack file format.

use anyhow::{anyhow, Result};
use clap::Subcommand;
use colored::*;
use std::path::PathBuf;

use ec_rules::store::find_pack;
use ec_rules::{search, Mutation, Rule, RuleState};

use crate::context::CliContext;
use crate::output::{confirm, print_json, read_document};
use crate::packs::{apply, hits_or_empty, locate};

#[derive(Subcommand)]
pub enum RuleCommands {
    /// List the rules of a pack with their hit counters
    List {
        /// Rule pack ID
        pack: String,
    },

    /// Create a rule from a file, or from the given flags
    New {
        /// Rule pack ID
        pack: String,
        /// Rule definition (JSON or YAML)
        #[arg(short, long, conflicts_with_all = ["id", "match_text", "description"])]
        file: Option<PathBuf>,
        #[arg(long)]
        id: Option<String>,
        /// Text to match (regular expression or plain text)
        #[arg(long = "match")]
        match_text: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Insert at the position of this rule instead of at the top
        #[arg(long)]
        clone_of: Option<String>,
    },

    /// Replace a rule with the definition from a file
    Edit {
        pack: String,
        rule: String,
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Delete a rule
    Delete { pack: String, rule: String },

    /// Move a rule to another position within its pack
    Move {
        pack: String,
        rule: String,
        /// Target position (0 = first)
        #[arg(long)]
        to: usize,
    },

    /// Move a rule to the top of another pack
    MoveTo {
        pack: String,
        rule: String,
        /// Target rule pack ID
        target: String,
    },

    /// Search rule packs and rules by ID, title, description or match text
    Search { expression: String },
}

pub async fn handle_command(cmd: RuleCommands, ctx: &CliContext) -> Result<()> {
    match cmd {
        RuleCommands::List { pack } => list(ctx, &pack).await,
        RuleCommands::New {
            pack,
            file,
            id,
            match_text,
            description,
            clone_of,
        } => {
            let rule = match file {
                Some(path) => read_document::<Rule>(&path)?,
                None => {
                    let id = id.ok_or_else(|| anyhow!("Either --file or --id is required"))?;
                    let mut rule = Rule::new(id);
                    rule.match_text = match_text;
                    rule.description = description;
                    rule
                },
            };
            let (nr, current) = locate(ctx, &pack)?;
            let clone_of = match clone_of {
                Some(rule_id) => Some(rule_position(&current, &pack, &rule_id)?),
                None => None,
            };
            apply(
                ctx,
                Mutation::NewRule {
                    pack: nr,
                    rule,
                    clone_of,
                },
            )
            .await
        },
        RuleCommands::Edit { pack, rule, file } => {
            let (nr, current) = locate(ctx, &pack)?;
            let position = rule_position(&current, &pack, &rule)?;
            let definition: Rule = read_document(&file)?;
            apply(
                ctx,
                Mutation::EditRule {
                    pack: nr,
                    nr: position,
                    rule: definition,
                },
            )
            .await
        },
        RuleCommands::Delete { pack, rule } => {
            let (nr, current) = locate(ctx, &pack)?;
            let position = rule_position(&current, &pack, &rule)?;
            let confirmed = confirm(ctx, &format!("Do you really want to delete the rule {}?", rule))?;
            apply(
                ctx,
                Mutation::DeleteRule {
                    pack: nr,
                    nr: position,
                    confirmed,
                },
            )
            .await
        },
        RuleCommands::Move { pack, rule, to } => {
            let (nr, current) = locate(ctx, &pack)?;
            let from = rule_position(&current, &pack, &rule)?;
            apply(ctx, Mutation::MoveRule { pack: nr, from, to }).await
        },
        RuleCommands::MoveTo { pack, rule, target } => {
            let (packs, _) = ctx.editor.load()?;
            let source = find_pack(&packs, &pack)
                .ok_or_else(|| anyhow!("Rule pack {} does not exist", pack))?;
            let target = find_pack(&packs, &target)
                .ok_or_else(|| anyhow!("Rule pack {} does not exist", target))?;
            let position = rule_position(&packs[source], &pack, &rule)?;
            apply(
                ctx,
                Mutation::MoveRuleToPack {
                    pack: source,
                    nr: position,
                    target,
                },
            )
            .await
        },
        RuleCommands::Search { expression } => {
            let (packs, _) = ctx.editor.load()?;
            let found = search(&packs, &expression);
            if ctx.json {
                return print_json(&found);
            }
            if found.is_empty() {
                println!("{} {}", "No rule packs or rules match".yellow(), expression);
            }
            for hit in found {
                println!("{} {}", hit.pack_id.bright_cyan(), hit.pack_title);
                for rule_id in hit.rule_ids {
                    println!("    {}", rule_id);
                }
            }
            Ok(())
        },
    }
}

fn rule_position(pack: &ec_rules::RulePackRef, pack_id: &str, rule_id: &str) -> Result<usize> {
    pack.loaded()
        .and_then(|spec| spec.rule_index(rule_id))
        .ok_or_else(|| anyhow!("Rule {} does not exist in rule pack {}", rule_id, pack_id))
}

fn state_label(state: &RuleState) -> String {
    match state {
        RuleState::Fixed(s) => s.to_string(),
        RuleState::FromSyslog => "(syslog)".to_string(),
        RuleState::TextPattern(_) => "(text pattern)".to_string(),
    }
}

async fn list(ctx: &CliContext, pack_id: &str) -> Result<()> {
    let (_, pack) = locate(ctx, pack_id)?;
    let spec = pack
        .loaded()
        .ok_or_else(|| anyhow!("Rule pack {} cannot be loaded", pack_id))?;

    if ctx.json {
        return print_json(&spec.rules);
    }

    let hits = hits_or_empty(ctx).await;
    println!("{} {}", spec.id.bright_cyan(), spec.title);
    println!(
        "{:>3}  {:<24} {:<14} {:>8}  {}",
        "#", "ID", "State", "Hits", "Match"
    );
    for (nr, rule) in spec.rules.iter().enumerate() {
        let line = format!(
            "{:>3}  {:<24} {:<14} {:>8}  {}",
            nr,
            rule.id,
            state_label(&rule.state),
            hits.rule(&rule.id),
            rule.match_text.as_deref().unwrap_or("")
        );
        if rule.disabled || spec.disabled {
            println!("{}", line.dimmed());
        } else {
            println!("{}", line);
        }
        if let Some(description) = &rule.description {
            println!("     {}", description.dimmed());
        }
    }
    Ok(())
}
