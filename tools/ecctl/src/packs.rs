//! Rule pack management commands

use anyhow::{anyhow, Result};
use clap::Subcommand;
use colored::*;
use std::path::PathBuf;
use tracing::warn;

use ec_rules::store::find_pack;
use ec_rules::{summarize, EngineControl, Mutation, RuleHits, RulePackProperties, RulePackRef};

use crate::context::CliContext;
use crate::output::{confirm, print_applied, print_json, type_label};

#[derive(Subcommand)]
pub enum PackCommands {
    /// List all rule packs with their packaging state and hits
    List,

    /// Show a rule pack including its rules
    Show {
        /// Rule pack ID
        id: String,
        /// Write the pack to a JSON or YAML file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Create a new rule pack at the top of the list
    New {
        #[arg(long)]
        id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        disabled: bool,
        #[arg(long)]
        customer: Option<String>,
    },

    /// Change the properties of a rule pack
    Edit {
        /// Rule pack ID
        id: String,
        /// New ID (internal packs only)
        #[arg(long)]
        new_id: Option<String>,
        /// New title (internal packs only)
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        disabled: Option<bool>,
        /// Customer scope; an empty value removes it
        #[arg(long)]
        customer: Option<String>,
    },

    /// Delete a rule pack and all its rules
    Delete { id: String },

    /// Move a rule pack to another position
    Move {
        id: String,
        /// Target position (0 = first)
        #[arg(long)]
        to: usize,
    },

    /// Make an internal rule pack available for MKP packaging
    Export { id: String },

    /// Turn an exported rule pack back into an internal one
    Dissolve { id: String },

    /// Discard local changes of a packaged rule pack
    Reset { id: String },

    /// Write local changes of a packaged rule pack back to the package
    Sync { id: String },
}

pub async fn handle_command(cmd: PackCommands, ctx: &CliContext) -> Result<()> {
    match cmd {
        PackCommands::List => list(ctx).await,
        PackCommands::Show { id, output } => show(ctx, &id, output),
        PackCommands::New {
            id,
            title,
            disabled,
            customer,
        } => {
            let properties = RulePackProperties {
                id,
                title,
                disabled,
                customer: customer.filter(|c| !c.is_empty()),
            };
            apply(ctx, Mutation::NewRulePack { properties }).await
        },
        PackCommands::Edit {
            id,
            new_id,
            title,
            disabled,
            customer,
        } => {
            let (nr, current) = locate(ctx, &id)?;
            let spec = current
                .loaded()
                .ok_or_else(|| anyhow!("Rule pack {} cannot be loaded", id))?;
            let properties = RulePackProperties {
                id: new_id.unwrap_or_else(|| spec.id.clone()),
                title: title.unwrap_or_else(|| spec.title.clone()),
                disabled: disabled.unwrap_or(spec.disabled),
                customer: match customer {
                    Some(c) if c.is_empty() => None,
                    Some(c) => Some(c),
                    None => spec.customer.clone(),
                },
            };
            apply(ctx, Mutation::EditRulePack { nr, properties }).await
        },
        PackCommands::Delete { id } => {
            let (nr, _) = locate(ctx, &id)?;
            let question = format!("Do you really want to delete the rule pack {} with all its rules?", id);
            let confirmed = confirm(ctx, &question)?;
            apply(ctx, Mutation::DeleteRulePack { nr, confirmed }).await
        },
        PackCommands::Move { id, to } => {
            let (from, _) = locate(ctx, &id)?;
            apply(ctx, Mutation::MoveRulePack { from, to }).await
        },
        PackCommands::Export { id } => {
            let (nr, _) = locate(ctx, &id)?;
            apply(ctx, Mutation::ExportRulePack { nr }).await
        },
        PackCommands::Dissolve { id } => {
            let (nr, _) = locate(ctx, &id)?;
            apply(ctx, Mutation::DissolveRulePack { nr }).await
        },
        PackCommands::Reset { id } => {
            let (nr, _) = locate(ctx, &id)?;
            apply(ctx, Mutation::ResetRulePack { nr }).await
        },
        PackCommands::Sync { id } => {
            let (nr, _) = locate(ctx, &id)?;
            apply(ctx, Mutation::SynchronizeRulePack { nr }).await
        },
    }
}

/// Submit a mutation under a fresh transaction
pub async fn apply(ctx: &CliContext, mutation: Mutation) -> Result<()> {
    let token = ctx.editor.begin();
    let applied = ctx.editor.apply(&token, mutation).await?;
    print_applied(&applied);
    Ok(())
}

/// Position and content of the pack `id`
pub fn locate(ctx: &CliContext, id: &str) -> Result<(usize, RulePackRef)> {
    let (mut packs, _) = ctx.editor.load()?;
    let nr = find_pack(&packs, id).ok_or_else(|| anyhow!("Rule pack {} does not exist", id))?;
    Ok((nr, packs.swap_remove(nr)))
}

/// Hit counters, or none when the engine is not reachable
pub async fn hits_or_empty(ctx: &CliContext) -> RuleHits {
    match ctx.client.rule_hits().await {
        Ok(hits) => hits,
        Err(e) => {
            warn!("Rule hits unavailable: {}", e);
            RuleHits::default()
        },
    }
}

async fn list(ctx: &CliContext) -> Result<()> {
    let (packs, index) = ctx.editor.load()?;
    let hits = hits_or_empty(ctx).await;
    let rows = summarize(&packs, &index, &hits);

    if ctx.json {
        return print_json(&rows);
    }

    if rows.is_empty() {
        println!("{}", "No rule packs configured".yellow());
        return Ok(());
    }

    println!(
        "{:>3}  {:<24} {:<32} {:<16} {:>6} {:>8}",
        "#", "ID", "Title", "Type", "Rules", "Hits"
    );
    for row in rows {
        let line = format!(
            "{:>3}  {:<24} {:<32} {:<16} {:>6} {:>8}",
            row.nr,
            row.id,
            row.title,
            type_label(row.pack_type),
            row.rules,
            row.hits
        );
        if row.disabled {
            println!("{} {}", line.dimmed(), "(disabled)".dimmed());
        } else {
            println!("{}", line);
        }
        if let Some(package) = row.package {
            println!("     {} {}", "package:".dimmed(), package);
        }
    }
    Ok(())
}

fn show(ctx: &CliContext, id: &str, output: Option<PathBuf>) -> Result<()> {
    let (_, pack) = locate(ctx, id)?;
    let spec = pack
        .loaded()
        .ok_or_else(|| anyhow!("Rule pack {} cannot be loaded", id))?;

    match output {
        Some(path) => {
            common::config::save_config_to_file(spec, &path)?;
            println!("{} Wrote rule pack {} to {}", "OK".bright_green(), id, path.display());
            Ok(())
        },
        None => print_json(spec),
    }
}
