//! Commands talking to the running Event Console

use anyhow::Result;
use colored::*;

use ec_rules::{EngineControl, Mutation, ReplicationMode, SwitchMode};

use crate::context::CliContext;
use crate::output::{confirm, print_json};
use crate::packs::apply;

pub async fn reset_counters(ctx: &CliContext) -> Result<()> {
    ctx.require_engine().await?;
    let confirmed = confirm(ctx, "Do you really want to reset all rule hit counters to zero?")?;
    apply(ctx, Mutation::ResetCounters { confirmed }).await
}

pub async fn switch_mode(ctx: &CliContext, mode: SwitchMode) -> Result<()> {
    let current = ctx.require_engine().await?;
    if !current.is_replica() {
        anyhow::bail!(
            "The Event Console runs in {} mode; only replicas can switch between sync and takeover",
            current
        );
    }
    ctx.client.switch_mode(mode).await?;
    println!(
        "{} Switched replication mode to {}",
        "OK".bright_green(),
        mode.as_str()
    );
    Ok(())
}

pub async fn copy_from_master(ctx: &CliContext) -> Result<()> {
    let confirmed = confirm(
        ctx,
        "Do you really want to copy all rules from the central site and replace your local configuration?",
    )?;
    apply(ctx, Mutation::CopyRulesFromMaster { confirmed }).await
}

#[derive(serde::Serialize)]
struct StatusReport {
    endpoint: String,
    replication_mode: ReplicationMode,
    rule_packs: usize,
    exported_rule_packs: usize,
}

pub async fn status(ctx: &CliContext) -> Result<()> {
    let mode = ctx.engine_mode().await;
    let (packs, index) = ctx.editor.load()?;
    let report = StatusReport {
        endpoint: ctx.client.endpoint().to_string(),
        replication_mode: mode,
        rule_packs: packs.len(),
        exported_rule_packs: index.len(),
    };

    if ctx.json {
        return print_json(&report);
    }

    let mode_label = match mode {
        ReplicationMode::Stopped => "stopped".bright_red(),
        ReplicationMode::Master => "master".bright_green(),
        ReplicationMode::Sync | ReplicationMode::Takeover => mode.to_string().yellow(),
    };
    println!("{}", "Event Console Status".bright_cyan());
    println!("  site:          {}", ctx.settings.site_id);
    println!("  site root:     {}", ctx.site_root.display());
    println!("  endpoint:      {}", report.endpoint);
    println!("  mode:          {}", mode_label);
    println!("  rule packs:    {}", report.rule_packs);
    println!("  exported:      {}", report.exported_rule_packs);
    if mode.is_replica() {
        println!("{} {}", "WARN".yellow(), ec_rules::REPLICA_WARNING);
    }
    Ok(())
}
