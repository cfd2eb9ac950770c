//! ecctl - Event Console rule management tool
//!
//! Manages rule packs and rules, simulates events against the rule set and
//! controls the running Event Console (counters, replication).

mod context;
mod engine;
mod output;
mod packs;
mod rules;
mod simulate;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::debug;

use common::{init_logging, load_settings, parse_level, LogConfig};
use ec_rules::SwitchMode;

use crate::context::CliContext;
use crate::packs::PackCommands;
use crate::rules::RuleCommands;
use crate::simulate::SimulateArgs;

#[derive(Parser)]
#[command(name = "ecctl")]
#[command(about = "Event Console rule management tool")]
#[command(long_about = "Event Console rule management tool

Rule Configuration:
  packs           Create, edit, move, export and package rule packs
  rules           Create, edit, move and search rules
  simulate        Run an event through the rule set

Event Console:
  status          Show engine and rule store status
  reset-counters  Reset all rule hit counters
  switch-mode     Switch a replica between sync and takeover
  copy-from-master  Replace the local rules with those of the central site

Examples:
  ecctl packs list
  ecctl rules new database --id ora --match 'ORA-\\d+'
  ecctl simulate --text 'ORA-600 error' --host db1 --priority 4 --details")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Settings file (YAML, TOML or JSON)
    #[arg(short = 'c', long = "config", global = true, env = "ECCTL_CONFIG")]
    config: Option<PathBuf>,

    /// Site root that relative paths are resolved against
    #[arg(long = "root", global = true, env = "OMD_ROOT", default_value = ".")]
    root: PathBuf,

    /// Answer yes to all confirmation questions
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    /// Print machine readable JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage rule packs
    Packs {
        #[command(subcommand)]
        command: PackCommands,
    },

    /// Manage rules
    Rules {
        #[command(subcommand)]
        command: RuleCommands,
    },

    /// Run an event through the rule set
    Simulate(SimulateArgs),

    /// Show engine and rule store status
    Status,

    /// Reset the hit counters of all rules
    ResetCounters,

    /// Switch a replica between sync and takeover
    SwitchMode {
        #[arg(value_enum)]
        mode: ModeArg,
    },

    /// Replace the local rules with those of the central site
    CopyFromMaster,

    /// Print the effective settings
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Sync,
    Takeover,
}

impl From<ModeArg> for SwitchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Sync => SwitchMode::Sync,
            ModeArg::Takeover => SwitchMode::Takeover,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Configure colored output
    if cli.no_color {
        colored::control::set_override(false);
    }

    let settings = load_settings(cli.config.as_deref()).context("Failed to load settings")?;

    // Initialize logging
    let level = if cli.verbose {
        "debug"
    } else {
        settings.log.level.as_str()
    };
    init_logging(&LogConfig {
        service_name: "ecctl".to_string(),
        log_dir: settings.log.dir.clone(),
        console_level: parse_level(level),
        enable_json: settings.log.json,
        no_color: cli.no_color,
    })?;
    debug!("Site root: {}", cli.root.display());

    if let Commands::Config = cli.command {
        print!("{}", serde_yaml::to_string(&settings)?);
        return Ok(());
    }

    let json = cli.json;
    let ctx = CliContext::new(settings, cli.root, cli.yes, json)?;

    let result = match cli.command {
        Commands::Packs { command } => packs::handle_command(command, &ctx).await,
        Commands::Rules { command } => rules::handle_command(command, &ctx).await,
        Commands::Simulate(args) => simulate::run(args, &ctx).await,
        Commands::Status => engine::status(&ctx).await,
        Commands::ResetCounters => engine::reset_counters(&ctx).await,
        Commands::SwitchMode { mode } => engine::switch_mode(&ctx, mode.into()).await,
        Commands::CopyFromMaster => engine::copy_from_master(&ctx).await,
        Commands::Config => Ok(()),
    };

    if let Err(e) = &result {
        output::report_error(e, json);
        std::process::exit(1);
    }
    Ok(())
}
