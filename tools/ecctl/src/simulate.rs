//! Event simulation command

use anyhow::Result;
use clap::Args;
use colored::*;

use ec_rules::{
    simulate, AlwaysActive, Event, Outcome, PackSummary, RuleMatcher, RulePackRef,
    RuleVerdict, StaticTimePeriods, TimePeriods,
};

use crate::context::CliContext;
use crate::output::print_json;

#[derive(Args)]
pub struct SimulateArgs {
    /// Message text
    #[arg(long)]
    pub text: String,
    #[arg(long, default_value = "")]
    pub host: String,
    #[arg(long, default_value = "")]
    pub ipaddress: String,
    #[arg(long, default_value = "")]
    pub application: String,
    /// Syslog priority 0 (emerg) .. 7 (debug)
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u8).range(0..=7))]
    pub priority: u8,
    /// Syslog facility 0..31
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(0..=31))]
    pub facility: u8,
    /// Service level of the message
    #[arg(long)]
    pub sl: Option<u32>,
    /// Site that received the message
    #[arg(long)]
    pub site: Option<String>,
    /// Time periods to treat as active; all are active when none is given
    #[arg(long = "active-period")]
    pub active_periods: Vec<String>,
    /// Show the verdict of every rule
    #[arg(short, long)]
    pub details: bool,
    /// Also send the event to the running Event Console
    #[arg(long)]
    pub send: bool,
}

impl SimulateArgs {
    fn event(&self) -> Event {
        Event {
            text: self.text.clone(),
            host: self.host.clone(),
            ipaddress: self.ipaddress.clone(),
            application: self.application.clone(),
            priority: self.priority,
            facility: self.facility,
            sl: self.sl,
            site: self.site.clone(),
            ..Event::default()
        }
    }
}

pub async fn run(args: SimulateArgs, ctx: &CliContext) -> Result<()> {
    let (packs, _) = ctx.editor.load()?;
    let specs: Vec<_> = packs
        .iter()
        .filter_map(RulePackRef::loaded)
        .cloned()
        .collect();

    let event = args.event();
    let match_context = ctx.match_context();
    let static_periods;
    let periods: &dyn TimePeriods = if args.active_periods.is_empty() {
        &AlwaysActive
    } else {
        static_periods = StaticTimePeriods {
            active: args.active_periods.clone(),
        };
        &static_periods
    };
    let matcher = RuleMatcher::new(&match_context, periods);
    let report = simulate(&specs, &event, &matcher)?;

    if ctx.json {
        print_json(&report)?;
    } else {
        for pack in &report.packs {
            let summary = match &pack.summary {
                PackSummary::Disabled => "disabled".dimmed(),
                PackSummary::NoMatch => "no match".normal(),
                PackSummary::Matched {
                    matches,
                    overruled: true,
                    ..
                } => format!("{} matches (overruled)", matches).yellow(),
                PackSummary::Matched { matches, .. } => format!("{} matches", matches).bright_green(),
            };
            println!("{} {} - {}", pack.pack_id.bright_cyan(), pack.title, summary);

            if args.details {
                for rule in &pack.rules {
                    println!("    {:<24} {}", rule.rule_id, verdict_label(&rule.verdict));
                }
            }
        }
        println!();
        print_outcome(&report.outcome);
    }

    if args.send {
        ctx.require_engine().await?;
        let message = ctx.client.create_event(&event).await?;
        println!("{} Sent event: {}", "OK".bright_green(), message);
    }
    Ok(())
}

fn verdict_label(verdict: &RuleVerdict) -> ColoredString {
    match verdict {
        RuleVerdict::Disabled => "disabled".dimmed(),
        RuleVerdict::Skipped => "skipped".dimmed(),
        RuleVerdict::NoMatch { reason } => reason.normal(),
        RuleVerdict::Matched {
            cancelling,
            groups,
            overruled,
        } => {
            let kind = if *cancelling { "cancels" } else { "matches" };
            let text = if groups.is_empty() {
                kind.to_string()
            } else {
                format!("{} (groups: {})", kind, groups.join(", "))
            };
            if *overruled {
                format!("{} - overruled", text).yellow()
            } else {
                text.bright_green()
            }
        },
    }
}

fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::NoMatch => println!("{}", "No rule matches this event".yellow()),
        Outcome::Dropped { pack_id, rule_id } => println!(
            "{} by rule {}/{}",
            "Event is dropped".bright_red(),
            pack_id,
            rule_id
        ),
        Outcome::Cancelled {
            pack_id,
            rule_id,
            actions,
        } => {
            println!("{} by rule {}/{}", "Event cancels".bright_green(), pack_id, rule_id);
            if !actions.is_empty() {
                println!("  actions:     {}", actions.join(", "));
            }
        },
        Outcome::Opened {
            pack_id,
            rule_id,
            classification,
            actions,
        } => {
            println!("{} by rule {}/{}", "Event is created".bright_green(), pack_id, rule_id);
            println!("  state:       {}", classification.state);
            println!("  text:        {}", classification.text);
            println!("  host:        {}", classification.host);
            println!("  application: {}", classification.application);
            println!("  sl:          {}", classification.sl);
            if let Some(comment) = &classification.comment {
                println!("  comment:     {}", comment);
            }
            if let Some(contact) = &classification.contact {
                println!("  contact:     {}", contact);
            }
            if !actions.is_empty() {
                println!("  actions:     {}", actions.join(", "));
            }
        },
    }
}
