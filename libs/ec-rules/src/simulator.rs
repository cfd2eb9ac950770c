//! Event simulator
//!
//! Runs an event through the whole store the way the engine does and
//! reports, for every pack and rule, whether it matched and why not.
//!
//! - packs in store order, rules in list order
//! - the first successful match is decisive; later ones are overruled
//! - `drop = Drop` ends processing without any action
//! - `drop = SkipPack` skips the rest of its pack only

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::matcher::{MatchResult, RuleMatcher};
use crate::rewrite::{classify, Classification};
use crate::types::{DropMode, Event, RulePackSpec};

/// Verdict for a single rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RuleVerdict {
    Disabled,
    NoMatch {
        reason: String,
    },
    Matched {
        cancelling: bool,
        groups: Vec<String>,
        /// A previous rule already decided the outcome
        overruled: bool,
    },
    /// Not evaluated because a previous rule skipped the pack
    Skipped,
}

/// Summary line of a pack
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PackSummary {
    Disabled,
    NoMatch,
    Matched {
        matches: usize,
        /// The first match skips the rest of the pack
        first_match_skips: bool,
        first_match_cancels: bool,
        decisive_groups: Vec<String>,
        /// A previous pack already decided the outcome
        overruled: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleReport {
    pub rule_id: String,
    pub verdict: RuleVerdict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackReport {
    pub pack_id: String,
    pub title: String,
    pub summary: PackSummary,
    pub rules: Vec<RuleReport>,
}

/// What the engine does with the event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    NoMatch,
    Dropped {
        pack_id: String,
        rule_id: String,
    },
    Cancelled {
        pack_id: String,
        rule_id: String,
        actions: Vec<String>,
    },
    Opened {
        pack_id: String,
        rule_id: String,
        classification: Classification,
        actions: Vec<String>,
    },
}

impl Outcome {
    /// Decisive rule as `(pack_id, rule_id)`
    pub fn decisive_rule(&self) -> Option<(&str, &str)> {
        match self {
            Outcome::NoMatch => None,
            Outcome::Dropped { pack_id, rule_id }
            | Outcome::Cancelled {
                pack_id, rule_id, ..
            }
            | Outcome::Opened {
                pack_id, rule_id, ..
            } => Some((pack_id, rule_id)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationReport {
    pub packs: Vec<PackReport>,
    pub outcome: Outcome,
}

/// Simulate `event` against resolved rule packs in store order
pub fn simulate(
    packs: &[RulePackSpec],
    event: &Event,
    matcher: &RuleMatcher<'_>,
) -> Result<SimulationReport> {
    let mut outcome: Option<Outcome> = None;
    let mut reports = Vec::with_capacity(packs.len());
    let mut pack_had_match = false;

    for pack in packs {
        if pack.disabled {
            reports.push(PackReport {
                pack_id: pack.id.clone(),
                title: pack.title.clone(),
                summary: PackSummary::Disabled,
                rules: pack
                    .rules
                    .iter()
                    .map(|r| RuleReport {
                        rule_id: r.id.clone(),
                        verdict: RuleVerdict::Disabled,
                    })
                    .collect(),
            });
            continue;
        }

        let mut rules = Vec::with_capacity(pack.rules.len());
        let mut matches = 0;
        let mut first: Option<(bool, Vec<String>)> = None;
        let mut skipping = false;

        for rule in &pack.rules {
            if skipping {
                rules.push(RuleReport {
                    rule_id: rule.id.clone(),
                    verdict: RuleVerdict::Skipped,
                });
                continue;
            }
            if rule.disabled {
                rules.push(RuleReport {
                    rule_id: rule.id.clone(),
                    verdict: RuleVerdict::Disabled,
                });
                continue;
            }

            let verdict = match matcher.matches(pack, rule, event) {
                MatchResult::Failure { reason } => RuleVerdict::NoMatch { reason },
                MatchResult::Success { cancelling, groups } => {
                    let opens = outcome.is_none() && rule.drop.is_none() && !cancelling;
                    let classification = match opens.then(|| classify(rule, event, &groups)) {
                        Some(Err(e)) => {
                            warn!("Rule {}/{} cannot classify the event: {}", pack.id, rule.id, e);
                            rules.push(RuleReport {
                                rule_id: rule.id.clone(),
                                verdict: RuleVerdict::NoMatch {
                                    reason: format!("The rule cannot be used: {}", e),
                                },
                            });
                            continue;
                        },
                        Some(Ok(classification)) => Some(classification),
                        None => None,
                    };

                    matches += 1;
                    let decisive_groups = groups.decisive(cancelling).to_vec();
                    if first.is_none() {
                        first = Some((cancelling, decisive_groups.clone()));
                    }

                    let overruled = outcome.is_some();
                    if !overruled {
                        match rule.drop {
                            Some(DropMode::SkipPack) => {
                                debug!("Rule {}/{} skips its pack", pack.id, rule.id);
                                skipping = true;
                            },
                            Some(DropMode::Drop) => {
                                outcome = Some(Outcome::Dropped {
                                    pack_id: pack.id.clone(),
                                    rule_id: rule.id.clone(),
                                });
                            },
                            None if cancelling => {
                                outcome = Some(Outcome::Cancelled {
                                    pack_id: pack.id.clone(),
                                    rule_id: rule.id.clone(),
                                    actions: rule.cancel_actions.clone(),
                                });
                            },
                            None => {
                                if let Some(classification) = classification {
                                    outcome = Some(Outcome::Opened {
                                        pack_id: pack.id.clone(),
                                        rule_id: rule.id.clone(),
                                        classification,
                                        actions: rule.actions.clone(),
                                    });
                                }
                            },
                        }
                    } else if rule.drop == Some(DropMode::SkipPack) && !cancelling {
                        skipping = true;
                    }

                    RuleVerdict::Matched {
                        cancelling,
                        groups: decisive_groups,
                        overruled,
                    }
                },
            };
            rules.push(RuleReport {
                rule_id: rule.id.clone(),
                verdict,
            });
        }

        let summary = match first {
            None => PackSummary::NoMatch,
            Some((first_cancels, decisive_groups)) => {
                let first_match_skips = matches == 1 && skipping;
                let overruled = pack_had_match;
                if !first_match_skips {
                    pack_had_match = true;
                }
                PackSummary::Matched {
                    matches,
                    first_match_skips,
                    first_match_cancels: first_cancels,
                    decisive_groups,
                    overruled,
                }
            },
        };

        reports.push(PackReport {
            pack_id: pack.id.clone(),
            title: pack.title.clone(),
            summary,
            rules,
        });
    }

    let outcome = outcome.unwrap_or(Outcome::NoMatch);
    debug!("Simulation outcome: {:?}", outcome);
    Ok(SimulationReport {
        packs: reports,
        outcome,
    })
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::matcher::{AlwaysActive, MatchContext};
    use crate::types::{MonitoringState, Rule, RuleState, TextPatterns};

    fn rule(id: &str, pattern: &str) -> Rule {
        let mut r = Rule::new(id);
        r.match_text = Some(pattern.to_string());
        r.state = RuleState::Fixed(MonitoringState::Warn);
        r.actions = vec![format!("notify-{}", id)];
        r
    }

    fn run(packs: &[RulePackSpec], text: &str) -> SimulationReport {
        let ctx = MatchContext::default();
        let matcher = RuleMatcher::new(&ctx, &AlwaysActive);
        let event = Event {
            text: text.to_string(),
            ..Event::default()
        };
        simulate(packs, &event, &matcher).unwrap()
    }

    #[test]
    fn test_first_match_wins_and_overrules() {
        let mut a = RulePackSpec::new("a", "A");
        a.rules = vec![rule("a1", "nomatch"), rule("a2", "disk")];
        let mut b = RulePackSpec::new("b", "B");
        b.rules = vec![rule("b1", "disk")];

        let report = run(&[a, b], "disk full");
        match &report.outcome {
            Outcome::Opened {
                rule_id, actions, ..
            } => {
                assert_eq!(rule_id, "a2");
                assert_eq!(actions, &vec!["notify-a2".to_string()]);
            },
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            report.packs[1].rules[0].verdict,
            RuleVerdict::Matched { overruled: true, .. }
        ));
        assert!(matches!(
            report.packs[1].summary,
            PackSummary::Matched { overruled: true, .. }
        ));
        assert!(matches!(
            report.packs[0].rules[0].verdict,
            RuleVerdict::NoMatch { .. }
        ));
    }

    #[test]
    fn test_skip_pack_then_later_pack() {
        let mut a = RulePackSpec::new("a", "A");
        let mut skip = rule("skip", "disk");
        skip.drop = Some(DropMode::SkipPack);
        a.rules = vec![skip, rule("a2", "disk")];
        let mut b = RulePackSpec::new("b", "B");
        b.rules = vec![rule("b1", "disk")];

        let report = run(&[a, b], "disk full");
        assert_eq!(report.outcome.decisive_rule(), Some(("b", "b1")));
        assert_eq!(report.packs[0].rules[1].verdict, RuleVerdict::Skipped);
        assert!(matches!(
            report.packs[0].summary,
            PackSummary::Matched {
                first_match_skips: true,
                ..
            }
        ));
        assert!(matches!(
            report.packs[1].summary,
            PackSummary::Matched { overruled: false, .. }
        ));
    }

    #[test]
    fn test_drop_stops_everything() {
        let mut a = RulePackSpec::new("a", "A");
        let mut drop = rule("drop", "noise");
        drop.drop = Some(DropMode::Drop);
        a.rules = vec![drop, rule("a2", "noise")];

        let report = run(&[a], "noise");
        assert_eq!(
            report.outcome,
            Outcome::Dropped {
                pack_id: "a".into(),
                rule_id: "drop".into()
            }
        );
    }

    #[test]
    fn test_unusable_state_pattern_is_reported_per_rule() {
        let mut a = RulePackSpec::new("a", "A");
        let mut broken = rule("broken", "disk");
        broken.state = RuleState::TextPattern(TextPatterns {
            crit: Some("[".into()),
            ..TextPatterns::default()
        });
        a.rules = vec![broken, rule("a2", "disk")];

        let report = run(&[a], "disk full");
        match &report.packs[0].rules[0].verdict {
            RuleVerdict::NoMatch { reason } => {
                assert!(reason.starts_with("The rule cannot be used"));
            },
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(report.outcome.decisive_rule(), Some(("a", "a2")));
        assert!(matches!(
            report.packs[0].summary,
            PackSummary::Matched { matches: 1, .. }
        ));
    }

    #[test]
    fn test_disabled_pack_and_cancel() {
        let mut off = RulePackSpec::new("off", "Off");
        off.disabled = true;
        off.rules = vec![rule("x", "up")];

        let mut on = RulePackSpec::new("on", "On");
        let mut cancel = rule("c", "link down");
        cancel.match_ok = Some("link up".into());
        cancel.cancel_actions = vec!["clear".into()];
        on.rules = vec![cancel];

        let report = run(&[off, on], "link up");
        assert_eq!(report.packs[0].summary, PackSummary::Disabled);
        assert_eq!(
            report.outcome,
            Outcome::Cancelled {
                pack_id: "on".into(),
                rule_id: "c".into(),
                actions: vec!["clear".into()]
            }
        );
    }
}
