//! Rule hit statistics and pack listings
//!
//! Hit counters live in the engine; they are joined into the listing at
//! display time and never persisted with the rules.

use serde::Serialize;
use std::collections::HashMap;

use crate::mkp::MkpIndex;
use crate::types::{Rule, RulePackRef, RulePackType};

/// Hits per rule id, summed over all sites
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleHits {
    hits: HashMap<String, u64>,
}

impl RuleHits {
    pub fn from_rows<I, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let mut hits = RuleHits::default();
        for (rule_id, count) in rows {
            hits.add(rule_id, count);
        }
        hits
    }

    pub fn add(&mut self, rule_id: impl Into<String>, count: u64) {
        *self.hits.entry(rule_id.into()).or_insert(0) += count;
    }

    pub fn rule(&self, rule_id: &str) -> u64 {
        self.hits.get(rule_id).copied().unwrap_or(0)
    }

    pub fn rules(&self, rules: &[Rule]) -> u64 {
        rules.iter().map(|r| self.rule(&r.id)).sum()
    }
}

/// One line of the pack listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackRow {
    pub nr: usize,
    pub id: String,
    pub title: String,
    pub pack_type: RulePackType,
    /// Package shipping the pack
    pub package: Option<String>,
    pub disabled: bool,
    pub customer: Option<String>,
    pub rules: usize,
    pub hits: u64,
}

/// Listing rows for all packs; unresolved proxies count as empty
pub fn summarize(packs: &[RulePackRef], index: &MkpIndex, hits: &RuleHits) -> Vec<PackRow> {
    packs
        .iter()
        .enumerate()
        .map(|(nr, pack)| {
            let spec = pack.loaded();
            PackRow {
                nr,
                id: pack.id().to_string(),
                title: spec.map(|s| s.title.clone()).unwrap_or_default(),
                pack_type: RulePackType::type_of(pack, index),
                package: index.package_of(pack.id()).map(str::to_string),
                disabled: spec.is_some_and(|s| s.disabled),
                customer: spec.and_then(|s| s.customer.clone()),
                rules: spec.map_or(0, |s| s.rules.len()),
                hits: spec.map_or(0, |s| hits.rules(&s.rules)),
            }
        })
        .collect()
}

/// Packs and rules found by [`search`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub pack_id: String,
    pub pack_title: String,
    /// Matching rule ids; empty when only the pack itself matched
    pub rule_ids: Vec<String>,
}

/// Case-insensitive search over pack id/title and rule id/description/match
pub fn search(packs: &[RulePackRef], expression: &str) -> Vec<SearchHit> {
    let needle = expression.to_lowercase();
    let mut found = Vec::new();

    for pack in packs.iter().filter_map(RulePackRef::loaded) {
        let pack_matches = pack.id.to_lowercase().contains(&needle)
            || pack.title.to_lowercase().contains(&needle);

        let rule_ids: Vec<String> = pack
            .rules
            .iter()
            .filter(|rule| {
                [
                    Some(rule.id.as_str()),
                    rule.description.as_deref(),
                    rule.match_text.as_deref(),
                ]
                .into_iter()
                .flatten()
                .any(|item| item.to_lowercase().contains(&needle))
            })
            .map(|rule| rule.id.clone())
            .collect();

        if pack_matches || !rule_ids.is_empty() {
            found.push(SearchHit {
                pack_id: pack.id.clone(),
                pack_title: pack.title.clone(),
                rule_ids,
            });
        }
    }
    found
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::types::RulePackSpec;

    fn packs() -> Vec<RulePackRef> {
        let mut db = RulePackSpec::new("database", "Database");
        let mut ora = Rule::new("ora");
        ora.description = Some("Oracle errors".into());
        ora.match_text = Some("ORA-\\d+".into());
        db.rules = vec![ora, Rule::new("pg")];

        let mut net = RulePackSpec::new("network", "Network");
        net.disabled = true;
        net.rules = vec![Rule::new("link")];

        vec![
            RulePackRef::Owned(db),
            RulePackRef::Owned(net),
            RulePackRef::proxy("vendor"),
        ]
    }

    #[test]
    fn test_hits_are_summed() {
        let hits = RuleHits::from_rows(vec![("ora", 3), ("pg", 1), ("ora", 2)]);
        assert_eq!(hits.rule("ora"), 5);
        assert_eq!(hits.rule("missing"), 0);

        let mut index = MkpIndex::default();
        index.insert("vendor", Some("vendor-pkg".into()));
        let rows = summarize(&packs(), &index, &hits);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].hits, 6);
        assert_eq!(rows[0].rules, 2);
        assert!(rows[1].disabled);
        assert_eq!(rows[2].pack_type, RulePackType::UnmodifiedMkp);
        assert_eq!(rows[2].package.as_deref(), Some("vendor-pkg"));
    }

    #[test]
    fn test_search() {
        let found = search(&packs(), "ORACLE");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].rule_ids, vec!["ora"]);

        let found = search(&packs(), "netw");
        assert_eq!(found[0].pack_id, "network");
        assert!(found[0].rule_ids.is_empty());

        assert!(search(&packs(), "nothing").is_empty());
    }
}
