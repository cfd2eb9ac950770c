//! Rule pack mutation API
//!
//! All changes to the store go through [`RuleEditor::apply`]:
//! 1. destructive mutations must be confirmed
//! 2. the single-use transaction token is consumed; a reused or unknown
//!    token makes the call a no-op
//! 3. the store is loaded, validated, mutated and saved once
//!
//! Errors never save. Packs provided by an extension package are
//! materialized as an editable copy before any change, and changes to
//! exported packs are written back to their exported file.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::engine::EngineControl;
use crate::error::{Result, RuleError};
use crate::mkp::{MkpIndex, MkpRepository};
use crate::store::{splice_move, RulePackStore};
use crate::transaction::TransactionLedger;
use crate::types::{Rule, RulePackRef, RulePackSpec, RulePackType};
use crate::validation::{
    validate_fixed_identity, validate_new_rule_id, validate_rule, validate_rule_edit,
    validate_rule_pack,
};

/// Warning shown while the engine runs as a replica
pub const REPLICA_WARNING: &str = "This Event Console is currently running as a remote replication. \
The rules edited here will not be used. Instead a copy of the rules of the central site \
is used in the case of a takeover.";

// ============================================================================
// Mutations
// ============================================================================

/// Editable properties of a rule pack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulePackProperties {
    pub id: String,
    pub title: String,
    pub disabled: bool,
    pub customer: Option<String>,
}

impl RulePackProperties {
    fn into_spec(self, rules: Vec<Rule>) -> RulePackSpec {
        RulePackSpec {
            id: self.id,
            title: self.title,
            disabled: self.disabled,
            customer: self.customer,
            rules,
        }
    }
}

/// A change to the store; packs and rules are addressed by position
#[derive(Debug, Clone)]
pub enum Mutation {
    /// Prepend a new, empty pack
    NewRulePack { properties: RulePackProperties },
    EditRulePack {
        nr: usize,
        properties: RulePackProperties,
    },
    DeleteRulePack { nr: usize, confirmed: bool },
    MoveRulePack { from: usize, to: usize },
    /// `internal` -> `exported`
    ExportRulePack { nr: usize },
    /// `exported` -> `internal`
    DissolveRulePack { nr: usize },
    /// `modified_mkp` -> `unmodified_mkp`, discarding local edits
    ResetRulePack { nr: usize },
    /// Write local edits of a `modified_mkp` pack back to its package
    SynchronizeRulePack { nr: usize },
    /// Insert at the head of the pack, or at the position of the cloned rule
    NewRule {
        pack: usize,
        rule: Rule,
        clone_of: Option<usize>,
    },
    EditRule { pack: usize, nr: usize, rule: Rule },
    DeleteRule {
        pack: usize,
        nr: usize,
        confirmed: bool,
    },
    MoveRule { pack: usize, from: usize, to: usize },
    /// Move a rule to the head of another pack
    MoveRuleToPack {
        pack: usize,
        nr: usize,
        target: usize,
    },
    /// Reset all hit counters in the engine
    ResetCounters { confirmed: bool },
    /// Replace the store with the rules of the replication master
    CopyRulesFromMaster { confirmed: bool },
}

impl Mutation {
    /// Audit name of the mutation
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::NewRulePack { .. } => "new-rule-pack",
            Mutation::EditRulePack { .. } => "edit-rule-pack",
            Mutation::DeleteRulePack { .. } => "delete-rule-pack",
            Mutation::MoveRulePack { .. } => "move-rule-pack",
            Mutation::ExportRulePack { .. } => "export-rule-pack",
            Mutation::DissolveRulePack { .. } => "dissolve-rule-pack",
            Mutation::ResetRulePack { .. } => "reset-rule-pack",
            Mutation::SynchronizeRulePack { .. } => "synchronize-rule-pack",
            Mutation::NewRule { .. } => "new-rule",
            Mutation::EditRule { .. } => "edit-rule",
            Mutation::DeleteRule { .. } => "delete-rule",
            Mutation::MoveRule { .. } => "move-rule",
            Mutation::MoveRuleToPack { .. } => "move-rule-to-pack",
            Mutation::ResetCounters { .. } => "counter-reset",
            Mutation::CopyRulesFromMaster { .. } => "copy-rules-from-master",
        }
    }

    /// `Some(confirmed)` for destructive mutations
    fn confirmation(&self) -> Option<bool> {
        match self {
            Mutation::DeleteRulePack { confirmed, .. }
            | Mutation::DeleteRule { confirmed, .. }
            | Mutation::ResetCounters { confirmed }
            | Mutation::CopyRulesFromMaster { confirmed } => Some(*confirmed),
            _ => None,
        }
    }

    /// Whether the mutation changes local rule configuration
    fn edits_rules(&self) -> bool {
        !matches!(
            self,
            Mutation::ResetCounters { .. } | Mutation::CopyRulesFromMaster { .. }
        )
    }
}

/// Result of [`RuleEditor::apply`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// The token was unknown or already used; nothing changed
    Replayed,
    Done {
        /// Audit message
        message: String,
        /// Set while the engine is a replica and edits do not take effect
        warning: Option<String>,
    },
}

// ============================================================================
// Editor
// ============================================================================

/// Store plus MKP repository with the mutation entry point
pub struct RuleEditor {
    store: RulePackStore,
    mkp: MkpRepository,
    packages_dir: PathBuf,
    ledger: Arc<TransactionLedger>,
    engine: Arc<dyn EngineControl>,
    replication_source: Option<Arc<dyn EngineControl>>,
}

impl RuleEditor {
    pub fn new(
        store: RulePackStore,
        mkp: MkpRepository,
        packages_dir: impl Into<PathBuf>,
        engine: Arc<dyn EngineControl>,
    ) -> Self {
        Self {
            store,
            mkp,
            packages_dir: packages_dir.into(),
            ledger: Arc::new(TransactionLedger::new()),
            engine,
            replication_source: None,
        }
    }

    /// Share a transaction ledger with other editors
    pub fn with_ledger(mut self, ledger: Arc<TransactionLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    /// Engine to copy rules from; the local engine by default
    pub fn with_replication_source(mut self, source: Arc<dyn EngineControl>) -> Self {
        self.replication_source = Some(source);
        self
    }

    /// Issue a token for the next mutation
    pub fn begin(&self) -> String {
        self.ledger.issue()
    }

    pub fn mkp(&self) -> &MkpRepository {
        &self.mkp
    }

    pub fn engine(&self) -> &Arc<dyn EngineControl> {
        &self.engine
    }

    /// Load the store with all proxies resolved, plus the MKP index
    ///
    /// A proxy whose exported file is gone stays unresolved.
    pub fn load(&self) -> Result<(Vec<RulePackRef>, MkpIndex)> {
        let mut packs = self.store.load()?;
        let index = MkpIndex::build(&self.mkp, &self.packages_dir)?;
        for pack in packs.iter_mut() {
            match pack.resolve(&self.mkp).map(|_| ()) {
                Ok(()) => {},
                Err(RuleError::NotFound(what)) => {
                    warn!("Cannot load rule pack {}: {} does not exist", pack.id(), what)
                },
                Err(e) => return Err(e),
            }
        }
        Ok((packs, index))
    }

    /// Apply a mutation guarded by a single-use transaction token
    pub async fn apply(&self, token: &str, mutation: Mutation) -> Result<Applied> {
        if mutation.confirmation() == Some(false) {
            return Err(RuleError::ConfirmationRequired(mutation.name().to_string()));
        }

        if !self.ledger.consume(token) {
            info!("Ignoring repeated submission of {}", mutation.name());
            return Ok(Applied::Replayed);
        }

        let name = mutation.name();
        let edits_rules = mutation.edits_rules();
        let message = match mutation {
            Mutation::NewRulePack { properties } => self.new_rule_pack(properties)?,
            Mutation::EditRulePack { nr, properties } => self.edit_rule_pack(nr, properties)?,
            Mutation::DeleteRulePack { nr, .. } => self.delete_rule_pack(nr)?,
            Mutation::MoveRulePack { from, to } => self.move_rule_pack(from, to)?,
            Mutation::ExportRulePack { nr } => self.export_rule_pack(nr)?,
            Mutation::DissolveRulePack { nr } => self.dissolve_rule_pack(nr)?,
            Mutation::ResetRulePack { nr } => self.reset_rule_pack(nr)?,
            Mutation::SynchronizeRulePack { nr } => self.synchronize_rule_pack(nr)?,
            Mutation::NewRule {
                pack,
                rule,
                clone_of,
            } => self.new_rule(pack, rule, clone_of)?,
            Mutation::EditRule { pack, nr, rule } => self.edit_rule(pack, nr, rule).await?,
            Mutation::DeleteRule { pack, nr, .. } => self.delete_rule(pack, nr)?,
            Mutation::MoveRule { pack, from, to } => self.move_rule(pack, from, to)?,
            Mutation::MoveRuleToPack { pack, nr, target } => {
                self.move_rule_to_pack(pack, nr, target)?
            },
            Mutation::ResetCounters { .. } => {
                self.engine.reset_counters(None).await?;
                "Reset all rule hit counters to zero".to_string()
            },
            Mutation::CopyRulesFromMaster { .. } => self.copy_rules_from_master().await?,
        };

        info!(action = name, "{}", message);

        let warning = if edits_rules && self.engine.replication_mode().await.is_replica() {
            Some(REPLICA_WARNING.to_string())
        } else {
            None
        };
        Ok(Applied::Done { message, warning })
    }

    // ---- rule packs ----

    fn new_rule_pack(&self, properties: RulePackProperties) -> Result<String> {
        let (mut packs, _) = self.load()?;
        let spec = properties.into_spec(Vec::new());
        validate_rule_pack(&spec, &packs, None)?;

        let message = format!("Created new rule pack {}", spec.id);
        packs.insert(0, RulePackRef::Owned(spec));
        self.store.save(&packs)?;
        Ok(message)
    }

    fn edit_rule_pack(&self, nr: usize, properties: RulePackProperties) -> Result<String> {
        let (mut packs, index) = self.load()?;
        let pack_type = self.prepare_for_edit(&mut packs, &index, nr)?;

        let old = editable(&mut packs, nr)?.clone();
        let mut spec = properties.into_spec(Vec::new());
        if pack_type != RulePackType::Internal {
            validate_fixed_identity(&old, &spec)?;
        }
        validate_rule_pack(&spec, &packs, Some(nr))?;

        spec.rules = old.rules;
        if spec.customer.is_some() {
            for rule in spec.rules.iter_mut() {
                rule.customer = None;
            }
        }
        let message = format!("Modified rule pack {}", spec.id);
        *editable(&mut packs, nr)? = spec;

        self.store.save(&packs)?;
        self.reexport(&packs, nr, pack_type)?;
        Ok(message)
    }

    fn delete_rule_pack(&self, nr: usize) -> Result<String> {
        let (mut packs, _) = self.load()?;
        pack_at(&packs, nr)?;
        let removed = packs.remove(nr);
        self.store.save(&packs)?;
        Ok(format!("Deleted rule pack {}", removed.id()))
    }

    fn move_rule_pack(&self, from: usize, to: usize) -> Result<String> {
        let (mut packs, _) = self.load()?;
        splice_move(&mut packs, from, to)?;
        self.store.save(&packs)?;
        Ok(format!("Changed position of rule pack {}", packs[to].id()))
    }

    fn export_rule_pack(&self, nr: usize) -> Result<String> {
        let (mut packs, index) = self.load()?;
        let pack = pack_at(&packs, nr)?;
        if RulePackType::type_of(pack, &index) != RulePackType::Internal {
            return Err(RuleError::InvalidState(format!(
                "Rule pack {} is not an internal rule pack and cannot be exported",
                pack.id()
            )));
        }

        let spec = editable(&mut packs, nr)?.clone();
        self.mkp.export_rule_pack(&spec)?;
        let message = format!("Made rule pack {} available for MKP export", spec.id);
        packs[nr] = RulePackRef::MkpProxy {
            id: spec.id.clone(),
            cached: Some(spec),
        };
        self.store.save(&packs)?;
        Ok(message)
    }

    fn dissolve_rule_pack(&self, nr: usize) -> Result<String> {
        let (mut packs, index) = self.load()?;
        let pack = pack_at(&packs, nr)?;
        if RulePackType::type_of(pack, &index) != RulePackType::Exported {
            return Err(RuleError::InvalidState(format!(
                "Rule pack {} was not exported",
                pack.id()
            )));
        }

        let spec = packs[nr].resolve(&self.mkp)?.clone();
        let id = spec.id.clone();
        packs[nr] = RulePackRef::Owned(spec);
        self.store.save(&packs)?;
        self.mkp.remove_exported_rule_pack(&id)?;
        Ok(format!("Removed rule pack {} from MKP export", id))
    }

    fn reset_rule_pack(&self, nr: usize) -> Result<String> {
        let (mut packs, index) = self.load()?;
        let pack = pack_at(&packs, nr)?;
        if RulePackType::type_of(pack, &index) != RulePackType::ModifiedMkp {
            return Err(RuleError::InvalidState(format!(
                "Rule pack {} has no local modifications to reset",
                pack.id()
            )));
        }

        let id = pack.id().to_string();
        packs[nr] = RulePackRef::proxy(&id);
        self.store.save(&packs)?;
        Ok(format!(
            "Reset the rules of rule pack {} to the ones provided via MKP",
            id
        ))
    }

    fn synchronize_rule_pack(&self, nr: usize) -> Result<String> {
        let (mut packs, index) = self.load()?;
        let pack = pack_at(&packs, nr)?;
        if RulePackType::type_of(pack, &index) != RulePackType::ModifiedMkp {
            return Err(RuleError::InvalidState(format!(
                "Rule pack {} is not a modified packaged rule pack",
                pack.id()
            )));
        }

        let spec = editable(&mut packs, nr)?.clone();
        self.mkp.export_rule_pack(&spec)?;
        let message = format!("Synchronized MKP with the modified rule pack {}", spec.id);
        packs[nr] = RulePackRef::MkpProxy {
            id: spec.id.clone(),
            cached: Some(spec),
        };
        self.store.save(&packs)?;
        Ok(message)
    }

    // ---- rules ----

    fn new_rule(&self, pack: usize, mut rule: Rule, clone_of: Option<usize>) -> Result<String> {
        let (mut packs, index) = self.load()?;
        pack_at(&packs, pack)?;
        validate_rule(&rule)?;
        validate_new_rule_id(&packs, &rule.id)?;

        let pack_type = self.prepare_for_edit(&mut packs, &index, pack)?;
        let spec = editable(&mut packs, pack)?;
        let position = match clone_of {
            Some(nr) if nr < spec.rules.len() => nr,
            Some(nr) => return Err(RuleError::NotFound(format!("Rule {}", nr))),
            None => 0,
        };
        if spec.customer.is_some() {
            rule.customer = None;
        }

        let message = format!("Created new rule {} in rule pack {}", rule.id, spec.id);
        spec.rules.insert(position, rule);

        self.store.save(&packs)?;
        self.reexport(&packs, pack, pack_type)?;
        Ok(message)
    }

    async fn edit_rule(&self, pack: usize, nr: usize, mut rule: Rule) -> Result<String> {
        let (mut packs, index) = self.load()?;
        let old = rule_at(&packs, pack, nr)?;
        validate_rule_edit(old, &rule)?;
        validate_rule(&rule)?;

        let pack_type = self.prepare_for_edit(&mut packs, &index, pack)?;
        let spec = editable(&mut packs, pack)?;
        if spec.customer.is_some() {
            rule.customer = None;
        }
        let rule_id = rule.id.clone();
        let message = format!("Modified rule {} in rule pack {}", rule_id, spec.id);
        let slot = spec
            .rules
            .get_mut(nr)
            .ok_or_else(|| RuleError::NotFound(format!("Rule {}", nr)))?;
        *slot = rule;

        self.store.save(&packs)?;
        self.reexport(&packs, pack, pack_type)?;

        if let Err(e) = self.engine.reset_counters(Some(&rule_id)).await {
            warn!("Could not reset hit counter of rule {}: {}", rule_id, e);
        }
        Ok(message)
    }

    fn delete_rule(&self, pack: usize, nr: usize) -> Result<String> {
        let (mut packs, index) = self.load()?;
        rule_at(&packs, pack, nr)?;

        let pack_type = self.prepare_for_edit(&mut packs, &index, pack)?;
        let spec = editable(&mut packs, pack)?;
        if nr >= spec.rules.len() {
            return Err(RuleError::NotFound(format!("Rule {}", nr)));
        }
        let removed = spec.rules.remove(nr);
        let message = format!("Deleted rule {} in rule pack {}", removed.id, spec.id);

        self.store.save(&packs)?;
        self.reexport(&packs, pack, pack_type)?;
        Ok(message)
    }

    fn move_rule(&self, pack: usize, from: usize, to: usize) -> Result<String> {
        let (mut packs, index) = self.load()?;
        pack_at(&packs, pack)?;

        let pack_type = self.prepare_for_edit(&mut packs, &index, pack)?;
        let spec = editable(&mut packs, pack)?;
        splice_move(&mut spec.rules, from, to)?;
        let message = format!(
            "Changed position of rule {} in rule pack {}",
            spec.rules[to].id, spec.id
        );

        self.store.save(&packs)?;
        self.reexport(&packs, pack, pack_type)?;
        Ok(message)
    }

    fn move_rule_to_pack(&self, pack: usize, nr: usize, target: usize) -> Result<String> {
        let (mut packs, index) = self.load()?;
        rule_at(&packs, pack, nr)?;
        pack_at(&packs, target)?;
        if pack == target {
            return Err(RuleError::InvalidState(
                "The rule is already in this rule pack".to_string(),
            ));
        }

        let source_type = self.prepare_for_edit(&mut packs, &index, pack)?;
        let target_type = self.prepare_for_edit(&mut packs, &index, target)?;

        let source = editable(&mut packs, pack)?;
        if nr >= source.rules.len() {
            return Err(RuleError::NotFound(format!("Rule {}", nr)));
        }
        let rule = source.rules.remove(nr);
        let source_id = source.id.clone();

        let destination = editable(&mut packs, target)?;
        let message = format!(
            "Moved rule {} from rule pack {} to rule pack {}",
            rule.id, source_id, destination.id
        );
        destination.rules.insert(0, rule);

        self.store.save(&packs)?;
        self.reexport(&packs, pack, source_type)?;
        self.reexport(&packs, target, target_type)?;
        Ok(message)
    }

    // ---- replication ----

    async fn copy_rules_from_master(&self) -> Result<String> {
        let source = self.replication_source.as_ref().unwrap_or(&self.engine);
        let packs = source.replicate().await?;
        self.store.save(&packs)?;
        Ok(format!(
            "Copied {} rule packs from the central site into the local configuration",
            packs.len()
        ))
    }

    // ---- helpers ----

    /// Make pack `nr` editable and return its type before the change
    fn prepare_for_edit(
        &self,
        packs: &mut [RulePackRef],
        index: &MkpIndex,
        nr: usize,
    ) -> Result<RulePackType> {
        let pack_type = RulePackType::type_of(pack_at(packs, nr)?, index);
        match pack_type {
            RulePackType::UnmodifiedMkp => self.mkp.override_rule_pack_proxy(nr, packs)?,
            RulePackType::Exported => {
                packs[nr].resolve(&self.mkp)?;
            },
            RulePackType::Internal | RulePackType::ModifiedMkp => {},
        }
        Ok(pack_type)
    }

    /// Write the pack back to its exported file when it was exported
    fn reexport(&self, packs: &[RulePackRef], nr: usize, pack_type: RulePackType) -> Result<()> {
        if pack_type != RulePackType::Exported {
            return Ok(());
        }
        match packs.get(nr).and_then(RulePackRef::loaded) {
            Some(spec) => self.mkp.export_rule_pack(spec),
            None => Err(RuleError::NotFound(format!("Rule pack {}", nr))),
        }
    }
}

fn pack_at(packs: &[RulePackRef], nr: usize) -> Result<&RulePackRef> {
    packs
        .get(nr)
        .ok_or_else(|| RuleError::NotFound(format!("Rule pack {}", nr)))
}

fn rule_at(packs: &[RulePackRef], pack: usize, nr: usize) -> Result<&Rule> {
    pack_at(packs, pack)?
        .loaded()
        .and_then(|spec| spec.rules.get(nr))
        .ok_or_else(|| RuleError::NotFound(format!("Rule {}", nr)))
}

fn editable(packs: &mut [RulePackRef], nr: usize) -> Result<&mut RulePackSpec> {
    packs
        .get_mut(nr)
        .and_then(RulePackRef::loaded_mut)
        .ok_or_else(|| RuleError::NotFound(format!("Rule pack {}", nr)))
}
