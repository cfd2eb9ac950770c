//! Rule packs shared through extension packages (MKPs)
//!
//! An exported rule pack lives as `<id>.json` in the MKP rule pack
//! directory and is referenced from the store by a proxy. Installed
//! packages declare the exported files they ship in a manifest under the
//! packages directory; [`MkpIndex`] joins both.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Result, RuleError};
use crate::store::write_json_atomic;
use crate::types::{RulePackRef, RulePackSpec};

// ============================================================================
// Repository of exported packs
// ============================================================================

/// Directory of exported rule packs
#[derive(Debug, Clone)]
pub struct MkpRepository {
    dir: PathBuf,
    pretty_print: bool,
}

impl MkpRepository {
    pub fn new(dir: impl Into<PathBuf>, pretty_print: bool) -> Self {
        Self {
            dir: dir.into(),
            pretty_print,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_of(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// Write the pack to its exported file
    pub fn export_rule_pack(&self, pack: &RulePackSpec) -> Result<()> {
        let path = self.file_of(&pack.id);
        write_json_atomic(&path, pack, self.pretty_print)?;
        info!("Exported rule pack {} to {}", pack.id, path.display());
        Ok(())
    }

    /// Remove the exported file of a pack; a missing file is ignored
    pub fn remove_exported_rule_pack(&self, id: &str) -> Result<()> {
        let path = self.file_of(id);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!("Removed exported rule pack {}", id);
                Ok(())
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Exported rule pack {} was already removed", id);
                Ok(())
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Load the exported copy of a pack
    pub fn load_rule_pack(&self, id: &str) -> Result<RulePackSpec> {
        let path = self.file_of(id);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RuleError::NotFound(format!("Exported rule pack {}", id)));
            },
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    /// Ids of all exported packs, sorted
    pub fn exported_ids(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Replace the proxy at `nr` with an editable copy of its packaged content
    pub fn override_rule_pack_proxy(&self, nr: usize, packs: &mut [RulePackRef]) -> Result<()> {
        let slot = packs
            .get_mut(nr)
            .ok_or_else(|| RuleError::NotFound(format!("Rule pack {}", nr)))?;

        let spec = match slot {
            RulePackRef::MkpProxy { id, cached } => match cached.take() {
                Some(spec) => spec,
                None => self.load_rule_pack(id)?,
            },
            RulePackRef::Owned(spec) => {
                return Err(RuleError::InvalidState(format!(
                    "Rule pack {} is not a packaged rule pack",
                    spec.id
                )));
            },
        };

        debug!("Materialized packaged rule pack {}", spec.id);
        *slot = RulePackRef::Owned(spec);
        Ok(())
    }
}

// ============================================================================
// Package index
// ============================================================================

/// Manifest of an installed package
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageManifest {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub files: PackageFiles,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageFiles {
    /// Exported rule pack files (`<id>.json`) shipped by the package
    #[serde(default)]
    pub ec_rule_packs: Vec<String>,
}

/// Exported rule pack id -> name of the package shipping it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MkpIndex {
    entries: HashMap<String, Option<String>>,
}

impl MkpIndex {
    /// Index over the exported packs and the installed package manifests
    pub fn build(repository: &MkpRepository, packages_dir: &Path) -> Result<Self> {
        let manifests = load_manifests(packages_dir)?;
        let mut index = MkpIndex::default();

        for id in repository.exported_ids()? {
            let file = format!("{}.json", id);
            let package = manifests
                .iter()
                .find(|m| m.files.ec_rule_packs.iter().any(|f| *f == file))
                .map(|m| m.name.clone());
            index.insert(id, package);
        }

        debug!("MKP index holds {} exported rule packs", index.len());
        Ok(index)
    }

    pub fn insert(&mut self, id: impl Into<String>, package: Option<String>) {
        self.entries.insert(id.into(), package);
    }

    /// Whether the pack is exported (with or without a package)
    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Package shipping the pack, if any
    pub fn package_of(&self, id: &str) -> Option<&str> {
        self.entries.get(id).and_then(|p| p.as_deref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn load_manifests(packages_dir: &Path) -> Result<Vec<PackageManifest>> {
    let entries = match std::fs::read_dir(packages_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut manifests = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let content = std::fs::read_to_string(&path)?;
        match serde_json::from_str::<PackageManifest>(&content) {
            Ok(manifest) => manifests.push(manifest),
            Err(e) => warn!("Ignoring unreadable package manifest {}: {}", path.display(), e),
        }
    }
    manifests.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(manifests)
}
