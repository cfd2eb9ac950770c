//! Rule pack store
//!
//! The store is one JSON document holding the ordered list of rule packs.
//! It is always loaded and saved as a whole; saving replaces the file
//! atomically so readers never observe a partial write. There is no
//! version check: the last writer wins.

use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Result, RuleError};
use crate::types::RulePackRef;

/// File name of the store inside the rule pack directory
pub const RULES_FILE: &str = "rules.json";

/// Persistent, ordered list of rule packs
#[derive(Debug, Clone)]
pub struct RulePackStore {
    path: PathBuf,
    pretty_print: bool,
}

impl RulePackStore {
    pub fn new(rule_pack_dir: impl AsRef<Path>, pretty_print: bool) -> Self {
        Self {
            path: rule_pack_dir.as_ref().join(RULES_FILE),
            pretty_print,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all rule packs in store order; a missing file is an empty store
    pub fn load(&self) -> Result<Vec<RulePackRef>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No rule pack store at {}", self.path.display());
                return Ok(Vec::new());
            },
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let packs: Vec<RulePackRef> = serde_json::from_str(&content)?;
        debug!("Loaded {} rule packs from {}", packs.len(), self.path.display());
        Ok(packs)
    }

    /// Persist all rule packs, replacing the previous file
    pub fn save(&self, packs: &[RulePackRef]) -> Result<()> {
        write_json_atomic(&self.path, &packs, self.pretty_print)?;
        info!("Saved {} rule packs to {}", packs.len(), self.path.display());
        Ok(())
    }
}

/// Write `value` as JSON to a temp file next to `path` and rename it over `path`
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
    pretty_print: bool,
) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut data = if pretty_print {
        serde_json::to_vec_pretty(value)?
    } else {
        serde_json::to_vec(value)?
    };
    data.push(b'\n');

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)?;
    Ok(())
}

/// Move the element at `from` to `to`
///
/// The element is removed first; `to` indexes the shortened list, so moving
/// forward accounts for the shift.
pub fn splice_move<T>(list: &mut Vec<T>, from: usize, to: usize) -> Result<()> {
    if from >= list.len() {
        return Err(RuleError::NotFound(format!("Entry at position {}", from)));
    }
    if to >= list.len() {
        return Err(RuleError::NotFound(format!("Target position {}", to)));
    }
    let item = list.remove(from);
    list.insert(to, item);
    Ok(())
}

/// Index of the pack with the given id
pub fn find_pack(packs: &[RulePackRef], id: &str) -> Option<usize> {
    packs.iter().position(|p| p.id() == id)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::types::{Rule, RulePackSpec};
    use tempfile::TempDir;

    fn pack(id: &str) -> RulePackRef {
        let mut spec = RulePackSpec::new(id, id.to_uppercase());
        spec.rules.push(Rule::new(format!("{}-1", id)));
        RulePackRef::Owned(spec)
    }

    #[test]
    fn test_missing_store_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = RulePackStore::new(dir.path().join("absent"), false);
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_load_preserves_order_and_proxies() {
        let dir = TempDir::new().unwrap();
        let store = RulePackStore::new(dir.path(), true);
        let packs = vec![pack("b"), RulePackRef::proxy("vendor"), pack("a")];

        store.save(&packs).unwrap();
        let loaded = store.load().unwrap();

        let ids: Vec<_> = loaded.iter().map(|p| p.id().to_string()).collect();
        assert_eq!(ids, vec!["b", "vendor", "a"]);
        assert!(loaded[1].is_proxy());
        assert_eq!(loaded[0], packs[0]);

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\n  "), "pretty printed output expected");
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let store = RulePackStore::new(dir.path(), false);
        store.save(&[pack("a")]).unwrap();
        store.save(&[pack("b")]).unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(store.load().unwrap()[0].id(), "b");
    }

    #[test]
    fn test_splice_move() {
        let mut list = vec!["old0", "old1", "old2"];
        splice_move(&mut list, 0, 2).unwrap();
        assert_eq!(list, vec!["old1", "old2", "old0"]);

        let mut list = vec!["old0", "old1", "old2"];
        splice_move(&mut list, 2, 0).unwrap();
        assert_eq!(list, vec!["old2", "old0", "old1"]);

        let mut list = vec!["old0", "old1", "old2"];
        assert!(matches!(splice_move(&mut list, 3, 0), Err(RuleError::NotFound(_))));
        assert!(matches!(splice_move(&mut list, 0, 3), Err(RuleError::NotFound(_))));
        assert_eq!(list, vec!["old0", "old1", "old2"]);
    }
}
