//! Runtime context shared by all commands
//!
//! Settings are loaded once; relative paths and socket endpoints are
//! resolved against the site root.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use common::EcSettings;
use ec_client::EventConsoleClient;
use ec_rules::{
    EngineControl, MatchContext, MkpRepository, ReplicationMode, RuleEditor, RulePackStore,
};

pub struct CliContext {
    pub settings: EcSettings,
    pub site_root: PathBuf,
    pub editor: RuleEditor,
    pub client: Arc<EventConsoleClient>,
    /// Confirm destructive operations without asking
    pub assume_yes: bool,
    pub json: bool,
}

impl CliContext {
    pub fn new(settings: EcSettings, site_root: PathBuf, assume_yes: bool, json: bool) -> Result<Self> {
        let paths = &settings.paths;
        let store = RulePackStore::new(resolve(&site_root, &paths.rule_pack_dir), settings.pretty_print);
        let mkp = MkpRepository::new(
            resolve(&site_root, &paths.mkp_rule_pack_dir),
            settings.pretty_print,
        );
        let packages_dir = resolve(&site_root, &paths.packages_dir);

        let client = Arc::new(
            EventConsoleClient::from_settings(&settings.engine, &site_root)
                .context("Invalid engine endpoint")?,
        );
        debug!("Engine endpoint: {}", client.endpoint());

        let mut editor = RuleEditor::new(store, mkp, packages_dir, client.clone());
        if let Some(master) = &settings.master {
            let source = EventConsoleClient::from_settings(master, &site_root)
                .context("Invalid master endpoint")?;
            debug!("Replication source: {}", source.endpoint());
            editor = editor.with_replication_source(Arc::new(source));
        }

        Ok(Self {
            settings,
            site_root,
            editor,
            client,
            assume_yes,
            json,
        })
    }

    pub fn match_context(&self) -> MatchContext {
        MatchContext {
            site_id: self.settings.site_id.clone(),
            site_customer: self.settings.site_customer.clone(),
        }
    }

    /// Replication mode of the local engine; `Stopped` when it is not running
    pub async fn engine_mode(&self) -> ReplicationMode {
        self.client.replication_mode().await
    }

    /// Fail early when the engine cannot take commands
    pub async fn require_engine(&self) -> Result<ReplicationMode> {
        let mode = self.engine_mode().await;
        if mode == ReplicationMode::Stopped {
            anyhow::bail!(
                "The Event Console is currently not running ({}). Engine actions are unavailable.",
                self.client.endpoint()
            );
        }
        Ok(mode)
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_paths_resolve_against_site_root() {
        let root = Path::new("/omd/sites/central");
        assert_eq!(
            resolve(root, Path::new("etc/mkeventd.d/wato")),
            PathBuf::from("/omd/sites/central/etc/mkeventd.d/wato")
        );
        assert_eq!(resolve(root, Path::new("/srv/rules")), PathBuf::from("/srv/rules"));
    }

    #[test]
    fn test_context_from_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = CliContext::new(EcSettings::default(), dir.path().to_path_buf(), false, false)
            .unwrap();
        assert_eq!(ctx.match_context().site_id, "local");
        assert_eq!(
            ctx.client.endpoint().to_string(),
            format!("unix:{}", dir.path().join("tmp/run/mkeventd/status").display())
        );
    }
}
