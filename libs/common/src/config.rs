//! Layered settings for the Event Console rule tooling
//!
//! Priority (highest to lowest):
//! 1. Environment variables (`EC_` prefix, `__` separates nested keys)
//! 2. Explicit config file passed on the command line
//! 3. `config/ecctl.{toml,yaml,json}`
//! 4. `config/default.{toml,yaml,json}`
//! 5. Built-in defaults

use crate::error::{Error, Result};
use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default connect timeout to the engine status socket (seconds)
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Root settings document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EcSettings {
    /// Name of the local site; rules with `match_site` compare against it
    pub site_id: String,
    /// Customer this site belongs to (multi-tenant editions)
    pub site_customer: Option<String>,
    /// Write rule pack files indented
    pub pretty_print: bool,
    pub paths: PathSettings,
    /// Local engine
    pub engine: EngineSettings,
    /// Replication master, used by "copy rules from master"
    pub master: Option<EngineSettings>,
    pub log: LogSettings,
}

impl Default for EcSettings {
    fn default() -> Self {
        Self {
            site_id: "local".to_string(),
            site_customer: None,
            pretty_print: false,
            paths: PathSettings::default(),
            engine: EngineSettings::default(),
            master: None,
            log: LogSettings::default(),
        }
    }
}

/// File system locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// Directory holding `rules.json`, the rule pack store
    pub rule_pack_dir: PathBuf,
    /// Directory holding exported rule packs (`<id>.json`)
    pub mkp_rule_pack_dir: PathBuf,
    /// Directory holding installed package manifests
    pub packages_dir: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            rule_pack_dir: PathBuf::from("etc/mkeventd.d/wato"),
            mkp_rule_pack_dir: PathBuf::from("etc/mkeventd.d/mkp/rule_packs"),
            packages_dir: PathBuf::from("var/packages"),
        }
    }
}

/// Engine channel endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// `unix:<path>`, `tcp:<host>:<port>` or a bare socket path
    pub endpoint: String,
    pub connect_timeout_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            endpoint: "unix:tmp/run/mkeventd/status".to_string(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    /// Daily log file directory; console only when unset
    pub dir: Option<PathBuf>,
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
            json: false,
        }
    }
}

/// Figment provider for a single file, chosen by extension
fn file_provider(path: &Path) -> Result<Figment> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::Config("Config file must have an extension".to_string()))?;

    match extension {
        "toml" => Ok(Figment::new().merge(Toml::file(path))),
        "yaml" | "yml" => Ok(Figment::new().merge(Yaml::file(path))),
        "json" => Ok(Figment::new().merge(Json::file(path))),
        _ => Err(Error::Config(format!(
            "Unsupported config file format: {}",
            extension
        ))),
    }
}

/// Load settings from all layers
pub fn load_settings(explicit: Option<&Path>) -> Result<EcSettings> {
    let mut figment = Figment::from(Serialized::defaults(EcSettings::default()))
        .merge(Toml::file("config/default.toml"))
        .merge(Yaml::file("config/default.yaml"))
        .merge(Json::file("config/default.json"))
        .merge(Toml::file("config/ecctl.toml"))
        .merge(Yaml::file("config/ecctl.yaml"))
        .merge(Json::file("config/ecctl.json"));

    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        figment = figment.merge(file_provider(path)?);
    }

    figment
        .merge(Env::prefixed("EC_").split("__"))
        .extract()
        .map_err(|e| Error::Config(format!("Failed to load configuration: {}", e)))
}

/// Load configuration from a specific file
pub fn load_config_from_file<T, P>(path: P) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    file_provider(path.as_ref())?
        .extract()
        .map_err(|e| Error::Config(format!("Failed to load configuration from file: {}", e)))
}

/// Save configuration to a YAML or JSON file
pub fn save_config_to_file<T, P>(config: &T, path: P) -> Result<()>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::Config("Config file must have an extension".to_string()))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = match extension {
        "yaml" | "yml" => serde_yaml::to_string(config)?,
        "json" => serde_json::to_string_pretty(config)?,
        _ => {
            return Err(Error::Config(format!(
                "Unsupported config file format: {}",
                extension
            )))
        },
    };

    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = EcSettings::default();
        assert_eq!(settings.engine.connect_timeout_secs, 10);
        assert!(!settings.pretty_print);
        assert!(settings.master.is_none());
    }

    #[test]
    fn test_save_and_load_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/ecctl.yaml");

        let mut settings = EcSettings::default();
        settings.site_id = "mysite".to_string();
        settings.pretty_print = true;
        settings.engine.endpoint = "tcp:127.0.0.1:6558".to_string();

        save_config_to_file(&settings, &path).unwrap();
        let loaded: EcSettings = load_config_from_file(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("site.json");
        std::fs::write(&path, r#"{"site_id": "branch", "engine": {"connect_timeout_secs": 3}}"#)
            .unwrap();

        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(settings.site_id, "branch");
        assert_eq!(settings.engine.connect_timeout_secs, 3);
        assert_eq!(settings.engine.endpoint, EngineSettings::default().endpoint);
    }

    #[test]
    fn test_unsupported_extension() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.ini");
        std::fs::write(&path, "site_id = x").unwrap();
        assert!(matches!(load_settings(Some(&path)), Err(Error::Config(_))));
        assert!(load_settings(Some(&temp_dir.path().join("missing.yaml"))).is_err());
    }
}
