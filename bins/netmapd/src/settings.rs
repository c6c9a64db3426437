// SPDX-License-Identifier: Apache-2.0
//! Daemon settings, loaded as one JSON blob through the config service.

use netmap_model::config::{ConfigError, ConfigService, ConfigStore};
use netmap_model::{Scope, User};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

/// Geographic node markup used when a dataset names no template.
pub const GEOGRAPHIC_NODE_TEMPLATE: &str = "<g><rect x='-4' y='-4' width='8' height='8' /></g>";

/// Logical node markup used when a dataset names no template.
pub const LOGICAL_NODE_TEMPLATE: &str = r#"<g><foreignObject width="30" height="15" overflow="visible"><div xmlns="http://www.w3.org/1999/xhtml" style="border: 1px solid rgba(0,0,0,0.2); padding: 2px 5px; border-radius:15px; font-size:10px; background: white; text-align:center; margin-left:-30px; margin-top:-15px;">{{endpoint_name}}</div></foreignObject></g>"#;

/// Store configs as JSON files under a base directory.
pub struct FsConfigStore {
    base: PathBuf,
}

impl FsConfigStore {
    /// Create a store rooted at `base`, creating it when absent.
    pub fn new(base: PathBuf) -> Result<Self, ConfigError> {
        fs::create_dir_all(&base)?;
        Ok(Self { base })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.base.join(format!("{key}.json"))
    }
}

impl ConfigStore for FsConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::NotFound),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
        Ok(())
    }
}

/// Daemon configuration (`netmapd.json` under the config directory).
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Opaque bearer tokens mapped to the principals they authenticate.
    pub tokens: BTreeMap<String, User>,
    /// Seed file for the document store (datasets/maps/templates).
    pub store_seed: Option<PathBuf>,
    /// Seed file the sheet cache fetches normalized documents from.
    pub sheet_seed: Option<PathBuf>,
    /// Named node templates seeded into the catalog on first start.
    pub node_templates: BTreeMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        let mut tokens = BTreeMap::new();
        tokens.insert(
            "netmap-dev-token".to_string(),
            User {
                name: "Administration User".to_string(),
                email: "admin".to_string(),
                username: "admin".to_string(),
                scopes: vec![Scope::Read, Scope::Write, Scope::Publish, Scope::Admin],
            },
        );
        Self {
            tokens,
            store_seed: None,
            sheet_seed: None,
            node_templates: default_node_templates(),
        }
    }
}

/// The built-in geographic and logical node templates.
pub fn default_node_templates() -> BTreeMap<String, String> {
    let mut templates = BTreeMap::new();
    templates.insert(
        "GEOGRAPHIC".to_string(),
        GEOGRAPHIC_NODE_TEMPLATE.to_string(),
    );
    templates.insert("LOGICAL".to_string(), LOGICAL_NODE_TEMPLATE.to_string());
    templates
}

/// Load settings from `config_dir`. On first run the defaults are
/// written back as `netmapd.json`, dev token included, so operators
/// have a file to edit.
pub fn load(config_dir: PathBuf) -> Result<Settings, ConfigError> {
    let service = ConfigService::new(FsConfigStore::new(config_dir)?);
    let (settings, initialized) = service.load_or_init::<Settings>("netmapd")?;
    if initialized {
        tracing::warn!("no netmapd.json found, wrote defaults with the dev token");
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn defaults_carry_the_dev_token_with_every_scope() {
        let settings = Settings::default();
        let user = settings.tokens.get("netmap-dev-token").unwrap();
        assert!(user.has_scope(Scope::Admin));
        assert!(user.has_scope(Scope::Publish));
    }

    #[test]
    fn default_templates_cover_both_layouts() {
        let templates = default_node_templates();
        assert!(templates.contains_key("GEOGRAPHIC"));
        assert!(templates["LOGICAL"].contains("{{endpoint_name}}"));
    }

    #[test]
    fn settings_deserialize_with_partial_json() {
        let settings: Settings = serde_json::from_str(r#"{"sheet_seed": "/tmp/seed.json"}"#).unwrap();
        assert_eq!(settings.sheet_seed, Some(PathBuf::from("/tmp/seed.json")));
        assert!(!settings.tokens.is_empty());
    }

    #[test]
    fn first_load_writes_defaults_and_later_loads_read_them_back() {
        let dir = std::env::temp_dir().join(format!("netmapd-settings-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);

        let settings = load(dir.clone()).unwrap();
        assert!(settings.tokens.contains_key("netmap-dev-token"));
        assert!(dir.join("netmapd.json").is_file());

        let edited = Settings {
            sheet_seed: Some(PathBuf::from("/var/lib/netmap/sheets.json")),
            ..Settings::default()
        };
        let service = ConfigService::new(FsConfigStore::new(dir.clone()).unwrap());
        service.save("netmapd", &edited).unwrap();

        let reloaded = load(dir.clone()).unwrap();
        assert_eq!(reloaded.sheet_seed, edited.sheet_seed);
        fs::remove_dir_all(&dir).unwrap();
    }
}
