//! User configuration, read from `config.toml`.
//!
//! Every field has a default, so an absent file or an empty table is valid.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::ItemIdentity;
use crate::model::known_items::{self, KnownItems};

pub const CONFIG_DIR_NAME: &str = "menubar-lens";
pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub cache: CacheSettings,
    pub permission: PermissionSettings,
    pub items: ItemSettings,
    pub sections: SectionSettings,
    /// Display names that take precedence over the built-in tables.
    pub display_names: BTreeMap<ItemIdentity, String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    pub refresh_interval_ms: u64,
    pub throttle_ms: u64,
    pub recent_move_window_ms: u64,
    pub capture_timeout_ms: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            refresh_interval_ms: 3000,
            throttle_ms: 500,
            recent_move_window_ms: 1000,
            capture_timeout_ms: 2000,
        }
    }
}

impl CacheSettings {
    pub fn refresh_interval(&self) -> Duration { Duration::from_millis(self.refresh_interval_ms) }

    pub fn throttle(&self) -> Duration { Duration::from_millis(self.throttle_ms) }

    pub fn recent_move_window(&self) -> Duration { Duration::from_millis(self.recent_move_window_ms) }

    pub fn capture_timeout(&self) -> Duration { Duration::from_millis(self.capture_timeout_ms) }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PermissionSettings {
    /// Size of the region captured when probing for screen capture access.
    pub probe_width: f64,
    pub probe_height: f64,
    /// How long to wait on the secondary access request.
    pub request_timeout_ms: u64,
}

impl Default for PermissionSettings {
    fn default() -> Self {
        PermissionSettings { probe_width: 100.0, probe_height: 25.0, request_timeout_ms: 5000 }
    }
}

impl PermissionSettings {
    pub fn request_timeout(&self) -> Duration { Duration::from_millis(self.request_timeout_ms) }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ItemSettings {
    pub immovable: Vec<ItemIdentity>,
    pub non_hideable: Vec<ItemIdentity>,
}

impl Default for ItemSettings {
    fn default() -> Self {
        let ids = |pairs: &[(&str, &str)]| {
            pairs.iter().map(|(ns, title)| ItemIdentity::named(ns, title)).collect()
        };
        ItemSettings {
            immovable: ids(known_items::IMMOVABLE),
            non_hideable: ids(known_items::NON_HIDEABLE),
        }
    }
}

/// The divider items that split the menu bar into sections.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct SectionSettings {
    pub hidden_divider: Option<ItemIdentity>,
    pub always_hidden_divider: Option<ItemIdentity>,
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Reads the config at `path`, or at [`Config::default_path`] if `None`.
    /// A missing file yields the defaults; a malformed one is an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Config> {
        let Some(path) = path.map(Path::to_path_buf).or_else(Config::default_path) else {
            debug!("no config directory, using defaults");
            return Ok(Config::default());
        };
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "config file not found, using defaults");
                return Ok(Config::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", path.display()));
            }
        };
        Config::parse(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Config> { Ok(toml::from_str(text)?) }

    pub fn known_items(&self) -> KnownItems {
        KnownItems::new(
            self.items.immovable.iter().cloned(),
            self.items.non_hideable.iter().cloned(),
            self.display_names.iter().map(|(id, name)| (id.clone(), name.clone())),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
        let cache = Config::default().cache;
        assert_eq!(cache.throttle(), Duration::from_millis(500));
        assert_eq!(cache.refresh_interval(), Duration::from_secs(3));
    }

    #[test]
    fn parses_partial_tables() {
        let config = Config::parse(
            r#"
            [cache]
            throttle_ms = 250

            [items]
            immovable = ["com.apple.controlcenter:Clock", "com.example:Thing#1"]

            [sections]
            hidden_divider = "com.example.lens:HiddenDivider"

            [display_names]
            "com.apple.controlcenter:WiFi" = "Wireless"
            "#,
        )
        .unwrap();
        assert_eq!(config.cache.throttle_ms, 250);
        assert_eq!(config.cache.capture_timeout_ms, 2000);
        assert_eq!(config.items.immovable[1].index, 1);
        assert_eq!(config.items.non_hideable, ItemSettings::default().non_hideable);
        assert_eq!(
            config.sections.hidden_divider,
            Some(ItemIdentity::named("com.example.lens", "HiddenDivider"))
        );

        let known = config.known_items();
        let wifi = ItemIdentity::named(known_items::CONTROL_CENTER, "WiFi");
        assert_eq!(known.display_name(&wifi, None, Some("WiFi")), "Wireless");
        assert!(known.is_immovable(&ItemIdentity::named("com.example", "Thing")));
        assert!(!known.is_immovable(&ItemIdentity::named(known_items::SYSTEM_UI_SERVER, "Siri")));
    }

    #[test]
    fn rejects_unknown_keys_and_bad_identities() {
        assert!(Config::parse("[cache]\nbogus = 1").is_err());
        assert!(Config::parse("[items]\nimmovable = [\":Clock\"]").is_err());
    }

    #[test]
    fn load_reads_file_and_tolerates_missing_one() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert_eq!(Config::load(Some(&missing)).unwrap(), Config::default());

        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[permission]\nprobe_width = 50.0").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.permission.probe_width, 50.0);
        assert_eq!(config.permission.probe_height, 25.0);
        assert_eq!(config.permission.request_timeout(), Duration::from_secs(5));

        std::fs::write(&path, "not = [valid").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }
}
