//! Tables of system menu bar items with special behavior.
//!
//! These lists track what the current OS release does and change between
//! releases, so the defaults here can be replaced from the config file.

use super::item::{ItemIdentity, Namespace};
use crate::common::collections::{HashMap, HashSet};

pub const CONTROL_CENTER: &str = "com.apple.controlcenter";
pub const SYSTEM_UI_SERVER: &str = "com.apple.systemuiserver";
pub const PASSWORDS: &str = "com.apple.Passwords.MenuBarExtra";
pub const SPECIAL: &str = "Special";

/// Items whose movement is prevented by the OS.
pub const IMMOVABLE: &[(&str, &str)] =
    &[(CONTROL_CENTER, "Clock"), (SYSTEM_UI_SERVER, "Siri"), (CONTROL_CENTER, "BentoBox")];

/// Items that can be moved but not hidden.
pub const NON_HIDEABLE: &[(&str, &str)] = &[
    (CONTROL_CENTER, "AudioVideoModule"),
    (CONTROL_CENTER, "FaceTime"),
    (CONTROL_CENTER, "MusicRecognition"),
];

/// Marks where newly added items appear.
pub fn new_items_marker() -> ItemIdentity { ItemIdentity::named(SPECIAL, "NewItems") }

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fallback {
    Title,
    Fixed(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Override {
    Name(&'static str),
    AppName,
}

struct NamespaceRule {
    namespace: &'static str,
    fallback: Fallback,
    titles: &'static [(&'static str, Override)],
}

const DISPLAY_NAME_RULES: &[NamespaceRule] = &[
    NamespaceRule {
        namespace: CONTROL_CENTER,
        fallback: Fallback::Title,
        titles: &[
            ("AccessibilityShortcuts", Override::Name("Accessibility Shortcuts")),
            ("BentoBox", Override::AppName),
            ("FocusModes", Override::Name("Focus")),
            ("KeyboardBrightness", Override::Name("Keyboard Brightness")),
            ("MusicRecognition", Override::Name("Music Recognition")),
            ("NowPlaying", Override::Name("Now Playing")),
            ("ScreenMirroring", Override::Name("Screen Mirroring")),
            ("StageManager", Override::Name("Stage Manager")),
            ("UserSwitcher", Override::Name("Fast User Switching")),
            ("WiFi", Override::Name("Wi-Fi")),
        ],
    },
    NamespaceRule {
        namespace: SYSTEM_UI_SERVER,
        fallback: Fallback::Title,
        titles: &[
            ("TimeMachine.TMMenuExtraHost", Override::Name("Time Machine")),
            ("TimeMachineMenuExtra.TMMenuExtraHost", Override::Name("Time Machine")),
        ],
    },
    NamespaceRule {
        namespace: PASSWORDS,
        fallback: Fallback::Fixed("Passwords"),
        titles: &[],
    },
];

const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone)]
pub struct KnownItems {
    immovable: HashSet<ItemIdentity>,
    non_hideable: HashSet<ItemIdentity>,
    name_overrides: HashMap<ItemIdentity, String>,
}

impl Default for KnownItems {
    fn default() -> Self {
        let collect = |pairs: &[(&str, &str)]| {
            pairs.iter().map(|(ns, title)| ItemIdentity::named(ns, title)).collect()
        };
        KnownItems {
            immovable: collect(IMMOVABLE),
            non_hideable: collect(NON_HIDEABLE),
            name_overrides: HashMap::default(),
        }
    }
}

impl KnownItems {
    pub fn new(
        immovable: impl IntoIterator<Item = ItemIdentity>,
        non_hideable: impl IntoIterator<Item = ItemIdentity>,
        name_overrides: impl IntoIterator<Item = (ItemIdentity, String)>,
    ) -> Self {
        KnownItems {
            immovable: immovable.into_iter().map(|id| id.with_index(0)).collect(),
            non_hideable: non_hideable.into_iter().map(|id| id.with_index(0)).collect(),
            name_overrides: name_overrides
                .into_iter()
                .map(|(id, name)| (id.with_index(0), name))
                .collect(),
        }
    }

    pub fn is_immovable(&self, id: &ItemIdentity) -> bool {
        self.immovable.contains(&id.with_index(0))
    }

    pub fn is_non_hideable(&self, id: &ItemIdentity) -> bool {
        self.non_hideable.contains(&id.with_index(0))
    }

    /// A name for the item suited to showing the user. Pure function of the
    /// identity's namespace and title plus the owning app's name.
    pub fn display_name(
        &self,
        id: &ItemIdentity,
        owner_name: Option<&str>,
        title: Option<&str>,
    ) -> String {
        if id.namespace.is_null() {
            return owner_name.or(title).unwrap_or(UNKNOWN).to_owned();
        }
        let best_name = || owner_name.unwrap_or(id.namespace.as_str()).to_owned();
        let Some(title) = title else {
            return best_name();
        };

        if let Some(name) = self.name_overrides.get(&id.with_index(0)) {
            return name.clone();
        }

        let Some(rule) = DISPLAY_NAME_RULES.iter().find(|r| r.namespace == id.namespace.as_str())
        else {
            return best_name();
        };
        match rule.titles.iter().find(|(t, _)| *t == title).map(|(_, o)| *o) {
            Some(Override::Name(name)) => name.to_owned(),
            Some(Override::AppName) => best_name(),
            None => match rule.fallback {
                Fallback::Title => title.to_owned(),
                Fallback::Fixed(name) => name.to_owned(),
            },
        }
    }
}

impl Namespace {
    pub fn is_special(&self) -> bool { self.as_str() == SPECIAL }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tables_cover_system_items() {
        let known = KnownItems::default();
        assert!(known.is_immovable(&ItemIdentity::named(CONTROL_CENTER, "Clock")));
        assert!(known.is_immovable(&ItemIdentity::named(SYSTEM_UI_SERVER, "Siri").with_index(1)));
        assert!(!known.is_immovable(&ItemIdentity::named(CONTROL_CENTER, "WiFi")));
        assert!(known.is_non_hideable(&ItemIdentity::named(CONTROL_CENTER, "FaceTime")));
        assert!(new_items_marker().namespace.is_special());
    }

    #[test]
    fn display_names_follow_namespace_rules() {
        let known = KnownItems::default();
        let cc = |title| ItemIdentity::named(CONTROL_CENTER, title);
        assert_eq!(known.display_name(&cc("WiFi"), Some("Control Center"), Some("WiFi")), "Wi-Fi");
        assert_eq!(
            known.display_name(&cc("BentoBox"), Some("Control Center"), Some("BentoBox")),
            "Control Center"
        );
        assert_eq!(known.display_name(&cc("Battery"), Some("Control Center"), Some("Battery")), "Battery");

        let pw = ItemIdentity::named(PASSWORDS, "Item-0");
        assert_eq!(known.display_name(&pw, None, Some("Item-0")), "Passwords");

        let app = ItemIdentity::named("com.example.app", "Item-0");
        assert_eq!(known.display_name(&app, Some("Example"), Some("Item-0")), "Example");
        assert_eq!(known.display_name(&app, None, Some("Item-0")), "com.example.app");
    }

    #[test]
    fn null_namespace_falls_back_to_owner_then_title() {
        let known = KnownItems::default();
        let id = ItemIdentity::new(Namespace::Null, "");
        assert_eq!(known.display_name(&id, Some("Owner"), Some("T")), "Owner");
        assert_eq!(known.display_name(&id, None, Some("T")), "T");
        assert_eq!(known.display_name(&id, None, None), "Unknown");
    }

    #[test]
    fn configured_overrides_win_and_ignore_index() {
        let id = ItemIdentity::named(CONTROL_CENTER, "WiFi");
        let known = KnownItems::new([], [], [(id.clone(), "Wireless".to_owned())]);
        assert_eq!(known.display_name(&id.with_index(2), None, Some("WiFi")), "Wireless");
        assert!(!known.is_immovable(&ItemIdentity::named(CONTROL_CENTER, "Clock")));
    }
}
