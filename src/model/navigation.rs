use serde::{Deserialize, Serialize};

use super::section::Section;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsPane {
    #[default]
    General,
    MenuBarLayout,
    Appearance,
    Hotkeys,
    Advanced,
    About,
}

/// What the user can currently see. Fed by the UI layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationState {
    pub is_app_frontmost: bool,
    pub is_settings_presented: bool,
    pub settings_pane: SettingsPane,
    /// The floating bar that shows hidden items below the menu bar.
    pub is_bar_presented: bool,
    pub bar_section: Option<Section>,
    pub is_search_presented: bool,
}

impl NavigationState {
    pub fn is_floating_ui_presented(&self) -> bool {
        self.is_bar_presented || self.is_search_presented
    }

    /// Why a refresh would be pointless right now, if it would be.
    pub fn skip_reason(&self) -> Option<&'static str> {
        if self.is_floating_ui_presented() {
            return None;
        }
        if !self.is_app_frontmost {
            return Some("bar not visible, app not frontmost");
        }
        if !self.is_settings_presented {
            return Some("bar not visible, settings not visible");
        }
        if self.settings_pane != SettingsPane::MenuBarLayout {
            return Some("bar not visible, settings visible but not on menu bar layout");
        }
        None
    }

    pub fn sections_needing_display(&self) -> Vec<Section> {
        if self.is_settings_presented || self.is_search_presented {
            Section::all().collect()
        } else if self.is_bar_presented {
            self.bar_section.into_iter().collect()
        } else {
            Vec::new()
        }
    }
}
