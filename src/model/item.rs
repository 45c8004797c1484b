//! Menu bar item identity and the runtime item built from a window.

use std::fmt;
use std::str::FromStr;

use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;

use super::known_items::KnownItems;
use crate::sys::geometry::Rect;
use crate::sys::window_server::{ListOptions, WindowInfo, WindowServer, WindowServerId, pid_t};

/// The owning application context of an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    Null,
    Named(String),
}

impl Namespace {
    pub const NULL_RAW: &'static str = "<null>";

    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        if raw == Self::NULL_RAW { Namespace::Null } else { Namespace::Named(raw) }
    }

    /// A missing or empty owner maps to [`Namespace::Null`].
    pub fn from_optional(value: Option<&str>) -> Self {
        match value {
            Some(raw) if !raw.is_empty() => Namespace::new(raw),
            _ => Namespace::Null,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Namespace::Null => Self::NULL_RAW,
            Namespace::Named(raw) => raw,
        }
    }

    pub fn is_null(&self) -> bool { matches!(self, Namespace::Null) }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Stable identity of a menu bar item, and the key of the image cache.
///
/// `index` separates items that share a namespace and title. It is assigned
/// left to right during enumeration and is zero for unique items.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, SerializeDisplay, DeserializeFromStr)]
pub struct ItemIdentity {
    pub namespace: Namespace,
    pub title: String,
    pub index: usize,
}

impl ItemIdentity {
    pub fn new(namespace: Namespace, title: impl Into<String>) -> Self {
        ItemIdentity { namespace, title: title.into(), index: 0 }
    }

    pub fn named(namespace: &str, title: &str) -> Self { Self::new(Namespace::new(namespace), title) }

    /// A copy carrying `index`. `self` is left untouched.
    pub fn with_index(&self, index: usize) -> Self {
        ItemIdentity { index, ..self.clone() }
    }

    pub fn matches_ignoring_index(&self, other: &ItemIdentity) -> bool {
        self.namespace == other.namespace && self.title == other.title
    }
}

impl fmt::Display for ItemIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.title)?;
        if self.index > 0 {
            write!(f, "#{}", self.index)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseItemIdentityError {
    #[error("missing namespace component in {0:?}")]
    MissingNamespace(String),
}

impl FromStr for ItemIdentity {
    type Err = ParseItemIdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (main, index) = match s.rsplit_once('#') {
            Some((main, suffix)) if is_encoded_index(suffix) => match suffix.parse::<usize>() {
                Ok(index) => (main, index),
                Err(_) => (s, 0),
            },
            _ => (s, 0),
        };

        // The namespace never contains ':'; the title may.
        let (namespace, title) = main.split_once(':').unwrap_or((main, ""));
        if namespace.is_empty() {
            return Err(ParseItemIdentityError::MissingNamespace(s.to_owned()));
        }

        Ok(ItemIdentity {
            namespace: Namespace::new(namespace),
            title: title.to_owned(),
            index,
        })
    }
}

/// Only a nonzero index is ever written, as plain ASCII digits.
fn is_encoded_index(suffix: &str) -> bool {
    !suffix.is_empty() && !suffix.starts_with('0') && suffix.bytes().all(|b| b.is_ascii_digit())
}

/// A menu bar item as seen during one enumeration pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub identity: ItemIdentity,
    pub window: WindowInfo,
}

impl Item {
    /// Builds an item from a window, or `None` if the window is not a menu
    /// bar item window.
    pub fn new(window: WindowInfo) -> Option<Item> {
        if !window.is_menu_bar_item() {
            return None;
        }
        Some(Item::new_unchecked(window))
    }

    fn new_unchecked(window: WindowInfo) -> Item {
        let identity = ItemIdentity::new(
            Namespace::from_optional(window.bundle_id.as_deref()),
            window.title.clone().unwrap_or_default(),
        );
        Item { identity, window }
    }

    pub fn from_window_id(server: &dyn WindowServer, id: WindowServerId) -> Option<Item> {
        server.window_info(id).and_then(Item::new)
    }

    pub fn with_index(&self, index: usize) -> Item {
        Item {
            identity: self.identity.with_index(index),
            window: self.window.clone(),
        }
    }

    pub fn window_id(&self) -> WindowServerId { self.window.id }

    pub fn frame(&self) -> Rect { self.window.frame }

    pub fn title(&self) -> Option<&str> { self.window.title.as_deref() }

    pub fn is_on_screen(&self) -> bool { self.window.is_on_screen }

    pub fn owner_pid(&self) -> pid_t { self.window.owner_pid }

    pub fn owner_name(&self) -> Option<&str> { self.window.owner_name.as_deref() }

    pub fn is_movable(&self, known: &KnownItems) -> bool { !known.is_immovable(&self.identity) }

    pub fn can_be_hidden(&self, known: &KnownItems) -> bool {
        !known.is_non_hideable(&self.identity)
    }

    pub fn display_name(&self, known: &KnownItems) -> String {
        known.display_name(&self.identity, self.owner_name(), self.title())
    }

    pub fn is_currently_in_menu_bar(&self, server: &dyn WindowServer) -> bool {
        server.window_list(ListOptions::MENU_BAR_ITEMS).contains(&self.window.id)
    }
}
