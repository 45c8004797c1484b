use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter};

/// A logical grouping of menu bar items, owned by the menu bar manager.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumIter,
    Display,
    AsRefStr
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Section {
    Visible,
    Hidden,
    AlwaysHidden,
}

impl Section {
    pub fn all() -> impl Iterator<Item = Section> { <Section as strum::IntoEnumIterator>::iter() }
}
