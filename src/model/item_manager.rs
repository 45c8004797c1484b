//! The current items of each section and the state of item moves.

use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::debug;

use super::item::{Item, ItemIdentity};
use super::section::Section;
use crate::common::collections::HashMap;

#[derive(Debug, Default)]
struct State {
    item_cache: HashMap<Section, Vec<Item>>,
    is_moving_item: bool,
    last_move_finished: Option<Instant>,
}

type ChangeHook = Box<dyn Fn() + Send + Sync>;

pub struct ItemManager {
    state: RwLock<State>,
    recent_move_window: Duration,
    on_change: Option<ChangeHook>,
}

impl ItemManager {
    pub fn new(recent_move_window: Duration) -> Self {
        ItemManager {
            state: RwLock::new(State::default()),
            recent_move_window,
            on_change: None,
        }
    }

    /// Calls `hook` whenever the item set of a section changes.
    pub fn with_change_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_change = Some(Box::new(hook));
        self
    }

    pub fn items(&self, section: Section) -> Vec<Item> {
        self.state.read().item_cache.get(&section).cloned().unwrap_or_default()
    }

    /// Replaces the items of `section`. Returns whether anything changed.
    pub fn set_items(&self, section: Section, items: Vec<Item>) -> bool {
        let changed = {
            let mut state = self.state.write();
            let previous = state.item_cache.get(&section);
            if previous == Some(&items) || (previous.is_none() && items.is_empty()) {
                false
            } else {
                state.item_cache.insert(section, items);
                true
            }
        };
        if changed {
            debug!(%section, "item set changed");
            if let Some(hook) = &self.on_change {
                hook();
            }
        }
        changed
    }

    /// Replaces every section at once from an ordered item list.
    pub fn set_all(&self, partitioned: HashMap<Section, Vec<Item>>) -> bool {
        let mut changed = false;
        for section in Section::all() {
            let items = partitioned.get(&section).cloned().unwrap_or_default();
            changed |= self.set_items(section, items);
        }
        changed
    }

    pub fn begin_move(&self) { self.state.write().is_moving_item = true; }

    pub fn end_move(&self) { self.end_move_at(Instant::now()) }

    pub fn end_move_at(&self, now: Instant) {
        let mut state = self.state.write();
        state.is_moving_item = false;
        state.last_move_finished = Some(now);
    }

    pub fn is_moving_item(&self) -> bool { self.state.read().is_moving_item }

    pub fn item_has_recently_moved(&self) -> bool { self.item_has_recently_moved_at(Instant::now()) }

    pub fn item_has_recently_moved_at(&self, now: Instant) -> bool {
        self.state
            .read()
            .last_move_finished
            .is_some_and(|t| now.saturating_duration_since(t) < self.recent_move_window)
    }
}

/// Splits a left-to-right item list into sections using the two divider
/// items. Items right of the hidden divider are visible, items between the
/// dividers are hidden, and items left of the always-hidden divider are
/// always hidden. Without dividers every item is visible.
pub fn partition_into_sections(
    items: &[Item],
    hidden_divider: Option<&ItemIdentity>,
    always_hidden_divider: Option<&ItemIdentity>,
) -> HashMap<Section, Vec<Item>> {
    let position = |divider: Option<&ItemIdentity>| {
        divider.and_then(|d| items.iter().position(|i| &i.identity == d))
    };
    let hidden_at = position(hidden_divider);
    let always_hidden_at = position(always_hidden_divider);

    let mut sections: HashMap<Section, Vec<Item>> = HashMap::default();
    for (idx, item) in items.iter().enumerate() {
        if Some(idx) == hidden_at || Some(idx) == always_hidden_at {
            continue;
        }
        let section = match (always_hidden_at, hidden_at) {
            (Some(ah), _) if idx < ah => Section::AlwaysHidden,
            (_, Some(h)) if idx < h => Section::Hidden,
            _ => Section::Visible,
        };
        sections.entry(section).or_default().push(item.clone());
    }
    sections
}
