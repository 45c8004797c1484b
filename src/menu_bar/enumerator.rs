//! Lists menu bar items in on-screen order.

use std::sync::Arc;

use tracing::{debug, instrument, trace};

use crate::common::collections::HashMap;
use crate::model::{Item, Namespace};
use crate::sys::screen::ScreenId;
use crate::sys::window_server::{ListOptions, WindowServer};

/// Which menu bar item windows to enumerate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureScope {
    pub on_screen_only: bool,
    pub active_space_only: bool,
    /// Only keep windows that intersect this display.
    pub display: Option<ScreenId>,
}

impl CaptureScope {
    pub fn active_space() -> Self { CaptureScope { active_space_only: true, ..Default::default() } }

    fn list_options(&self) -> ListOptions {
        let mut options = ListOptions::MENU_BAR_ITEMS;
        options.set(ListOptions::ON_SCREEN, self.on_screen_only);
        options.set(ListOptions::ACTIVE_SPACE, self.active_space_only);
        options
    }
}

#[derive(Clone)]
pub struct ItemEnumerator {
    server: Arc<dyn WindowServer>,
}

impl ItemEnumerator {
    pub fn new(server: Arc<dyn WindowServer>) -> Self { ItemEnumerator { server } }

    /// Items matching `scope`, ordered left to right, each with an identity
    /// that is unique within the result.
    #[instrument(skip(self), level = "debug")]
    pub fn menu_bar_items(&self, scope: CaptureScope) -> Vec<Item> {
        let server = &*self.server;
        let mut ids = server.window_list(scope.list_options());

        if let Some(display_id) = scope.display {
            let Some(bounds) = server.display_bounds(display_id) else {
                debug!(?display_id, "unknown display");
                return Vec::new();
            };
            ids.retain(|&id| server.window_frame(id).is_some_and(|frame| frame.intersects(&bounds)));
        }

        let mut items: Vec<Item> =
            ids.into_iter().filter_map(|id| Item::from_window_id(server, id)).collect();

        if scope.active_space_only {
            items.retain(|item| !item.identity.title.is_empty());
        }

        items.sort_by(|a, b| a.frame().min_x().total_cmp(&b.frame().min_x()));
        assign_unique_indices(&mut items);
        trace!(count = items.len(), "enumerated menu bar items");
        items
    }
}

/// Numbers items that share a namespace and title from left to right.
/// Items whose pair is unique keep index 0.
pub fn assign_unique_indices(items: &mut [Item]) {
    let mut counts: HashMap<(&Namespace, &str), usize> = HashMap::default();
    for item in items.iter() {
        *counts.entry((&item.identity.namespace, item.identity.title.as_str())).or_default() += 1;
    }
    let duplicated: Vec<bool> = items
        .iter()
        .map(|item| counts[&(&item.identity.namespace, item.identity.title.as_str())] > 1)
        .collect();

    let mut next: HashMap<(Namespace, String), usize> = HashMap::default();
    for (item, duplicated) in items.iter_mut().zip(duplicated) {
        if !duplicated {
            continue;
        }
        let key = (item.identity.namespace.clone(), item.identity.title.clone());
        let index = next.entry(key).or_default();
        *item = item.with_index(*index);
        *index += 1;
    }
}
