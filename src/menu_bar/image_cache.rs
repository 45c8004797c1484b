//! Item images keyed by identity.
//!
//! Entries are only ever added or overwritten. An item that disappears keeps
//! its last image, and an item that moves between sections keeps its image.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{Instrument, debug, info_span, warn};

use super::capture::CaptureEngine;
use super::permission::PermissionOracle;
use crate::common::collections::HashMap;
use crate::model::{ItemIdentity, ItemManager, NavigationState, Section};
use crate::sys::screen::ScreenInfo;
use crate::sys::window_server::{ItemImage, WindowServer};

#[derive(Default)]
struct CacheState {
    images: HashMap<ItemIdentity, ItemImage>,
    /// The screen the last batch was captured on.
    screen: Option<ScreenInfo>,
    menu_bar_height: Option<f64>,
}

pub struct ImageCache {
    state: RwLock<CacheState>,
    server: Arc<dyn WindowServer>,
    engine: CaptureEngine,
    permission: Arc<PermissionOracle>,
    items: Arc<ItemManager>,
    navigation: Arc<RwLock<NavigationState>>,
    generation: watch::Sender<u64>,
}

impl ImageCache {
    pub fn new(
        server: Arc<dyn WindowServer>,
        engine: CaptureEngine,
        permission: Arc<PermissionOracle>,
        items: Arc<ItemManager>,
        navigation: Arc<RwLock<NavigationState>>,
    ) -> Self {
        ImageCache {
            state: RwLock::new(CacheState::default()),
            server,
            engine,
            permission,
            items,
            navigation,
            generation: watch::channel(0).0,
        }
    }

    pub fn permission(&self) -> &PermissionOracle { &self.permission }

    pub fn images(&self) -> HashMap<ItemIdentity, ItemImage> { self.state.read().images.clone() }

    pub fn image(&self, id: &ItemIdentity) -> Option<ItemImage> {
        self.state.read().images.get(id).cloned()
    }

    pub fn screen(&self) -> Option<ScreenInfo> { self.state.read().screen.clone() }

    pub fn menu_bar_height(&self) -> Option<f64> { self.state.read().menu_bar_height }

    /// Changes every time new images are merged in.
    pub fn subscribe(&self) -> watch::Receiver<u64> { self.generation.subscribe() }

    /// Whether the cache has nothing to show for `section`.
    pub fn cache_failed(&self, section: Section) -> bool {
        if !self.permission.cached_check(false) {
            return true;
        }
        let items = self.items.items(section);
        if items.is_empty() {
            return false;
        }
        let state = self.state.read();
        !items.iter().any(|item| state.images.contains_key(&item.identity))
    }

    /// Refreshes the sections currently on display, if any UI can show them.
    pub async fn update_cache_all(&self) {
        let sections = self.navigation.read().sections_needing_display();
        self.update_cache(&sections).await
    }

    /// Refreshes `sections` unless nothing can show the result or an item is
    /// being dragged.
    pub async fn update_cache(&self, sections: &[Section]) {
        if let Some(reason) = self.skip_reason() {
            debug!("skipping image cache update as {reason}");
            return;
        }
        self.update_cache_without_checks(sections).await
    }

    fn skip_reason(&self) -> Option<&'static str> {
        if let Some(reason) = self.navigation.read().skip_reason() {
            return Some(reason);
        }
        if self.items.is_moving_item() {
            return Some("an item is currently being moved");
        }
        if self.items.item_has_recently_moved() {
            return Some("an item was recently moved");
        }
        None
    }

    /// Captures every non-empty section in `sections` and merges the results.
    pub async fn update_cache_without_checks(&self, sections: &[Section]) {
        let Some(screen) = self.server.main_screen() else {
            debug!("no main screen, not updating image cache");
            return;
        };

        let mut new_images = HashMap::default();
        for &section in sections {
            let items = self.items.items(section);
            if items.is_empty() {
                continue;
            }
            let engine = self.engine.clone();
            let server = self.server.clone();
            let batch_screen = screen.clone();
            let captured = tokio::task::spawn_blocking(move || {
                engine.capture_items(&items, &*server, &batch_screen)
            })
            .instrument(info_span!("capture section", %section))
            .await;
            let section_images = match captured {
                Ok(images) => images,
                Err(e) => {
                    warn!(%section, "capture task failed: {e}");
                    continue;
                }
            };
            if section_images.is_empty() {
                warn!(%section, "image cache update failed");
                continue;
            }
            new_images.extend(section_images);
        }

        let merged = new_images.len();
        {
            let mut state = self.state.write();
            state.images.extend(new_images);
            state.menu_bar_height = screen.menu_bar_height;
            state.screen = Some(screen);
        }
        if merged > 0 {
            self.generation.send_modify(|g| *g += 1);
        }
        debug!(merged, "image cache updated");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::menu_bar::enumerator::{CaptureScope, ItemEnumerator};
    use crate::menu_bar::permission::Probes;
    use crate::model::SettingsPane;
    use crate::model::item_manager::partition_into_sections;
    use crate::sys::window_server::stub::{StubCapture, StubWindowServer, tag_of};

    struct Fixture {
        server: Arc<StubWindowServer>,
        capture: Arc<StubCapture>,
        granted: Arc<AtomicBool>,
        items: Arc<ItemManager>,
        navigation: Arc<RwLock<NavigationState>>,
        cache: ImageCache,
    }

    fn fixture() -> Fixture {
        let server = Arc::new(StubWindowServer::new());
        server.add_item(1, "com.app.a", Some("A"), -200.0, 30.0, true);
        server.add_item(2, "com.example.lens", Some("HiddenDivider"), -170.0, 10.0, true);
        server.add_item(3, "com.app.b", Some("B"), 1000.0, 40.0, true);
        server.add_item(4, "com.app.c", Some("C"), 1040.0, 20.0, true);
        let capture = Arc::new(StubCapture::new(server.clone()));

        let granted = Arc::new(AtomicBool::new(true));
        let g = granted.clone();
        let permission = Arc::new(PermissionOracle::new(Probes::new(
            move || g.load(Ordering::SeqCst),
            || false,
            || false,
        )));

        let items = Arc::new(ItemManager::new(Duration::from_secs(1)));
        let navigation = Arc::new(RwLock::new(NavigationState {
            is_app_frontmost: true,
            is_settings_presented: true,
            settings_pane: SettingsPane::MenuBarLayout,
            ..Default::default()
        }));
        let cache = ImageCache::new(
            server.clone(),
            CaptureEngine::new(capture.clone(), Duration::from_secs(1)),
            permission,
            items.clone(),
            navigation.clone(),
        );
        Fixture { server, capture, granted, items, navigation, cache }
    }

    impl Fixture {
        fn load_items(&self) {
            let all = ItemEnumerator::new(self.server.clone()).menu_bar_items(CaptureScope::default());
            let divider = ItemIdentity::named("com.example.lens", "HiddenDivider");
            self.items.set_all(partition_into_sections(&all, Some(&divider), None));
        }

        fn id(&self, ns: &str, title: &str) -> ItemIdentity { ItemIdentity::named(ns, title) }
    }

    #[tokio::test]
    async fn refresh_fills_cache_for_each_section() {
        let f = fixture();
        f.load_items();
        let mut generation = f.cache.subscribe();

        assert!(f.cache.cache_failed(Section::Visible));
        f.cache.update_cache_all().await;

        let mut keys: Vec<String> = f.cache.images().keys().map(|k| k.to_string()).collect();
        keys.sort();
        assert_eq!(keys, vec!["com.app.a:A", "com.app.b:B", "com.app.c:C"]);
        assert!(!f.cache.cache_failed(Section::Visible));
        assert!(!f.cache.cache_failed(Section::Hidden));
        assert_eq!(f.cache.menu_bar_height(), Some(24.0));
        assert_eq!(f.cache.screen().map(|s| s.backing_scale_factor), Some(2.0));
        assert!(generation.has_changed().unwrap());
        assert_eq!(*generation.borrow_and_update(), 1);
    }

    #[tokio::test]
    async fn denied_permission_means_failure_regardless_of_contents() {
        let f = fixture();
        f.load_items();
        f.cache.update_cache_without_checks(&[Section::Visible]).await;
        assert!(!f.cache.images().is_empty());

        f.granted.store(false, Ordering::SeqCst);
        f.cache.permission().cached_check(true);
        assert!(f.cache.cache_failed(Section::Visible));
        assert!(f.cache.cache_failed(Section::AlwaysHidden));
    }

    #[tokio::test]
    async fn empty_section_never_fails() {
        let f = fixture();
        f.load_items();
        assert!(f.cache.images().is_empty());
        assert!(!f.cache.cache_failed(Section::AlwaysHidden));
    }

    #[tokio::test]
    async fn recent_move_blocks_refresh() {
        let f = fixture();
        f.load_items();
        f.items.begin_move();
        f.cache.update_cache_all().await;
        assert!(f.cache.images().is_empty());

        f.items.end_move();
        f.cache.update_cache_all().await;
        assert!(f.cache.images().is_empty());
        assert_eq!(f.cache.screen(), None);
    }

    #[tokio::test]
    async fn hidden_ui_blocks_refresh() {
        let f = fixture();
        f.load_items();
        f.navigation.write().settings_pane = SettingsPane::General;
        f.cache.update_cache(&[Section::Visible]).await;
        assert!(f.cache.images().is_empty());

        {
            let mut nav = f.navigation.write();
            nav.is_app_frontmost = false;
            nav.is_settings_presented = false;
            nav.is_bar_presented = true;
            nav.bar_section = Some(Section::Hidden);
        }
        f.cache.update_cache_all().await;
        let keys: Vec<ItemIdentity> = f.cache.images().into_keys().collect();
        assert_eq!(keys, vec![f.id("com.app.a", "A")]);
    }

    #[tokio::test]
    async fn size_mismatch_keeps_only_single_captures() {
        let f = fixture();
        f.load_items();
        *f.capture.composite_clip.lock() = 2;
        f.cache.update_cache_without_checks(&[Section::Visible]).await;
        let images = f.cache.images();
        assert_eq!(images.len(), 2);
        for image in images.values() {
            assert!(tag_of(image).contains("single-"));
        }
    }

    #[tokio::test]
    async fn stale_entries_survive_and_are_overwritten() {
        let f = fixture();
        f.load_items();
        f.cache.update_cache_without_checks(&[Section::Visible]).await;
        let b = f.id("com.app.b", "B");
        let before = f.cache.image(&b).unwrap();

        f.server.windows.lock().remove(&4);
        f.load_items();
        f.cache.update_cache_without_checks(&[Section::Visible]).await;
        assert!(f.cache.image(&f.id("com.app.c", "C")).is_some());
        let after = f.cache.image(&b).unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[tokio::test]
    async fn failing_section_does_not_stop_others() {
        let f = fixture();
        f.load_items();
        f.capture.failing.lock().push(1);
        f.cache.update_cache_without_checks(&[Section::Hidden, Section::Visible]).await;
        assert!(f.cache.cache_failed(Section::Hidden));
        assert!(!f.cache.cache_failed(Section::Visible));
    }
}
