//! The seam between the capture pipeline and the platform window server.
//!
//! Everything the pipeline knows about windows, displays and pixels comes
//! through [`WindowServer`] and [`ScreenCapture`]. The macOS backend lives in
//! [`crate::sys::macos`]; tests provide stubs.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::geometry::Rect;
use super::screen::{ScreenId, ScreenInfo};

#[allow(non_camel_case_types)]
pub type pid_t = i32;

/// The window level menu bar items live at (`kCGStatusWindowLevel`).
pub const STATUS_WINDOW_LEVEL: i32 = 25;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct WindowServerId(u32);

impl WindowServerId {
    pub fn new(id: u32) -> Self { WindowServerId(id) }

    pub fn as_u32(&self) -> u32 { self.0 }
}

impl fmt::Display for WindowServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

bitflags! {
    /// Options applied by the window server when listing windows.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ListOptions: u32 {
        const MENU_BAR_ITEMS = 1 << 0;
        const ON_SCREEN = 1 << 1;
        const ACTIVE_SPACE = 1 << 2;
    }
}

bitflags! {
    /// Mirrors the subset of `CGWindowImageOption` the pipeline uses.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ImageOptions: u32 {
        const BOUNDS_IGNORE_FRAMING = 1 << 0;
        const BEST_RESOLUTION = 1 << 3;
    }
}

/// A snapshot of a window as reported by the window server.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowInfo {
    pub id: WindowServerId,
    pub frame: Rect,
    /// Only readable while the process holds screen capture access.
    pub title: Option<String>,
    pub layer: i32,
    pub owner_pid: pid_t,
    pub owner_name: Option<String>,
    pub bundle_id: Option<String>,
    pub is_on_screen: bool,
}

impl WindowInfo {
    pub fn is_menu_bar_item(&self) -> bool { self.layer == STATUS_WINDOW_LEVEL }
}

/// Captured pixel data.
pub trait Bitmap: Send + Sync + fmt::Debug {
    /// Width in pixels.
    fn width(&self) -> usize;

    /// Height in pixels.
    fn height(&self) -> usize;

    /// Crops to `rect`, given in pixels relative to the top-left corner.
    fn crop(&self, rect: Rect) -> Option<ItemImage>;
}

pub type ItemImage = Arc<dyn Bitmap>;

pub trait WindowServer: Send + Sync {
    /// Window ids matching `options`, front to back.
    fn window_list(&self, options: ListOptions) -> Vec<WindowServerId>;

    fn window_info(&self, id: WindowServerId) -> Option<WindowInfo>;

    /// The live frame of a window. `None` once the window is gone.
    fn window_frame(&self, id: WindowServerId) -> Option<Rect>;

    fn display_bounds(&self, display: ScreenId) -> Option<Rect>;

    fn main_screen(&self) -> Option<ScreenInfo>;

    fn current_pid(&self) -> pid_t { nix::unistd::getpid().as_raw() }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture timed out after {0:?}")]
    TimedOut(std::time::Duration),
    #[error("window server refused the request: {0}")]
    Platform(String),
    #[error("not supported on this system")]
    Unsupported,
}

pub trait ScreenCapture: Send + Sync {
    /// Captures a composite image of `windows`. `bounds` of `None` captures
    /// the smallest rectangle enclosing every window.
    fn capture_windows(
        &self,
        windows: &[WindowServerId],
        bounds: Option<Rect>,
        options: ImageOptions,
    ) -> Option<ItemImage>;

    /// Captures whatever is on screen inside `rect`.
    fn capture_region(&self, rect: Rect) -> Option<ItemImage>;

    /// The declarative access flag. May be stale until the process restarts.
    fn preflight_access(&self) -> bool;

    /// Asks the system for access. Adds the process to the system's list of
    /// capture clients even if the user never answers.
    fn request_access(&self) -> bool;

    /// Additional request trigger through a newer API, where one exists.
    fn request_access_secondary(&self) -> Result<(), CaptureError> { Err(CaptureError::Unsupported) }
}

#[cfg(test)]
pub(crate) mod stub {
    //! In-memory window server used across the crate's tests.

    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub struct TestImage {
        pub width: usize,
        pub height: usize,
        /// Where this image came from, for assertions.
        pub tag: String,
    }

    impl TestImage {
        pub fn new(width: usize, height: usize, tag: impl Into<String>) -> ItemImage {
            Arc::new(TestImage { width, height, tag: tag.into() })
        }
    }

    impl Bitmap for TestImage {
        fn width(&self) -> usize { self.width }

        fn height(&self) -> usize { self.height }

        fn crop(&self, rect: Rect) -> Option<ItemImage> {
            if rect.min_x() < 0.0
                || rect.min_y() < 0.0
                || rect.max_x() > self.width as f64
                || rect.max_y() > self.height as f64
                || rect.is_empty()
            {
                return None;
            }
            Some(Arc::new(TestImage {
                width: rect.width() as usize,
                height: rect.height() as usize,
                tag: format!("{}@{}", self.tag, rect.min_x()),
            }))
        }
    }

    pub fn tag_of(image: &ItemImage) -> String { format!("{image:?}") }

    #[derive(Default)]
    pub struct StubWindowServer {
        pub windows: Mutex<BTreeMap<u32, (WindowInfo, bool)>>,
        pub screen: Mutex<Option<ScreenInfo>>,
        pub displays: Mutex<BTreeMap<u32, Rect>>,
        pub pid: pid_t,
        /// When set, frame lookups fail for every window.
        pub frames_unavailable: AtomicBool,
    }

    impl StubWindowServer {
        pub fn new() -> Self {
            StubWindowServer {
                pid: 4242,
                screen: Mutex::new(Some(ScreenInfo {
                    id: ScreenId::new(1),
                    frame: Rect::from_xywh(0.0, 0.0, 1440.0, 900.0),
                    backing_scale_factor: 2.0,
                    menu_bar_height: Some(24.0),
                })),
                ..Default::default()
            }
        }

        /// Adds a menu bar item window. `active_space` controls whether it
        /// survives `ListOptions::ACTIVE_SPACE`.
        pub fn add_item(
            &self,
            id: u32,
            bundle_id: &str,
            title: Option<&str>,
            x: f64,
            width: f64,
            active_space: bool,
        ) {
            let info = WindowInfo {
                id: WindowServerId::new(id),
                frame: Rect::from_xywh(x, 0.0, width, 24.0),
                title: title.map(str::to_owned),
                layer: STATUS_WINDOW_LEVEL,
                owner_pid: 100 + id as pid_t,
                owner_name: Some(bundle_id.rsplit('.').next().unwrap_or(bundle_id).to_owned()),
                bundle_id: Some(bundle_id.to_owned()),
                is_on_screen: x >= 0.0,
            };
            self.windows.lock().insert(id, (info, active_space));
        }

        pub fn insert(&self, info: WindowInfo, active_space: bool) {
            self.windows.lock().insert(info.id.as_u32(), (info, active_space));
        }

        pub fn set_title(&self, id: u32, title: Option<&str>) {
            if let Some((info, _)) = self.windows.lock().get_mut(&id) {
                info.title = title.map(str::to_owned);
            }
        }
    }

    impl WindowServer for StubWindowServer {
        fn window_list(&self, options: ListOptions) -> Vec<WindowServerId> {
            self.windows
                .lock()
                .values()
                .filter(|(info, _)| {
                    !options.contains(ListOptions::MENU_BAR_ITEMS) || info.is_menu_bar_item()
                })
                .filter(|(info, _)| !options.contains(ListOptions::ON_SCREEN) || info.is_on_screen)
                .filter(|(_, active)| !options.contains(ListOptions::ACTIVE_SPACE) || *active)
                .map(|(info, _)| info.id)
                .collect()
        }

        fn window_info(&self, id: WindowServerId) -> Option<WindowInfo> {
            self.windows.lock().get(&id.as_u32()).map(|(info, _)| info.clone())
        }

        fn window_frame(&self, id: WindowServerId) -> Option<Rect> {
            if self.frames_unavailable.load(Ordering::SeqCst) {
                return None;
            }
            self.window_info(id).map(|info| info.frame)
        }

        fn display_bounds(&self, display: ScreenId) -> Option<Rect> {
            self.displays.lock().get(&display.as_u32()).copied()
        }

        fn main_screen(&self) -> Option<ScreenInfo> { self.screen.lock().clone() }

        fn current_pid(&self) -> pid_t { self.pid }
    }

    /// Capture stub that fabricates images from the stub window server's
    /// frames at 2x scale.
    pub struct StubCapture {
        pub server: Arc<StubWindowServer>,
        pub scale: f64,
        /// Pixels subtracted from composite widths to simulate clipping.
        pub composite_clip: Mutex<usize>,
        /// Windows whose individual capture fails.
        pub failing: Mutex<Vec<u32>>,
        pub fail_everything: AtomicBool,
        pub region_ok: AtomicBool,
        pub preflight: AtomicBool,
        pub requests: AtomicUsize,
        pub secondary_requests: AtomicUsize,
        /// When set, the secondary request hangs this long before answering.
        pub secondary_stall: Mutex<Option<std::time::Duration>>,
        pub composite_calls: AtomicUsize,
    }

    impl StubCapture {
        pub fn new(server: Arc<StubWindowServer>) -> Self {
            StubCapture {
                server,
                scale: 2.0,
                composite_clip: Mutex::new(0),
                failing: Mutex::new(Vec::new()),
                fail_everything: AtomicBool::new(false),
                region_ok: AtomicBool::new(false),
                preflight: AtomicBool::new(false),
                requests: AtomicUsize::new(0),
                secondary_requests: AtomicUsize::new(0),
                secondary_stall: Mutex::new(None),
                composite_calls: AtomicUsize::new(0),
            }
        }
    }

    impl ScreenCapture for StubCapture {
        fn capture_windows(
            &self,
            windows: &[WindowServerId],
            _bounds: Option<Rect>,
            _options: ImageOptions,
        ) -> Option<ItemImage> {
            if self.fail_everything.load(Ordering::SeqCst) || windows.is_empty() {
                return None;
            }
            if windows.len() == 1 {
                if self.failing.lock().contains(&windows[0].as_u32()) {
                    return None;
                }
                let frame = self.server.window_frame(windows[0])?;
                return Some(TestImage::new(
                    (frame.width() * self.scale) as usize,
                    (frame.height() * self.scale) as usize,
                    format!("single-{}", windows[0]),
                ));
            }
            self.composite_calls.fetch_add(1, Ordering::SeqCst);
            let union = windows
                .iter()
                .filter_map(|id| self.server.window_frame(*id))
                .fold(Rect::NULL, |acc, frame| acc.union(&frame));
            let width =
                ((union.width() * self.scale) as usize).saturating_sub(*self.composite_clip.lock());
            Some(TestImage::new(width, (union.height() * self.scale) as usize, "composite"))
        }

        fn capture_region(&self, rect: Rect) -> Option<ItemImage> {
            self.region_ok.load(Ordering::SeqCst).then(|| {
                TestImage::new(rect.width() as usize, rect.height() as usize, "region")
            })
        }

        fn preflight_access(&self) -> bool { self.preflight.load(Ordering::SeqCst) }

        fn request_access(&self) -> bool {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.preflight_access()
        }

        fn request_access_secondary(&self) -> Result<(), CaptureError> {
            self.secondary_requests.fetch_add(1, Ordering::SeqCst);
            let stall = *self.secondary_stall.lock();
            let timeout = std::time::Duration::from_millis(50);
            crate::sys::timeout::call_with_timeout("secondary request", timeout, move || {
                if let Some(stall) = stall {
                    std::thread::sleep(stall);
                }
            })
        }
    }
}
