//! Screen capture access, judged by what the process can actually do.
//!
//! The system's declarative access flag can stay stale for the lifetime of
//! the process after the user grants access, so it is consulted last. Reading
//! another app's item title or capturing a few pixels is tried first.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use super::enumerator::{CaptureScope, ItemEnumerator};
use crate::sys::geometry::{Rect, Size};
use crate::sys::window_server::{ScreenCapture, WindowServer};

type Probe = Box<dyn Fn() -> bool + Send + Sync>;

/// The three access probes, in the order they are tried.
pub struct Probes {
    legacy: Probe,
    capture: Probe,
    preflight: Probe,
}

impl Probes {
    pub fn new(
        legacy: impl Fn() -> bool + Send + Sync + 'static,
        capture: impl Fn() -> bool + Send + Sync + 'static,
        preflight: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self {
        Probes {
            legacy: Box::new(legacy),
            capture: Box::new(capture),
            preflight: Box::new(preflight),
        }
    }

    /// Probes backed by the window server and capture APIs.
    pub fn for_system(
        server: Arc<dyn WindowServer>,
        capture: Arc<dyn ScreenCapture>,
        probe_size: Size,
    ) -> Self {
        let enumerator = ItemEnumerator::new(server.clone());
        let own_pid = server.current_pid();
        let legacy = move || {
            enumerator
                .menu_bar_items(CaptureScope::active_space())
                .iter()
                .filter(|item| item.owner_pid() != own_pid)
                .any(|item| item.title().is_some_and(|t| !t.is_empty()))
        };

        let region_capture = capture.clone();
        let region = move || {
            let origin = server.main_screen().map(|s| s.frame.origin).unwrap_or_default();
            let rect = Rect { origin, size: probe_size };
            region_capture
                .capture_region(rect)
                .is_some_and(|image| image.width() > 0 && image.height() > 0)
        };

        let preflight = move || capture.preflight_access();

        Probes::new(legacy, region, preflight)
    }
}

pub struct PermissionOracle {
    probes: Probes,
    last_check_result: Mutex<Option<bool>>,
}

impl PermissionOracle {
    pub fn new(probes: Probes) -> Self {
        PermissionOracle { probes, last_check_result: Mutex::new(None) }
    }

    /// Runs the probes in order and stops at the first that succeeds.
    #[instrument(skip(self), level = "debug")]
    pub fn check(&self) -> bool {
        if (self.probes.legacy)() {
            debug!("read an item title, access granted");
            return true;
        }
        if (self.probes.capture)() {
            debug!("captured a menu bar region, access granted");
            return true;
        }
        let preflight = (self.probes.preflight)();
        debug!(preflight, "falling back to the preflight flag");
        preflight
    }

    /// The last result, unless there is none or `reset` is set, in which case
    /// the probes run again and the new result is remembered.
    pub fn cached_check(&self, reset: bool) -> bool {
        let mut last = self.last_check_result.lock();
        if !reset {
            if let Some(result) = *last {
                return result;
            }
        }
        let result = self.check();
        *last = Some(result);
        result
    }

    /// Asks the system for access.
    ///
    /// The primary request always goes out, so the process shows up in the
    /// system's list of capture clients whatever the secondary trigger does.
    /// Returns the access state re-probed afterwards.
    #[instrument(skip(self, capture))]
    pub fn request(&self, capture: &dyn ScreenCapture) -> bool {
        let granted = capture.request_access();
        info!(granted, "requested screen capture access");
        match capture.request_access_secondary() {
            Ok(()) => debug!("secondary access request succeeded"),
            Err(e) => warn!("secondary access request failed: {e}"),
        }
        self.cached_check(true)
    }
}
