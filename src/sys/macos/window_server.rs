use objc2::rc::Retained;
use objc2::runtime::AnyObject;
use objc2_app_kit::{NSRunningApplication, NSScreen};
use objc2_core_foundation::{CFRetained, CGPoint, CGRect, CGSize};
use objc2_core_graphics::{
    CGDisplayBounds, CGMainDisplayID, CGWindowListCopyWindowInfo, CGWindowListOption,
};
use objc2_foundation::{MainThreadMarker, NSArray, NSDictionary, NSNumber, NSString, ns_string};
use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use super::skylight::*;
use crate::common::collections::HashMap;
use crate::sys::geometry::Rect;
use crate::sys::screen::{ScreenId, ScreenInfo};
use crate::sys::window_server::{ListOptions, WindowInfo, WindowServer, WindowServerId};

pub(super) fn to_rect(rect: CGRect) -> Rect {
    Rect::from_xywh(rect.origin.x, rect.origin.y, rect.size.width, rect.size.height)
}

pub(super) fn to_cg_rect(rect: Rect) -> CGRect {
    CGRect::new(CGPoint::new(rect.min_x(), rect.min_y()), CGSize::new(rect.width(), rect.height()))
}

/// Per-display details only AppKit knows, read on the main thread.
#[derive(Debug, Clone, Copy)]
struct DisplayMetrics {
    backing_scale_factor: f64,
    menu_bar_height: Option<f64>,
}

pub struct MacWindowServer {
    cid: cid_t,
    metrics: RwLock<HashMap<ScreenId, DisplayMetrics>>,
}

impl MacWindowServer {
    pub fn new(mtm: MainThreadMarker) -> Self {
        let server = MacWindowServer {
            cid: unsafe { CGSMainConnectionID() },
            metrics: RwLock::new(HashMap::default()),
        };
        server.refresh_screens(mtm);
        server
    }

    /// Re-reads scale factors and menu bar heights. Call after the screen
    /// configuration changes.
    pub fn refresh_screens(&self, mtm: MainThreadMarker) {
        let mut metrics = HashMap::default();
        for screen in NSScreen::screens(mtm).iter() {
            let Some(id) = screen_number(&screen) else { continue };
            metrics.insert(id, DisplayMetrics {
                backing_scale_factor: screen.backingScaleFactor(),
                menu_bar_height: ScreenInfo::menu_bar_height_from(
                    to_rect(screen.frame()),
                    to_rect(screen.visibleFrame()),
                ),
            });
        }
        debug!(screens = metrics.len(), "refreshed screen metrics");
        *self.metrics.write() = metrics;
    }

    fn raw_window_list(
        &self,
        count: unsafe extern "C" fn(cid_t, cid_t, *mut i32) -> CGError,
        list: unsafe extern "C" fn(cid_t, cid_t, i32, *mut u32, *mut i32) -> CGError,
    ) -> Vec<u32> {
        let mut n = 0;
        if !cg_ok(unsafe { count(self.cid, 0, &mut n) }) || n <= 0 {
            return Vec::new();
        }
        let mut ids = vec![0u32; n as usize];
        let mut real = 0;
        if !cg_ok(unsafe { list(self.cid, 0, n, ids.as_mut_ptr(), &mut real) }) {
            warn!("window list query failed");
            return Vec::new();
        }
        ids.truncate(real.max(0) as usize);
        ids
    }

    fn on_active_space(&self, ids: &mut Vec<u32>) {
        let active = unsafe { CGSGetActiveSpace(self.cid) };
        ids.retain(|&id| {
            let wids = NSArray::from_retained_slice(&[NSNumber::new_u32(id)]);
            let raw = unsafe {
                CGSCopySpacesForWindows(self.cid, ALL_SPACES_MASK, Retained::as_ptr(&wids).cast())
            };
            // SAFETY: The call returns a +1 CFArray of CFNumbers, toll-free
            // bridged with NSArray<NSNumber>.
            let Some(spaces) = (unsafe { Retained::<NSArray<NSNumber>>::from_raw(raw.cast()) })
            else {
                return false;
            };
            spaces.iter().any(|space| space.as_u64() == active)
        });
    }
}

fn screen_number(screen: &NSScreen) -> Option<ScreenId> {
    let desc = screen.deviceDescription();
    let value = desc.objectForKey(ns_string!("NSScreenNumber"))?;
    let number = value.downcast_ref::<NSNumber>()?;
    Some(ScreenId::new(number.as_u32()))
}

fn number(dict: &NSDictionary<NSString, AnyObject>, key: &NSString) -> Option<f64> {
    dict.objectForKey(key)?.downcast_ref::<NSNumber>().map(|n| n.as_f64())
}

fn string(dict: &NSDictionary<NSString, AnyObject>, key: &NSString) -> Option<String> {
    dict.objectForKey(key)?.downcast_ref::<NSString>().map(|s| s.to_string())
}

fn bounds(dict: &NSDictionary<NSString, AnyObject>) -> Option<Rect> {
    let value = dict.objectForKey(ns_string!("kCGWindowBounds"))?;
    let bounds = value.downcast_ref::<NSDictionary>()?;
    // SAFETY: The bounds dictionary has string keys.
    let bounds: &NSDictionary<NSString, AnyObject> =
        unsafe { &*(bounds as *const NSDictionary).cast() };
    Some(Rect::from_xywh(
        number(bounds, ns_string!("X"))?,
        number(bounds, ns_string!("Y"))?,
        number(bounds, ns_string!("Width"))?,
        number(bounds, ns_string!("Height"))?,
    ))
}

impl WindowServer for MacWindowServer {
    fn window_list(&self, options: ListOptions) -> Vec<WindowServerId> {
        let mut ids = if options.contains(ListOptions::MENU_BAR_ITEMS) {
            self.raw_window_list(CGSGetWindowCount, CGSGetProcessMenuBarWindowList)
        } else {
            self.raw_window_list(CGSGetOnScreenWindowCount, CGSGetOnScreenWindowList)
        };
        if options.contains(ListOptions::ON_SCREEN) {
            let on_screen =
                self.raw_window_list(CGSGetOnScreenWindowCount, CGSGetOnScreenWindowList);
            ids.retain(|id| on_screen.contains(id));
        }
        if options.contains(ListOptions::ACTIVE_SPACE) {
            self.on_active_space(&mut ids);
        }
        trace!(?options, count = ids.len(), "window list");
        ids.into_iter().map(WindowServerId::new).collect()
    }

    fn window_info(&self, id: WindowServerId) -> Option<WindowInfo> {
        let list = unsafe {
            CGWindowListCopyWindowInfo(CGWindowListOption::OptionIncludingWindow, id.as_u32())
        }?;
        // SAFETY: CFArray is toll-free bridged with NSArray, and the window
        // list holds dictionaries with string keys.
        let list: &NSArray<NSDictionary<NSString, AnyObject>> =
            unsafe { &*CFRetained::as_ptr(&list).as_ptr().cast() };
        let dict = list.firstObject()?;

        let owner_pid = number(&dict, ns_string!("kCGWindowOwnerPID"))? as i32;
        let bundle_id = NSRunningApplication::runningApplicationWithProcessIdentifier(owner_pid)
            .and_then(|app| app.bundleIdentifier())
            .map(|id| id.to_string());
        Some(WindowInfo {
            id,
            frame: bounds(&dict)?,
            title: string(&dict, ns_string!("kCGWindowName")),
            layer: number(&dict, ns_string!("kCGWindowLayer"))? as i32,
            owner_pid,
            owner_name: string(&dict, ns_string!("kCGWindowOwnerName")),
            bundle_id,
            is_on_screen: number(&dict, ns_string!("kCGWindowIsOnscreen")).is_some_and(|v| v != 0.0),
        })
    }

    fn window_frame(&self, id: WindowServerId) -> Option<Rect> {
        let mut rect = CGRect::default();
        let err = unsafe { CGSGetScreenRectForWindow(self.cid, id.as_u32(), &mut rect) };
        cg_ok(err).then(|| to_rect(rect))
    }

    fn display_bounds(&self, display: ScreenId) -> Option<Rect> {
        let bounds = to_rect(CGDisplayBounds(display.as_u32()));
        (!bounds.is_empty()).then_some(bounds)
    }

    fn main_screen(&self) -> Option<ScreenInfo> {
        let id = ScreenId::new(CGMainDisplayID());
        let frame = self.display_bounds(id)?;
        let metrics = self.metrics.read().get(&id).copied();
        let Some(metrics) = metrics else {
            warn!(?id, "no metrics for main display");
            return None;
        };
        Some(ScreenInfo {
            id,
            frame,
            backing_scale_factor: metrics.backing_scale_factor,
            menu_bar_height: metrics.menu_bar_height,
        })
    }
}
