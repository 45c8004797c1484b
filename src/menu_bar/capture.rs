//! Captures item images through the window list capture API.
//!
//! Hidden sections park their items at negative x coordinates. Only the
//! window list path captures those faithfully, so it is the only path used.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, trace, warn};

use crate::common::collections::HashMap;
use crate::model::{Item, ItemIdentity};
use crate::sys::geometry::Rect;
use crate::sys::screen::ScreenInfo;
use crate::sys::timeout::call_with_timeout;
use crate::sys::window_server::{
    ImageOptions, ItemImage, ScreenCapture, WindowServer, WindowServerId,
};

pub const ITEM_IMAGE_OPTIONS: ImageOptions =
    ImageOptions::BOUNDS_IGNORE_FRAMING.union(ImageOptions::BEST_RESOLUTION);

#[derive(Clone)]
pub struct CaptureEngine {
    capture: Arc<dyn ScreenCapture>,
    timeout: Duration,
}

impl CaptureEngine {
    pub fn new(capture: Arc<dyn ScreenCapture>, timeout: Duration) -> Self {
        CaptureEngine { capture, timeout }
    }

    /// One image spanning `windows`. A call that exceeds the timeout counts
    /// as a failed capture.
    pub fn capture_windows(
        &self,
        windows: &[WindowServerId],
        bounds: Option<Rect>,
        options: ImageOptions,
    ) -> Option<ItemImage> {
        if windows.is_empty() {
            return None;
        }
        let capture = self.capture.clone();
        let windows = windows.to_vec();
        call_with_timeout("capture_windows", self.timeout, move || {
            capture.capture_windows(&windows, bounds, options)
        })
        .unwrap_or_else(|e| {
            debug!("window capture failed: {e}");
            None
        })
        .filter(|image| image.width() > 0 && image.height() > 0)
    }

    pub fn capture_window(&self, window: WindowServerId, options: ImageOptions) -> Option<ItemImage> {
        self.capture_windows(&[window], None, options)
    }

    /// Images of `items` on `screen`, keyed by identity.
    ///
    /// Tries one composite capture first and crops it per item. If the
    /// composite is missing or its width does not match the union of the
    /// item frames, the crops are discarded and every item is captured on
    /// its own. Items that cannot be captured are left out.
    #[instrument(skip_all, fields(items = items.len()))]
    pub fn capture_items(
        &self,
        items: &[Item],
        server: &dyn WindowServer,
        screen: &ScreenInfo,
    ) -> HashMap<ItemIdentity, ItemImage> {
        let scale = screen.backing_scale_factor;
        let display_bounds = server.display_bounds(screen.id).unwrap_or(screen.frame);

        let mut targets: Vec<(&ItemIdentity, WindowServerId, Rect)> = Vec::new();
        let mut union = Rect::NULL;
        for item in items {
            // Use the live frame; items that moved off the menu bar row are skipped.
            let Some(frame) = server.window_frame(item.window_id()) else {
                trace!(id = %item.identity, "window is gone");
                continue;
            };
            if frame.min_y() != display_bounds.min_y() {
                trace!(id = %item.identity, "window is not in the menu bar row");
                continue;
            }
            targets.push((&item.identity, item.window_id(), frame));
            union = union.union(&frame);
        }

        let mut images = HashMap::default();
        if targets.is_empty() {
            return images;
        }

        let ids: Vec<WindowServerId> = targets.iter().map(|(_, id, _)| *id).collect();
        let composite = self
            .capture_windows(&ids, None, ITEM_IMAGE_OPTIONS)
            .filter(|image| image.width() as f64 == union.width() * scale);

        if let Some(composite) = composite {
            for (identity, _, frame) in &targets {
                let rect = Rect::from_xywh(
                    frame.min_x() - union.min_x(),
                    frame.min_y() - union.min_y(),
                    frame.width(),
                    frame.height(),
                )
                .scaled(scale);
                match composite.crop(rect) {
                    Some(image) if image.width() > 0 && image.height() > 0 => {
                        images.insert((*identity).clone(), image);
                    }
                    _ => trace!(id = %identity, "crop failed"),
                }
            }
        } else {
            warn!("composite capture failed, capturing items individually");
            for (identity, id, _) in &targets {
                if let Some(image) = self.capture_window(*id, ITEM_IMAGE_OPTIONS) {
                    images.insert((*identity).clone(), image);
                }
            }
        }
        debug!(captured = images.len(), of = targets.len(), "captured item images");
        images
    }
}
