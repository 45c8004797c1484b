use serde::{Deserialize, Serialize};

use super::geometry::Rect;

type CGDirectDisplayID = u32;

#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScreenId(CGDirectDisplayID);

impl ScreenId {
    pub fn new(id: u32) -> Self { ScreenId(id) }

    pub fn as_u32(&self) -> u32 { self.0 }
}

/// The display context a batch of captures was taken in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenInfo {
    pub id: ScreenId,
    /// Display bounds in window server coordinates.
    pub frame: Rect,
    pub backing_scale_factor: f64,
    pub menu_bar_height: Option<f64>,
}

impl ScreenInfo {
    /// Menu bar height derived from the Cocoa frame and visible frame of a
    /// screen. Both rects use a bottom-left origin.
    pub fn menu_bar_height_from(frame: Rect, visible_frame: Rect) -> Option<f64> {
        let height = frame.max_y() - visible_frame.max_y();
        (height > 0.0).then_some(height)
    }
}
