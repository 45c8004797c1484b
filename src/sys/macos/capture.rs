use std::ffi::c_void;
use std::fmt;
use std::ptr;
use std::sync::Arc;
use std::time::Duration;

use objc2_core_foundation::{CFArray, CFRetained, CGPoint, CGRect, CGSize};
use objc2_core_graphics::{
    CGImage, CGPreflightScreenCaptureAccess, CGRequestScreenCaptureAccess, CGWindowImageOption,
    CGWindowListCreateImage, CGWindowListCreateImageFromArray, CGWindowListOption,
    kCGNullWindowID,
};
use screencapturekit::sc_shareable_content::SCShareableContent;
use tracing::trace;

use super::window_server::to_cg_rect;
use crate::sys::geometry::Rect;
use crate::sys::timeout::call_with_timeout;
use crate::sys::window_server::{
    Bitmap, CaptureError, ImageOptions, ItemImage, ScreenCapture, WindowServerId,
};

pub struct CgBitmap(CFRetained<CGImage>);

// SAFETY: A CGImage is immutable once created, and CoreGraphics allows it to
// be read from any thread.
unsafe impl Send for CgBitmap {}
unsafe impl Sync for CgBitmap {}

impl CgBitmap {
    fn item_image(image: CFRetained<CGImage>) -> ItemImage { Arc::new(CgBitmap(image)) }

    pub fn image(&self) -> &CGImage { &self.0 }
}

impl fmt::Debug for CgBitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CgBitmap({}x{})", self.width(), self.height())
    }
}

impl Bitmap for CgBitmap {
    fn width(&self) -> usize { unsafe { CGImage::width(Some(&self.0)) } }

    fn height(&self) -> usize { unsafe { CGImage::height(Some(&self.0)) } }

    fn crop(&self, rect: Rect) -> Option<ItemImage> {
        let cropped = unsafe { CGImage::with_image_in_rect(Some(&self.0), to_cg_rect(rect)) };
        cropped.map(CgBitmap::item_image)
    }
}

/// A `CFArray` holding window ids as raw values, as the window list image
/// functions expect. No callbacks, so the values are never retained.
fn window_id_array(ids: &[WindowServerId]) -> Option<CFRetained<CFArray>> {
    let mut values: Vec<*const c_void> =
        ids.iter().map(|id| id.as_u32() as usize as *const c_void).collect();
    unsafe { CFArray::new(None, values.as_mut_ptr(), values.len() as isize, ptr::null()) }
}

fn image_option(options: ImageOptions) -> CGWindowImageOption {
    CGWindowImageOption(options.bits())
}

const NULL_RECT: CGRect = CGRect {
    origin: CGPoint { x: f64::INFINITY, y: f64::INFINITY },
    size: CGSize { width: 0.0, height: 0.0 },
};

#[derive(Debug)]
pub struct MacScreenCapture {
    /// Upper bound on the shareable content request, which blocks while the
    /// system shows its access prompt.
    request_timeout: Duration,
}

impl MacScreenCapture {
    pub fn new(request_timeout: Duration) -> Self { MacScreenCapture { request_timeout } }
}

impl ScreenCapture for MacScreenCapture {
    #[allow(deprecated)]
    fn capture_windows(
        &self,
        windows: &[WindowServerId],
        bounds: Option<Rect>,
        options: ImageOptions,
    ) -> Option<ItemImage> {
        let array = window_id_array(windows)?;
        let bounds = bounds.map_or(NULL_RECT, to_cg_rect);
        let image =
            unsafe { CGWindowListCreateImageFromArray(bounds, &array, image_option(options)) };
        trace!(windows = windows.len(), captured = image.is_some(), "window list image");
        image.map(CgBitmap::item_image)
    }

    #[allow(deprecated)]
    fn capture_region(&self, rect: Rect) -> Option<ItemImage> {
        let image = unsafe {
            CGWindowListCreateImage(
                to_cg_rect(rect),
                CGWindowListOption::OptionOnScreenOnly,
                kCGNullWindowID,
                image_option(ImageOptions::BOUNDS_IGNORE_FRAMING),
            )
        };
        image.map(CgBitmap::item_image)
    }

    fn preflight_access(&self) -> bool { unsafe { CGPreflightScreenCaptureAccess() } }

    fn request_access(&self) -> bool { unsafe { CGRequestScreenCaptureAccess() } }

    /// Asking for shareable content registers the process with
    /// ScreenCaptureKit, which on newer systems is what lists it in the
    /// privacy settings.
    fn request_access_secondary(&self) -> Result<(), CaptureError> {
        call_with_timeout("shareable content request", self.request_timeout, || {
            SCShareableContent::try_current().map(drop).map_err(|e| e.to_string())
        })?
        .map_err(CaptureError::Platform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_id_array_holds_raw_ids() {
        let ids = [WindowServerId::new(3), WindowServerId::new(41), WindowServerId::new(7)];
        let array = window_id_array(&ids).unwrap();
        assert_eq!(array.count(), 3);
        assert_eq!(window_id_array(&[]).unwrap().count(), 0);
    }

    #[test]
    fn image_options_keep_their_bits() {
        let options = ImageOptions::BOUNDS_IGNORE_FRAMING | ImageOptions::BEST_RESOLUTION;
        assert_eq!(image_option(options).0, options.bits());
    }
}
