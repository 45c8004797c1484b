//! The item capture pipeline.

pub mod capture;
pub mod enumerator;
pub mod image_cache;
pub mod permission;
pub mod throttle;

pub use capture::CaptureEngine;
pub use enumerator::{CaptureScope, ItemEnumerator};
pub use image_cache::ImageCache;
pub use permission::PermissionOracle;
pub use throttle::Throttle;
