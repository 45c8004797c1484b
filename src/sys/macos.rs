//! CoreGraphics backend for the window server seam.

pub mod capture;
pub mod skylight;
pub mod window_server;

pub use capture::MacScreenCapture;
pub use window_server::MacWindowServer;
