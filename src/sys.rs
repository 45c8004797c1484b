pub mod geometry;
#[cfg(target_os = "macos")]
pub mod macos;
pub mod screen;
pub mod timeout;
pub mod window_server;
