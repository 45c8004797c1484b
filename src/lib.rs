//! Enumerates the status items of the macOS menu bar, tells them apart with
//! stable identities, and keeps a cache of their images fresh.

pub mod actor;
pub mod common;
pub mod menu_bar;
pub mod model;
pub mod sys;
