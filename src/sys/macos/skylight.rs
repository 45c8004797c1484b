//! Private window server calls. These are exported by CoreGraphics under
//! their `CGS` names.

#![allow(non_camel_case_types, non_snake_case)]

use std::ffi::c_void;

use objc2_core_foundation::CGRect;
use objc2_core_graphics::CGError;

pub type cid_t = i32;

pub const ALL_SPACES_MASK: i32 = 0x7;

#[link(name = "CoreGraphics", kind = "framework")]
unsafe extern "C" {
    pub fn CGSMainConnectionID() -> cid_t;

    pub fn CGSGetActiveSpace(cid: cid_t) -> u64;

    /// `target` of 0 counts windows of every process.
    pub fn CGSGetWindowCount(cid: cid_t, target: cid_t, count: *mut i32) -> CGError;

    pub fn CGSGetProcessMenuBarWindowList(
        cid: cid_t,
        target: cid_t,
        count: i32,
        list: *mut u32,
        out_count: *mut i32,
    ) -> CGError;

    pub fn CGSGetOnScreenWindowCount(cid: cid_t, target: cid_t, count: *mut i32) -> CGError;

    pub fn CGSGetOnScreenWindowList(
        cid: cid_t,
        target: cid_t,
        count: i32,
        list: *mut u32,
        out_count: *mut i32,
    ) -> CGError;

    pub fn CGSGetScreenRectForWindow(cid: cid_t, wid: u32, rect: *mut CGRect) -> CGError;

    /// Takes a `CFArray` of `CFNumber` window ids and returns a retained
    /// `CFArray` of `CFNumber` space ids.
    pub fn CGSCopySpacesForWindows(cid: cid_t, mask: i32, wids: *const c_void) -> *mut c_void;
}

pub fn cg_ok(err: CGError) -> bool { err == CGError::Success }
