//! C ABI over an opaque tree handle
//!
//! Every entry point takes the handle returned by [`fz_create_tree`] and
//! plain integers/doubles. Nothing here unwinds into the caller: bad ids
//! degrade to defaults, failures return a sentinel and record a message
//! readable through [`fz_last_error`], and panics are caught at the boundary.
//!
//! Handles must be released exactly once with [`fz_destroy_tree`]. A handle
//! must not be used from two threads at the same time.

use std::cell::RefCell;
use std::ffi::{c_char, CStr, CString};
use std::panic::{self, AssertUnwindSafe};

use log::warn;

use crate::{node::NodeId, tree::FluidTree, FluxError};

/// Status returned by mutating calls on success
pub const FZ_OK: i32 = 0;

/// Status returned by mutating calls on failure
pub const FZ_ERROR: i32 = -1;

thread_local! {
    static LAST_ERROR: RefCell<CString> = RefCell::new(CString::default());
}

fn set_last_error(message: &str) {
    warn!("capi: {}", message);
    // Interior NULs would truncate the message on the C side anyway
    let sanitized = message.replace('\0', " ");
    let c_message = CString::new(sanitized).unwrap_or_default();
    LAST_ERROR.with(|slot| *slot.borrow_mut() = c_message);
}

/// Runs `f`, mapping a panic to `fallback` and recording it
fn guard<T>(fallback: T, f: impl FnOnce() -> T) -> T {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            set_last_error("internal panic caught at the C boundary");
            fallback
        }
    }
}

fn report(err: &FluxError) {
    set_last_error(&err.to_string());
}

unsafe fn tree_ref<'a>(handle: *const FluidTree) -> Option<&'a FluidTree> {
    handle.as_ref()
}

unsafe fn tree_mut<'a>(handle: *mut FluidTree) -> Option<&'a mut FluidTree> {
    handle.as_mut()
}

unsafe fn path_arg<'a>(path: *const c_char) -> Option<&'a str> {
    if path.is_null() {
        set_last_error("null path");
        return None;
    }
    match CStr::from_ptr(path).to_str() {
        Ok(s) => Some(s),
        Err(_) => {
            set_last_error("path is not valid UTF-8");
            None
        }
    }
}

/// Message for the most recent failure on this thread, empty if none
///
/// Successful calls never touch the message, so the pointer stays valid until
/// the next failing call on the same thread.
#[no_mangle]
pub extern "C" fn fz_last_error() -> *const c_char {
    LAST_ERROR.with(|slot| slot.borrow().as_ptr())
}

/// Creates a tree holding only node 0; null only if allocation panicked
#[no_mangle]
pub extern "C" fn fz_create_tree() -> *mut FluidTree {
    guard(std::ptr::null_mut(), || {
        Box::into_raw(Box::new(FluidTree::new()))
    })
}

/// Releases a tree and every id derived from it
///
/// # Safety
///
/// `handle` must be null or a pointer returned by [`fz_create_tree`] that has
/// not been destroyed yet.
#[no_mangle]
pub unsafe extern "C" fn fz_destroy_tree(handle: *mut FluidTree) {
    if handle.is_null() {
        return;
    }
    guard((), || drop(Box::from_raw(handle)));
}

/// Allocates a node under `parent` (`-1` for a new root)
///
/// Returns the new id, or `-1` on failure.
///
/// # Safety
///
/// `handle` must be null or a live handle from [`fz_create_tree`].
#[no_mangle]
pub unsafe extern "C" fn fz_create_node(handle: *mut FluidTree, parent: i32) -> i32 {
    let Some(tree) = tree_mut(handle) else {
        set_last_error("null tree handle");
        return NodeId::NONE.0;
    };
    guard(NodeId::NONE.0, || match tree.create_node(NodeId(parent)) {
        Ok(id) => id.0,
        Err(err) => {
            report(&err);
            NodeId::NONE.0
        }
    })
}

/// Allocates a node under `parent` and links it in one step
///
/// Returns the new id, or `-1` on failure.
///
/// # Safety
///
/// `handle` must be null or a live handle from [`fz_create_tree`].
#[no_mangle]
pub unsafe extern "C" fn fz_create_child(handle: *mut FluidTree, parent: i32) -> i32 {
    let Some(tree) = tree_mut(handle) else {
        set_last_error("null tree handle");
        return NodeId::NONE.0;
    };
    guard(NodeId::NONE.0, || match tree.create_child(NodeId(parent)) {
        Ok(id) => id.0,
        Err(err) => {
            report(&err);
            NodeId::NONE.0
        }
    })
}

/// Links `child` under `parent`
///
/// Returns `1` if a link was recorded, `0` if it already existed and `-1`
/// if the link was rejected.
///
/// # Safety
///
/// `handle` must be null or a live handle from [`fz_create_tree`].
#[no_mangle]
pub unsafe extern "C" fn fz_add_child(handle: *mut FluidTree, parent: i32, child: i32) -> i32 {
    let Some(tree) = tree_mut(handle) else {
        set_last_error("null tree handle");
        return FZ_ERROR;
    };
    guard(FZ_ERROR, || match tree.add_child(NodeId(parent), NodeId(child)) {
        Ok(true) => 1,
        Ok(false) => 0,
        Err(err) => {
            report(&err);
            FZ_ERROR
        }
    })
}

/// Descends from `start` to a leaf; returns `start` if it has no children
///
/// Returns `-1` only for a null handle.
///
/// # Safety
///
/// `handle` must be null or a live handle from [`fz_create_tree`].
#[no_mangle]
pub unsafe extern "C" fn fz_select_leaf(
    handle: *const FluidTree,
    start: i32,
    exploration: f64,
) -> i32 {
    let Some(tree) = tree_ref(handle) else {
        return NodeId::NONE.0;
    };
    guard(start, || tree.select_leaf(NodeId(start), exploration).0)
}

/// Folds `reward` into `leaf` and its ancestors
///
/// # Safety
///
/// `handle` must be null or a live handle from [`fz_create_tree`].
#[no_mangle]
pub unsafe extern "C" fn fz_backprop(
    handle: *mut FluidTree,
    leaf: i32,
    reward: f64,
    learning_rate: f64,
) {
    if let Some(tree) = tree_mut(handle) {
        guard(0, || tree.backprop(NodeId(leaf), reward, learning_rate));
    }
}

/// Visit count of `node`; 0 for unknown ids or a null handle
///
/// # Safety
///
/// `handle` must be null or a live handle from [`fz_create_tree`].
#[no_mangle]
pub unsafe extern "C" fn fz_get_visits(handle: *const FluidTree, node: i32) -> i32 {
    match tree_ref(handle) {
        Some(tree) => i32::try_from(tree.get_visits(NodeId(node))).unwrap_or(i32::MAX),
        None => 0,
    }
}

/// Conductivity of `node`; 0.0 for unknown ids or a null handle
///
/// # Safety
///
/// `handle` must be null or a live handle from [`fz_create_tree`].
#[no_mangle]
pub unsafe extern "C" fn fz_get_value(handle: *const FluidTree, node: i32) -> f64 {
    match tree_ref(handle) {
        Some(tree) => tree.get_value(NodeId(node)),
        None => 0.0,
    }
}

/// Most visited child of `node`, or `-1` if it has none
///
/// # Safety
///
/// `handle` must be null or a live handle from [`fz_create_tree`].
#[no_mangle]
pub unsafe extern "C" fn fz_get_best_child(handle: *const FluidTree, node: i32) -> i32 {
    match tree_ref(handle) {
        Some(tree) => tree.get_best_child(NodeId(node)).0,
        None => NodeId::NONE.0,
    }
}

/// Copies up to `capacity` children of `node` into `out` and returns the
/// total number of children
///
/// Call once with a null buffer or zero capacity to learn the count, then
/// again with a buffer of that size. Unknown ids have no children.
///
/// # Safety
///
/// `handle` must be null or a live handle from [`fz_create_tree`]; `out`
/// must be null or valid for `capacity` writes of `i32`.
#[no_mangle]
pub unsafe extern "C" fn fz_get_children(
    handle: *const FluidTree,
    node: i32,
    out: *mut i32,
    capacity: i32,
) -> i32 {
    let Some(tree) = tree_ref(handle) else {
        return 0;
    };
    let children = tree.get_children(NodeId(node));

    if !out.is_null() && capacity > 0 {
        let len = children.len().min(capacity as usize);
        let buf = std::slice::from_raw_parts_mut(out, len);
        for (slot, child) in buf.iter_mut().zip(children) {
            *slot = child.0;
        }
    }

    i32::try_from(children.len()).unwrap_or(i32::MAX)
}

/// Number of nodes in the tree; 0 for a null handle
///
/// # Safety
///
/// `handle` must be null or a live handle from [`fz_create_tree`].
#[no_mangle]
pub unsafe extern "C" fn fz_node_count(handle: *const FluidTree) -> i32 {
    match tree_ref(handle) {
        Some(tree) => i32::try_from(tree.len()).unwrap_or(i32::MAX),
        None => 0,
    }
}

/// Writes the tree to `path`; returns `0` on success and `-1` on failure
///
/// # Safety
///
/// `handle` must be null or a live handle from [`fz_create_tree`]; `path`
/// must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn fz_save(handle: *const FluidTree, path: *const c_char) -> i32 {
    let Some(tree) = tree_ref(handle) else {
        set_last_error("null tree handle");
        return FZ_ERROR;
    };
    let Some(path) = path_arg(path) else {
        return FZ_ERROR;
    };
    guard(FZ_ERROR, || match tree.save(path) {
        Ok(()) => FZ_OK,
        Err(err) => {
            report(&err);
            FZ_ERROR
        }
    })
}

/// Replaces the tree with the one stored at `path`
///
/// Returns `0` on success and `-1` on failure; on failure the tree is
/// unchanged.
///
/// # Safety
///
/// `handle` must be null or a live handle from [`fz_create_tree`]; `path`
/// must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn fz_load(handle: *mut FluidTree, path: *const c_char) -> i32 {
    let Some(tree) = tree_mut(handle) else {
        set_last_error("null tree handle");
        return FZ_ERROR;
    };
    let Some(path) = path_arg(path) else {
        return FZ_ERROR;
    };
    guard(FZ_ERROR, || match tree.load(path) {
        Ok(()) => FZ_OK,
        Err(err) => {
            report(&err);
            FZ_ERROR
        }
    })
}
