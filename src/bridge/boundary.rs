//! The start/stop/callback contract every foreign node exposes.

use std::ffi::{c_char, c_void, CStr};
use std::ptr::NonNull;

/// C-ABI entry point a node invokes for every parsed header block.
///
/// Arguments are the user context given at start, a pointer to the header
/// bytes and their length. The bytes are only valid for the duration of the
/// call.
pub type HeaderCallback = unsafe extern "C" fn(user: *mut c_void, data: *const c_char, len: usize);

/// A network node implemented outside this crate's safety guarantees.
///
/// # Safety
///
/// Implementors promise that:
/// - `start` either returns null and never invokes `callback`, or returns a
///   handle and only passes the given `user` pointer to `callback`;
/// - once `stop` returns, `callback` is never invoked again for that handle;
/// - `callback` is never invoked with a buffer shorter than the reported length.
pub unsafe trait ForeignNode {
    /// Start listening on `address`. Returns null on failure.
    ///
    /// # Safety
    ///
    /// `user` must stay valid until `stop` has returned for the returned handle.
    unsafe fn start(
        &self,
        address: &CStr,
        callback: HeaderCallback,
        user: *mut c_void,
    ) -> *mut c_void;

    /// Stop the node behind `*handle`. Implementations may null the slot.
    ///
    /// # Safety
    ///
    /// `handle` must point to a value previously returned by `start` on this
    /// node and not yet stopped.
    unsafe fn stop(&self, handle: *mut *mut c_void);
}

/// Exclusive handle to one live node instance.
///
/// Neither `Clone` nor `Copy`: a handle denotes exactly one
/// running instance and is consumed by [`NodeHandle::into_raw`] when stopping.
#[derive(Debug)]
pub struct NodeHandle(NonNull<c_void>);

impl NodeHandle {
    /// Wrap a raw handle returned by [`ForeignNode::start`]. `None` for null.
    pub fn from_raw(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    /// Raw pointer value, for logging and identity checks.
    pub fn as_ptr(&self) -> *mut c_void {
        self.0.as_ptr()
    }

    /// Give up ownership, returning the raw handle for the stop call.
    pub fn into_raw(self) -> *mut c_void {
        self.0.as_ptr()
    }
}

/// Run the foreign stop for `handle`, consuming it.
///
/// Returns `true` when the node cleared the handle slot itself.
///
/// # Safety
///
/// `handle` must have been returned by `start` on the same `node`.
pub(crate) unsafe fn stop_handle<N: ForeignNode + ?Sized>(node: &N, handle: NodeHandle) -> bool {
    let mut slot = handle.into_raw();
    unsafe { node.stop(&mut slot) };
    // Whatever is left in the slot is dead and goes out of scope here.
    slot.is_null()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    #[test]
    fn null_is_not_a_handle() {
        assert!(NodeHandle::from_raw(ptr::null_mut()).is_none());
    }

    #[test]
    fn handle_round_trips_pointer() {
        let mut value = 7u8;
        let raw = &mut value as *mut u8 as *mut c_void;
        let handle = NodeHandle::from_raw(raw).unwrap();
        assert_eq!(handle.as_ptr(), raw);
        assert_eq!(handle.into_raw(), raw);
    }
}
