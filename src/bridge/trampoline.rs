//! The fixed C-ABI entry point foreign nodes call with header data.
//!
//! # Concurrency Contract
//! - May run on any node thread, concurrently with itself
//! - Copies the payload before anything else; the node owns the buffer
//! - Must return promptly: sinks that do heavy work should queue it
//!   (see [`crate::sink::ChannelSink`])
//! - Never unwinds into the node; faults go to [`EventSink::on_fault`]

use std::any::Any;
use std::ffi::{c_char, c_void};
use std::panic::{self, AssertUnwindSafe};

use super::context::{self, CallbackContext};
use super::error::IntegrityFault;
use super::event::HeaderEvent;
use crate::observability::metrics;
use crate::sink::{EventFault, EventSink};

/// Registered with every foreign node as its header callback.
///
/// # Safety
///
/// `data` must be null or valid for reads of `len` bytes for the duration of
/// the call. `user` is validated against the live registrations before use.
pub(crate) unsafe extern "C" fn header_trampoline(
    user: *mut c_void,
    data: *const c_char,
    len: usize,
) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| unsafe { dispatch(user, data, len) }));

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(fault)) => integrity_abort(&fault),
        Err(payload) => {
            // Only reachable if the fault path itself panicked.
            tracing::error!(
                panic = %panic_message(payload.as_ref()),
                "Header callback panicked while reporting a fault"
            );
        }
    }
}

unsafe fn dispatch(
    user: *mut c_void,
    data: *const c_char,
    len: usize,
) -> Result<(), IntegrityFault> {
    let guard = unsafe { context::acquire(user) }?;
    let ctx = guard.context();

    let Some(bytes) = (unsafe { copy_payload(data, len) }) else {
        report(
            ctx,
            EventFault::NullPayload {
                registration: ctx.registration(),
                len,
            },
        );
        return Ok(());
    };

    metrics::record_header_event(bytes.len());
    let event = HeaderEvent::new(ctx.registration(), bytes);
    let sink = ctx.sink();

    match panic::catch_unwind(AssertUnwindSafe(|| sink.on_header(event))) {
        Ok(Ok(())) => {}
        Ok(Err(source)) => report(
            ctx,
            EventFault::Sink {
                registration: ctx.registration(),
                source,
            },
        ),
        Err(payload) => report(
            ctx,
            EventFault::Panicked {
                registration: ctx.registration(),
                message: panic_message(payload.as_ref()),
            },
        ),
    }

    Ok(())
}

/// Copy exactly `len` bytes out of the node's buffer.
///
/// `None` for a null pointer with a non-zero length.
unsafe fn copy_payload(data: *const c_char, len: usize) -> Option<Vec<u8>> {
    if len == 0 {
        return Some(Vec::new());
    }
    if data.is_null() {
        return None;
    }
    let view = unsafe { std::slice::from_raw_parts(data.cast::<u8>(), len) };
    Some(view.to_vec())
}

fn report(ctx: &CallbackContext, fault: EventFault) {
    metrics::record_event_fault(fault.kind());
    ctx.sink().on_fault(&fault);
}

fn integrity_abort(fault: &IntegrityFault) -> ! {
    tracing::error!(fault = %fault, "Integrity fault at the callback boundary, aborting");
    eprintln!("fatal: {fault}");
    std::process::abort()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
