//! User context allocation and the registry of live contexts.
//!
//! # Responsibilities
//! - Allocate the context whose address round-trips through every callback
//! - Track which context addresses are live
//! - Keep a context allocated until no dispatch can still be reading it
//!
//! # Design Decisions
//! - The registry lock is held only for lookups; each registration carries
//!   its own in-flight counter, so registrations never wait on each other
//! - Addresses are only unique among live registrations: a freed address may
//!   be handed out again, and a callback arriving for the old one after
//!   release resolves to the new registration

use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock};

use dashmap::DashMap;

use super::error::IntegrityFault;
use crate::sink::EventSink;

/// Global atomic counter for registration IDs.
static REGISTRATION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for one registered callback context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationId(pub(crate) u64);

impl RegistrationId {
    fn next() -> Self {
        Self(REGISTRATION_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "reg-{}", self.0)
    }
}

#[derive(Default)]
struct InFlight {
    active: usize,
    closed: bool,
}

/// Registry value: the id and the dispatch barrier of one live context.
struct Entry {
    registration: RegistrationId,
    in_flight: Mutex<InFlight>,
    idle: Condvar,
}

impl Entry {
    fn new(registration: RegistrationId) -> Self {
        Self {
            registration,
            in_flight: Mutex::new(InFlight::default()),
            idle: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, InFlight> {
        self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Count a dispatch in. `false` once the registration is closing.
    fn enter(&self) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        state.active += 1;
        true
    }

    fn exit(&self) {
        let mut state = self.lock();
        state.active -= 1;
        if state.active == 0 {
            self.idle.notify_all();
        }
    }

    /// Refuse new dispatches and wait for the running ones to finish.
    fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        while state.active > 0 {
            state = self
                .idle
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }
}

/// Live context addresses, keyed by address.
fn registry() -> &'static DashMap<usize, Arc<Entry>> {
    static LIVE: OnceLock<DashMap<usize, Arc<Entry>>> = OnceLock::new();
    LIVE.get_or_init(DashMap::new)
}

/// Supervisor-side state a callback recovers from its user pointer.
///
/// Written once in [`Registration::new`] and read-only afterwards.
pub(crate) struct CallbackContext {
    registration: RegistrationId,
    sink: Arc<dyn EventSink>,
}

impl CallbackContext {
    pub(crate) fn registration(&self) -> RegistrationId {
        self.registration
    }

    pub(crate) fn sink(&self) -> &dyn EventSink {
        self.sink.as_ref()
    }
}

/// Owning side of a registered context.
///
/// Dropping it deregisters the address, waits for every [`ContextGuard`]
/// still held by a running callback, and then frees the context.
pub(crate) struct Registration {
    context: NonNull<CallbackContext>,
    entry: Arc<Entry>,
}

impl Registration {
    pub(crate) fn new(sink: Arc<dyn EventSink>) -> Self {
        let registration = RegistrationId::next();
        let context = NonNull::from(Box::leak(Box::new(CallbackContext { registration, sink })));
        let entry = Arc::new(Entry::new(registration));
        registry().insert(context.as_ptr() as usize, Arc::clone(&entry));

        tracing::debug!(registration = %registration, "Callback context registered");
        Self { context, entry }
    }

    pub(crate) fn id(&self) -> RegistrationId {
        self.entry.registration
    }

    /// The address handed to the foreign node as its user context.
    pub(crate) fn user_ptr(&self) -> *mut c_void {
        self.context.as_ptr().cast()
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let address = self.context.as_ptr() as usize;
        registry().remove(&address);
        self.entry.close();

        // SAFETY: allocated by `Box::leak` in `new`; the entry is closed and
        // idle, so no guard can reach it any more.
        let context = unsafe { Box::from_raw(self.context.as_ptr()) };
        tracing::debug!(registration = %context.registration, "Callback context released");
    }
}

/// Read access to a live context for the duration of one callback.
pub(crate) struct ContextGuard {
    entry: Arc<Entry>,
    context: NonNull<CallbackContext>,
}

impl ContextGuard {
    pub(crate) fn context(&self) -> &CallbackContext {
        // SAFETY: the registration cannot finish closing while this guard is
        // counted in, and with it the allocation stays alive.
        unsafe { self.context.as_ref() }
    }
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        self.entry.exit();
    }
}

/// Resolve a callback's user pointer to its live context.
///
/// The address is checked against the registry before it is dereferenced.
///
/// # Safety
///
/// If `user` is registered it must point to a `CallbackContext`, which holds
/// for every address produced by [`Registration::user_ptr`].
pub(crate) unsafe fn acquire(user: *mut c_void) -> Result<ContextGuard, IntegrityFault> {
    let context = NonNull::new(user.cast::<CallbackContext>()).ok_or(IntegrityFault::NullContext)?;
    let address = context.as_ptr() as usize;

    // Clone the entry out so the registry shard is released before dispatch.
    let entry = registry()
        .get(&address)
        .map(|entry| Arc::clone(entry.value()))
        .ok_or(IntegrityFault::Unregistered { address })?;
    if !entry.enter() {
        return Err(IntegrityFault::Unregistered { address });
    }
    let guard = ContextGuard { entry, context };

    let registered = guard.entry.registration;
    let found = guard.context().registration;
    if found != registered {
        return Err(IntegrityFault::RegistrationMismatch {
            address,
            registered,
            found,
        });
    }
    Ok(guard)
}
