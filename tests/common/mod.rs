//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::ffi::{c_void, CStr};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use header_bridge::bridge::{ForeignNode, HeaderCallback};

/// The callback registered by the current instance. `user` is kept as an
/// address so workers can carry it across threads.
#[derive(Clone, Copy)]
struct Armed {
    callback: HeaderCallback,
    user: usize,
}

struct Shared {
    /// Addresses "bound" by any clone of this node.
    bound: Mutex<HashSet<String>>,
    armed: Mutex<Option<Armed>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    join_on_stop: bool,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

/// Handle payload returned from `start`.
struct Instance {
    address: String,
}

/// An in-process stand-in for a foreign node.
///
/// Callbacks are invoked from threads the node owns, never from the test
/// thread. Clones share state, so two supervisors driving clones see each
/// other's bound addresses.
#[derive(Clone)]
pub struct SimulatedNode {
    shared: Arc<Shared>,
}

impl SimulatedNode {
    /// A well-behaved node: `stop` joins every callback thread.
    pub fn new() -> Self {
        Self::build(true)
    }

    /// A node whose `stop` returns without waiting for its callback threads.
    pub fn lenient() -> Self {
        Self::build(false)
    }

    fn build(join_on_stop: bool) -> Self {
        Self {
            shared: Arc::new(Shared {
                bound: Mutex::new(HashSet::new()),
                armed: Mutex::new(None),
                workers: Mutex::new(Vec::new()),
                join_on_stop,
                starts: AtomicUsize::new(0),
                stops: AtomicUsize::new(0),
            }),
        }
    }

    pub fn starts(&self) -> usize {
        self.shared.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.shared.stops.load(Ordering::SeqCst)
    }

    pub fn is_bound(&self, address: &str) -> bool {
        lock(&self.shared.bound).contains(address)
    }

    /// Deliver `payload` from a fresh node thread.
    pub fn fire(&self, payload: &[u8]) {
        let armed = (*lock(&self.shared.armed)).expect("fire on a stopped node");
        let payload = payload.to_vec();
        let worker = thread::spawn(move || unsafe {
            (armed.callback)(armed.user as *mut c_void, payload.as_ptr().cast(), payload.len());
        });
        lock(&self.shared.workers).push(worker);
    }

    /// Deliver a null buffer with a non-zero length.
    pub fn fire_null(&self, len: usize) {
        let armed = (*lock(&self.shared.armed)).expect("fire on a stopped node");
        let worker = thread::spawn(move || unsafe {
            (armed.callback)(armed.user as *mut c_void, ptr::null(), len);
        });
        lock(&self.shared.workers).push(worker);
    }

    /// Deliver `count` distinct payloads (`X-Seq: <n>`) from concurrent threads.
    pub fn fire_concurrent(&self, count: usize) {
        for n in 0..count {
            self.fire(format!("X-Seq: {}\r\n", n).as_bytes());
        }
    }

    /// Wait for every callback thread spawned so far.
    pub fn join_workers(&self) {
        let workers: Vec<_> = lock(&self.shared.workers).drain(..).collect();
        for worker in workers {
            let _ = worker.join();
        }
    }
}

// SAFETY: callbacks only run on worker threads; a joining node waits for all of
// them in `stop`, a lenient one leaves that to the test.
unsafe impl ForeignNode for SimulatedNode {
    unsafe fn start(
        &self,
        address: &CStr,
        callback: HeaderCallback,
        user: *mut c_void,
    ) -> *mut c_void {
        let address = address.to_string_lossy().into_owned();
        if !lock(&self.shared.bound).insert(address.clone()) {
            return ptr::null_mut();
        }
        self.shared.starts.fetch_add(1, Ordering::SeqCst);
        *lock(&self.shared.armed) = Some(Armed {
            callback,
            user: user as usize,
        });
        Box::into_raw(Box::new(Instance { address })).cast()
    }

    unsafe fn stop(&self, handle: *mut *mut c_void) {
        let raw = unsafe { std::mem::replace(&mut *handle, ptr::null_mut()) };
        if raw.is_null() {
            return;
        }
        let instance = unsafe { Box::from_raw(raw.cast::<Instance>()) };

        *lock(&self.shared.armed) = None;
        if self.shared.join_on_stop {
            self.join_workers();
        }
        lock(&self.shared.bound).remove(&instance.address);
        self.shared.stops.fetch_add(1, Ordering::SeqCst);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Send a raw request and return the full response.
pub fn send_request(addr: SocketAddr, request: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    stream.write_all(request).unwrap();

    let mut response = String::new();
    let _ = stream.read_to_string(&mut response);
    response
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}
