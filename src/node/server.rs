//! Runtime, accept loop and per-connection handling of the embedded node.

use std::ffi::{c_void, CStr};
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::connection::{ConnectionGuard, ConnectionTracker};
use super::headers::{read_header_block, HeaderError};
use super::listener::{ConnectionPermit, Listener, ListenerError};
use super::NodeOptions;
use crate::bridge::HeaderCallback;

const RESPONSE_OK: &[u8] = b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n";
const RESPONSE_BAD_REQUEST: &[u8] =
    b"HTTP/1.1 400 Bad Request\r\ncontent-length: 0\r\nconnection: close\r\n\r\n";
const RESPONSE_TIMEOUT: &[u8] =
    b"HTTP/1.1 408 Request Timeout\r\ncontent-length: 0\r\nconnection: close\r\n\r\n";
const RESPONSE_TOO_LARGE: &[u8] =
    b"HTTP/1.1 431 Request Header Fields Too Large\r\n\
      content-length: 0\r\nconnection: close\r\n\r\n";

/// Errors starting the embedded node.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("address is not valid UTF-8")]
    AddressEncoding,

    #[error("failed to build node runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// The callback and user pointer registered at start.
#[derive(Clone, Copy)]
pub(crate) struct CallbackTarget {
    callback: HeaderCallback,
    user: *mut c_void,
}

// SAFETY: the user pointer is opaque to the node and only handed back to
// `callback`, whose contract allows invocation from any thread.
unsafe impl Send for CallbackTarget {}
unsafe impl Sync for CallbackTarget {}

impl CallbackTarget {
    pub(crate) fn new(callback: HeaderCallback, user: *mut c_void) -> Self {
        Self { callback, user }
    }

    fn deliver(&self, bytes: &[u8]) {
        // SAFETY: `bytes` outlives the call; the callback copies what it keeps.
        unsafe { (self.callback)(self.user, bytes.as_ptr().cast(), bytes.len()) }
    }
}

/// One running embedded node: its runtime, accept task and open connections.
pub struct NodeInstance {
    runtime: Runtime,
    local_addr: SocketAddr,
    stop_tx: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
    tracker: ConnectionTracker,
}

impl NodeInstance {
    /// Build the runtime, bind, and start accepting.
    ///
    /// Must not be called from inside a Tokio runtime.
    pub(crate) fn launch(
        address: &CStr,
        target: CallbackTarget,
        options: &NodeOptions,
    ) -> Result<Self, NodeError> {
        let address = address.to_str().map_err(|_| NodeError::AddressEncoding)?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(options.worker_threads)
            .thread_name("header-node")
            .enable_all()
            .build()
            .map_err(NodeError::Runtime)?;

        let listener = runtime.block_on(Listener::bind(address, options.max_connections))?;
        let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let tracker = ConnectionTracker::new();
        let accept_task = runtime.spawn(accept_loop(
            listener,
            target,
            options.clone(),
            stop_rx,
            tracker.clone(),
        ));

        Ok(Self {
            runtime,
            local_addr,
            stop_tx,
            accept_task,
            tracker,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, close every connection, and wait until none is left.
    ///
    /// No callback is in progress or can start once this returns.
    pub(crate) fn shutdown(self) {
        let NodeInstance {
            runtime,
            local_addr,
            stop_tx,
            accept_task,
            tracker,
        } = self;

        tracing::info!(address = %local_addr, "Embedded node stopping");
        stop_tx.send_replace(true);

        runtime.block_on(async {
            if let Err(e) = accept_task.await {
                tracing::warn!(error = %e, "Accept loop ended abnormally");
            }
            tracker.wait_idle().await;
        });
        runtime.shutdown_timeout(Duration::from_secs(1));

        tracing::info!(address = %local_addr, "Embedded node stopped");
    }
}

/// Resolve once the stop flag is set (or its sender is gone).
async fn stopped(rx: &mut watch::Receiver<bool>) {
    loop {
        let stopping = *rx.borrow_and_update();
        if stopping || rx.changed().await.is_err() {
            return;
        }
    }
}

async fn accept_loop(
    listener: Listener,
    target: CallbackTarget,
    options: NodeOptions,
    mut stop: watch::Receiver<bool>,
    tracker: ConnectionTracker,
) {
    loop {
        tokio::select! {
            _ = stopped(&mut stop) => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer, permit)) => {
                    let guard = tracker.track();
                    let stop = stop.clone();
                    let options = options.clone();
                    tokio::spawn(async move {
                        handle_connection(stream, peer, target, options, stop, guard, permit).await;
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
    tracing::debug!(open = tracker.active_count(), "Accept loop stopped");
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    target: CallbackTarget,
    options: NodeOptions,
    mut stop: watch::Receiver<bool>,
    guard: ConnectionGuard,
    _permit: ConnectionPermit,
) {
    let read = tokio::time::timeout(
        options.header_timeout,
        read_header_block(&mut stream, options.max_header_bytes),
    );

    let outcome = tokio::select! {
        _ = stopped(&mut stop) => {
            tracing::debug!(connection_id = %guard.id(), "Connection dropped by node shutdown");
            return;
        }
        outcome = read => outcome,
    };

    let response = match outcome {
        Ok(Ok(block)) => {
            tracing::debug!(
                connection_id = %guard.id(),
                peer_addr = %peer,
                request = %block.request_line,
                len = block.fields.len(),
                "Header block parsed"
            );
            target.deliver(&block.fields);
            RESPONSE_OK
        }
        Ok(Err(HeaderError::Closed)) => return,
        Ok(Err(e @ HeaderError::TooLarge { .. })) => {
            tracing::debug!(connection_id = %guard.id(), error = %e, "Rejecting request");
            RESPONSE_TOO_LARGE
        }
        Ok(Err(e)) => {
            tracing::debug!(connection_id = %guard.id(), error = %e, "Rejecting request");
            RESPONSE_BAD_REQUEST
        }
        Err(_) => {
            tracing::debug!(connection_id = %guard.id(), "Header read timed out");
            RESPONSE_TIMEOUT
        }
    };

    if let Err(e) = stream.write_all(response).await {
        tracing::debug!(connection_id = %guard.id(), error = %e, "Failed to write response");
        return;
    }
    let _ = stream.shutdown().await;
}
