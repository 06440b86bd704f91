//! Dynamic library (dylib) node backend.
//!
//! Loads a shared library (`.so`/`.dll`/`.dylib`) exporting the node's C ABI:
//!
//! - `startNode(address, callback, user) -> handle`: null on failure
//! - `stopNode(&handle)`: returns once no further callbacks will be issued
//!
//! Symbol names are configurable and default to `startNode` and `stopNode`.

use std::ffi::{c_char, c_void, CStr};
use std::path::{Path, PathBuf};

use crate::bridge::{ForeignNode, HeaderCallback};

type StartFn = unsafe extern "C" fn(*const c_char, HeaderCallback, *mut c_void) -> *mut c_void;
type StopFn = unsafe extern "C" fn(*mut *mut c_void);

/// Errors from loading a dylib node.
#[derive(Debug, thiserror::Error)]
pub enum DylibError {
    #[error("failed to load library at {path}: {source}")]
    LoadFailed {
        path: PathBuf,
        source: libloading::Error,
    },

    #[error("required symbol '{symbol}' not found in {path}: {source}")]
    SymbolNotFound {
        path: PathBuf,
        symbol: String,
        source: libloading::Error,
    },
}

/// A node backed by a native shared library.
///
/// The library stays loaded for the node's lifetime; the function pointers
/// are resolved once at load time.
pub struct DylibNode {
    /// Keeps the shared library loaded for the node's lifetime.
    _library: libloading::Library,
    path: PathBuf,
    start_fn: StartFn,
    stop_fn: StopFn,
}

impl std::fmt::Debug for DylibNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DylibNode").field("path", &self.path).finish()
    }
}

impl DylibNode {
    /// Load the library at `path` and resolve its start/stop symbols.
    pub fn load(path: &Path, start_symbol: &str, stop_symbol: &str) -> Result<Self, DylibError> {
        // SAFETY: running the library's initialisers is inherent to using it.
        let library = unsafe { libloading::Library::new(path) }.map_err(|e| DylibError::LoadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        let start_fn = Self::load_symbol::<StartFn>(&library, path, start_symbol)?;
        let stop_fn = Self::load_symbol::<StopFn>(&library, path, stop_symbol)?;

        tracing::info!(
            path = %path.display(),
            start_symbol,
            stop_symbol,
            "Node library loaded"
        );

        Ok(Self {
            _library: library,
            path: path.to_path_buf(),
            start_fn,
            stop_fn,
        })
    }

    fn load_symbol<T: Copy>(
        library: &libloading::Library,
        path: &Path,
        name: &str,
    ) -> Result<T, DylibError> {
        // SAFETY: the caller names the type the symbol is declared with.
        let symbol = unsafe { library.get::<T>(name.as_bytes()) }.map_err(|e| {
            DylibError::SymbolNotFound {
                path: path.to_path_buf(),
                symbol: name.to_string(),
                source: e,
            }
        })?;
        Ok(*symbol)
    }
}

// SAFETY: the library's own contract; see the module docs.
unsafe impl ForeignNode for DylibNode {
    unsafe fn start(
        &self,
        address: &CStr,
        callback: HeaderCallback,
        user: *mut c_void,
    ) -> *mut c_void {
        unsafe { (self.start_fn)(address.as_ptr(), callback, user) }
    }

    unsafe fn stop(&self, handle: *mut *mut c_void) {
        unsafe { (self.stop_fn)(handle) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_library_fails_to_load() {
        let err = DylibNode::load(
            Path::new("/nonexistent/libheader_node.so"),
            "startNode",
            "stopNode",
        )
        .unwrap_err();

        assert!(matches!(err, DylibError::LoadFailed { .. }));
        assert!(err.to_string().contains("/nonexistent/libheader_node.so"));
    }
}
