//! In-memory protection for sensitive buffers.
//!
//! The guard holds handles to registered byte buffers plus arbitrary
//! cleanup callbacks. `cleanup_all` zeroes every registered buffer through
//! `zeroize` (whose writes are guaranteed not to be optimized away), clears
//! them, and runs the callbacks. The composition root owns one guard and
//! tears it down on shutdown; mutating methods are serialized by an internal
//! lock.

use std::sync::{Arc, Mutex};
use tracing::debug;
use zeroize::Zeroize;

type CleanupFn = Box<dyn FnOnce() + Send>;

/// A registered sensitive buffer.
pub type SensitiveBuffer = Arc<Mutex<Vec<u8>>>;

/// Outcome of a cleanup sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    /// Buffers zeroed and cleared
    pub buffers_zeroed: usize,
    /// Callbacks executed
    pub callbacks_run: usize,
}

/// Registry of sensitive allocations with explicit teardown.
pub struct MemoryGuard {
    inner: Mutex<GuardInner>,
}

struct GuardInner {
    buffers: Vec<SensitiveBuffer>,
    cleanups: Vec<CleanupFn>,
}

impl MemoryGuard {
    /// Create an empty guard.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(GuardInner {
                buffers: Vec::new(),
                cleanups: Vec::new(),
            }),
        }
    }

    /// Register a buffer for zeroing at cleanup.
    pub fn register_buffer(&self, buffer: SensitiveBuffer) {
        let mut inner = self.inner.lock().expect("memory guard lock poisoned");
        inner.buffers.push(buffer);
    }

    /// Allocate and register a buffer in one step.
    pub fn track_bytes(&self, data: Vec<u8>) -> SensitiveBuffer {
        let buffer = Arc::new(Mutex::new(data));
        self.register_buffer(Arc::clone(&buffer));
        buffer
    }

    /// Register a cleanup callback to run during `cleanup_all`.
    pub fn register_cleanup(&self, f: impl FnOnce() + Send + 'static) {
        let mut inner = self.inner.lock().expect("memory guard lock poisoned");
        inner.cleanups.push(Box::new(f));
    }

    /// Number of currently registered buffers.
    pub fn tracked_buffers(&self) -> usize {
        self.inner
            .lock()
            .expect("memory guard lock poisoned")
            .buffers
            .len()
    }

    /// Zero all registered buffers, run callbacks, and drop registrations.
    pub fn cleanup_all(&self) -> CleanupReport {
        let (buffers, cleanups) = {
            let mut inner = self.inner.lock().expect("memory guard lock poisoned");
            (
                std::mem::take(&mut inner.buffers),
                std::mem::take(&mut inner.cleanups),
            )
        };

        let mut zeroed = 0;
        for buffer in &buffers {
            if let Ok(mut bytes) = buffer.lock() {
                // Vec::zeroize wipes the contents and clears the length.
                bytes.zeroize();
                zeroed += 1;
            }
        }

        let callbacks_run = cleanups.len();
        for cleanup in cleanups {
            cleanup();
        }

        debug!(
            "Memory guard cleanup: {} buffers zeroed, {} callbacks run",
            zeroed, callbacks_run
        );

        CleanupReport {
            buffers_zeroed: zeroed,
            callbacks_run,
        }
    }
}

impl Default for MemoryGuard {
    fn default() -> Self {
        Self::new()
    }
}
