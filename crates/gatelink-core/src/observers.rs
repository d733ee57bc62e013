//! Connected-changed observer registry.
//!
//! Handles come from a per-registry monotonic u64 counter and are never
//! reused for the life of the registry. Counter wraparound is out of
//! scope: at one registration per nanosecond it would take centuries.

use std::collections::HashMap;

use tracing::trace;

/// Callback invoked with the new connected state.
pub type ConnectedChangedHandler = Box<dyn FnMut(bool) + Send>;

/// Opaque handle identifying a registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverHandle(u64);

/// Registry of connected-changed observers.
#[derive(Default)]
pub struct ObserverRegistry {
    next_handle: u64,
    handlers: HashMap<u64, ConnectedChangedHandler>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer, returning its handle.
    pub fn register(&mut self, handler: ConnectedChangedHandler) -> ObserverHandle {
        let handle = ObserverHandle(self.next_handle);
        self.next_handle += 1;
        self.handlers.insert(handle.0, handler);
        trace!(handle = handle.0, "registered connected-changed observer");
        handle
    }

    /// Remove an observer. Returns `false` if the handle was unknown
    /// (already removed, or never issued by this registry).
    pub fn unregister(&mut self, handle: ObserverHandle) -> bool {
        let removed = self.handlers.remove(&handle.0).is_some();
        trace!(handle = handle.0, removed, "unregistered connected-changed observer");
        removed
    }

    /// Invoke every registered observer with the new connected state.
    pub fn notify_all(&mut self, connected: bool) {
        for handler in self.handlers.values_mut() {
            handler(connected);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

// ── Tests ────────────────────────────────────────────────────────────
