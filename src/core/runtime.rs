// ============================================================================
// spark-context - Propagation Runtime
// Thread-local bookkeeping for scope keys, broadcasts, and diagnostics
// ============================================================================

use std::cell::Cell;

use super::types::ScopeKey;

// =============================================================================
// PROPAGATION RUNTIME
// =============================================================================

/// Thread-local runtime holding the global state of the propagation engine.
///
/// Everything here is bookkeeping: the engine itself keeps no global emitter
/// registry. Emitters travel only through scoped linkage.
pub struct PropagationRuntime {
    /// Next scope key to hand out
    pub next_scope_key: Cell<u64>,

    /// Current broadcast nesting depth (re-entrant publishes increase it)
    pub broadcast_depth: Cell<u32>,

    /// Total broadcasts started on this thread
    pub broadcast_count: Cell<u64>,

    /// Total out-of-range change mask diagnostics emitted on this thread
    pub diagnostic_count: Cell<u64>,
}

impl PropagationRuntime {
    /// Create a new runtime with default values
    pub fn new() -> Self {
        Self {
            next_scope_key: Cell::new(1),
            broadcast_depth: Cell::new(0),
            broadcast_count: Cell::new(0),
            diagnostic_count: Cell::new(0),
        }
    }

    // =========================================================================
    // SCOPE KEYS
    // =========================================================================

    /// Allocate a fresh, never-reused scope key
    pub fn allocate_scope_key(&self) -> ScopeKey {
        let raw = self.next_scope_key.get();
        self.next_scope_key.set(raw + 1);
        ScopeKey::from_raw(raw)
    }

    // =========================================================================
    // BROADCASTS
    // =========================================================================

    /// Enter a broadcast, returning the new depth
    pub fn enter_broadcast(&self) -> u32 {
        let depth = self.broadcast_depth.get() + 1;
        self.broadcast_depth.set(depth);
        self.broadcast_count.set(self.broadcast_count.get() + 1);
        depth
    }

    /// Exit a broadcast, returning the new depth
    pub fn exit_broadcast(&self) -> u32 {
        let depth = self.broadcast_depth.get().saturating_sub(1);
        self.broadcast_depth.set(depth);
        depth
    }

    /// Get current broadcast depth
    pub fn get_broadcast_depth(&self) -> u32 {
        self.broadcast_depth.get()
    }

    /// Check if a broadcast is in progress
    pub fn is_broadcasting(&self) -> bool {
        self.broadcast_depth.get() > 0
    }

    /// Get the number of broadcasts started so far
    pub fn get_broadcast_count(&self) -> u64 {
        self.broadcast_count.get()
    }

    // =========================================================================
    // DIAGNOSTICS
    // =========================================================================

    /// Count one emitted diagnostic, returning the new total
    pub fn record_diagnostic(&self) -> u64 {
        let n = self.diagnostic_count.get() + 1;
        self.diagnostic_count.set(n);
        n
    }

    /// Get the number of diagnostics emitted so far
    pub fn get_diagnostic_count(&self) -> u64 {
        self.diagnostic_count.get()
    }
}

impl Default for PropagationRuntime {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// THREAD-LOCAL ACCESS
// =============================================================================

thread_local! {
    /// The thread-local propagation runtime
    static RUNTIME: PropagationRuntime = PropagationRuntime::new();
}

/// Access the thread-local propagation runtime.
///
/// # Example
///
/// ```
/// use spark_context::with_runtime;
///
/// let key = with_runtime(|rt| rt.allocate_scope_key());
/// assert!(key.id() >= 1);
/// ```
pub fn with_runtime<R>(f: impl FnOnce(&PropagationRuntime) -> R) -> R {
    RUNTIME.with(f)
}

// =============================================================================
// BROADCAST GUARD
// =============================================================================

/// Marks a broadcast in progress until dropped, so the depth is restored even
/// when a handler unwinds.
pub(crate) struct BroadcastGuard {
    depth: u32,
}

impl BroadcastGuard {
    pub(crate) fn enter() -> Self {
        Self {
            depth: with_runtime(|rt| rt.enter_broadcast()),
        }
    }

    /// Nesting depth of this broadcast (outermost = 1)
    pub(crate) fn depth(&self) -> u32 {
        self.depth
    }
}

impl Drop for BroadcastGuard {
    fn drop(&mut self) {
        with_runtime(|rt| rt.exit_broadcast());
    }
}

// =============================================================================
// CONVENIENCE FUNCTIONS
// =============================================================================

/// Check if an emitter broadcast is currently running on this thread
pub fn is_broadcasting() -> bool {
    with_runtime(|rt| rt.is_broadcasting())
}

/// Get the current broadcast nesting depth
pub fn broadcast_depth() -> u32 {
    with_runtime(|rt| rt.get_broadcast_depth())
}

/// Get the number of broadcasts started on this thread
pub fn broadcast_count() -> u64 {
    with_runtime(|rt| rt.get_broadcast_count())
}

/// Get the number of out-of-range change mask diagnostics on this thread
pub fn diagnostic_count() -> u64 {
    with_runtime(|rt| rt.get_diagnostic_count())
}

// =============================================================================
// TESTS
// =============================================================================
