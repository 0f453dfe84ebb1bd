// ============================================================================
// spark-context - Core Module
// Constants, types, and the thread-local runtime of the propagation engine
// ============================================================================

pub mod constants;
pub mod runtime;
pub mod types;

// Re-export commonly used items
pub use constants::*;
pub use runtime::{
    broadcast_count, broadcast_depth, diagnostic_count, is_broadcasting, with_runtime,
    PropagationRuntime,
};
pub use types::{ChangeFn, ChangedBitsFn, EqualsFn, ScopeKey, ScopedLinkage, UpdateHandler};
