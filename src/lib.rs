// ============================================================================
// spark-context - Tree-Scoped Value Propagation for Rust
// ============================================================================
//
// A context is created once. Providers bind a value for their subtree;
// consumers below read the nearest bound value and are woken only when a
// part of the value they observe changes.
//
// The host tree stays outside: it drives mount/update/unmount and supplies
// scoped linkage (publish for a subtree, nearest lookup from below). `Scope`
// is a ready-made host for applications and tests.
// ============================================================================

#[macro_use]
mod macros;

pub mod core;
pub mod error;
pub mod primitives;
pub mod reactivity;

// Re-export core items at crate root for ergonomic access
pub use crate::core::constants;
pub use crate::core::runtime::{
    broadcast_count, broadcast_depth, diagnostic_count, is_broadcasting, with_runtime,
    PropagationRuntime,
};
pub use crate::core::types::{ChangeFn, ChangedBitsFn, EqualsFn, ScopeKey, ScopedLinkage, UpdateHandler};
pub use error::{ContextError, Result, Role};

// Re-export primitives at crate root
pub use primitives::consumer::Consumer;
pub use primitives::context::{
    create_context, create_context_with_changed_bits, create_context_with_equals,
    create_context_with_options, Context, ContextOptions,
};
pub use primitives::emitter::Emitter;
pub use primitives::provider::Provider;
pub use primitives::scope::{get_current_scope, on_scope_dispose, root_scope, Scope, ScopeCleanupFn};

// Re-export change detection
pub use reactivity::changed_bits::{calculate_changed_bits, is_valid_changed_bits, mask_changed_bits};
pub use reactivity::equality::{equals, never_equals, same_value, SameValue};

// =============================================================================
// TESTS
// =============================================================================
