// ============================================================================
// spark-context - Primitives Module
// Emitter, context factory, provider, consumer, and the scope tree
// ============================================================================

pub mod consumer;
pub mod context;
pub mod emitter;
pub mod provider;
pub mod scope;

// Re-export for convenience
pub use consumer::Consumer;
pub use context::{
    create_context, create_context_with_changed_bits, create_context_with_equals,
    create_context_with_options, Context, ContextOptions,
};
pub use emitter::Emitter;
pub use provider::Provider;
pub use scope::{get_current_scope, on_scope_dispose, root_scope, Scope, ScopeCleanupFn};
