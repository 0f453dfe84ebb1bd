// ============================================================================
// spark-context - Type Definitions
// Function aliases, scope keys, and the host linkage seam
// ============================================================================

use std::any::Any;
use std::fmt;
use std::rc::Rc;

// =============================================================================
// FUNCTION TYPES
// =============================================================================

/// Equality function deciding whether a provider update is a no-op.
///
/// Default for contexts is [`same_value`](crate::reactivity::equality::same_value).
pub type EqualsFn<T> = fn(&T, &T) -> bool;

/// Change-bit calculator: `(old, new) -> mask`.
///
/// Returns `i64` so that out-of-range results (negative, or wider than 31
/// bits) can be detected and reported before masking.
pub type ChangedBitsFn<T> = Rc<dyn Fn(&T, &T) -> i64>;

/// Callback registered with an emitter. Receives `(value, changed_bits)`.
///
/// Handlers are compared by pointer identity on unregister, so keep the
/// `Rc` you registered.
pub type UpdateHandler<T> = Rc<dyn Fn(&T, u32)>;

/// Callback a consumer invokes when its observed value changed.
pub type ChangeFn<T> = Box<dyn Fn(&T)>;

// =============================================================================
// SCOPE KEY
// =============================================================================

/// Opaque token identifying one context in the scoped linkage.
///
/// Allocated from the thread-local runtime, so two contexts never share a
/// key even when they carry the same value type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeKey(u64);

impl ScopeKey {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric id (for diagnostics)
    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope#{}", self.0)
    }
}

// =============================================================================
// SCOPED LINKAGE
// =============================================================================
//
// The host tree owns the parent/descendant relation. The core only needs to
// put a value into a subtree and to find the nearest value for a key from
// below. Values are type-erased; each context downcasts what it published.
// =============================================================================

/// Host primitive for tree-scoped publication and nearest-ancestor lookup.
///
/// [`Scope`](crate::primitives::scope::Scope) is the bundled implementation.
/// A UI host implements this over its own node tree.
pub trait ScopedLinkage {
    /// Publish `value` under `key` for this node's subtree.
    ///
    /// Replaces any value this node previously published under `key`.
    fn publish(&self, key: ScopeKey, value: Rc<dyn Any>);

    /// The value this node itself published under `key`, ignoring ancestors.
    fn published(&self, key: ScopeKey) -> Option<Rc<dyn Any>>;

    /// Remove this node's publication under `key`. No-op if absent.
    fn retract(&self, key: ScopeKey);

    /// Nearest value published under `key`, searching this node first and
    /// then each ancestor outward.
    fn lookup_nearest(&self, key: ScopeKey) -> Option<Rc<dyn Any>>;
}

// =============================================================================
// TESTS
// =============================================================================
