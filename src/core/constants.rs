// ============================================================================
// spark-context - Constants
// Change-bit masks and lifecycle flags for providers and consumers
// ============================================================================

// =============================================================================
// CHANGE BITS
// =============================================================================

/// Largest legal change mask: every bit of a non-negative 31-bit integer.
///
/// Change masks are always reduced to this range before filtering, so the
/// sign bit and bit 31 never carry meaning.
pub const MAX_CHANGED_BITS: u32 = 0x7FFF_FFFF;

/// "Everything changed" / "observe everything".
///
/// Used when a context has no change-bit calculator and as the default
/// observed mask of a consumer.
pub const ALL_BITS: u32 = MAX_CHANGED_BITS;

/// "Nothing changed". A provider never broadcasts this mask.
pub const NO_BITS: u32 = 0;

// =============================================================================
// LIFECYCLE FLAGS
// =============================================================================

/// Instance has not been mounted yet, or has been unmounted
pub const UNMOUNTED: u32 = 1 << 0;

/// Instance is mounted in a scope
pub const MOUNTED: u32 = 1 << 1;

/// Consumer found an enclosing provider and is registered with its emitter
pub const BOUND: u32 = 1 << 2;

/// Consumer found no provider and reads the context default
pub const DEFAULTED: u32 = 1 << 3;

/// Mask to clear the mount status bits (UNMOUNTED, MOUNTED)
pub const STATUS_MASK: u32 = !(UNMOUNTED | MOUNTED);

/// Mask to clear the binding bits (BOUND, DEFAULTED)
pub const BINDING_MASK: u32 = !(BOUND | DEFAULTED);

// =============================================================================
// TESTS
// =============================================================================
