// ============================================================================
// spark-context - Reactivity Module
// Change detection: the equality oracle and change-bit calculation
// ============================================================================

pub mod changed_bits;
pub mod equality;

pub use changed_bits::{calculate_changed_bits, is_valid_changed_bits, mask_changed_bits};
pub use equality::{equals, never_equals, same_value, same_value_fn, SameValue};
