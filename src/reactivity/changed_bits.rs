// ============================================================================
// spark-context - Change-Bit Calculation
// Identity short-circuit, calculator invocation, and 31-bit masking
// ============================================================================

use tracing::warn;

use crate::core::constants::{ALL_BITS, MAX_CHANGED_BITS, NO_BITS};
use crate::core::runtime::with_runtime;
use crate::core::types::{ChangedBitsFn, EqualsFn};
use crate::error::ContextError;

// =============================================================================
// MASKING
// =============================================================================

/// Whether a raw calculator result is a legal non-negative 31-bit mask.
///
/// # Example
/// ```
/// use spark_context::reactivity::changed_bits::is_valid_changed_bits;
///
/// assert!(is_valid_changed_bits(0));
/// assert!(is_valid_changed_bits(0x7FFF_FFFF));
/// assert!(!is_valid_changed_bits(0xFFFF_FFFF));
/// assert!(!is_valid_changed_bits(-1));
/// ```
pub fn is_valid_changed_bits(raw: i64) -> bool {
    raw & MAX_CHANGED_BITS as i64 == raw
}

/// Reduce a raw calculator result to 31 bits by bitwise AND.
///
/// # Example
/// ```
/// use spark_context::reactivity::changed_bits::mask_changed_bits;
///
/// assert_eq!(mask_changed_bits(0b101), 0b101);
/// assert_eq!(mask_changed_bits((1i64 << 32) - 1), 0x7FFF_FFFF);
/// ```
pub fn mask_changed_bits(raw: i64) -> u32 {
    (raw & MAX_CHANGED_BITS as i64) as u32
}

// =============================================================================
// CALCULATION
// =============================================================================

/// Compute the change mask for a provider update.
///
/// 1. `equals(old, new)` → [`NO_BITS`], the calculator is not called.
/// 2. No calculator → [`ALL_BITS`].
/// 3. Otherwise the calculator result, masked to 31 bits. An out-of-range
///    result emits exactly one warning naming the value and is still used.
///
/// `context` names the context in the diagnostic.
pub fn calculate_changed_bits<T>(
    old: &T,
    new: &T,
    equals: EqualsFn<T>,
    calculator: Option<&ChangedBitsFn<T>>,
    context: &str,
) -> u32 {
    if equals(old, new) {
        return NO_BITS;
    }

    let Some(calculator) = calculator else {
        return ALL_BITS;
    };

    let raw = calculator(old, new);
    if !is_valid_changed_bits(raw) {
        report_out_of_range(context, raw);
    }
    mask_changed_bits(raw)
}

fn report_out_of_range(context: &str, received: i64) {
    let diagnostic = ContextError::ChangedBitsOutOfRange {
        context: context.to_string(),
        received,
    };
    with_runtime(|rt| rt.record_diagnostic());
    warn!(
        target: "spark_context::changed_bits",
        context,
        received,
        "{diagnostic}"
    );
}

// =============================================================================
// TESTS
// =============================================================================
