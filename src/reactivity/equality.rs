// ============================================================================
// spark-context - Equality Oracle
// "Same value" identity: NaN equals NaN, +0 and -0 differ
// ============================================================================

use std::rc::Rc;
use std::sync::Arc;

use crate::core::types::EqualsFn;

// =============================================================================
// SAME VALUE
// =============================================================================

/// Identity comparison used to decide whether a provider update is a no-op.
///
/// - primitives compare by value
/// - floats treat two NaNs as identical and `+0.0` / `-0.0` as distinct
/// - `Rc` / `Arc` compare by pointer (reference identity)
/// - containers and tuples compare element-wise with the same rules
///
/// Implement it for your own types with [`same_value_by_eq!`](crate::same_value_by_eq)
/// when `PartialEq` is the right notion of identity.
pub trait SameValue {
    fn same_value(&self, other: &Self) -> bool;
}

/// Identity comparison through [`SameValue`].
///
/// # Example
/// ```
/// use spark_context::same_value;
///
/// assert!(same_value(&42, &42));
/// assert!(same_value(&f64::NAN, &f64::NAN));
/// assert!(!same_value(&0.0, &-0.0));
/// ```
pub fn same_value<T: SameValue + ?Sized>(a: &T, b: &T) -> bool {
    a.same_value(b)
}

crate::same_value_by_eq!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, bool, char, (), str, String,
);

/// Same-value for f64.
///
/// # Example
/// ```
/// use spark_context::reactivity::equality::same_value_f64;
///
/// assert!(same_value_f64(&1.5, &1.5));
/// assert!(same_value_f64(&f64::NAN, &f64::NAN));
/// assert!(!same_value_f64(&0.0, &-0.0));
/// assert!(!same_value_f64(&f64::NAN, &1.0));
/// ```
pub fn same_value_f64(a: &f64, b: &f64) -> bool {
    if a == b {
        // Only zero needs the sign check: 0.0 == -0.0 under IEEE 754
        *a != 0.0 || a.is_sign_negative() == b.is_sign_negative()
    } else {
        a.is_nan() && b.is_nan()
    }
}

/// Same-value for f32.
pub fn same_value_f32(a: &f32, b: &f32) -> bool {
    if a == b {
        *a != 0.0 || a.is_sign_negative() == b.is_sign_negative()
    } else {
        a.is_nan() && b.is_nan()
    }
}

impl SameValue for f64 {
    fn same_value(&self, other: &Self) -> bool {
        same_value_f64(self, other)
    }
}

impl SameValue for f32 {
    fn same_value(&self, other: &Self) -> bool {
        same_value_f32(self, other)
    }
}

impl SameValue for &'static str {
    fn same_value(&self, other: &Self) -> bool {
        *self == *other
    }
}

// Shared handles are references: identity, not contents
impl<T: ?Sized> SameValue for Rc<T> {
    fn same_value(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}

impl<T: ?Sized> SameValue for Arc<T> {
    fn same_value(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

impl<T: SameValue + ?Sized> SameValue for Box<T> {
    fn same_value(&self, other: &Self) -> bool {
        (**self).same_value(&**other)
    }
}

impl<T: SameValue> SameValue for Option<T> {
    fn same_value(&self, other: &Self) -> bool {
        match (self, other) {
            (None, None) => true,
            (Some(a), Some(b)) => a.same_value(b),
            _ => false,
        }
    }
}

impl<T: SameValue> SameValue for [T] {
    fn same_value(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a.same_value(b))
    }
}

impl<T: SameValue> SameValue for Vec<T> {
    fn same_value(&self, other: &Self) -> bool {
        self.as_slice().same_value(other.as_slice())
    }
}

impl<A: SameValue, B: SameValue> SameValue for (A, B) {
    fn same_value(&self, other: &Self) -> bool {
        self.0.same_value(&other.0) && self.1.same_value(&other.1)
    }
}

impl<A: SameValue, B: SameValue, C: SameValue> SameValue for (A, B, C) {
    fn same_value(&self, other: &Self) -> bool {
        self.0.same_value(&other.0) && self.1.same_value(&other.1) && self.2.same_value(&other.2)
    }
}

// =============================================================================
// OTHER EQUALITY FUNCTIONS
// =============================================================================

/// Structural equality via `PartialEq`.
///
/// Note that this makes `NaN` updates always "changed"; prefer
/// [`same_value`] for float-carrying values.
pub fn equals<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

/// Never equal: every provider update counts as a change.
pub fn never_equals<T>(_a: &T, _b: &T) -> bool {
    false
}

/// Get the same-value function for a type as an [`EqualsFn`].
pub fn same_value_fn<T: SameValue + 'static>() -> EqualsFn<T> {
    same_value::<T>
}

// =============================================================================
// TESTS
// =============================================================================
