// ============================================================================
// spark-context - Ergonomic Macros
// ============================================================================

/// Implement [`SameValue`](crate::SameValue) for types whose `PartialEq` is
/// already the right notion of identity.
///
/// # Usage
///
/// ```rust
/// use spark_context::{same_value, same_value_by_eq};
///
/// #[derive(Clone, PartialEq)]
/// enum Theme { Light, Dark }
///
/// same_value_by_eq!(Theme);
///
/// assert!(same_value(&Theme::Light, &Theme::Light));
/// assert!(!same_value(&Theme::Light, &Theme::Dark));
/// ```
#[macro_export]
macro_rules! same_value_by_eq {
    ($($t:ty),+ $(,)?) => {
        $(
            impl $crate::reactivity::equality::SameValue for $t {
                fn same_value(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )+
    };
}

/// Build a change-bit calculator from `field => bit` pairs.
///
/// Each listed field is compared with [`same_value`](crate::same_value);
/// the bits of every field that differs are OR-ed together.
///
/// # Usage
///
/// ```rust
/// use spark_context::{changed_bits_by_field, create_context_with_changed_bits};
///
/// #[derive(Clone, PartialEq)]
/// struct Pair { foo: i32, bar: i32 }
/// spark_context::same_value_by_eq!(Pair);
///
/// let ctx = create_context_with_changed_bits(
///     Pair { foo: 0, bar: 0 },
///     changed_bits_by_field!(Pair { foo => 0b01, bar => 0b10 }),
/// );
/// assert_eq!(
///     ctx.calculate_changed_bits(&Pair { foo: 1, bar: 1 }, &Pair { foo: 2, bar: 1 }),
///     0b01
/// );
/// ```
#[macro_export]
macro_rules! changed_bits_by_field {
    ($t:ty { $($field:ident => $bit:expr),+ $(,)? }) => {
        |old: &$t, new: &$t| -> i64 {
            let mut bits: i64 = 0;
            $(
                if !$crate::same_value(&old.$field, &new.$field) {
                    bits |= ($bit) as i64;
                }
            )+
            bits
        }
    };
}
