// ============================================================================
// spark-context - Context Factory
// Creates a matched provider/consumer pair sharing a private scope key
// ============================================================================

use std::fmt;
use std::rc::Rc;

use crate::core::runtime::with_runtime;
use crate::core::types::{ChangedBitsFn, EqualsFn, ScopeKey};
use crate::primitives::consumer::Consumer;
use crate::primitives::provider::Provider;
use crate::reactivity::changed_bits::calculate_changed_bits;
use crate::reactivity::equality::{same_value, SameValue};

// =============================================================================
// OPTIONS
// =============================================================================

/// Options for creating a context.
pub struct ContextOptions<T> {
    /// Identity check for provider updates. Defaults to [`same_value`].
    pub equals: Option<EqualsFn<T>>,

    /// Partial-change calculator. Defaults to "everything changed".
    pub calculate_changed_bits: Option<ChangedBitsFn<T>>,

    /// Name used in logs and errors. Defaults to `Context(scope#N)`.
    pub name: Option<String>,
}

impl<T> Default for ContextOptions<T> {
    fn default() -> Self {
        Self {
            equals: None,
            calculate_changed_bits: None,
            name: None,
        }
    }
}

// =============================================================================
// CONTEXT
// =============================================================================

pub(crate) struct ContextInner<T> {
    key: ScopeKey,
    default_value: T,
    equals: EqualsFn<T>,
    calculate_changed_bits: Option<ChangedBitsFn<T>>,
    name: String,
}

/// A typed channel for tree-scoped value propagation.
///
/// Immutable once created. Every `Context` owns a unique [`ScopeKey`], so two
/// contexts never see each other's providers, even for the same value type.
///
/// # Example
///
/// ```
/// use spark_context::{create_context, root_scope};
///
/// let theme = create_context("light");
/// let root = root_scope();
///
/// let provider = theme.provider();
/// provider.mount(&root, "dark").unwrap();
///
/// let consumer = theme.consumer();
/// consumer.mount(&root.child()).unwrap();
/// assert_eq!(consumer.value(), "dark");
///
/// provider.update("light").unwrap();
/// assert_eq!(consumer.value(), "light");
/// ```
pub struct Context<T> {
    inner: Rc<ContextInner<T>>,
}

impl<T> Clone for Context<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static> Context<T> {
    fn from_parts(
        default_value: T,
        equals: EqualsFn<T>,
        calculate_changed_bits: Option<ChangedBitsFn<T>>,
        name: Option<String>,
    ) -> Self {
        let key = with_runtime(|rt| rt.allocate_scope_key());
        let name = name.unwrap_or_else(|| format!("Context({key})"));
        Self {
            inner: Rc::new(ContextInner {
                key,
                default_value,
                equals,
                calculate_changed_bits,
                name,
            }),
        }
    }

    /// A new, unmounted provider for this context.
    pub fn provider(&self) -> Provider<T> {
        Provider::new(self.clone())
    }

    /// A new, unmounted consumer observing every change.
    pub fn consumer(&self) -> Consumer<T> {
        Consumer::new(self.clone())
    }
}

impl<T> Context<T> {
    /// The private key providers publish under.
    pub fn key(&self) -> ScopeKey {
        self.inner.key
    }

    /// The value unbound consumers observe.
    pub fn default_value(&self) -> &T {
        &self.inner.default_value
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn has_changed_bits_calculator(&self) -> bool {
        self.inner.calculate_changed_bits.is_some()
    }

    /// Whether `old` and `new` are identical for this context.
    pub fn is_identical(&self, old: &T, new: &T) -> bool {
        (self.inner.equals)(old, new)
    }

    /// Masked change bits for `old -> new` (0 when identical).
    pub fn calculate_changed_bits(&self, old: &T, new: &T) -> u32 {
        calculate_changed_bits(
            old,
            new,
            self.inner.equals,
            self.inner.calculate_changed_bits.as_ref(),
            &self.inner.name,
        )
    }

    /// Whether two handles refer to the same context.
    pub fn ptr_eq(&self, other: &Context<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: fmt::Debug> fmt::Debug for Context<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("name", &self.inner.name)
            .field("key", &self.inner.key)
            .field("default_value", &self.inner.default_value)
            .field("changed_bits", &self.has_changed_bits_calculator())
            .finish()
    }
}

// =============================================================================
// FACTORY FUNCTIONS
// =============================================================================

/// Create a context with a default value and no change-bit calculator.
///
/// Any non-identical update notifies every bound consumer.
pub fn create_context<T>(default_value: T) -> Context<T>
where
    T: SameValue + Clone + 'static,
{
    Context::from_parts(default_value, same_value::<T>, None, None)
}

/// Create a context whose providers compute a partial-change mask.
///
/// Consumers whose observed bits do not intersect the mask are not woken.
///
/// # Example
///
/// ```
/// use spark_context::create_context_with_changed_bits;
///
/// let ctx = create_context_with_changed_bits((0, 0), |old: &(i32, i32), new: &(i32, i32)| {
///     let mut bits = 0;
///     if old.0 != new.0 { bits |= 0b01; }
///     if old.1 != new.1 { bits |= 0b10; }
///     bits
/// });
///
/// assert_eq!(ctx.calculate_changed_bits(&(1, 1), &(2, 1)), 0b01);
/// assert_eq!(ctx.calculate_changed_bits(&(1, 1), &(1, 1)), 0);
/// ```
pub fn create_context_with_changed_bits<T, F>(default_value: T, calculate: F) -> Context<T>
where
    T: SameValue + Clone + 'static,
    F: Fn(&T, &T) -> i64 + 'static,
{
    let calculate: ChangedBitsFn<T> = Rc::new(calculate);
    Context::from_parts(default_value, same_value::<T>, Some(calculate), None)
}

/// Create a context with a custom identity check instead of [`SameValue`].
pub fn create_context_with_equals<T>(default_value: T, equals: EqualsFn<T>) -> Context<T>
where
    T: Clone + 'static,
{
    Context::from_parts(default_value, equals, None, None)
}

/// Create a context from [`ContextOptions`].
pub fn create_context_with_options<T>(default_value: T, options: ContextOptions<T>) -> Context<T>
where
    T: SameValue + Clone + 'static,
{
    Context::from_parts(
        default_value,
        options.equals.unwrap_or(same_value::<T>),
        options.calculate_changed_bits,
        options.name,
    )
}

// =============================================================================
// TESTS
// =============================================================================
