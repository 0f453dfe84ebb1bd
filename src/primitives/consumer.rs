// ============================================================================
// spark-context - Consumer
// Reads the nearest provider's value and filters notifications by bits
// ============================================================================
//
// States: unbound -> bound(emitter) | defaulted.
//
// On mount the consumer resolves the nearest emitter once. Re-parenting is
// the host's business: it unmounts and mounts again.
//
// A notification (value, changed_bits) is relevant iff
// `observed_bits & changed_bits != 0`. Irrelevant notifications touch no
// state at all. Relevant ones re-read the emitter (so a nested broadcast
// that already ran is never rolled back) and then call `on_change`.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::core::constants::*;
use crate::core::types::{ChangeFn, ScopedLinkage, UpdateHandler};
use crate::error::{ContextError, Result, Role};
use crate::primitives::context::Context;
use crate::primitives::emitter::Emitter;
use crate::primitives::scope::Scope;

struct Subscription<T> {
    emitter: Emitter<T>,
    handler: UpdateHandler<T>,
}

pub(crate) struct ConsumerInner<T> {
    context: Context<T>,
    flags: Cell<u32>,

    /// Mask as configured by the host (None = observe everything)
    configured_bits: Cell<Option<u32>>,

    /// Effective mask consulted on every notification
    observed_bits: Cell<u32>,

    value: RefCell<Rc<T>>,
    subscription: RefCell<Option<Subscription<T>>>,
    on_change: RefCell<Option<ChangeFn<T>>>,
    recomputes: Cell<u64>,
}

/// Observes the nearest enclosing provider of a context.
///
/// Without an enclosing provider it observes the context default forever.
/// Cloning yields another handle to the same consumer instance.
///
/// # Example
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use spark_context::{create_context, root_scope};
///
/// let ctx = create_context(0);
/// let root = root_scope();
/// let provider = ctx.provider();
/// provider.mount(&root, 1).unwrap();
///
/// let renders = Rc::new(Cell::new(0));
/// let consumer = ctx.consumer().on_change({
///     let renders = renders.clone();
///     move |_value: &i32| renders.set(renders.get() + 1)
/// });
/// consumer.mount(&root.child()).unwrap();
///
/// provider.update(2).unwrap();
/// assert_eq!(consumer.value(), 2);
/// assert_eq!(renders.get(), 1);
/// ```
pub struct Consumer<T> {
    inner: Rc<ConsumerInner<T>>,
}

impl<T> Clone for Consumer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

fn effective_bits(configured: Option<u32>) -> u32 {
    configured.map_or(ALL_BITS, |bits| bits & MAX_CHANGED_BITS)
}

impl<T: Clone + 'static> Consumer<T> {
    pub(crate) fn new(context: Context<T>) -> Self {
        let value = Rc::new(context.default_value().clone());
        Self {
            inner: Rc::new(ConsumerInner {
                context,
                flags: Cell::new(UNMOUNTED),
                configured_bits: Cell::new(None),
                observed_bits: Cell::new(ALL_BITS),
                value: RefCell::new(value),
                subscription: RefCell::new(None),
                on_change: RefCell::new(None),
                recomputes: Cell::new(0),
            }),
        }
    }

    /// Only wake for changes intersecting `bits`.
    pub fn observed_bits(self, bits: u32) -> Self {
        self.set_observed_bits(Some(bits));
        self
    }

    /// Called with the new value every time an observed change arrives.
    pub fn on_change(self, f: impl Fn(&T) + 'static) -> Self {
        *self.inner.on_change.borrow_mut() = Some(Box::new(f));
        self
    }

    /// Resolve the nearest provider in `linkage` and subscribe to it.
    ///
    /// With no provider in reach the consumer stays on the context default
    /// and is never notified. Fails if already mounted, or if something
    /// other than this context's emitter is published under its key.
    pub fn mount<L>(&self, linkage: &L) -> Result<()>
    where
        L: ScopedLinkage + ?Sized,
    {
        if self.is_mounted() {
            return Err(ContextError::AlreadyMounted {
                role: Role::Consumer,
                context: self.inner.context.name().to_string(),
            });
        }

        let key = self.inner.context.key();
        let emitter = match linkage.lookup_nearest(key) {
            Some(published) => match published.downcast_ref::<Emitter<T>>() {
                Some(emitter) => Some(emitter.clone()),
                None => {
                    return Err(ContextError::ScopeTypeMismatch {
                        key,
                        context: self.inner.context.name().to_string(),
                    });
                }
            },
            None => None,
        };

        let flags = self.inner.flags.get() & STATUS_MASK & BINDING_MASK;
        match emitter {
            Some(emitter) => {
                *self.inner.value.borrow_mut() = emitter.current();
                let handler = self.make_handler();
                emitter.register(handler.clone());
                *self.inner.subscription.borrow_mut() = Some(Subscription { emitter, handler });
                self.inner.flags.set(flags | MOUNTED | BOUND);
            }
            None => {
                *self.inner.value.borrow_mut() = Rc::new(self.inner.context.default_value().clone());
                self.inner.flags.set(flags | MOUNTED | DEFAULTED);
            }
        }
        self.inner
            .observed_bits
            .set(effective_bits(self.inner.configured_bits.get()));

        debug!(
            context = self.inner.context.name(),
            %key,
            bound = self.is_bound(),
            "consumer mounted"
        );
        Ok(())
    }

    /// Mount into `scope` and unmount automatically when the scope stops.
    pub fn mount_scoped(&self, scope: &Scope) -> Result<()> {
        self.mount(scope)?;
        let weak = Rc::downgrade(&self.inner);
        scope.on_dispose(move || {
            if let Some(inner) = weak.upgrade() {
                Consumer { inner }.unmount();
            }
        });
        Ok(())
    }

    fn make_handler(&self) -> UpdateHandler<T> {
        let weak: Weak<ConsumerInner<T>> = Rc::downgrade(&self.inner);
        Rc::new(move |_value: &T, changed_bits: u32| {
            if let Some(inner) = weak.upgrade() {
                Consumer { inner }.handle_update(changed_bits);
            }
        })
    }

    fn handle_update(&self, changed_bits: u32) {
        // Still in the broadcast snapshot after unmounting
        if self.inner.flags.get() & BOUND == 0 {
            return;
        }
        if self.inner.observed_bits.get() & changed_bits == 0 {
            return;
        }

        let current = match self.inner.subscription.borrow().as_ref() {
            Some(subscription) => subscription.emitter.current(),
            None => return,
        };
        *self.inner.value.borrow_mut() = current.clone();
        self.inner.recomputes.set(self.inner.recomputes.get() + 1);

        if let Some(on_change) = self.inner.on_change.borrow().as_ref() {
            on_change(&*current);
        }
    }

    /// Unsubscribe from the emitter, if bound.
    ///
    /// Returns `false` if the consumer was not mounted.
    pub fn unmount(&self) -> bool {
        if !self.is_mounted() {
            return false;
        }

        if let Some(Subscription { emitter, handler }) = self.inner.subscription.borrow_mut().take() {
            emitter.unregister(&handler);
        }
        self.inner
            .flags
            .set((self.inner.flags.get() & STATUS_MASK & BINDING_MASK) | UNMOUNTED);

        debug!(context = self.inner.context.name(), "consumer unmounted");
        true
    }

    /// The observed value (context default when unbound).
    pub fn value(&self) -> T {
        (**self.inner.value.borrow()).clone()
    }
}

impl<T> Consumer<T> {
    /// Reconfigure the observed mask. `None` observes every change.
    ///
    /// Takes effect for the next notification; the subscription is kept.
    pub fn set_observed_bits(&self, bits: Option<u32>) {
        self.inner.configured_bits.set(bits);
        self.inner.observed_bits.set(effective_bits(bits));
    }

    /// The effective observed mask.
    pub fn observed(&self) -> u32 {
        self.inner.observed_bits.get()
    }

    /// Access the observed value without cloning it.
    ///
    /// `f` may update providers; a change that reaches this consumer while
    /// `f` runs is adopted, and `f` keeps its own snapshot.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let current = self.inner.value.borrow().clone();
        f(&*current)
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.flags.get() & MOUNTED != 0
    }

    /// Mounted and subscribed to a provider's emitter.
    pub fn is_bound(&self) -> bool {
        self.inner.flags.get() & BOUND != 0
    }

    /// Mounted without a provider in reach.
    pub fn is_default(&self) -> bool {
        self.inner.flags.get() & DEFAULTED != 0
    }

    /// How many observed changes this consumer has adopted.
    pub fn recompute_count(&self) -> u64 {
        self.inner.recomputes.get()
    }

    pub fn context(&self) -> &Context<T> {
        &self.inner.context
    }
}

impl<T: fmt::Debug> fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("context", &self.inner.context.name())
            .field("bound", &self.is_bound())
            .field("observed_bits", &self.observed())
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::context::{create_context, create_context_with_changed_bits};
    use crate::primitives::scope::root_scope;
    use std::any::Any;

    #[test]
    fn unbound_consumer_uses_default() {
        let ctx = create_context("light");
        let root = root_scope();
        let consumer = ctx.consumer();

        consumer.mount(&root).unwrap();
        assert!(consumer.is_mounted());
        assert!(consumer.is_default());
        assert!(!consumer.is_bound());
        assert_eq!(consumer.value(), "light");
    }

    #[test]
    fn bound_consumer_reads_provider_value() {
        let ctx = create_context(0);
        let root = root_scope();
        let provider = ctx.provider();
        provider.mount(&root, 5).unwrap();

        let consumer = ctx.consumer();
        consumer.mount(&root.child().child()).unwrap();

        assert!(consumer.is_bound());
        assert_eq!(consumer.value(), 5);
        assert_eq!(provider.emitter().unwrap().handler_count(), 1);
    }

    #[test]
    fn observed_bits_filter_notifications() {
        let ctx = create_context_with_changed_bits(0, |_: &i32, new: &i32| *new as i64);
        let root = root_scope();
        let provider = ctx.provider();
        provider.mount(&root, 0).unwrap();

        let consumer = ctx.consumer().observed_bits(0b10);
        consumer.mount(&root).unwrap();

        provider.update(0b01).unwrap();
        assert_eq!(consumer.recompute_count(), 0);
        assert_eq!(consumer.value(), 0, "Ignored notifications do not change state");

        provider.update(0b11).unwrap();
        assert_eq!(consumer.recompute_count(), 1);
        assert_eq!(consumer.value(), 0b11);
    }

    #[test]
    fn reconfiguring_bits_keeps_subscription() {
        let ctx = create_context_with_changed_bits(0, |_: &i32, new: &i32| *new as i64);
        let root = root_scope();
        let provider = ctx.provider();
        provider.mount(&root, 0).unwrap();

        let consumer = ctx.consumer().observed_bits(0b01);
        consumer.mount(&root).unwrap();
        let emitter = provider.emitter().unwrap();

        consumer.set_observed_bits(Some(0b10));
        assert_eq!(emitter.handler_count(), 1);

        provider.update(0b01).unwrap();
        assert_eq!(consumer.recompute_count(), 0);
        provider.update(0b10).unwrap();
        assert_eq!(consumer.recompute_count(), 1);

        consumer.set_observed_bits(None);
        assert_eq!(consumer.observed(), ALL_BITS);
        provider.update(0b100).unwrap();
        assert_eq!(consumer.recompute_count(), 2);
    }

    #[test]
    fn observed_bits_are_masked_to_31_bits() {
        let ctx = create_context(0);
        let consumer = ctx.consumer().observed_bits(u32::MAX);
        assert_eq!(consumer.observed(), MAX_CHANGED_BITS);
    }

    #[test]
    fn zero_observed_bits_never_recompute() {
        let ctx = create_context(0);
        let root = root_scope();
        let provider = ctx.provider();
        provider.mount(&root, 0).unwrap();

        let consumer = ctx.consumer().observed_bits(0);
        consumer.mount(&root).unwrap();
        provider.update(1).unwrap();
        assert_eq!(consumer.recompute_count(), 0);
        assert_eq!(consumer.value(), 0);
    }

    #[test]
    fn unmount_unregisters() {
        let ctx = create_context(0);
        let root = root_scope();
        let provider = ctx.provider();
        provider.mount(&root, 0).unwrap();

        let consumer = ctx.consumer();
        consumer.mount(&root).unwrap();
        assert!(consumer.unmount());
        assert!(!consumer.is_mounted());
        assert!(!consumer.is_bound());
        assert_eq!(provider.emitter().unwrap().handler_count(), 0);

        provider.update(1).unwrap();
        assert_eq!(consumer.recompute_count(), 0);
        assert!(!consumer.unmount());
    }

    #[test]
    fn default_consumer_unmount_is_clean() {
        let ctx = create_context(0);
        let consumer = ctx.consumer();
        consumer.mount(&root_scope()).unwrap();
        assert!(consumer.unmount());
        assert!(!consumer.is_default());
    }

    #[test]
    fn double_mount_is_an_error() {
        let ctx = create_context(0);
        let root = root_scope();
        let consumer = ctx.consumer();
        consumer.mount(&root).unwrap();
        assert!(matches!(
            consumer.mount(&root),
            Err(ContextError::AlreadyMounted { role: Role::Consumer, .. })
        ));
    }

    #[test]
    fn foreign_value_under_key_is_an_error() {
        let ctx = create_context(0);
        let root = root_scope();
        root.publish(ctx.key(), Rc::new("not an emitter") as Rc<dyn Any>);

        let consumer = ctx.consumer();
        assert!(matches!(
            consumer.mount(&root),
            Err(ContextError::ScopeTypeMismatch { .. })
        ));
        assert!(!consumer.is_mounted());
    }

    #[test]
    fn unmount_during_broadcast_stops_delivery() {
        let ctx = create_context(0);
        let root = root_scope();
        let provider = ctx.provider();
        provider.mount(&root, 0).unwrap();

        let second = ctx.consumer();
        let first = ctx.consumer().on_change({
            let second = second.clone();
            move |_: &i32| {
                second.unmount();
            }
        });
        first.mount(&root).unwrap();
        second.mount(&root).unwrap();

        provider.update(1).unwrap();
        assert_eq!(first.recompute_count(), 1);
        assert_eq!(second.recompute_count(), 0);
        assert_eq!(second.value(), 0);
    }

    #[test]
    fn relevant_notification_rereads_latest_value() {
        let ctx = create_context(0);
        let root = root_scope();
        let provider = ctx.provider();
        provider.mount(&root, 0).unwrap();

        // First consumer bumps the provider once, from inside the broadcast
        let first = ctx.consumer().on_change({
            let provider = provider.clone();
            move |value: &i32| {
                if *value == 1 {
                    provider.update(2).unwrap();
                }
            }
        });
        let second = ctx.consumer();
        first.mount(&root).unwrap();
        second.mount(&root).unwrap();

        provider.update(1).unwrap();

        assert_eq!(first.value(), 2);
        assert_eq!(second.value(), 2, "Outer broadcast must not roll back the nested one");
    }

    #[test]
    fn with_borrows_value() {
        let ctx = create_context(vec![1, 2, 3]);
        let consumer = ctx.consumer();
        consumer.mount(&root_scope()).unwrap();
        assert_eq!(consumer.with(|v| v.len()), 3);
    }

    #[test]
    fn with_may_update_the_provider() {
        let ctx = create_context(1);
        let root = root_scope();
        let provider = ctx.provider();
        provider.mount(&root, 1).unwrap();

        let consumer = ctx.consumer();
        consumer.mount(&root).unwrap();

        let bits = consumer.with(|v| provider.update(v + 1).unwrap());

        assert_eq!(bits, ALL_BITS);
        assert_eq!(consumer.value(), 2);
        assert_eq!(consumer.recompute_count(), 1);
        assert!(!crate::core::runtime::is_broadcasting());

        // The snapshot handed to `f` does not move under it
        let (seen, after) = consumer.with(|v| {
            provider.update(10).unwrap();
            (*v, consumer.value())
        });
        assert_eq!((seen, after), (2, 10));
    }
}
