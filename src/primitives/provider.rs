// ============================================================================
// spark-context - Provider
// Binds a value for a subtree and broadcasts relevant changes
// ============================================================================
//
// Lifecycle: unmounted -> mounted -> unmounted.
//
// Each mount creates a fresh Emitter and publishes it under the context key
// in the given scope. Nested providers of the same context therefore shadow
// each other naturally: a consumer finds the nearest emitter.
//
// Unmount retracts the emitter and drops it. Consumers are not told; the host
// unmounts them first (children before parents).
// ============================================================================

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::core::constants::*;
use crate::core::types::ScopedLinkage;
use crate::error::{ContextError, Result, Role};
use crate::primitives::context::Context;
use crate::primitives::emitter::Emitter;
use crate::primitives::scope::Scope;

struct Mount<T> {
    emitter: Emitter<T>,
    linkage: Rc<dyn ScopedLinkage>,
}

pub(crate) struct ProviderInner<T> {
    context: Context<T>,
    flags: Cell<u32>,
    value: RefCell<Option<T>>,
    mount: RefCell<Option<Mount<T>>>,
}

/// Publishes a value for every consumer in its subtree.
///
/// Cloning yields another handle to the same provider instance.
pub struct Provider<T> {
    inner: Rc<ProviderInner<T>>,
}

impl<T> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + 'static> Provider<T> {
    pub(crate) fn new(context: Context<T>) -> Self {
        Self {
            inner: Rc::new(ProviderInner {
                context,
                flags: Cell::new(UNMOUNTED),
                value: RefCell::new(None),
                mount: RefCell::new(None),
            }),
        }
    }

    /// Mount into `linkage`, binding `value` for its subtree.
    ///
    /// Creates a new emitter seeded with `value` and publishes it under the
    /// context key. Fails if this provider is already mounted.
    pub fn mount<L>(&self, linkage: &L, value: T) -> Result<()>
    where
        L: ScopedLinkage + Clone + 'static,
    {
        if self.is_mounted() {
            return Err(ContextError::AlreadyMounted {
                role: Role::Provider,
                context: self.inner.context.name().to_string(),
            });
        }

        let key = self.inner.context.key();
        let emitter = Emitter::new(value.clone());
        let linkage: Rc<dyn ScopedLinkage> = Rc::new(linkage.clone());
        linkage.publish(key, Rc::new(emitter.clone()) as Rc<dyn Any>);

        *self.inner.value.borrow_mut() = Some(value);
        *self.inner.mount.borrow_mut() = Some(Mount { emitter, linkage });
        self.inner.flags.set((self.inner.flags.get() & STATUS_MASK) | MOUNTED);

        debug!(context = self.inner.context.name(), %key, "provider mounted");
        Ok(())
    }

    /// Mount into `scope` and unmount automatically when the scope stops.
    pub fn mount_scoped(&self, scope: &Scope, value: T) -> Result<()> {
        self.mount(scope, value)?;
        let weak = Rc::downgrade(&self.inner);
        scope.on_dispose(move || {
            if let Some(inner) = weak.upgrade() {
                Provider { inner }.unmount();
            }
        });
        Ok(())
    }

    /// Bind a new value.
    ///
    /// Returns the change mask that was broadcast, or 0 when nothing was
    /// broadcast (identical value, or the calculator reported no bits).
    pub fn update(&self, value: T) -> Result<u32> {
        let Some(emitter) = self.emitter() else {
            return Err(ContextError::NotMounted {
                role: Role::Provider,
                context: self.inner.context.name().to_string(),
            });
        };

        let changed_bits = {
            let previous = self.inner.value.borrow();
            match previous.as_ref() {
                Some(previous) => self.inner.context.calculate_changed_bits(previous, &value),
                None => ALL_BITS,
            }
        };

        if changed_bits == NO_BITS {
            // Identical values are a pure no-op. A suppressed change still
            // becomes the current value for consumers that mount later.
            if !self.is_identical_to_current(&value) {
                emitter.store(value.clone());
                *self.inner.value.borrow_mut() = Some(value);
            }
            return Ok(NO_BITS);
        }

        *self.inner.value.borrow_mut() = Some(value.clone());
        emitter.publish(value, changed_bits);
        Ok(changed_bits)
    }

    /// Retract the emitter from scope and return to unmounted.
    ///
    /// Returns `false` if the provider was not mounted.
    pub fn unmount(&self) -> bool {
        let Some(Mount { emitter, linkage }) = self.inner.mount.borrow_mut().take() else {
            return false;
        };

        let key = self.inner.context.key();
        let still_ours = linkage
            .published(key)
            .and_then(|published| published.downcast::<Emitter<T>>().ok())
            .is_some_and(|published| published.ptr_eq(&emitter));
        if still_ours {
            linkage.retract(key);
        }

        *self.inner.value.borrow_mut() = None;
        self.inner.flags.set((self.inner.flags.get() & STATUS_MASK) | UNMOUNTED);

        debug!(
            context = self.inner.context.name(),
            %key,
            subscribers = emitter.handler_count(),
            "provider unmounted"
        );
        true
    }

    fn is_identical_to_current(&self, value: &T) -> bool {
        self.inner
            .value
            .borrow()
            .as_ref()
            .is_some_and(|current| self.inner.context.is_identical(current, value))
    }
}

impl<T> Provider<T> {
    pub fn is_mounted(&self) -> bool {
        self.inner.flags.get() & MOUNTED != 0
    }

    /// The currently bound value, if mounted.
    pub fn value(&self) -> Option<T>
    where
        T: Clone,
    {
        self.inner.value.borrow().clone()
    }

    /// The emitter of the current mount.
    pub fn emitter(&self) -> Option<Emitter<T>> {
        self.inner.mount.borrow().as_ref().map(|m| m.emitter.clone())
    }

    pub fn context(&self) -> &Context<T> {
        &self.inner.context
    }
}

impl<T: fmt::Debug> fmt::Debug for Provider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("context", &self.inner.context.name())
            .field("mounted", &self.is_mounted())
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
    use crate::core::types::UpdateHandler;
    use crate::primitives::context::{create_context, create_context_with_changed_bits};
    use crate::primitives::scope::root_scope;

    fn counting_handler<T: 'static>(log: &Rc<RefCell<Vec<u32>>>) -> UpdateHandler<T> {
        let log = log.clone();
        Rc::new(move |_: &T, bits: u32| log.borrow_mut().push(bits))
    }

    #[test]
    fn mount_publishes_a_fresh_emitter() {
        let ctx = create_context(0);
        let root = root_scope();
        let provider = ctx.provider();

        assert!(!provider.is_mounted());
        provider.mount(&root, 1).unwrap();
        assert!(provider.is_mounted());
        assert_eq!(provider.value(), Some(1));

        let published = root.lookup_nearest(ctx.key()).unwrap();
        let emitter = published.downcast_ref::<Emitter<i32>>().unwrap();
        assert!(emitter.ptr_eq(&provider.emitter().unwrap()));
        assert_eq!(emitter.read(), 1);
    }

    #[test]
    fn double_mount_is_an_error() {
        let ctx = create_context(0);
        let root = root_scope();
        let provider = ctx.provider();

        provider.mount(&root, 1).unwrap();
        let err = provider.mount(&root, 2).unwrap_err();
        assert!(matches!(err, ContextError::AlreadyMounted { role: Role::Provider, .. }));
        assert_eq!(provider.value(), Some(1));
    }

    #[test]
    fn update_when_unmounted_is_an_error() {
        let ctx = create_context(0);
        let provider = ctx.provider();
        let err = provider.update(1).unwrap_err();
        assert!(matches!(err, ContextError::NotMounted { .. }));
    }

    #[test]
    fn identical_update_does_not_broadcast() {
        let ctx = create_context(f64::NAN);
        let root = root_scope();
        let provider = ctx.provider();
        provider.mount(&root, f64::NAN).unwrap();

        let log = Rc::new(RefCell::new(Vec::new()));
        provider.emitter().unwrap().register(counting_handler::<f64>(&log));

        assert_eq!(provider.update(f64::NAN).unwrap(), 0);
        assert!(log.borrow().is_empty());

        assert_eq!(provider.update(0.0).unwrap(), ALL_BITS);
        assert_eq!(provider.update(-0.0).unwrap(), ALL_BITS);
        assert_eq!(*log.borrow(), vec![ALL_BITS, ALL_BITS]);
    }

    #[test]
    fn zero_mask_stores_without_broadcast() {
        let ctx = create_context_with_changed_bits(0, |_: &i32, _: &i32| 0);
        let root = root_scope();
        let provider = ctx.provider();
        provider.mount(&root, 1).unwrap();

        let log = Rc::new(RefCell::new(Vec::new()));
        let emitter = provider.emitter().unwrap();
        emitter.register(counting_handler::<i32>(&log));

        assert_eq!(provider.update(2).unwrap(), 0);
        assert!(log.borrow().is_empty());
        assert_eq!(emitter.read(), 2);
        assert_eq!(provider.value(), Some(2));
    }

    #[test]
    fn unmount_retracts_emitter() {
        let ctx = create_context(0);
        let root = root_scope();
        let provider = ctx.provider();
        provider.mount(&root, 1).unwrap();

        assert!(provider.unmount());
        assert!(!provider.is_mounted());
        assert!(root.lookup_nearest(ctx.key()).is_none());
        assert!(provider.emitter().is_none());
        assert_eq!(provider.value(), None);

        // second unmount is a no-op
        assert!(!provider.unmount());
    }

    #[test]
    fn remount_gets_a_new_emitter() {
        let ctx = create_context(0);
        let root = root_scope();
        let provider = ctx.provider();

        provider.mount(&root, 1).unwrap();
        let first = provider.emitter().unwrap();
        provider.unmount();
        provider.mount(&root, 1).unwrap();
        let second = provider.emitter().unwrap();

        assert!(!first.ptr_eq(&second));
    }

    #[test]
    fn unmount_leaves_a_newer_publication_alone() {
        let ctx = create_context(0);
        let root = root_scope();
        let first = ctx.provider();
        let second = ctx.provider();

        first.mount(&root, 1).unwrap();
        second.mount(&root, 2).unwrap();
        first.unmount();

        let published = root.lookup_nearest(ctx.key()).unwrap();
        let emitter = published.downcast_ref::<Emitter<i32>>().unwrap();
        assert_eq!(emitter.read(), 2);
    }

    #[test]
    fn mount_scoped_unmounts_on_stop() {
        let ctx = create_context(0);
        let root = root_scope();
        let scope = root.child();
        let provider = ctx.provider();

        provider.mount_scoped(&scope, 1).unwrap();
        assert!(provider.is_mounted());

        scope.stop();
        assert!(!provider.is_mounted());
    }
}
