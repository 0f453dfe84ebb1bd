// ============================================================================
// spark-context - Emitter
// Per-provider mailbox: current value plus a list of update handlers
// ============================================================================
//
// Broadcasts are synchronous and iterate over a snapshot of the handler list
// taken before the first call. Handlers may register, unregister, or publish
// again while a broadcast is running:
// - the in-flight broadcast still reaches exactly its snapshot
// - nested publishes run to completion before the outer one continues
//
// No RefCell borrow is held while a handler or a `with` closure runs: the
// value sits behind an Rc that is cloned out first.
// ============================================================================

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::core::runtime::BroadcastGuard;
use crate::core::types::UpdateHandler;

struct EmitterInner<T> {
    value: RefCell<Rc<T>>,
    handlers: RefCell<Vec<UpdateHandler<T>>>,
}

/// Holds the value of one provider mount and fans changes out to consumers.
///
/// Cloning yields another handle to the same emitter.
///
/// # Example
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use spark_context::{Emitter, UpdateHandler};
///
/// let emitter = Emitter::new(1);
/// let seen = Rc::new(Cell::new(0));
///
/// let handler: UpdateHandler<i32> = {
///     let seen = seen.clone();
///     Rc::new(move |value: &i32, _bits: u32| seen.set(*value))
/// };
/// emitter.register(handler.clone());
///
/// emitter.publish(5, 1);
/// assert_eq!(seen.get(), 5);
/// assert_eq!(emitter.read(), 5);
///
/// emitter.unregister(&handler);
/// emitter.publish(6, 1);
/// assert_eq!(seen.get(), 5);
/// ```
pub struct Emitter<T> {
    inner: Rc<EmitterInner<T>>,
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Emitter<T> {
    /// Create an emitter seeded with `value` and no handlers.
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(EmitterInner {
                value: RefCell::new(Rc::new(value)),
                handlers: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Append a handler. Registering the same handler twice delivers twice.
    pub fn register(&self, handler: UpdateHandler<T>) {
        self.inner.handlers.borrow_mut().push(handler);
    }

    /// Remove every occurrence of `handler` (by pointer identity).
    ///
    /// Unregistering a handler that is not registered does nothing.
    pub fn unregister(&self, handler: &UpdateHandler<T>) {
        self.inner
            .handlers
            .borrow_mut()
            .retain(|h| !Rc::ptr_eq(h, handler));
    }

    /// Current value.
    pub fn read(&self) -> T
    where
        T: Clone,
    {
        (*self.current()).clone()
    }

    /// Access the current value without cloning it.
    ///
    /// `f` may publish to this emitter; it keeps seeing the value that was
    /// current when it was called.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let current = self.current();
        f(&*current)
    }

    /// Shared handle to the current value.
    pub(crate) fn current(&self) -> Rc<T> {
        self.inner.value.borrow().clone()
    }

    /// Replace the current value without notifying anyone.
    pub fn store(&self, value: T) {
        *self.inner.value.borrow_mut() = Rc::new(value);
    }

    /// Store `value`, then call every registered handler with
    /// `(value, changed_bits)` in registration order.
    pub fn publish(&self, value: T, changed_bits: u32) {
        let value = Rc::new(value);
        *self.inner.value.borrow_mut() = value.clone();

        // Snapshot: changes to the handler list during this broadcast apply
        // to the next one
        let handlers: Vec<UpdateHandler<T>> = self.inner.handlers.borrow().clone();

        // Balanced on unwind too
        let guard = BroadcastGuard::enter();
        let depth = guard.depth();
        trace!(
            handlers = handlers.len(),
            changed_bits,
            depth,
            "emitter broadcast"
        );

        for handler in &handlers {
            handler(&*value, changed_bits);
        }
    }

    /// Number of registered handlers (duplicates counted).
    pub fn handler_count(&self) -> usize {
        self.inner.handlers.borrow().len()
    }

    /// Whether `handler` is currently registered.
    pub fn is_registered(&self, handler: &UpdateHandler<T>) -> bool {
        self.inner
            .handlers
            .borrow()
            .iter()
            .any(|h| Rc::ptr_eq(h, handler))
    }

    /// Whether two handles refer to the same emitter.
    pub fn ptr_eq(&self, other: &Emitter<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: fmt::Debug> fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("value", &*self.inner.value.borrow())
            .field("handlers", &self.handler_count())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
