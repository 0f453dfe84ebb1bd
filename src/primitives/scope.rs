// ============================================================================
// spark-context - Scope Tree
//
// A minimal host tree implementing scoped linkage.
// ============================================================================
//
// Each Scope is a node with an optional parent. Providers publish their
// emitter into a node; consumers look up the nearest publication from their
// own node outward. Scopes also carry teardown callbacks, so a node can stand
// in for a mounted component:
// - run(fn) - Execute function with this scope current
// - on_dispose(fn) - Register teardown
// - stop() - Stop children first, then run teardowns (LIFO), then detach
//
// Stopping children before the node's own teardowns is what guarantees that
// consumers unregister before the provider above them goes away.
// ============================================================================

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace, warn};

use crate::core::types::{ScopeKey, ScopedLinkage};

// =============================================================================
// THREAD-LOCAL SCOPE STATE
// =============================================================================

thread_local! {
    /// Currently active scope (if any)
    static ACTIVE_SCOPE: RefCell<Option<Rc<ScopeInner>>> = const { RefCell::new(None) };
}

fn get_active_scope() -> Option<Rc<ScopeInner>> {
    ACTIVE_SCOPE.with(|s| s.borrow().clone())
}

fn set_active_scope(scope: Option<Rc<ScopeInner>>) -> Option<Rc<ScopeInner>> {
    ACTIVE_SCOPE.with(|s| s.replace(scope))
}

// =============================================================================
// CLEANUP TYPE
// =============================================================================

/// Teardown callback run when a scope stops
pub type ScopeCleanupFn = Box<dyn FnOnce()>;

const PRUNE_THRESHOLD: usize = 16;

// =============================================================================
// SCOPE INNER
// =============================================================================

pub(crate) struct ScopeInner {
    /// Whether the scope is still active (not stopped)
    active: Cell<bool>,

    /// Values published for this subtree, by context key
    published: RefCell<HashMap<ScopeKey, Rc<dyn Any>>>,

    /// Teardowns to run on stop
    cleanups: RefCell<Vec<ScopeCleanupFn>>,

    parent: Option<Weak<ScopeInner>>,

    /// Child scopes
    children: RefCell<Vec<Rc<ScopeInner>>>,

    /// Child count at which the next `child()` prunes inert children
    prune_at: Cell<usize>,

    depth: usize,
}

impl ScopeInner {
    fn new(parent: Option<&Rc<ScopeInner>>) -> Rc<Self> {
        let scope = Rc::new(Self {
            active: Cell::new(true),
            published: RefCell::new(HashMap::new()),
            cleanups: RefCell::new(Vec::new()),
            parent: parent.map(Rc::downgrade),
            children: RefCell::new(Vec::new()),
            prune_at: Cell::new(PRUNE_THRESHOLD),
            depth: parent.map_or(0, |p| p.depth + 1),
        });

        if let Some(parent) = parent {
            parent.children.borrow_mut().push(scope.clone());
        }

        scope
    }

    fn stop(self: &Rc<Self>) {
        if !self.active.get() {
            return;
        }
        // Mark first so teardowns that touch this scope see it stopping
        self.active.set(false);

        // Children first
        let children: Vec<_> = self.children.borrow_mut().drain(..).collect();
        for child in children {
            child.stop();
        }

        let cleanups: Vec<_> = self.cleanups.borrow_mut().drain(..).collect();
        let count = cleanups.len();
        for cleanup in cleanups.into_iter().rev() {
            cleanup();
        }

        self.published.borrow_mut().clear();

        if let Some(parent) = self.parent.as_ref().and_then(Weak::upgrade) {
            parent.children.borrow_mut().retain(|s| !Rc::ptr_eq(s, self));
        }

        debug!(depth = self.depth, teardowns = count, "scope stopped");
    }

    /// Nothing can observe this node any more: no handle besides its parent,
    /// no publications, no teardowns, and only inert children.
    fn is_inert(self: &Rc<Self>) -> bool {
        Rc::strong_count(self) == 1
            && self.published.borrow().is_empty()
            && self.cleanups.borrow().is_empty()
            && self.children.borrow().iter().all(|c| c.is_inert())
    }

    /// Drop inert children once the list has doubled since the last pass.
    fn prune_children(&self) {
        let len = self.children.borrow().len();
        if len < self.prune_at.get() {
            return;
        }
        self.children.borrow_mut().retain(|c| !c.is_inert());
        let kept = self.children.borrow().len();
        self.prune_at.set((kept * 2).max(PRUNE_THRESHOLD));
        trace!(depth = self.depth, pruned = len - kept, kept, "pruned inert child scopes");
    }

    fn lookup_nearest(&self, key: ScopeKey) -> Option<Rc<dyn Any>> {
        if let Some(value) = self.published.borrow().get(&key) {
            return Some(value.clone());
        }
        let parent = self.parent.as_ref()?.upgrade()?;
        parent.lookup_nearest(key)
    }
}

// =============================================================================
// SCOPE (Public handle)
// =============================================================================

/// A node in the host tree.
///
/// Cloning yields another handle to the same node. A node lives as long as a
/// handle or its parent holds it; stopping detaches it from the parent.
///
/// # Example
///
/// ```
/// use spark_context::{create_context, root_scope};
///
/// let ctx = create_context(0);
/// let app = root_scope();
/// let outer = app.child();
/// let inner = outer.child();
///
/// ctx.provider().mount(&outer, 1).unwrap();
/// ctx.provider().mount(&inner, 2).unwrap();
///
/// let near = ctx.consumer();
/// near.mount(&inner.child()).unwrap();
/// assert_eq!(near.value(), 2);
///
/// let far = ctx.consumer();
/// far.mount(&outer.child()).unwrap();
/// assert_eq!(far.value(), 1);
/// ```
#[derive(Clone)]
pub struct Scope {
    inner: Rc<ScopeInner>,
}

impl Scope {
    fn from_inner(inner: Rc<ScopeInner>) -> Self {
        Self { inner }
    }

    /// Create a child node.
    ///
    /// Children of a stopped scope are created detached and already usable,
    /// but nothing above them is reachable.
    ///
    /// A child whose handles are all dropped is kept while it still holds
    /// publications, teardowns, or live descendants (so `stop()` reaches
    /// them), and is pruned otherwise.
    pub fn child(&self) -> Scope {
        if !self.inner.active.get() {
            warn!(depth = self.inner.depth, "child() called on a stopped scope");
            return Scope::from_inner(ScopeInner::new(None));
        }
        self.inner.prune_children();
        Scope::from_inner(ScopeInner::new(Some(&self.inner)))
    }

    /// The parent node, if it is still alive.
    pub fn parent(&self) -> Option<Scope> {
        self.inner
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(Scope::from_inner)
    }

    /// Distance from the root (root = 0).
    pub fn depth(&self) -> usize {
        self.inner.depth
    }

    /// Whether the scope has not been stopped
    pub fn active(&self) -> bool {
        self.inner.active.get()
    }

    /// Number of live child scopes.
    pub fn child_count(&self) -> usize {
        self.inner.children.borrow().len()
    }

    /// Run a function with this scope as the current scope.
    ///
    /// Returns None if the scope has been stopped.
    pub fn run<R, F: FnOnce() -> R>(&self, f: F) -> Option<R> {
        if !self.inner.active.get() {
            return None;
        }

        let prev_scope = set_active_scope(Some(self.inner.clone()));
        let result = f();
        set_active_scope(prev_scope);

        Some(result)
    }

    /// Register a teardown to run when this scope stops.
    ///
    /// On a stopped scope the teardown runs immediately.
    pub fn on_dispose<F: FnOnce() + 'static>(&self, f: F) {
        if self.inner.active.get() {
            self.inner.cleanups.borrow_mut().push(Box::new(f));
        } else {
            f();
        }
    }

    /// Stop the scope.
    ///
    /// - All child scopes are stopped (depth first)
    /// - All teardowns are run (in reverse order)
    /// - Published values are dropped
    /// - The scope is detached from its parent
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Whether two handles refer to the same node.
    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl ScopedLinkage for Scope {
    fn publish(&self, key: ScopeKey, value: Rc<dyn Any>) {
        self.inner.published.borrow_mut().insert(key, value);
    }

    fn published(&self, key: ScopeKey) -> Option<Rc<dyn Any>> {
        self.inner.published.borrow().get(&key).cloned()
    }

    fn retract(&self, key: ScopeKey) {
        self.inner.published.borrow_mut().remove(&key);
    }

    fn lookup_nearest(&self, key: ScopeKey) -> Option<Rc<dyn Any>> {
        self.inner.lookup_nearest(key)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("depth", &self.inner.depth)
            .field("active", &self.active())
            .field("published", &self.inner.published.borrow().len())
            .field("children", &self.child_count())
            .finish()
    }
}

// =============================================================================
// PUBLIC API
// =============================================================================

/// Create a new root node with no parent.
pub fn root_scope() -> Scope {
    Scope::from_inner(ScopeInner::new(None))
}

/// Get the currently active scope, if any.
///
/// Returns None if not inside a scope's `run()` call.
pub fn get_current_scope() -> Option<Scope> {
    get_active_scope().map(Scope::from_inner)
}

/// Register a teardown on the current scope.
///
/// Does nothing if called outside of a scope (with a warning).
pub fn on_scope_dispose<F: FnOnce() + 'static>(f: F) {
    if let Some(scope) = get_active_scope() {
        Scope::from_inner(scope).on_dispose(f);
    } else {
        warn!("on_scope_dispose() called outside of scope context");
    }
}

// =============================================================================
// TESTS
// =============================================================================
