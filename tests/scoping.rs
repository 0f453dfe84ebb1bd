use spark_context::{create_context, on_scope_dispose, root_scope, Emitter, ScopedLinkage};
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn test_nearest_provider_wins() {
    let ctx = create_context(0);
    let root = root_scope();
    let outer = root.child();
    let inner = outer.child();

    let a = ctx.provider();
    let b = ctx.provider();
    a.mount(&outer, 1).unwrap();
    b.mount(&inner, 2).unwrap();

    let s = ctx.consumer();
    s.mount(&inner.child()).unwrap();
    assert_eq!(s.value(), 2);

    // Updating the shadowed provider does not reach S
    a.update(10).unwrap();
    assert_eq!(s.value(), 2);
    assert_eq!(s.recompute_count(), 0);

    b.update(20).unwrap();
    assert_eq!(s.value(), 20);
}

#[test]
fn test_inner_unmount_rebinds_fresh_consumers_to_outer() {
    let ctx = create_context(0);
    let root = root_scope();
    let outer = root.child();
    let inner = outer.child();

    let a = ctx.provider();
    a.mount_scoped(&outer, 1).unwrap();
    let b = ctx.provider();
    b.mount_scoped(&inner, 2).unwrap();

    let position = inner.child();
    let s = ctx.consumer();
    s.mount_scoped(&position).unwrap();
    assert_eq!(s.value(), 2);

    // Host tears down B's subtree: S first, then B
    inner.stop();
    assert!(!s.is_mounted());
    assert!(!b.is_mounted());
    assert!(a.is_mounted());

    // A fresh consumer in B's former position (now directly under outer)
    let replacement = ctx.consumer();
    replacement.mount(&outer.child()).unwrap();
    assert_eq!(replacement.value(), 1);
}

#[test]
fn test_mount_does_not_rebind_automatically() {
    let ctx = create_context(0);
    let root = root_scope();
    let outer = root.child();
    let inner = outer.child();

    let a = ctx.provider();
    a.mount(&outer, 1).unwrap();

    let s = ctx.consumer();
    s.mount(&inner).unwrap();
    assert_eq!(s.value(), 1);

    // A provider appearing later between S and A is not picked up
    let b = ctx.provider();
    b.mount(&inner, 2).unwrap();
    b.update(3).unwrap();
    assert_eq!(s.value(), 1);

    a.update(4).unwrap();
    assert_eq!(s.value(), 4);

    // Until the host remounts it
    s.unmount();
    s.mount(&inner).unwrap();
    assert_eq!(s.value(), 3);
}

#[test]
fn test_each_provider_mount_owns_its_emitter() {
    let ctx = create_context(0);
    let root = root_scope();
    let left = root.child();
    let right = root.child();

    let l = ctx.provider();
    let r = ctx.provider();
    l.mount(&left, 1).unwrap();
    r.mount(&right, 2).unwrap();

    let left_consumer = ctx.consumer();
    let right_consumer = ctx.consumer();
    left_consumer.mount(&left.child()).unwrap();
    right_consumer.mount(&right.child()).unwrap();

    l.update(10).unwrap();
    assert_eq!(left_consumer.value(), 10);
    assert_eq!(right_consumer.value(), 2);
    assert_eq!(right_consumer.recompute_count(), 0);

    assert!(!l.emitter().unwrap().ptr_eq(&r.emitter().unwrap()));
}

#[test]
fn test_scope_stop_unmounts_children_before_parents() {
    let ctx = create_context(0);
    let root = root_scope();
    let app = root.child();
    let order = Rc::new(RefCell::new(Vec::new()));

    let provider = ctx.provider();
    app.run(|| {
        let order = order.clone();
        on_scope_dispose(move || order.borrow_mut().push("provider"));
    });
    provider.mount_scoped(&app, 1).unwrap();

    let leaf = app.child();
    {
        let order = order.clone();
        let emitter = provider.emitter().unwrap();
        leaf.on_dispose(move || {
            // Registered before the consumer, so it runs after its teardown
            order.borrow_mut().push("consumer");
            assert_eq!(emitter.handler_count(), 0);
        });
    }
    let consumer = ctx.consumer();
    consumer.mount_scoped(&leaf).unwrap();

    app.stop();

    assert_eq!(*order.borrow(), vec!["consumer", "provider"]);
    assert!(!consumer.is_mounted());
    assert!(!provider.is_mounted());
}

#[test]
fn test_provider_publishes_through_custom_linkage() {
    // A host that only knows a single flat level
    #[derive(Clone, Default)]
    struct Flat {
        slots: Rc<RefCell<Vec<(spark_context::ScopeKey, Rc<dyn std::any::Any>)>>>,
    }

    impl ScopedLinkage for Flat {
        fn publish(&self, key: spark_context::ScopeKey, value: Rc<dyn std::any::Any>) {
            self.retract(key);
            self.slots.borrow_mut().push((key, value));
        }
        fn published(&self, key: spark_context::ScopeKey) -> Option<Rc<dyn std::any::Any>> {
            self.lookup_nearest(key)
        }
        fn retract(&self, key: spark_context::ScopeKey) {
            self.slots.borrow_mut().retain(|(k, _)| *k != key);
        }
        fn lookup_nearest(&self, key: spark_context::ScopeKey) -> Option<Rc<dyn std::any::Any>> {
            self.slots
                .borrow()
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
        }
    }

    let ctx = create_context(0);
    let host = Flat::default();
    let provider = ctx.provider();
    provider.mount(&host, 7).unwrap();
    assert!(host.lookup_nearest(ctx.key()).unwrap().is::<Emitter<i32>>());

    let consumer = ctx.consumer();
    consumer.mount(&host).unwrap();
    assert_eq!(consumer.value(), 7);

    consumer.unmount();
    provider.unmount();
    assert!(host.slots.borrow().is_empty());
}
