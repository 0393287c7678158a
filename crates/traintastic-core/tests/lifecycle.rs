//! Object creation/destruction ordering scenarios, covering both directions
//! of cross-reference teardown and sub-object destruction cascades.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use traintastic_core::{IdObject, InterfaceItems, ObjectBase, ObjectList, ObjectProperty, Subscription};

struct Node {
    base: ObjectBase,
    /// Non-owning back-reference, e.g. an input pointing at its interface.
    other: ObjectProperty<Node>,
}

impl Node {
    fn new(id: &str) -> Arc<Self> {
        Arc::new(Node {
            base: ObjectBase::new(id),
            other: ObjectProperty::new(),
        })
    }
}

impl IdObject for Node {
    fn id(&self) -> Arc<str> {
        self.base.id()
    }
    fn interface_items(&self) -> InterfaceItems {
        self.base.interface_items()
    }
    fn is_destroyed(&self) -> bool {
        self.base.is_destroyed()
    }
    fn destroy(&self) {
        self.base.destroy()
    }
    fn subscribe_destroying(&self, f: Box<dyn FnMut(()) + Send>) -> Subscription<()> {
        self.base.subscribe_destroying(f)
    }
}

#[test]
fn cross_reference_nulls_regardless_of_destroy_order_a_then_b() {
    let a = Node::new("a");
    let b = Node::new("b");
    let a_ref: Arc<ObjectProperty<Node>> = Arc::new(ObjectProperty::new());
    a_ref.set(Some(b.clone()));

    a.destroy();
    assert!(a_ref.get().is_some(), "a's destruction must not affect an unrelated reference to b");

    b.destroy();
    assert!(a_ref.get().is_none(), "b's destruction must null every reference to it");
}

#[test]
fn cross_reference_nulls_regardless_of_destroy_order_b_then_a() {
    let a = Node::new("a");
    let b = Node::new("b");
    let a_ref: Arc<ObjectProperty<Node>> = Arc::new(ObjectProperty::new());
    a_ref.set(Some(b.clone()));

    b.destroy();
    assert!(a_ref.get().is_none());

    a.destroy();
    assert!(a.is_destroyed());
}

#[test]
fn sub_object_destruction_cascades_synchronously_within_destroying() {
    // A parent's `destroying()` callback destroys a child synchronously;
    // by the time `destroy()` returns on the parent, the child is gone too.
    let parent = Node::new("parent");
    let child = Node::new("child");

    let child_for_hook = child.clone();
    let _sub = parent.base.subscribe_destroying(move |_| {
        child_for_hook.destroy();
    });

    parent.destroy();
    assert!(child.is_destroyed());
}

#[test]
fn list_removal_destroys_the_sole_strong_owner() {
    let list: ObjectList<Node> = ObjectList::new();
    let destroyed = Arc::new(AtomicUsize::new(0));

    let node = Node::new("input1");
    let d = destroyed.clone();
    let _sub = node.base.subscribe_destroying(move |_| {
        d.fetch_add(1, Ordering::SeqCst);
    });
    list.append(node);

    assert!(list.remove_by_id("input1"));
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
}

#[test]
fn list_removal_does_not_destroy_an_externally_referenced_item() {
    let list: ObjectList<Node> = ObjectList::new();
    let node = Node::new("input1");
    list.append(node.clone());

    assert!(list.remove_by_id("input1"));
    assert!(!node.is_destroyed(), "an externally held Arc keeps the object alive");
}
