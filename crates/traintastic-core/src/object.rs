//! The base every reflective object embeds: a world-unique id, an ordered
//! interface table, and the two-phase destroy protocol.
//!
//! Destruction is explicit and synchronous, never tied to `Drop`: an
//! object is destroyed by calling [`ObjectBase::destroy`], which first
//! fires `destroying` (so cross-references and owning lists can detach
//! themselves while the object is still fully readable) and only then
//! marks every property on the object as destroyed. `Drop` still runs
//! afterwards to reclaim storage, but by the time it does the object has
//! already told everyone who cared that it is going away.

use crate::event::{Event, Subscription};
use crate::interface_items::InterfaceItems;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared behaviour every reflective object exposes, regardless of its
/// concrete type — world-unique identity, the interface table, and the
/// destroy lifecycle.
pub trait IdObject: Send + Sync {
    fn id(&self) -> Arc<str>;

    /// A snapshot of the current interface table. Returned by value, not
    /// by reference: the table lives behind a lock so concrete objects can
    /// keep registering items during construction, and an `Arc`-cloned
    /// [`InterfaceItems`] is cheap enough that callers doing a one-off
    /// by-name lookup don't need to special-case that.
    fn interface_items(&self) -> InterfaceItems;
    fn is_destroyed(&self) -> bool;

    /// Runs this object's two-phase destroy. Idempotent: a second call is
    /// a no-op.
    fn destroy(&self);

    /// Subscribes to this object's `destroying` notification — the hook
    /// [`crate::object_property::ObjectProperty`] uses to null itself out
    /// when the object it points to goes away.
    fn subscribe_destroying(&self, f: Box<dyn FnMut(()) + Send>) -> Subscription<()>;
}

/// Embeddable base implementing [`IdObject`]. Concrete object types hold
/// one of these as a field and delegate to it, the same way a derived
/// class in the reference runtime inherits `IdObject`.
pub struct ObjectBase {
    id: RwLock<Arc<str>>,
    items: Mutex<InterfaceItems>,
    destroying: Event<()>,
    id_changed: Event<(Arc<str>, Arc<str>)>,
    destroyed: AtomicBool,
}

impl ObjectBase {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        ObjectBase {
            id: RwLock::new(id.into()),
            items: Mutex::new(InterfaceItems::new()),
            destroying: Event::new(),
            id_changed: Event::new(),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> Arc<str> {
        self.id.read().clone()
    }

    /// Renames the object. The world's id registry is responsible for
    /// rejecting a rename to an id already in use — by the time this is
    /// called the new id has already been reserved there.
    pub fn set_id(&self, new_id: impl Into<Arc<str>>) {
        let new_id = new_id.into();
        let old_id = {
            let mut guard = self.id.write();
            let old = guard.clone();
            *guard = new_id.clone();
            old
        };
        if old_id != new_id {
            self.id_changed.emit((old_id, new_id));
        }
    }

    pub fn subscribe_id_changed<F>(&self, f: F) -> Subscription<(Arc<str>, Arc<str>)>
    where
        F: FnMut((Arc<str>, Arc<str>)) + Send + 'static,
    {
        self.id_changed.connect(f)
    }

    /// Locks the interface table for the duration of `f` — used by a
    /// concrete object's constructor to register its properties/methods
    /// in declaration order.
    pub fn with_items_mut<R>(&self, f: impl FnOnce(&mut InterfaceItems) -> R) -> R {
        f(&mut self.items.lock())
    }

    /// Clones the current interface table — the [`IdObject::interface_items`]
    /// every concrete object delegates to.
    pub fn interface_items(&self) -> InterfaceItems {
        self.items.lock().clone()
    }

    pub fn subscribe_destroying<F>(&self, f: F) -> Subscription<()>
    where
        F: FnMut(()) + Send + 'static,
    {
        self.destroying.connect(f)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Fires `destroying`, then marks every registered property destroyed.
    /// Calling this twice is harmless; only the first call has any effect.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.destroying.emit(());
        for item in self.items.lock().iter() {
            item.mark_destroyed();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{Property, PropertyFlags};
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn destroy_is_idempotent() {
        let base = ObjectBase::new("obj1");
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let _sub = base.subscribe_destroying(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        base.destroy();
        base.destroy();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn interface_items_is_queryable_by_name_through_the_trait() {
        // Exercises reflection the way a session handler would: given only
        // a `&dyn IdObject`, look a property up by name and read it back.
        struct Dummy(ObjectBase);
        impl IdObject for Dummy {
            fn id(&self) -> Arc<str> {
                self.0.id()
            }
            fn interface_items(&self) -> InterfaceItems {
                self.0.interface_items()
            }
            fn is_destroyed(&self) -> bool {
                self.0.is_destroyed()
            }
            fn destroy(&self) {
                self.0.destroy()
            }
            fn subscribe_destroying(&self, f: Box<dyn FnMut(()) + Send>) -> Subscription<()> {
                self.0.subscribe_destroying(f)
            }
        }

        let base = ObjectBase::new("obj1");
        let name_prop = Arc::new(Property::new("name", "hello".to_string(), PropertyFlags::READ_WRITE));
        base.with_items_mut(|items| items.add(name_prop.clone()));
        let dummy: &dyn IdObject = &Dummy(base);

        let items = dummy.interface_items();
        assert_eq!(items.names().collect::<Vec<_>>(), vec!["name"]);
        assert!(items.get("missing").is_none());
        assert!(items.get("name").is_some());
    }

    #[test]
    fn destroy_marks_registered_properties_destroyed() {
        let base = ObjectBase::new("obj1");
        let name_prop = Arc::new(Property::new("name", String::new(), PropertyFlags::READ_WRITE));
        base.with_items_mut(|items| items.add(name_prop.clone()));

        base.destroy();
        assert!(base.is_destroyed());
        assert!(name_prop.is_destroyed());
        assert!(name_prop.set("x".to_string()).is_err());
    }

    #[test]
    fn destroying_fires_before_properties_are_marked() {
        let base = ObjectBase::new("obj1");
        let name_prop = Arc::new(Property::new("name", String::new(), PropertyFlags::READ_WRITE));
        base.with_items_mut(|items| items.add(name_prop.clone()));

        let prop_for_listener = name_prop.clone();
        let saw_live_property = Arc::new(AtomicBool::new(false));
        let flag = saw_live_property.clone();
        let _sub = base.subscribe_destroying(move |_| {
            flag.store(prop_for_listener.set("still alive".to_string()).is_ok(), Ordering::SeqCst);
        });

        base.destroy();
        assert!(saw_live_property.load(Ordering::SeqCst));
    }

    #[test]
    fn set_id_notifies_on_change_only() {
        let base = ObjectBase::new("obj1");
        let seen: Arc<Mutex<Vec<(Arc<str>, Arc<str>)>>> = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let _sub = base.subscribe_id_changed(move |pair| seen2.lock().push(pair));

        base.set_id("obj1");
        assert!(seen.lock().is_empty());
        base.set_id("obj2");
        assert_eq!(base.id().as_ref(), "obj2");
        assert_eq!(seen.lock().len(), 1);
    }
}
