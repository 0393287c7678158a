//! A non-owning, self-nulling reference to another object.
//!
//! `ObjectProperty<T>` is how objects point at each other without
//! creating ownership cycles: a [`crate::object_list::ObjectList`] owns
//! its members, everything else that needs to refer to one of them goes
//! through an `ObjectProperty`, which holds only a `Weak<T>` and
//! subscribes to the target's `destroying` event so it atomically clears
//! itself — and notifies its own observers — the moment the target
//! starts going away.

use crate::event::{Event, Subscription};
use crate::object::IdObject;
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};

pub struct ObjectProperty<T: IdObject + ?Sized + 'static> {
    value: RwLock<Option<Weak<T>>>,
    target_subscription: Mutex<Option<Subscription<()>>>,
    on_changed: Event<()>,
}

impl<T: IdObject + ?Sized + 'static> Default for ObjectProperty<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: IdObject + ?Sized + 'static> ObjectProperty<T> {
    pub fn new() -> Self {
        ObjectProperty {
            value: RwLock::new(None),
            target_subscription: Mutex::new(None),
            on_changed: Event::new(),
        }
    }

    /// Returns the referenced object, or `None` if it was never set or
    /// has since been destroyed.
    pub fn get(&self) -> Option<Arc<T>> {
        self.value.read().as_ref().and_then(Weak::upgrade)
    }

    pub fn is_none(&self) -> bool {
        self.get().is_none()
    }

    /// Points this property at `target` (or clears it, for `None`),
    /// replacing any previous target subscription. Requires the property
    /// itself to already be held in an `Arc` so the destroy hook can hold
    /// a weak reference back to it.
    pub fn set(self: &Arc<Self>, target: Option<Arc<T>>) {
        *self.target_subscription.lock() = None;
        *self.value.write() = target.as_ref().map(Arc::downgrade);

        if let Some(t) = &target {
            let self_weak = Arc::downgrade(self);
            let sub = t.subscribe_destroying(Box::new(move |_| {
                if let Some(this) = self_weak.upgrade() {
                    this.clear();
                }
            }));
            *self.target_subscription.lock() = Some(sub);
        }

        self.on_changed.emit(());
    }

    fn clear(&self) {
        *self.value.write() = None;
        *self.target_subscription.lock() = None;
        self.on_changed.emit(());
    }

    pub fn subscribe<F>(&self, f: F) -> Subscription<()>
    where
        F: FnMut(()) + Send + 'static,
    {
        self.on_changed.connect(f)
    }
}
