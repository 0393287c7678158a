//! Insertion-ordered, owning collection of objects.
//!
//! An `ObjectList<T>` is normally the *only* strong owner of the objects
//! it holds — other parts of the world refer to list members through
//! [`crate::object_property::ObjectProperty`], which is weak. Removing an
//! item destroys it once the list's `Arc` was the last strong reference;
//! if some other strong owner still exists (unusual, but not forbidden)
//! the item is detached from the list without being destroyed.

use crate::object::IdObject;
use parking_lot::RwLock;
use std::sync::Arc;

pub struct ObjectList<T: IdObject + ?Sized> {
    items: RwLock<Vec<Arc<T>>>,
}

impl<T: IdObject + ?Sized> Default for ObjectList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: IdObject + ?Sized> ObjectList<T> {
    pub fn new() -> Self {
        ObjectList {
            items: RwLock::new(Vec::new()),
        }
    }

    pub fn append(&self, item: Arc<T>) {
        self.items.write().push(item);
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    pub fn get_by_id(&self, id: &str) -> Option<Arc<T>> {
        self.items.read().iter().find(|i| &*i.id() == id).cloned()
    }

    pub fn to_vec(&self) -> Vec<Arc<T>> {
        self.items.read().clone()
    }

    /// Removes the item with the given id, destroying it if the list held
    /// the last strong reference. Returns whether an item was found.
    pub fn remove_by_id(&self, id: &str) -> bool {
        let removed = {
            let mut guard = self.items.write();
            let pos = guard.iter().position(|i| &*i.id() == id);
            pos.map(|idx| guard.remove(idx))
        };
        match removed {
            Some(item) => {
                if Arc::strong_count(&item) == 1 {
                    item.destroy();
                }
                true
            }
            None => false,
        }
    }

    /// Destroys and clears every item in the list, front to back — the
    /// ordering a controller's teardown relies on when detaching an item
    /// mutates the very list being drained.
    pub fn destroy_all(&self) {
        loop {
            let front = {
                let mut guard = self.items.write();
                if guard.is_empty() {
                    break;
                }
                guard.remove(0)
            };
            if Arc::strong_count(&front) == 1 {
                front.destroy();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface_items::InterfaceItems;
    use crate::object::ObjectBase;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Dummy {
        base: ObjectBase,
    }

    impl IdObject for Dummy {
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
        fn subscribe_destroying(&self, f: Box<dyn FnMut(()) + Send>) -> crate::event::Subscription<()> {
            self.base.subscribe_destroying(f)
        }
    }

    #[test]
    fn preserves_insertion_order_and_lookup() {
        let list: ObjectList<Dummy> = ObjectList::new();
        list.append(Arc::new(Dummy { base: ObjectBase::new("a") }));
        list.append(Arc::new(Dummy { base: ObjectBase::new("b") }));
        assert_eq!(list.len(), 2);
        assert!(list.get_by_id("b").is_some());
        assert!(list.get_by_id("z").is_none());
    }

    #[test]
    fn remove_destroys_sole_owner() {
        let list: ObjectList<Dummy> = ObjectList::new();
        let item = Arc::new(Dummy { base: ObjectBase::new("a") });
        list.append(item.clone());
        drop(item);

        assert!(list.remove_by_id("a"));
        assert_eq!(list.len(), 0);
    }

    #[test]
    fn remove_does_not_destroy_externally_held_item() {
        let list: ObjectList<Dummy> = ObjectList::new();
        let item = Arc::new(Dummy { base: ObjectBase::new("a") });
        list.append(item.clone());

        assert!(list.remove_by_id("a"));
        assert!(!item.is_destroyed());
    }

    #[test]
    fn destroy_all_drains_front_to_back() {
        let list: ObjectList<Dummy> = ObjectList::new();
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let destroyed_count = Arc::new(AtomicUsize::new(0));

        for id in ["a", "b", "c"] {
            let dummy = Dummy { base: ObjectBase::new(id) };
            let o = order.clone();
            let dc = destroyed_count.clone();
            let _sub = dummy.base.subscribe_destroying(move |_| {
                dc.fetch_add(1, Ordering::SeqCst);
                o.lock().push(());
            });
            list.append(Arc::new(dummy));
        }

        list.destroy_all();
        assert_eq!(destroyed_count.load(Ordering::SeqCst), 3);
        assert!(list.is_empty());
    }
}
