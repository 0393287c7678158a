//! World-wide id → object registry.
//!
//! Every [`IdObject`](crate::object::IdObject) in a world — decoders,
//! inputs, boards, interfaces, everything — shares one flat id
//! namespace, looked up here. The registry holds only weak references:
//! it observes object lifetime, it does not extend it.

use crate::error::Error;
use crate::object::IdObject;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

#[derive(Default)]
pub struct Registry {
    objects: RwLock<HashMap<Arc<str>, Weak<dyn IdObject>>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    pub fn is_in_use(&self, id: &str) -> bool {
        self.objects
            .read()
            .get(id)
            .and_then(Weak::upgrade)
            .is_some()
    }

    /// Registers `object` under its current id. Fails if another live
    /// object already holds that id.
    pub fn register(&self, object: Arc<dyn IdObject>) -> Result<(), Error> {
        let id = object.id();
        let mut guard = self.objects.write();
        if guard.get(&id).and_then(Weak::upgrade).is_some() {
            return Err(Error::IdInUse);
        }
        guard.insert(id, Arc::downgrade(&object));
        Ok(())
    }

    pub fn unregister(&self, id: &str) {
        self.objects.write().remove(id);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn IdObject>> {
        self.objects.read().get(id).and_then(Weak::upgrade)
    }

    /// Moves a registration from `old_id` to `new_id`. Fails if `new_id`
    /// is already taken by a live object, or `old_id` isn't registered.
    pub fn rename(&self, old_id: &str, new_id: impl Into<Arc<str>>) -> Result<(), Error> {
        let new_id = new_id.into();
        let mut guard = self.objects.write();
        if guard.get(new_id.as_ref()).and_then(Weak::upgrade).is_some() {
            return Err(Error::IdInUse);
        }
        match guard.remove(old_id) {
            Some(weak) => {
                guard.insert(new_id, weak);
                Ok(())
            }
            None => Err(Error::UnknownId),
        }
    }

    /// Drops registry entries whose object has already been dropped.
    /// Registrations are removed explicitly on destroy in the normal
    /// path; this exists for cleanup after abnormal teardown in tests.
    pub fn prune_stale(&self) {
        self.objects.write().retain(|_, w| w.strong_count() > 0);
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }
}
