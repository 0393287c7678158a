//! Typed observable cells (`Property<T>`) and the attribute metadata
//! attached to them.

use crate::convert::Value;
use crate::error::Error;
use crate::event::{Event, Subscription};
use bitflags::bitflags;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

bitflags! {
    /// Readable always; writable only if `READ_WRITE`; persisted only if
    /// `STORE`; not transmitted to clients if `INTERNAL`; container of a
    /// sub-object if `SUB_OBJECT`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PropertyFlags: u16 {
        const READ_WRITE = 1 << 0;
        const STORE      = 1 << 1;
        const INTERNAL   = 1 << 2;
        const SUB_OBJECT = 1 << 3;
    }
}

/// Names of the observable attributes a property can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeName {
    DisplayName,
    Enabled,
    Visible,
    Min,
    Max,
    Values,
    ObjectList,
}

/// A typed observable cell.
///
/// `set` enforces the `READ_WRITE` flag and runs the validator; `
/// set_internal` is the kernel-facing bypass used to reflect hardware
/// truth into the property without pretending a client wrote it.
pub struct Property<T: Clone + PartialEq + Send + Sync + 'static> {
    name: String,
    value: RwLock<T>,
    flags: PropertyFlags,
    validator: Option<Box<dyn Fn(&T) -> Result<T, Error> + Send + Sync>>,
    on_changed: Event<(T, T)>,
    attributes: Mutex<HashMap<AttributeName, Value>>,
    attribute_changed: Event<(AttributeName, Value)>,
    destroyed: AtomicBool,
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Property<T> {
    pub fn new(name: impl Into<String>, initial: T, flags: PropertyFlags) -> Self {
        Property {
            name: name.into(),
            value: RwLock::new(initial),
            flags,
            validator: None,
            on_changed: Event::new(),
            attributes: Mutex::new(HashMap::new()),
            attribute_changed: Event::new(),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn with_validator<F>(name: impl Into<String>, initial: T, flags: PropertyFlags, validator: F) -> Self
    where
        F: Fn(&T) -> Result<T, Error> + Send + Sync + 'static,
    {
        Property {
            validator: Some(Box::new(validator)),
            ..Property::new(name, initial, flags)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> PropertyFlags {
        self.flags
    }

    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Validated, writability-checked write. Notifies observers exactly
    /// once if the value actually changed, before returning.
    pub fn set(&self, new_value: T) -> Result<(), Error> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(Error::ObjectDestroyed);
        }
        if !self.flags.contains(PropertyFlags::READ_WRITE) {
            return Err(Error::NotWritable);
        }
        let accepted = match &self.validator {
            Some(v) => v(&new_value)?,
            None => new_value,
        };
        self.commit(accepted);
        Ok(())
    }

    /// Bypasses the writability check and validator — used by kernels to
    /// reflect observed hardware state. Still notifies observers and still
    /// refuses on a destroyed object.
    pub fn set_internal(&self, new_value: T) -> Result<(), Error> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(Error::ObjectDestroyed);
        }
        self.commit(new_value);
        Ok(())
    }

    fn commit(&self, new_value: T) {
        let old_value = {
            let mut guard = self.value.write();
            if *guard == new_value {
                return;
            }
            std::mem::replace(&mut *guard, new_value.clone())
        };
        self.on_changed.emit((old_value, new_value));
    }

    pub fn subscribe<F>(&self, f: F) -> Subscription<(T, T)>
    where
        F: FnMut((T, T)) + Send + 'static,
    {
        self.on_changed.connect(f)
    }

    pub fn set_attribute(&self, name: AttributeName, value: Value) {
        self.attributes.lock().insert(name, value.clone());
        self.attribute_changed.emit((name, value));
    }

    pub fn attribute(&self, name: AttributeName) -> Option<Value> {
        self.attributes.lock().get(&name).cloned()
    }

    pub fn subscribe_attribute_changed<F>(&self, f: F) -> Subscription<(AttributeName, Value)>
    where
        F: FnMut((AttributeName, Value)) + Send + 'static,
    {
        self.attribute_changed.connect(f)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.set_attribute(AttributeName::Enabled, Value::Bool(enabled));
    }

    pub fn set_visible(&self, visible: bool) {
        self.set_attribute(AttributeName::Visible, Value::Bool(visible));
    }

    /// Marks the owning property destroyed: all subsequent `set`/
    /// `set_internal` calls return `ObjectDestroyed` (§4.3 invariant).
    pub fn mark_destroyed(&self) {
        self.destroyed.store(true, Ordering::Release);
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotent_write_does_not_notify() {
        let p = Property::new("throttle", 0.0_f64, PropertyFlags::READ_WRITE);
        let count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let c = count.clone();
        let _sub = p.subscribe(move |_| {
            c.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });
        p.set(0.0).unwrap();
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 0);
        p.set(0.5).unwrap();
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn read_only_property_rejects_writes() {
        let p = Property::new("status", 1_i32, PropertyFlags::empty());
        assert_eq!(p.set(2), Err(Error::NotWritable));
    }

    #[test]
    fn validator_can_refuse() {
        let p = Property::with_validator(
            "throttle",
            0.0_f64,
            PropertyFlags::READ_WRITE,
            |v: &f64| {
                if (0.0..=1.0).contains(v) {
                    Ok(*v)
                } else {
                    Err(Error::OutOfRange)
                }
            },
        );
        assert_eq!(p.set(1.5), Err(Error::OutOfRange));
        assert_eq!(p.get(), 0.0);
    }

    #[test]
    fn validator_can_mutate_accepted_value() {
        let p = Property::with_validator(
            "address",
            0_u16,
            PropertyFlags::READ_WRITE,
            |v: &u16| Ok(if *v > 127 { 127 } else { *v }),
        );
        p.set(9999).unwrap();
        assert_eq!(p.get(), 127);
    }

    #[test]
    fn destroyed_property_rejects_mutation() {
        let p = Property::new("name", String::new(), PropertyFlags::READ_WRITE);
        p.mark_destroyed();
        assert_eq!(p.set("x".to_string()), Err(Error::ObjectDestroyed));
        assert_eq!(p.set_internal("y".to_string()), Err(Error::ObjectDestroyed));
    }

    #[test]
    fn set_internal_bypasses_writability_but_still_notifies() {
        let p = Property::new("status", 0_i32, PropertyFlags::empty());
        let seen = std::sync::Arc::new(Mutex::new(None));
        let seen2 = seen.clone();
        let _sub = p.subscribe(move |(old, new)| *seen2.lock() = Some((old, new)));
        p.set_internal(5).unwrap();
        assert_eq!(p.get(), 5);
        assert_eq!(*seen.lock(), Some((0, 5)));
    }
}
