//! A single addressed output (turnout drive, signal aspect, accessory
//! relay, ...), bound to an optional [`crate::controller::OutputController`].

use crate::controller::OutputController;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use traintastic_core::{Error, IdObject, InterfaceItem, ObjectBase, ObjectProperty, Property, PropertyFlags, Result, Subscription};

pub struct Output {
    base: ObjectBase,
    self_weak: Mutex<Weak<Output>>,

    pub name: Arc<Property<String>>,
    pub channel: Arc<Property<u32>>,
    pub address: Arc<Property<u32>>,
    /// Read-only from a client's point of view: writes go through
    /// [`Output::set_value`], which asks the controller to actually drive
    /// the hardware; the property itself is only updated once the
    /// command station echoes the new state back.
    pub value: Arc<Property<bool>>,
    pub interface: Arc<ObjectProperty<dyn OutputController>>,
}

impl Output {
    pub fn new(id: impl Into<Arc<str>>) -> Arc<Self> {
        let output = Arc::new(Output {
            base: ObjectBase::new(id.into()),
            self_weak: Mutex::new(Weak::new()),
            name: Arc::new(Property::new("name", String::new(), PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            channel: Arc::new(Property::new("channel", 0u32, PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            address: Arc::new(Property::new("address", 0u32, PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            value: Arc::new(Property::new("value", false, PropertyFlags::empty())),
            interface: Arc::new(ObjectProperty::new()),
        });
        output.base.with_items_mut(|items| {
            items.add(output.name.clone() as Arc<dyn InterfaceItem>);
            items.add(output.channel.clone() as Arc<dyn InterfaceItem>);
            items.add(output.address.clone() as Arc<dyn InterfaceItem>);
            items.add(output.value.clone() as Arc<dyn InterfaceItem>);
        });
        *output.self_weak.lock() = Arc::downgrade(&output);
        output
    }

    fn arc(&self) -> Arc<Output> {
        self.self_weak.lock().upgrade().expect("output destroyed while still referenced")
    }

    pub fn set_interface(self: &Arc<Self>, new: Option<Arc<dyn OutputController>>) -> Result<()> {
        if let Some(ctrl) = &new {
            if ctrl.output_base().get_output(self.channel.get(), self.address.get()).is_some() {
                return Err(Error::DuplicateAddress);
            }
        }
        if let Some(old) = self.interface.get() {
            old.output_base().remove_output(self);
        }
        if let Some(ctrl) = &new {
            ctrl.output_base()
                .add_output(self.clone())
                .expect("duplicate address already rejected above");
        }
        self.interface.set(new);
        Ok(())
    }

    /// Requests the bound controller drive this output to `value`.
    /// Returns `UnknownAddress` if there is no bound controller, or
    /// whatever the controller itself reports for an address it doesn't
    /// recognise. The property isn't updated here — it updates once the
    /// controller calls back through `output_echo`.
    pub fn set_value(&self, value: bool) -> Result<()> {
        match self.interface.get() {
            Some(ctrl) => {
                if ctrl.set_output_value(self.channel.get(), self.address.get(), value) {
                    Ok(())
                } else {
                    Err(Error::UnknownAddress)
                }
            }
            None => Err(Error::UnknownAddress),
        }
    }
}

impl IdObject for Output {
    fn id(&self) -> Arc<str> {
        self.base.id()
    }
    fn interface_items(&self) -> traintastic_core::InterfaceItems {
        self.base.interface_items()
    }
    fn is_destroyed(&self) -> bool {
        self.base.is_destroyed()
    }
    fn destroy(&self) {
        if self.base.is_destroyed() {
            return;
        }
        let _ = self.arc().set_interface(None);
        self.base.destroy();
    }
    fn subscribe_destroying(&self, f: Box<dyn FnMut(()) + Send>) -> Subscription<()> {
        self.base.subscribe_destroying(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_value_without_interface_is_unknown_address() {
        let output = Output::new("o1");
        assert_eq!(output.set_value(true), Err(Error::UnknownAddress));
    }
}
