//! A single addressed sensor input (track occupancy detector, reed
//! switch, ...), bound to an optional [`crate::controller::InputController`].

use crate::controller::InputController;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use traintastic_core::{Error, IdObject, InterfaceItem, ObjectBase, ObjectProperty, Property, PropertyFlags, Result, Subscription};

pub struct Input {
    base: ObjectBase,
    self_weak: Mutex<Weak<Input>>,
    /// Bumped on every hardware report; a delayed debounce task only
    /// applies its value if this still matches the generation it was
    /// spawned with, so a later report within the debounce window
    /// supersedes an earlier one instead of stacking notifications.
    generation: AtomicU64,

    pub name: Arc<Property<String>>,
    pub channel: Arc<Property<u32>>,
    pub address: Arc<Property<u32>>,
    pub inverted: Arc<Property<bool>>,
    /// Milliseconds a hardware-reported state must remain stable before
    /// it is applied to `value`. Zero (the default) applies immediately.
    pub debounce_ms: Arc<Property<u32>>,
    /// Read-only: only ever written via `set_internal`, by
    /// [`Input::report_hardware_value`].
    pub value: Arc<Property<bool>>,
    pub interface: Arc<ObjectProperty<dyn InputController>>,
}

impl Input {
    pub fn new(id: impl Into<Arc<str>>) -> Arc<Self> {
        let input = Arc::new(Input {
            base: ObjectBase::new(id.into()),
            self_weak: Mutex::new(Weak::new()),
            generation: AtomicU64::new(0),
            name: Arc::new(Property::new("name", String::new(), PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            channel: Arc::new(Property::new("channel", 0u32, PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            address: Arc::new(Property::new("address", 0u32, PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            inverted: Arc::new(Property::new("inverted", false, PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            debounce_ms: Arc::new(Property::new("debounce_ms", 0u32, PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            value: Arc::new(Property::new("value", false, PropertyFlags::empty())),
            interface: Arc::new(ObjectProperty::new()),
        });
        input.base.with_items_mut(|items| {
            items.add(input.name.clone() as Arc<dyn InterfaceItem>);
            items.add(input.channel.clone() as Arc<dyn InterfaceItem>);
            items.add(input.address.clone() as Arc<dyn InterfaceItem>);
            items.add(input.inverted.clone() as Arc<dyn InterfaceItem>);
            items.add(input.debounce_ms.clone() as Arc<dyn InterfaceItem>);
            items.add(input.value.clone() as Arc<dyn InterfaceItem>);
        });
        *input.self_weak.lock() = Arc::downgrade(&input);
        input
    }

    fn arc(&self) -> Arc<Input> {
        self.self_weak.lock().upgrade().expect("input destroyed while still referenced")
    }

    pub fn set_interface(self: &Arc<Self>, new: Option<Arc<dyn InputController>>) -> Result<()> {
        if let Some(ctrl) = &new {
            if ctrl.input_base().get_input(self.channel.get(), self.address.get()).is_some() {
                return Err(Error::DuplicateAddress);
            }
        }
        if let Some(old) = self.interface.get() {
            old.input_base().remove_input(self);
        }
        if let Some(ctrl) = &new {
            ctrl.input_base()
                .add_input(self.clone())
                .expect("duplicate address already rejected above");
        }
        self.interface.set(new);
        Ok(())
    }

    /// The value seen by the layout: raw hardware state XOR `inverted`.
    pub fn effective_value(&self) -> bool {
        self.value.get() != self.inverted.get()
    }

    /// Called by the bound controller whenever the hardware reports a
    /// new state. With `debounce_ms == 0` the value is applied
    /// immediately; otherwise it is applied only once this remains the
    /// most recent report for the full debounce interval, so a burst of
    /// flickering reports collapses into the last one.
    pub fn report_hardware_value(self: &Arc<Self>, value: bool) {
        let debounce_ms = self.debounce_ms.get();
        if debounce_ms == 0 {
            let _ = self.value.set_internal(value);
            return;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(debounce_ms as u64)).await;
            if let Some(input) = weak.upgrade() {
                if input.generation.load(Ordering::SeqCst) == generation {
                    let _ = input.value.set_internal(value);
                }
            }
        });
    }
}

impl IdObject for Input {
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
    fn inverted_flips_effective_value() {
        let input = Input::new("in1");
        input.value.set_internal(true).unwrap();
        assert!(input.effective_value());
        input.inverted.set(true).unwrap();
        assert!(!input.effective_value());
    }

    #[tokio::test]
    async fn zero_debounce_applies_immediately() {
        let input = Input::new("in1");
        input.report_hardware_value(true);
        assert!(input.value.get());
    }

    #[tokio::test(start_paused = true)]
    async fn debounced_value_is_not_applied_until_the_interval_elapses() {
        let input = Input::new("in1");
        input.debounce_ms.set(50).unwrap();
        input.report_hardware_value(true);
        assert!(!input.value.get());

        tokio::time::advance(Duration::from_millis(60)).await;
        tokio::task::yield_now().await;
        assert!(input.value.get());
    }

    #[tokio::test(start_paused = true)]
    async fn a_later_report_within_the_window_supersedes_the_earlier_one() {
        let input = Input::new("in1");
        input.debounce_ms.set(50).unwrap();
        input.report_hardware_value(true);
        tokio::time::advance(Duration::from_millis(30)).await;
        input.report_hardware_value(false);

        tokio::time::advance(Duration::from_millis(60)).await;
        tokio::task::yield_now().await;
        assert!(!input.value.get());
    }
}
