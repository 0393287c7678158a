//! Addressed locomotive decoder, parameterised by protocol and bound to
//! an optional [`crate::controller::DecoderController`].

use crate::controller::DecoderController;
use crate::decoder_function::{DecoderFunction, DecoderFunctionFunction, DecoderFunctions};
use bitflags::bitflags;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use traintastic_core::{
    Error, IdObject, InterfaceItem, ObjectBase, ObjectProperty, Property, PropertyFlags, Result,
    Subscription, World, WorldEvent, WorldState,
};

/// The wire protocol a decoder speaks. Controllers key their address
/// ranges and permitted speed-step sets off this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecoderProtocol {
    None,
    Dcc,
    Motorola,
    Selectrix,
}

const DCC_SHORT_ADDRESS_MAX: u16 = 127;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

bitflags! {
    /// What changed about a decoder, reported to the bound controller so
    /// it can forward exactly the affected fields to the command station.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DecoderChangeFlags: u8 {
        const EMERGENCY_STOP = 1 << 0;
        const DIRECTION      = 1 << 1;
        const SPEED_STEPS    = 1 << 2;
        const THROTTLE       = 1 << 3;
        const FUNCTION_VALUE = 1 << 4;
    }
}

const THROTTLE_MIN: f64 = 0.0;
const THROTTLE_MAX: f64 = 1.0;

fn almost_zero(v: f64) -> bool {
    v.abs() < 1e-6
}

pub struct Decoder {
    base: ObjectBase,
    self_weak: Mutex<Weak<Decoder>>,
    world: Weak<World>,
    world_mute: AtomicBool,
    world_no_smoke: AtomicBool,
    world_subscription: Mutex<Option<Subscription<(WorldState, WorldEvent)>>>,

    pub name: Arc<Property<String>>,
    pub protocol: Arc<Property<DecoderProtocol>>,
    pub address: Arc<Property<u16>>,
    pub long_address: Arc<Property<bool>>,
    pub emergency_stop: Arc<Property<bool>>,
    pub direction: Arc<Property<Direction>>,
    pub speed_steps: Arc<Property<u8>>,
    pub throttle: Arc<Property<f64>>,
    pub notes: Arc<Property<String>>,
    /// `SubObject`-flagged: owned exclusively for the lifetime of this
    /// decoder, not wrapped in `Property<T>` since containment, not
    /// observability, is the point (see DESIGN.md).
    pub functions: Arc<DecoderFunctions>,
    pub interface: Arc<ObjectProperty<dyn DecoderController>>,
}

impl Decoder {
    pub fn new(world: &Arc<World>, id: impl Into<Arc<str>>) -> Arc<Self> {
        let id = id.into();
        let state = world.state();
        let decoder = Arc::new(Decoder {
            base: ObjectBase::new(id.clone()),
            self_weak: Mutex::new(Weak::new()),
            world: Arc::downgrade(world),
            world_mute: AtomicBool::new(state.contains(WorldState::MUTE)),
            world_no_smoke: AtomicBool::new(state.contains(WorldState::NO_SMOKE)),
            world_subscription: Mutex::new(None),
            name: Arc::new(Property::new("name", String::new(), PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            protocol: Arc::new(Property::new("protocol", DecoderProtocol::None, PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            address: Arc::new(Property::new("address", 0u16, PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            long_address: Arc::new(Property::new("long_address", false, PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            emergency_stop: Arc::new(Property::new("emergency_stop", false, PropertyFlags::READ_WRITE)),
            direction: Arc::new(Property::new("direction", Direction::Forward, PropertyFlags::READ_WRITE)),
            speed_steps: Arc::new(Property::new("speed_steps", 0u8, PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            throttle: Arc::new(Property::with_validator("throttle", THROTTLE_MIN, PropertyFlags::READ_WRITE, |v: &f64| {
                if (THROTTLE_MIN..=THROTTLE_MAX).contains(v) {
                    Ok(*v)
                } else {
                    Err(Error::OutOfRange)
                }
            })),
            notes: Arc::new(Property::new("notes", String::new(), PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            functions: DecoderFunctions::new(),
            interface: Arc::new(ObjectProperty::new()),
        });

        decoder.base.with_items_mut(|items| {
            items.add(decoder.name.clone() as Arc<dyn InterfaceItem>);
            items.add(decoder.protocol.clone() as Arc<dyn InterfaceItem>);
            items.add(decoder.address.clone() as Arc<dyn InterfaceItem>);
            items.add(decoder.long_address.clone() as Arc<dyn InterfaceItem>);
            items.add(decoder.emergency_stop.clone() as Arc<dyn InterfaceItem>);
            items.add(decoder.direction.clone() as Arc<dyn InterfaceItem>);
            items.add(decoder.speed_steps.clone() as Arc<dyn InterfaceItem>);
            items.add(decoder.throttle.clone() as Arc<dyn InterfaceItem>);
            items.add(decoder.notes.clone() as Arc<dyn InterfaceItem>);
        });

        *decoder.self_weak.lock() = Arc::downgrade(&decoder);
        decoder.wire_reactions(world);
        decoder.update_editable();
        decoder
    }

    fn arc(&self) -> Arc<Decoder> {
        self.self_weak.lock().upgrade().expect("decoder destroyed while still referenced")
    }

    fn wire_reactions(self: &Arc<Self>, world: &Arc<World>) {
        let w = Arc::downgrade(self);
        self.protocol.subscribe(move |(_, new): (DecoderProtocol, DecoderProtocol)| {
            if let Some(d) = w.upgrade() {
                if new == DecoderProtocol::Dcc && d.address.get() > DCC_SHORT_ADDRESS_MAX {
                    let _ = d.long_address.set_internal(true);
                }
                d.update_editable();
            }
        });

        let w = Arc::downgrade(self);
        self.address.subscribe(move |(_, new): (u16, u16)| {
            if let Some(d) = w.upgrade() {
                if d.protocol.get() == DecoderProtocol::Dcc && new > DCC_SHORT_ADDRESS_MAX {
                    let _ = d.long_address.set_internal(true);
                }
                d.update_editable();
            }
        });

        let w = Arc::downgrade(self);
        self.emergency_stop.subscribe(move |_: (bool, bool)| {
            if let Some(d) = w.upgrade() {
                d.changed(DecoderChangeFlags::EMERGENCY_STOP, 0);
                d.update_editable();
            }
        });

        let w = Arc::downgrade(self);
        self.direction.subscribe(move |_: (Direction, Direction)| {
            if let Some(d) = w.upgrade() {
                d.changed(DecoderChangeFlags::DIRECTION, 0);
            }
        });

        let w = Arc::downgrade(self);
        self.speed_steps.subscribe(move |_: (u8, u8)| {
            if let Some(d) = w.upgrade() {
                d.changed(DecoderChangeFlags::SPEED_STEPS, 0);
            }
        });

        let w = Arc::downgrade(self);
        self.throttle.subscribe(move |_: (f64, f64)| {
            if let Some(d) = w.upgrade() {
                d.changed(DecoderChangeFlags::THROTTLE, 0);
                d.update_editable();
            }
        });

        let w = Arc::downgrade(self);
        let sub = world.subscribe(move |(state, event)| {
            if let Some(d) = w.upgrade() {
                d.world_event(state, event);
            }
        });
        *self.world_subscription.lock() = Some(sub);
    }

    /// `worldEvent` (§4.4/§4.7): refresh cached mute/no-smoke flags and
    /// re-derive editability, mirroring function-value overrides back to
    /// the command station when mute/smoke toggles.
    fn world_event(&self, state: WorldState, event: WorldEvent) {
        self.update_editable_for(state.contains(WorldState::EDIT));
        self.world_mute.store(state.contains(WorldState::MUTE), Ordering::Release);
        self.world_no_smoke.store(state.contains(WorldState::NO_SMOKE), Ordering::Release);

        match event {
            WorldEvent::Mute | WorldEvent::Unmute => {
                let mut has_mute = false;
                for f in self.functions.iter() {
                    if f.function.get() == DecoderFunctionFunction::Mute {
                        has_mute = true;
                        if !f.value.get() {
                            self.changed(DecoderChangeFlags::FUNCTION_VALUE, f.number.get());
                        }
                    }
                }
                if !has_mute {
                    for f in self.functions.iter() {
                        if f.function.get() == DecoderFunctionFunction::Sound && f.value.get() {
                            self.changed(DecoderChangeFlags::FUNCTION_VALUE, f.number.get());
                        }
                    }
                }
            }
            WorldEvent::NoSmoke | WorldEvent::Smoke => {
                for f in self.functions.iter() {
                    if f.function.get() == DecoderFunctionFunction::Smoke && f.value.get() {
                        self.changed(DecoderChangeFlags::FUNCTION_VALUE, f.number.get());
                    }
                }
            }
            _ => {}
        }
    }

    fn update_editable(&self) {
        let editable = self.world.upgrade().is_some_and(|w| w.state().contains(WorldState::EDIT));
        self.update_editable_for(editable);
    }

    /// Editable attributes become enabled only while the world is in
    /// `Edit` mode and the decoder is stopped (§4.7).
    fn update_editable_for(&self, editable: bool) {
        let stopped = editable && almost_zero(self.throttle.get());
        self.name.set_enabled(editable);
        self.protocol.set_enabled(stopped);
        self.address.set_enabled(stopped);
        self.long_address.set_enabled(stopped && self.protocol.get() == DecoderProtocol::Dcc && self.address.get() < DCC_SHORT_ADDRESS_MAX);
        self.speed_steps.set_enabled(stopped);
    }

    /// Moves this decoder to `new`'s controller, removing it from any
    /// controller it is currently bound to first. Rejects the move if
    /// `new` already has a decoder at this `(protocol, address)`.
    pub fn set_interface(self: &Arc<Self>, new: Option<Arc<dyn DecoderController>>) -> Result<()> {
        if let Some(ctrl) = &new {
            if ctrl.decoder_base().get_decoder(self.protocol.get(), self.address.get()).is_some() {
                return Err(Error::DuplicateAddress);
            }
        }
        if let Some(old) = self.interface.get() {
            old.decoder_base().remove_decoder(self);
        }
        if let Some(ctrl) = &new {
            ctrl.decoder_base()
                .add_decoder(self.clone())
                .expect("duplicate address already rejected above");
        }
        self.interface.set(new);
        Ok(())
    }

    pub fn has_function(&self, number: u32) -> bool {
        self.functions.iter().any(|f| f.number.get() == number)
    }

    pub fn get_function(&self, number: u32) -> Option<Arc<DecoderFunction>> {
        self.functions.iter().find(|f| f.number.get() == number)
    }

    pub fn get_function_by_kind(&self, kind: DecoderFunctionFunction) -> Option<Arc<DecoderFunction>> {
        self.functions.iter().find(|f| f.function.get() == kind)
    }

    /// Applies the mute/no-smoke overrides of §4.7 on top of the
    /// function's raw stored value, using the cached world flags rather
    /// than re-reading the world on every call.
    pub fn get_function_value(&self, function: &DecoderFunction) -> bool {
        if self.world_mute.load(Ordering::Acquire) {
            if function.function.get() == DecoderFunctionFunction::Mute {
                return true;
            }
            if function.function.get() == DecoderFunctionFunction::Sound
                && self.get_function_by_kind(DecoderFunctionFunction::Mute).is_none()
            {
                return false;
            }
        }
        if self.world_no_smoke.load(Ordering::Acquire) && function.function.get() == DecoderFunctionFunction::Smoke {
            return false;
        }
        function.value.get()
    }

    pub fn get_function_value_by_number(&self, number: u32) -> bool {
        self.get_function(number).is_some_and(|f| self.get_function_value(&f))
    }

    pub fn set_function_value(&self, number: u32, value: bool) {
        if let Some(f) = self.get_function(number) {
            if self.get_function_value(&f) != value {
                let _ = f.value.set_internal(value);
                self.changed(DecoderChangeFlags::FUNCTION_VALUE, number);
            }
        }
    }

    fn changed(&self, changes: DecoderChangeFlags, function_number: u32) {
        if let Some(ctrl) = self.interface.get() {
            ctrl.decoder_changed(&self.arc(), changes, function_number);
        }
    }
}

impl IdObject for Decoder {
    fn id(&self) -> Arc<str> {
        self.base.id()
    }

    fn interface_items(&self) -> traintastic_core::InterfaceItems {
        self.base.interface_items()
    }

    fn is_destroyed(&self) -> bool {
        self.base.is_destroyed()
    }

    /// Two-phase destroy (§4.3): detach from any bound controller,
    /// release the function sub-object, then mark this object's own
    /// properties destroyed.
    fn destroy(&self) {
        if self.base.is_destroyed() {
            return;
        }
        let _ = self.arc().set_interface(None);
        self.functions.destroy();
        if let Some(sub) = self.world_subscription.lock().take() {
            sub.disconnect();
        }
        self.base.destroy();
    }

    fn subscribe_destroying(&self, f: Box<dyn FnMut(()) + Send>) -> Subscription<()> {
        self.base.subscribe_destroying(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::DecoderControllerBase;
    use traintastic_core::InterfaceItems;

    struct FakeController {
        base: ObjectBase,
        decoders: DecoderControllerBase,
    }

    impl IdObject for FakeController {
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

    impl DecoderController for FakeController {
        fn decoder_base(&self) -> &DecoderControllerBase {
            &self.decoders
        }
        fn decoder_changed(&self, _decoder: &Arc<Decoder>, _changes: DecoderChangeFlags, _function_number: u32) {}
    }

    fn controller() -> Arc<FakeController> {
        Arc::new(FakeController {
            base: ObjectBase::new("cs1"),
            decoders: DecoderControllerBase::new(),
        })
    }

    #[test]
    fn auto_long_address_on_protocol_change() {
        let world = Arc::new(World::new());
        let decoder = Decoder::new(&world, "loco1");
        decoder.address.set(100).unwrap();
        decoder.protocol.set(DecoderProtocol::Dcc).unwrap();
        assert!(!decoder.long_address.get());

        decoder.address.set(200).unwrap();
        assert!(decoder.long_address.get());
    }

    #[test]
    fn auto_long_address_on_address_change_scenario_s2() {
        let world = Arc::new(World::new());
        let decoder = Decoder::new(&world, "loco1");
        decoder.protocol.set(DecoderProtocol::Dcc).unwrap();
        decoder.address.set(100).unwrap();
        decoder.long_address.set_internal(false).unwrap();

        decoder.address.set(200).unwrap();
        assert!(decoder.long_address.get());
    }

    #[test]
    fn throttle_rejects_out_of_range() {
        let world = Arc::new(World::new());
        let decoder = Decoder::new(&world, "loco1");
        assert_eq!(decoder.throttle.set(1.5), Err(Error::OutOfRange));
        assert_eq!(decoder.throttle.get(), 0.0);
    }

    #[test]
    fn set_interface_moves_decoder_between_controllers() {
        let world = Arc::new(World::new());
        let decoder = Decoder::new(&world, "loco1");
        decoder.protocol.set(DecoderProtocol::Dcc).unwrap();
        decoder.address.set(3).unwrap();

        let a = controller();
        let b = controller();
        decoder.set_interface(Some(a.clone())).unwrap();
        assert_eq!(a.decoders.decoders.len(), 1);

        decoder.set_interface(Some(b.clone())).unwrap();
        assert_eq!(a.decoders.decoders.len(), 0);
        assert_eq!(b.decoders.decoders.len(), 1);
    }

    #[test]
    fn set_interface_rejects_duplicate_address() {
        let world = Arc::new(World::new());
        let a = Decoder::new(&world, "loco_a");
        let b = Decoder::new(&world, "loco_b");
        a.protocol.set(DecoderProtocol::Dcc).unwrap();
        a.address.set(3).unwrap();
        b.protocol.set(DecoderProtocol::Dcc).unwrap();
        b.address.set(3).unwrap();

        let ctrl = controller();
        a.set_interface(Some(ctrl.clone())).unwrap();
        assert_eq!(b.set_interface(Some(ctrl)), Err(Error::DuplicateAddress));
    }

    #[test]
    fn mute_overrides_sound_function_when_no_mute_function_present() {
        let world = Arc::new(World::new());
        let decoder = Decoder::new(&world, "loco1");
        let sound = decoder.functions.add(0, DecoderFunctionFunction::Sound);
        sound.value.set_internal(true).unwrap();

        world.set_mute(true);
        assert!(!decoder.get_function_value(&sound));

        world.set_mute(false);
        assert!(decoder.get_function_value(&sound));
    }

    #[test]
    fn mute_function_reads_true_while_muted_regardless_of_stored_value() {
        let world = Arc::new(World::new());
        let decoder = Decoder::new(&world, "loco1");
        let mute_fn = decoder.functions.add(1, DecoderFunctionFunction::Mute);
        world.set_mute(true);
        assert!(decoder.get_function_value(&mute_fn));
    }

    #[test]
    fn destroying_nulls_interface_and_is_idempotent() {
        let world = Arc::new(World::new());
        let decoder = Decoder::new(&world, "loco1");
        let ctrl = controller();
        decoder.set_interface(Some(ctrl.clone())).unwrap();

        decoder.destroy();
        assert_eq!(ctrl.decoders.decoders.len(), 0);
        assert!(decoder.is_destroyed());
        decoder.destroy();
    }
}
