//! A single piece of rolling stock: physical attributes plus an optional
//! cross-reference to the [`crate::decoder::Decoder`] that drives it.
//!
//! Grounded on `vehicle/rail/railvehicle.cpp`: a rail vehicle does not own
//! its decoder — decoders live in the world-wide decoder list owned by a
//! hardware interface — it only points at one.

use crate::decoder::Decoder;
use std::sync::Arc;
use traintastic_core::{IdObject, InterfaceItem, ObjectBase, ObjectProperty, Property, PropertyFlags, Subscription};

pub struct RailVehicle {
    base: ObjectBase,
    pub name: Arc<Property<String>>,
    /// Length over buffers, in millimetres at layout scale.
    pub length: Arc<Property<u32>>,
    pub weight: Arc<Property<u32>>,
    /// Whether this vehicle is oriented backwards within its train.
    pub flipped: Arc<Property<bool>>,
    pub decoder: Arc<ObjectProperty<Decoder>>,
}

impl RailVehicle {
    pub fn new(id: impl Into<Arc<str>>) -> Arc<Self> {
        let vehicle = Arc::new(RailVehicle {
            base: ObjectBase::new(id.into()),
            name: Arc::new(Property::new("name", String::new(), PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            length: Arc::new(Property::new("length", 0u32, PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            weight: Arc::new(Property::new("weight", 0u32, PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            flipped: Arc::new(Property::new("flipped", false, PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            decoder: Arc::new(ObjectProperty::new()),
        });
        vehicle.base.with_items_mut(|items| {
            items.add(vehicle.name.clone() as Arc<dyn InterfaceItem>);
            items.add(vehicle.length.clone() as Arc<dyn InterfaceItem>);
            items.add(vehicle.weight.clone() as Arc<dyn InterfaceItem>);
            items.add(vehicle.flipped.clone() as Arc<dyn InterfaceItem>);
        });
        vehicle
    }
}

impl IdObject for RailVehicle {
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
        self.base.destroy()
    }
    fn subscribe_destroying(&self, f: Box<dyn FnMut(()) + Send>) -> Subscription<()> {
        self.base.subscribe_destroying(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::DecoderProtocol;
    use traintastic_core::World;

    #[test]
    fn decoder_reference_survives_until_decoder_destroyed() {
        let world = Arc::new(World::new());
        let decoder = Decoder::new(&world, "loco1");
        decoder.protocol.set(DecoderProtocol::Dcc).unwrap();
        let vehicle = RailVehicle::new("bv1");
        vehicle.decoder.set(Some(decoder.clone()));
        assert!(vehicle.decoder.get().is_some());

        decoder.destroy();
        assert!(vehicle.decoder.get().is_none());
    }
}
