//! A train: an ordered consist of [`RailVehicle`]s, with throttle and
//! direction delegated to the decoder of the first vehicle in the consist
//! that actually has one bound — mirroring how the reference runtime lets
//! any vehicle in a rake carry the powered decoder.

use crate::decoder::Direction;
use crate::railvehicle::RailVehicle;
use std::sync::Arc;
use traintastic_core::{Error, IdObject, InterfaceItem, ObjectBase, ObjectList, Property, PropertyFlags, Result, Subscription};

pub struct Train {
    base: ObjectBase,
    pub name: Arc<Property<String>>,
    /// Owned, ordered front-to-back.
    pub vehicles: ObjectList<RailVehicle>,
}

impl Train {
    pub fn new(id: impl Into<Arc<str>>) -> Arc<Self> {
        let train = Arc::new(Train {
            base: ObjectBase::new(id.into()),
            name: Arc::new(Property::new("name", String::new(), PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            vehicles: ObjectList::new(),
        });
        train.base.with_items_mut(|items| {
            items.add(train.name.clone() as Arc<dyn InterfaceItem>);
        });
        train
    }

    /// The vehicle whose decoder is addressed when the train as a whole
    /// is throttled — the first in the consist that has one bound.
    fn lead_vehicle(&self) -> Option<Arc<RailVehicle>> {
        self.vehicles.to_vec().into_iter().find(|v| v.decoder.get().is_some())
    }

    pub fn throttle(&self) -> Option<f64> {
        self.lead_vehicle()?.decoder.get().map(|d| d.throttle.get())
    }

    pub fn set_throttle(&self, value: f64) -> Result<()> {
        match self.lead_vehicle().and_then(|v| v.decoder.get()) {
            Some(d) => d.throttle.set(value),
            None => Err(Error::UnknownAddress),
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        Some(self.lead_vehicle()?.decoder.get()?.direction.get())
    }

    pub fn set_direction(&self, direction: Direction) -> Result<()> {
        match self.lead_vehicle().and_then(|v| v.decoder.get()) {
            Some(d) => d.direction.set(direction),
            None => Err(Error::UnknownAddress),
        }
    }

    pub fn emergency_stop(&self) -> Result<()> {
        match self.lead_vehicle().and_then(|v| v.decoder.get()) {
            Some(d) => d.emergency_stop.set(true),
            None => Err(Error::UnknownAddress),
        }
    }

    /// Changes the decoder-facing speed step count for every vehicle in
    /// the consist that carries a decoder, not only the lead vehicle —
    /// consist members each keep their own speed table.
    pub fn set_speed_steps_for_all_decoders(&self, steps: u8) {
        for v in self.vehicles.to_vec() {
            if let Some(d) = v.decoder.get() {
                let _ = d.speed_steps.set(steps);
            }
        }
    }
}

impl IdObject for Train {
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
        self.vehicles.destroy_all();
        self.base.destroy()
    }
    fn subscribe_destroying(&self, f: Box<dyn FnMut(()) + Send>) -> Subscription<()> {
        self.base.subscribe_destroying(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{Decoder, DecoderProtocol};
    use traintastic_core::World;

    #[test]
    fn throttle_delegates_to_lead_vehicles_decoder() {
        let world = Arc::new(World::new());
        let decoder = Decoder::new(&world, "loco1");
        decoder.protocol.set(DecoderProtocol::Dcc).unwrap();

        let undriven = RailVehicle::new("wagon1");
        let driven = RailVehicle::new("loco_body1");
        driven.decoder.set(Some(decoder.clone()));

        let train = Train::new("train1");
        train.vehicles.append(undriven);
        train.vehicles.append(driven);

        train.set_throttle(0.5).unwrap();
        assert_eq!(decoder.throttle.get(), 0.5);
        assert_eq!(train.throttle(), Some(0.5));
    }

    #[test]
    fn train_without_any_decoder_refuses_throttle() {
        let train = Train::new("train1");
        train.vehicles.append(RailVehicle::new("wagon1"));
        assert_eq!(train.set_throttle(0.5), Err(Error::UnknownAddress));
    }
}
