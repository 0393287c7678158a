//! The function table hanging off a [`crate::decoder::Decoder`]: a
//! `SUB_OBJECT`-owned list of numbered, named, typed function buttons.

use std::sync::Arc;
use traintastic_core::{Error, IdObject, InterfaceItem, ObjectBase, ObjectList, Property, PropertyFlags, Result, Subscription};

/// What a function button is understood to do — read by
/// [`crate::decoder::Decoder::get_function_value`] to apply the
/// mute/no-smoke overrides of §4.7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderFunctionFunction {
    Generic,
    Sound,
    Mute,
    Smoke,
    Light,
}

pub struct DecoderFunction {
    base: ObjectBase,
    pub number: Arc<Property<u32>>,
    pub name: Arc<Property<String>>,
    pub function: Arc<Property<DecoderFunctionFunction>>,
    /// Raw stored value. Read through
    /// [`crate::decoder::Decoder::get_function_value`] rather than
    /// directly — the decoder applies world-wide overrides on top.
    pub value: Arc<Property<bool>>,
}

impl DecoderFunction {
    fn new(number: u32, function: DecoderFunctionFunction) -> Arc<Self> {
        let f = Arc::new(DecoderFunction {
            base: ObjectBase::new(format!("f{number}")),
            number: Arc::new(Property::new("number", number, PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            name: Arc::new(Property::new("name", String::new(), PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            function: Arc::new(Property::new("function", function, PropertyFlags::READ_WRITE | PropertyFlags::STORE)),
            value: Arc::new(Property::new("value", false, PropertyFlags::READ_WRITE)),
        });
        f.base.with_items_mut(|items| {
            items.add(f.number.clone() as Arc<dyn InterfaceItem>);
            items.add(f.name.clone() as Arc<dyn InterfaceItem>);
            items.add(f.function.clone() as Arc<dyn InterfaceItem>);
            items.add(f.value.clone() as Arc<dyn InterfaceItem>);
        });
        f
    }
}

impl IdObject for DecoderFunction {
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

pub struct DecoderFunctions {
    base: ObjectBase,
    functions: ObjectList<DecoderFunction>,
}

impl DecoderFunctions {
    pub fn new() -> Arc<Self> {
        Arc::new(DecoderFunctions {
            base: ObjectBase::new("functions"),
            functions: ObjectList::new(),
        })
    }

    /// Appends a new function at `number`, rejecting a duplicate number.
    pub fn add(&self, number: u32, function: DecoderFunctionFunction) -> Arc<DecoderFunction> {
        let f = DecoderFunction::new(number, function);
        self.functions.append(f.clone());
        f
    }

    pub fn remove(&self, number: u32) -> Result<()> {
        if self.functions.remove_by_id(&format!("f{number}")) {
            Ok(())
        } else {
            Err(Error::UnknownId)
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Arc<DecoderFunction>> {
        self.functions.to_vec().into_iter()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl IdObject for DecoderFunctions {
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
        self.functions.destroy_all();
        self.base.destroy()
    }
    fn subscribe_destroying(&self, f: Box<dyn FnMut(()) + Send>) -> Subscription<()> {
        self.base.subscribe_destroying(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_lookup_by_kind() {
        let functions = DecoderFunctions::new();
        let f0 = functions.add(0, DecoderFunctionFunction::Generic);
        functions.add(1, DecoderFunctionFunction::Sound);
        assert_eq!(functions.len(), 2);
        assert_eq!(f0.number.get(), 0);
    }

    #[test]
    fn remove_unknown_number_is_an_error() {
        let functions = DecoderFunctions::new();
        assert_eq!(functions.remove(9), Err(Error::UnknownId));
    }

    #[test]
    fn destroy_drains_every_function() {
        let functions = DecoderFunctions::new();
        functions.add(0, DecoderFunctionFunction::Generic);
        functions.add(1, DecoderFunctionFunction::Sound);
        functions.destroy();
        assert!(functions.is_empty());
    }
}
