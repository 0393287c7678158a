//! Reflective object/property/method/event runtime and world state
//! machine shared by every higher-level crate in this workspace.

pub mod convert;
pub mod error;
pub mod event;
pub mod interface_items;
pub mod method;
pub mod object;
pub mod object_list;
pub mod object_property;
pub mod property;
pub mod registry;
pub mod world;

pub use convert::{convert, Value, ValueKind};
pub use error::{Error, Result};
pub use event::{Event, Subscription};
pub use interface_items::{InterfaceItem, InterfaceItems, NamedEvent};
pub use method::Method;
pub use object::{IdObject, ObjectBase};
pub use object_list::ObjectList;
pub use object_property::ObjectProperty;
pub use property::{AttributeName, Property, PropertyFlags};
pub use registry::Registry;
pub use world::{TraintasticMode, World, WorldEvent, WorldState};
