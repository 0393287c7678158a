//! The ordered name → item table every [`IdObject`](crate::object::IdObject)
//! exposes to the outside world.
//!
//! Order matters: it is the order properties/methods/events are presented
//! to a client, and `insert_before` lets a subclass's constructor splice
//! its own items in among its base class's without reordering everything.

use crate::event::Event;
use crate::method::Method;
use crate::property::Property;
use std::sync::Arc;

/// Anything that can sit in an object's interface table.
pub trait InterfaceItem: Send + Sync {
    fn name(&self) -> &str;

    /// Called once, from the owning object's `destroying()`, so a
    /// destroyed object's properties immediately start refusing writes
    /// even though the `Arc` holding them may outlive the object itself.
    fn mark_destroyed(&self) {}
}

impl<T: Clone + PartialEq + Send + Sync + 'static> InterfaceItem for Property<T> {
    fn name(&self) -> &str {
        Property::name(self)
    }

    fn mark_destroyed(&self) {
        Property::mark_destroyed(self)
    }
}

impl<Args: Send + Sync + 'static, Ret: Send + Sync + 'static> InterfaceItem for Method<Args, Ret> {
    fn name(&self) -> &str {
        Method::name(self)
    }
}

/// A named, unordered-payload event — registered in the interface table so
/// it can be listed alongside properties and methods, even though
/// dispatch itself goes through the typed [`Event`] directly.
pub struct NamedEvent<A: Clone> {
    name: String,
    event: Event<A>,
}

impl<A: Clone> NamedEvent<A> {
    pub fn new(name: impl Into<String>) -> Self {
        NamedEvent {
            name: name.into(),
            event: Event::new(),
        }
    }

    pub fn event(&self) -> &Event<A> {
        &self.event
    }
}

impl<A: Clone + Send + Sync + 'static> InterfaceItem for NamedEvent<A> {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Insertion-ordered collection of [`InterfaceItem`]s, keyed by name.
///
/// Cheap to clone: each entry is an `Arc`, so cloning the table only bumps
/// refcounts, not the underlying properties/methods/events.
#[derive(Default, Clone)]
pub struct InterfaceItems {
    items: Vec<Arc<dyn InterfaceItem>>,
}

impl InterfaceItems {
    pub fn new() -> Self {
        InterfaceItems { items: Vec::new() }
    }

    pub fn add(&mut self, item: Arc<dyn InterfaceItem>) {
        debug_assert!(
            self.get(item.name()).is_none(),
            "duplicate interface item name: {}",
            item.name()
        );
        self.items.push(item);
    }

    /// Inserts `item` immediately before the existing item named `before`.
    /// If `before` isn't present, appends at the end — matching the
    /// reference runtime's "insert before, else push back" fallback.
    pub fn insert_before(&mut self, item: Arc<dyn InterfaceItem>, before: &str) {
        match self.items.iter().position(|i| i.name() == before) {
            Some(idx) => self.items.insert(idx, item),
            None => self.items.push(item),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn InterfaceItem>> {
        self.items.iter().find(|i| i.name() == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|i| i.name())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn InterfaceItem>> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
