//! Aggregate persistence: a root entity plus a tree of value-object slots
//! that link back to it through key fields.

pub mod descriptor;
mod delete;
mod engine;
pub mod events;
mod find;
pub mod registry;
pub mod repository;
mod save;
pub mod shape;

use std::any::Any;
use std::collections::HashSet;

pub use descriptor::{AggregateDescriptor, HolderKind, SlotId, SlotNode};
pub use events::{DomainEvent, DomainEventPublisher};
pub use registry::AggregateRegistry;
pub use repository::AggregateRepository;
pub use shape::{AggregateShape, Slot, SlotValue, ValueObjectShape};

/// A root entity together with its value-object slots.
pub trait Aggregate: Any + Default + Send + Sync {
    fn shape() -> AggregateShape<Self>;

    /// Names of the top-level slots modified since loading; `None` saves
    /// every slot.
    fn changed_slots(&self) -> Option<HashSet<String>> {
        None
    }

    /// Events to publish after the next successful save.
    fn take_events(&mut self) -> Vec<DomainEvent> {
        Vec::new()
    }
}

/// Holder type of a value-object slot.
pub trait ValueObject: Any + Default + Send + Sync {
    fn shape() -> ValueObjectShape<Self>;
}
