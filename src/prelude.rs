//! Everything needed to declare models and aggregates and to persist them.
//!
//! ```ignore
//! use rustcrud::prelude::*;
//! ```

pub use crate::config::CrudConfig;
pub use crate::core::{DataType, DbError, Result, Value};
pub use crate::domain::{
    Aggregate, AggregateRepository, AggregateShape, DomainEvent, DomainEventPublisher, Slot, ValueObject,
    ValueObjectShape,
};
pub use crate::facade::CrudContext;
pub use crate::mapper::ModelMapper;
pub use crate::model::{
    DynamicModel, DynamicRecord, FieldSpec, IdentityStrategy, Model, ModelConfiguration, ModelShape, NameType,
};
pub use crate::query::{ConditionSet, ConditionType, Page, QuerySpec, SortSpec};
pub use crate::storage::{Datasources, InMemoryRowStore, RowStore};
