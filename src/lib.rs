// ============================================================================
// rustcrud Library
// ============================================================================
//
// Generic data access: model descriptors, a declarative condition/query
// model with a pluggable compiler, typed single-table mappers, and aggregate
// persistence over a recursive tree of value-object slots.
//
// ============================================================================

pub mod config;
pub mod core;
pub mod domain;
pub mod facade;
pub mod mapper;
pub mod model;
pub mod prelude;
pub mod query;
pub mod storage;
mod expression;

pub use config::CrudConfig;
pub use core::{DataType, DbError, FieldType, FieldValue, Result, Row, Value};
pub use domain::{
    Aggregate, AggregateDescriptor, AggregateRegistry, AggregateRepository, AggregateShape, DomainEvent,
    DomainEventPublisher, HolderKind, Slot, SlotId, SlotNode, ValueObject, ValueObjectShape,
};
pub use facade::CrudContext;
pub use mapper::ModelMapper;
pub use model::{
    DynamicModel, DynamicRecord, FieldSpec, IdGenerator, IdentityStrategy, Model, ModelConfiguration,
    ModelDescriptor, ModelRegistry, ModelShape, NameType,
};
pub use query::{
    ConditionSet, ConditionType, Page, QueryCompiler, QuerySpec, SelectStatement, SortSpec, StandardCompiler,
};
pub use storage::{Datasources, InMemoryRowStore, RowStore};
