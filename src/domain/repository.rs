use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug_span;

use crate::core::{DbError, Result, Value};
use crate::domain::descriptor::AggregateDescriptor;
use crate::domain::engine::Engine;
use crate::domain::events::{publish_all, DomainEvent, DomainEventPublisher};
use crate::domain::Aggregate;
use crate::query::QueryCompiler;
use crate::storage::Datasources;

/// Finds, saves and deletes aggregates of type `A` together with their
/// slot trees.
///
/// None of the operations is transactional: a failure part way through a
/// save or delete leaves the rows written so far in place. Callers that need
/// atomicity must run these calls inside a transaction of the backing store.
pub struct AggregateRepository<A> {
    engine: Engine,
    publisher: Option<Arc<dyn DomainEventPublisher>>,
    _aggregate: PhantomData<fn() -> A>,
}

impl<A: Aggregate> AggregateRepository<A> {
    pub fn new(
        descriptor: Arc<AggregateDescriptor>,
        datasources: &Datasources,
        compiler: Arc<dyn QueryCompiler>,
    ) -> Result<Self> {
        Ok(Self {
            engine: Engine::new(descriptor, datasources, &compiler)?,
            publisher: None,
            _aggregate: PhantomData,
        })
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn DomainEventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn descriptor(&self) -> &Arc<AggregateDescriptor> {
        &self.engine.descriptor
    }

    /// Loads the aggregate whose root has identity `id`.
    ///
    /// A missing root (or a null id) yields `Ok(None)`, or `NotFound` when
    /// `strict` is set.
    pub fn find_by_id(&self, id: impl Into<Value>, strict: bool) -> Result<Option<A>> {
        let id = id.into();
        let _span = debug_span!("find_aggregate", aggregate = self.engine.descriptor.name(), id = %id).entered();

        let mut aggregate = A::default();
        if self.engine.find(&mut aggregate, &id)? {
            return Ok(Some(aggregate));
        }
        if strict {
            return Err(DbError::NotFound(format!(
                "aggregate '{}' with id {}",
                self.engine.descriptor.name(),
                id
            )));
        }
        Ok(None)
    }

    /// Saves the root and reconciles the changed slots, then publishes the
    /// aggregate's pending events. Returns the root identity.
    pub fn save(&self, aggregate: &mut A) -> Result<Value> {
        let _span = debug_span!("save_aggregate", aggregate = self.engine.descriptor.name()).entered();

        let changed = aggregate.changed_slots();
        let id = self.engine.save(aggregate, changed.as_ref())?;
        publish_all(self.publisher.as_ref(), aggregate.take_events());
        Ok(id)
    }

    pub fn delete_by_id(&self, id: impl Into<Value>) -> Result<()> {
        self.delete_by_id_with_events(id, Vec::new())
    }

    /// Deletes the aggregate, then hands `events` to the publisher.
    pub fn delete_by_id_with_events(&self, id: impl Into<Value>, events: Vec<DomainEvent>) -> Result<()> {
        let id = id.into();
        if id.is_null() {
            return Ok(());
        }
        let _span = debug_span!("delete_aggregate", aggregate = self.engine.descriptor.name(), id = %id).entered();

        self.engine.delete(&id)?;
        publish_all(self.publisher.as_ref(), events);
        Ok(())
    }

    pub fn delete_by_ids<V: Into<Value>>(&self, ids: impl IntoIterator<Item = V>) -> Result<()> {
        self.delete_by_ids_with_events(ids, Vec::new())
    }

    /// Deletes each aggregate in turn; `events` are published once all
    /// deletes succeeded.
    pub fn delete_by_ids_with_events<V: Into<Value>>(
        &self,
        ids: impl IntoIterator<Item = V>,
        events: Vec<DomainEvent>,
    ) -> Result<()> {
        let ids: Vec<Value> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            return Ok(());
        }
        for id in &ids {
            self.engine.delete(id)?;
        }
        publish_all(self.publisher.as_ref(), events);
        Ok(())
    }
}
