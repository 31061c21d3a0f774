use std::sync::Arc;

use crate::config::CrudConfig;
use crate::core::{DbError, Result};
use crate::domain::{Aggregate, AggregateRegistry, AggregateRepository, DomainEventPublisher};
use crate::mapper::ModelMapper;
use crate::model::{DynamicModel, DynamicRecord, Model, ModelDescriptor, ModelRegistry};
use crate::query::{QueryCompiler, StandardCompiler};
use crate::storage::{Datasources, RowStore};

/// Entry point wiring the registries, the datasources and the compiler.
///
/// # Examples
///
/// ```ignore
/// let store = Arc::new(InMemoryRowStore::new());
/// let ctx = CrudContext::with_store(store);
/// let customers = ctx.mapper::<Customer>()?;
/// let orders = ctx.repository::<OrderAggregate>()?;
/// ```
pub struct CrudContext {
    models: Arc<ModelRegistry>,
    aggregates: Arc<AggregateRegistry>,
    datasources: Datasources,
    compiler: Arc<dyn QueryCompiler>,
    publisher: Option<Arc<dyn DomainEventPublisher>>,
}

impl CrudContext {
    pub fn new(config: CrudConfig, datasources: Datasources) -> Self {
        let models = Arc::new(ModelRegistry::new(config));
        Self {
            aggregates: Arc::new(AggregateRegistry::new(Arc::clone(&models))),
            models,
            datasources,
            compiler: Arc::new(StandardCompiler),
            publisher: None,
        }
    }

    /// Default configuration with `store` serving the default datasource.
    pub fn with_store(store: Arc<dyn RowStore>) -> Self {
        Self::new(CrudConfig::default(), Datasources::single(store))
    }

    pub fn compiler(mut self, compiler: Arc<dyn QueryCompiler>) -> Self {
        self.compiler = compiler;
        self
    }

    /// Publisher handed to every repository created afterwards.
    pub fn publisher(mut self, publisher: Arc<dyn DomainEventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn models(&self) -> &Arc<ModelRegistry> {
        &self.models
    }

    pub fn aggregates(&self) -> &Arc<AggregateRegistry> {
        &self.aggregates
    }

    pub fn datasources(&self) -> &Datasources {
        &self.datasources
    }

    fn mapper_for<T: 'static>(&self, descriptor: Arc<ModelDescriptor>) -> Result<ModelMapper<T>> {
        let store = self.datasources.store_for(&descriptor)?;
        Ok(ModelMapper::new(descriptor, store, Arc::clone(&self.compiler)))
    }

    pub fn mapper<T: Model>(&self) -> Result<ModelMapper<T>> {
        let descriptor = self.models.require::<T>()?;
        self.mapper_for(descriptor)
    }

    /// Registers `model` and returns a mapper over its records.
    pub fn register_dynamic(&self, model: DynamicModel) -> Result<ModelMapper<DynamicRecord>> {
        let descriptor = self.models.register_dynamic(model)?;
        self.mapper_for(descriptor)
    }

    pub fn dynamic_mapper(&self, name: &str) -> Result<ModelMapper<DynamicRecord>> {
        let descriptor = self
            .models
            .resolve_by_name(name)?
            .filter(|descriptor| descriptor.type_id().is_none())
            .ok_or_else(|| DbError::configuration(format!("no dynamic model named '{}'", name)))?;
        self.mapper_for(descriptor)
    }

    pub fn repository<A: Aggregate>(&self) -> Result<AggregateRepository<A>> {
        let descriptor = self.aggregates.resolve::<A>()?;
        let repository = AggregateRepository::new(descriptor, &self.datasources, Arc::clone(&self.compiler))?;
        Ok(match &self.publisher {
            Some(publisher) => repository.with_publisher(Arc::clone(publisher)),
            None => repository,
        })
    }
}
