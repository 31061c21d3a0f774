pub mod erased;

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::core::{DbError, Result, Value};
use crate::model::ModelDescriptor;
use crate::query::{ConditionSet, Page, QueryCompiler, QuerySpec};
use crate::storage::RowStore;

pub use erased::MapperCore;

/// Typed CRUD facade for one model.
///
/// `T` is the instance type the descriptor produces: the model struct for
/// registered types, [`DynamicRecord`](crate::model::DynamicRecord) for
/// dynamic models.
pub struct ModelMapper<T> {
    core: MapperCore,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for ModelMapper<T> {
    fn clone(&self) -> Self {
        Self { core: self.core.clone(), _marker: PhantomData }
    }
}

fn downcast<T: Any>(instance: Box<dyn Any>, model: &str) -> Result<T> {
    instance.downcast::<T>().map(|boxed| *boxed).map_err(|_| {
        DbError::type_mismatch(format!(
            "model '{}' does not produce instances of {}",
            model,
            std::any::type_name::<T>()
        ))
    })
}

fn values<V: Into<Value>>(ids: impl IntoIterator<Item = V>) -> Vec<Value> {
    ids.into_iter().map(Into::into).collect()
}

impl<T: Any> ModelMapper<T> {
    pub fn new(descriptor: Arc<ModelDescriptor>, store: Arc<dyn RowStore>, compiler: Arc<dyn QueryCompiler>) -> Self {
        Self::from_core(MapperCore::new(descriptor, store, compiler))
    }

    pub fn from_core(core: MapperCore) -> Self {
        Self { core, _marker: PhantomData }
    }

    pub fn core(&self) -> &MapperCore {
        &self.core
    }

    pub fn descriptor(&self) -> &Arc<ModelDescriptor> {
        self.core.descriptor()
    }

    fn typed(&self, instance: Box<dyn Any>) -> Result<T> {
        downcast(instance, self.descriptor().name())
    }

    fn typed_all(&self, instances: Vec<Box<dyn Any>>) -> Result<Vec<T>> {
        instances.into_iter().map(|instance| self.typed(instance)).collect()
    }

    /// Inserts the non-null insertable fields, generating the identity when
    /// it is absent. A store-assigned key is written back into `model`.
    pub fn insert(&self, model: &mut T) -> Result<bool> {
        self.core.insert(model)
    }

    /// Inserts every insertable field, nulls included. Returns `false` for an
    /// empty slice.
    pub fn batch_insert(&self, models: &mut [T]) -> Result<bool> {
        let mut erased: Vec<&mut dyn Any> = models.iter_mut().map(|model| model as &mut dyn Any).collect();
        self.core.batch_insert(&mut erased)
    }

    pub fn delete_by_id(&self, id: impl Into<Value>) -> Result<bool> {
        self.core.delete_by_id(&id.into())
    }

    pub fn delete_by_ids<V: Into<Value>>(&self, ids: impl IntoIterator<Item = V>) -> Result<bool> {
        self.core.delete_by_ids(&values(ids))
    }

    /// Fails with `UnsupportedOperation` when the conditions filter nothing.
    pub fn delete_by_conditions(&self, conditions: &ConditionSet) -> Result<u64> {
        self.core.delete_by_conditions(conditions)
    }

    pub fn update_by_id(&self, model: &T) -> Result<bool> {
        self.core.update_by_id(model, false)
    }

    pub fn update_by_id_with_null(&self, model: &T) -> Result<bool> {
        self.core.update_by_id(model, true)
    }

    pub fn update_by_conditions(&self, model: &T, conditions: &ConditionSet) -> Result<u64> {
        self.core.update_by_conditions(model, conditions)
    }

    pub fn find_by_id(&self, id: impl Into<Value>) -> Result<Option<T>> {
        match self.core.find_by_id(&id.into())? {
            Some(instance) => Ok(Some(self.typed(instance)?)),
            None => Ok(None),
        }
    }

    pub fn list_by_ids<V: Into<Value>>(&self, ids: impl IntoIterator<Item = V>) -> Result<Vec<T>> {
        let instances = self.core.list_by_ids(&values(ids))?;
        self.typed_all(instances)
    }

    pub fn list_by_condition(&self, template: Option<&T>, specs: &[&QuerySpec]) -> Result<Vec<T>> {
        let instances = self.core.list_by_condition(template.map(|t| t as &dyn Any), specs)?;
        self.typed_all(instances)
    }

    pub fn find_by_condition(&self, template: Option<&T>, specs: &[&QuerySpec]) -> Result<Option<T>> {
        Ok(self.list_by_condition(template, specs)?.into_iter().next())
    }

    pub fn page_by_condition(
        &self,
        template: Option<&T>,
        page_num: i64,
        page_size: i64,
        specs: &[&QuerySpec],
    ) -> Result<Page<T>> {
        let page = self
            .core
            .page_by_condition(template.map(|t| t as &dyn Any), page_num, page_size, specs)?;
        page.try_convert(|instance| self.typed(instance))
    }

    pub fn count_by_condition(&self, template: Option<&T>, conditions: &[&ConditionSet]) -> Result<u64> {
        self.core.count_by_condition(template.map(|t| t as &dyn Any), conditions)
    }

    pub fn exist_by_condition(&self, template: Option<&T>, conditions: &[&ConditionSet]) -> Result<bool> {
        Ok(self.count_by_condition(template, conditions)? > 0)
    }
}
