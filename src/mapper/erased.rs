use std::any::Any;
use std::sync::Arc;

use tracing::trace;

use crate::core::{DbError, Result, Row, Value};
use crate::model::ModelDescriptor;
use crate::query::{CompiledPredicate, ConditionSet, Page, QueryCompiler, QuerySpec};
use crate::storage::RowStore;

/// Single-table CRUD over type-erased instances.
///
/// Instances are whatever the descriptor's factory produces; every accessor
/// call goes through the descriptor, so the same code serves plain structs
/// and dynamic records.
#[derive(Clone)]
pub struct MapperCore {
    descriptor: Arc<ModelDescriptor>,
    store: Arc<dyn RowStore>,
    compiler: Arc<dyn QueryCompiler>,
}

impl MapperCore {
    pub fn new(descriptor: Arc<ModelDescriptor>, store: Arc<dyn RowStore>, compiler: Arc<dyn QueryCompiler>) -> Self {
        Self { descriptor, store, compiler }
    }

    pub fn descriptor(&self) -> &Arc<ModelDescriptor> {
        &self.descriptor
    }

    fn insert_row(&self, instance: &dyn Any, include_null: bool) -> Result<Row> {
        let mut row = Row::new();
        for field in self.descriptor.fields() {
            let value = field.get(instance)?;
            // an explicit identity is written even where the store assigns keys
            let writable = field.insertable || (field.is_identity() && !value.is_null());
            if writable && (include_null || !value.is_null()) {
                row.insert(field.column.clone(), value);
            }
        }
        Ok(row)
    }

    fn update_row(&self, instance: &dyn Any, include_null: bool) -> Result<Row> {
        let mut row = Row::new();
        for field in self.descriptor.fields().filter(|field| field.updatable && !field.is_identity()) {
            let value = field.get(instance)?;
            if include_null || !value.is_null() {
                row.insert(field.column.clone(), value);
            }
        }
        Ok(row)
    }

    fn capture_generated_id(&self, instance: &mut dyn Any, generated: Option<Value>) -> Result<()> {
        if let (Some(value), Some(field)) = (generated, self.descriptor.id_field()) {
            if field.get(instance)?.is_null() {
                field.set(instance, value)?;
            }
        }
        Ok(())
    }

    fn instances(&self, rows: Vec<Row>) -> Result<Vec<Box<dyn Any>>> {
        rows.into_iter().map(|row| self.descriptor.instance_from_row(row)).collect()
    }

    fn predicate(&self, template: Option<&dyn Any>, conditions: &[&ConditionSet]) -> Result<CompiledPredicate> {
        if conditions.is_empty() {
            return self.compiler.compile_predicate(&self.descriptor, template, None);
        }
        let merged = ConditionSet::merge_all(conditions);
        self.compiler.compile_predicate(&self.descriptor, template, Some(&merged))
    }

    fn merged_spec(specs: &[&QuerySpec]) -> Option<QuerySpec> {
        match specs {
            [] => None,
            [single] => Some((*single).clone()),
            many => Some(QuerySpec::merge_all(many)),
        }
    }

    pub fn insert(&self, instance: &mut dyn Any) -> Result<bool> {
        self.descriptor.assign_id_if_absent(instance)?;
        let row = self.insert_row(instance, false)?;
        let outcome = self.store.insert(&self.descriptor, row)?;
        self.capture_generated_id(instance, outcome.generated_id)?;
        trace!(model = self.descriptor.name(), affected = outcome.affected, "insert");
        Ok(outcome.affected == 1)
    }

    pub fn batch_insert(&self, instances: &mut [&mut dyn Any]) -> Result<bool> {
        if instances.is_empty() {
            return Ok(false);
        }
        let mut rows = Vec::with_capacity(instances.len());
        for instance in instances.iter_mut() {
            self.descriptor.assign_id_if_absent(&mut **instance)?;
            rows.push(self.insert_row(&**instance, true)?);
        }
        let outcome = self.store.batch_insert(&self.descriptor, rows)?;
        for (instance, generated) in instances.iter_mut().zip(outcome.generated_ids) {
            self.capture_generated_id(&mut **instance, generated)?;
        }
        trace!(model = self.descriptor.name(), affected = outcome.affected, "batch insert");
        Ok(outcome.affected > 0)
    }

    pub fn delete_by_id(&self, id: &Value) -> Result<bool> {
        if id.is_null() {
            return Ok(false);
        }
        Ok(self.store.delete_by_id(&self.descriptor, id)? > 0)
    }

    pub fn delete_by_ids(&self, ids: &[Value]) -> Result<bool> {
        if ids.iter().all(Value::is_null) {
            return Ok(false);
        }
        Ok(self.store.delete_by_ids(&self.descriptor, ids)? > 0)
    }

    pub fn delete_by_conditions(&self, conditions: &ConditionSet) -> Result<u64> {
        let predicate = self.compiler.compile_predicate(&self.descriptor, None, Some(conditions))?;
        let deleted = self.store.delete_by_filter(&self.descriptor, &predicate)?;
        trace!(model = self.descriptor.name(), deleted, "delete by conditions");
        Ok(deleted)
    }

    /// Updates the row addressed by the instance's identity. Null fields are
    /// written only when `include_null` is set.
    pub fn update_by_id(&self, instance: &dyn Any, include_null: bool) -> Result<bool> {
        let id = self.descriptor.id_value(instance)?;
        if id.is_null() {
            return Err(DbError::PersistFailed(format!(
                "cannot update '{}' by id: the instance carries no identity",
                self.descriptor.name()
            )));
        }
        let assignments = self.update_row(instance, include_null)?;
        Ok(self.store.update_by_id(&self.descriptor, &id, assignments)? == 1)
    }

    pub fn update_by_conditions(&self, instance: &dyn Any, conditions: &ConditionSet) -> Result<u64> {
        let assignments = self.update_row(instance, false)?;
        let predicate = self.compiler.compile_predicate(&self.descriptor, None, Some(conditions))?;
        self.store.update_by_filter(&self.descriptor, assignments, &predicate)
    }

    pub fn find_by_id(&self, id: &Value) -> Result<Option<Box<dyn Any>>> {
        if id.is_null() {
            return Ok(None);
        }
        match self.store.select_by_id(&self.descriptor, id)? {
            Some(row) => Ok(Some(self.descriptor.instance_from_row(row)?)),
            None => Ok(None),
        }
    }

    pub fn list_by_ids(&self, ids: &[Value]) -> Result<Vec<Box<dyn Any>>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self.store.select_by_ids(&self.descriptor, ids)?;
        self.instances(rows)
    }

    /// Static mode with a template and no specs, dynamic mode otherwise.
    pub fn list_by_condition(&self, template: Option<&dyn Any>, specs: &[&QuerySpec]) -> Result<Vec<Box<dyn Any>>> {
        let spec = Self::merged_spec(specs);
        let statement = self.compiler.compile_select(&self.descriptor, template, spec.as_ref())?;
        let rows = self.store.select(&self.descriptor, &statement, None)?;
        self.instances(rows)
    }

    pub fn page_by_condition(
        &self,
        template: Option<&dyn Any>,
        page_num: i64,
        page_size: i64,
        specs: &[&QuerySpec],
    ) -> Result<Page<Box<dyn Any>>> {
        let spec = Self::merged_spec(specs);
        let statement = self.compiler.compile_select(&self.descriptor, template, spec.as_ref())?;
        let page = self.store.select_page(&self.descriptor, &statement, page_num, page_size)?;
        page.try_convert(|row| self.descriptor.instance_from_row(row))
    }

    pub fn count_by_condition(&self, template: Option<&dyn Any>, conditions: &[&ConditionSet]) -> Result<u64> {
        let predicate = self.predicate(template, conditions)?;
        self.store.count(&self.descriptor, &predicate)
    }

    /// Identities of the rows matching `conditions`, selecting only the
    /// identity column.
    pub fn select_ids(&self, conditions: &ConditionSet) -> Result<Vec<Value>> {
        let id_field = self.descriptor.require_id_field()?;
        let spec = QuerySpec::filter(conditions.clone()).select([id_field.name.as_str()]);
        let statement = self.compiler.compile_select(&self.descriptor, None, Some(&spec))?;
        let rows = self.store.select(&self.descriptor, &statement, None)?;
        let mut ids = Vec::with_capacity(rows.len());
        for mut row in rows {
            let value = row.shift_remove(&id_field.column).unwrap_or(Value::Null);
            let value = if value.is_null() || id_field.field_type.data_type.is_compatible(&value) {
                value
            } else {
                value.cast_to(&id_field.field_type.data_type)?
            };
            ids.push(value);
        }
        Ok(ids)
    }
}
