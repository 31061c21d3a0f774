use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::trace;

use super::sort::{SortExecutor, SortKey};
use super::table::{Table, TableStats};
use super::{refuse_unconditional, BatchInsertOutcome, InsertOutcome, RowStore, RowWindow};
use crate::core::{Result, Row, Value};
use crate::model::ModelDescriptor;
use crate::query::{CompiledPredicate, SelectStatement};

/// Row store keeping every table in process memory.
///
/// Tables are created on first use; each one sits behind its own lock so
/// work on different tables does not contend.
#[derive(Default)]
pub struct InMemoryRowStore {
    tables: RwLock<HashMap<String, Arc<RwLock<Table>>>>,
}

impl InMemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table_for(&self, model: &ModelDescriptor) -> Result<Arc<RwLock<Table>>> {
        if let Some(table) = self.tables.read()?.get(model.table()) {
            return Ok(Arc::clone(table));
        }
        let mut tables = self.tables.write()?;
        let table = tables.entry(model.table().to_string()).or_insert_with(|| {
            let id_column = model.id_field().map(|field| field.column.clone());
            Arc::new(RwLock::new(Table::new(model.table(), id_column)))
        });
        Ok(Arc::clone(table))
    }

    /// Every row currently stored in `table`, in insertion order.
    pub fn rows(&self, table: &str) -> Result<Vec<Row>> {
        match self.tables.read()?.get(table) {
            Some(handle) => Ok(handle.read()?.scan()),
            None => Ok(Vec::new()),
        }
    }

    pub fn table_stats(&self, table: &str) -> Result<TableStats> {
        match self.tables.read()?.get(table) {
            Some(handle) => Ok(handle.read()?.stats),
            None => Ok(TableStats::default()),
        }
    }

    pub fn list_tables(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.tables.read()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

fn store_assigns_key(model: &ModelDescriptor) -> bool {
    model
        .id_field()
        .and_then(|field| field.identity.as_ref())
        .is_some_and(|identity| identity.strategy.is_store_assigned())
}

fn id_column(model: &ModelDescriptor) -> Result<String> {
    Ok(model.require_id_field()?.column.clone())
}

fn project(row: &Row, statement: &SelectStatement) -> Row {
    statement
        .projection
        .iter()
        .map(|column| (column.column.clone(), row.get(&column.column).cloned().unwrap_or(Value::Null)))
        .collect()
}

impl RowStore for InMemoryRowStore {
    fn insert(&self, model: &ModelDescriptor, row: Row) -> Result<InsertOutcome> {
        let handle = self.table_for(model)?;
        let mut table = handle.write()?;
        let generated_id = table.insert(row, store_assigns_key(model))?;
        trace!(table = model.table(), "inserted row");
        Ok(InsertOutcome { affected: 1, generated_id })
    }

    fn batch_insert(&self, model: &ModelDescriptor, rows: Vec<Row>) -> Result<BatchInsertOutcome> {
        let handle = self.table_for(model)?;
        let mut table = handle.write()?;
        let assign = store_assigns_key(model);
        let mut outcome = BatchInsertOutcome::default();
        for row in rows {
            outcome.generated_ids.push(table.insert(row, assign)?);
            outcome.affected += 1;
        }
        trace!(table = model.table(), rows = outcome.affected, "batch inserted rows");
        Ok(outcome)
    }

    fn delete_by_id(&self, model: &ModelDescriptor, id: &Value) -> Result<u64> {
        self.delete_by_ids(model, std::slice::from_ref(id))
    }

    fn delete_by_ids(&self, model: &ModelDescriptor, ids: &[Value]) -> Result<u64> {
        id_column(model)?;
        let handle = self.table_for(model)?;
        let mut table = handle.write()?;
        let mut deleted = 0;
        for id in ids.iter().filter(|id| !id.is_null()) {
            if let Some(row_id) = table.find_row_id(id) {
                if table.delete(row_id) {
                    deleted += 1;
                }
            }
        }
        Ok(deleted)
    }

    fn delete_by_filter(&self, model: &ModelDescriptor, predicate: &CompiledPredicate) -> Result<u64> {
        refuse_unconditional("delete", model, predicate)?;
        let handle = self.table_for(model)?;
        let mut table = handle.write()?;
        let mut deleted = 0;
        for row_id in table.matching(predicate)? {
            if table.delete(row_id) {
                deleted += 1;
            }
        }
        trace!(table = model.table(), rows = deleted, "deleted rows by filter");
        Ok(deleted)
    }

    fn update_by_id(&self, model: &ModelDescriptor, id: &Value, assignments: Row) -> Result<u64> {
        id_column(model)?;
        if id.is_null() {
            return Ok(0);
        }
        let handle = self.table_for(model)?;
        let mut table = handle.write()?;
        match table.find_row_id(id) {
            Some(row_id) if table.update(row_id, &assignments) => Ok(1),
            _ => Ok(0),
        }
    }

    fn update_by_filter(
        &self,
        model: &ModelDescriptor,
        assignments: Row,
        predicate: &CompiledPredicate,
    ) -> Result<u64> {
        refuse_unconditional("update", model, predicate)?;
        let handle = self.table_for(model)?;
        let mut table = handle.write()?;
        let mut updated = 0;
        for row_id in table.matching(predicate)? {
            if table.update(row_id, &assignments) {
                updated += 1;
            }
        }
        Ok(updated)
    }

    fn select_by_id(&self, model: &ModelDescriptor, id: &Value) -> Result<Option<Row>> {
        Ok(self.select_by_ids(model, std::slice::from_ref(id))?.into_iter().next())
    }

    fn select_by_ids(&self, model: &ModelDescriptor, ids: &[Value]) -> Result<Vec<Row>> {
        id_column(model)?;
        let handle = self.table_for(model)?;
        let mut table = handle.write()?;
        table.stats.row_queries += 1;
        let rows = ids
            .iter()
            .filter(|id| !id.is_null())
            .filter_map(|id| table.find_row_id(id))
            .filter_map(|row_id| table.get(row_id).cloned())
            .collect();
        Ok(rows)
    }

    fn select(
        &self,
        model: &ModelDescriptor,
        statement: &SelectStatement,
        window: Option<RowWindow>,
    ) -> Result<Vec<Row>> {
        let handle = self.table_for(model)?;
        let mut rows = {
            let mut table = handle.write()?;
            table.stats.row_queries += 1;
            let mut rows = Vec::new();
            for row_id in table.matching(&statement.predicate)? {
                if let Some(row) = table.get(row_id) {
                    rows.push(row.clone());
                }
            }
            rows
        };

        let keys: Vec<SortKey> = statement.order_by.iter().map(SortKey::from).collect();
        SortExecutor::sort(&mut rows, &keys)?;

        let rows = match window {
            Some(window) => rows
                .into_iter()
                .skip(window.offset as usize)
                .take(window.limit as usize)
                .collect(),
            None => rows,
        };
        Ok(rows.iter().map(|row| project(row, statement)).collect())
    }

    fn count(&self, model: &ModelDescriptor, predicate: &CompiledPredicate) -> Result<u64> {
        let handle = self.table_for(model)?;
        let mut table = handle.write()?;
        table.stats.count_queries += 1;
        Ok(table.matching(predicate)?.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DataType;
    use crate::model::{DynamicModel, IdentityStrategy, ModelRegistry};
    use crate::query::{ConditionSet, QueryCompiler, QuerySpec, SortSpec, StandardCompiler};

    fn descriptor() -> Arc<ModelDescriptor> {
        let registry = ModelRegistry::default();
        let mut model = DynamicModel::new("item");
        model.set_id("id", DataType::Integer, IdentityStrategy::StoreAssigned).unwrap();
        model.add_field("name", DataType::Text).unwrap();
        model.add_field("qty", DataType::Integer).unwrap();
        registry.register_dynamic(model).unwrap()
    }

    fn row(name: &str, qty: i64) -> Row {
        [
            ("id".to_string(), Value::Null),
            ("name".to_string(), Value::from(name)),
            ("qty".to_string(), Value::Integer(qty)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_store_assigns_keys() {
        let model = descriptor();
        let store = InMemoryRowStore::new();
        let outcome = store.insert(&model, row("a", 1)).unwrap();
        assert_eq!(outcome.generated_id, Some(Value::Integer(1)));

        let batch = store.batch_insert(&model, vec![row("b", 2), row("c", 3)]).unwrap();
        assert_eq!(batch.generated_ids, vec![Some(Value::Integer(2)), Some(Value::Integer(3))]);
        assert_eq!(store.rows(model.table()).unwrap().len(), 3);
    }

    #[test]
    fn test_unconditional_filters_are_refused() {
        let model = descriptor();
        let store = InMemoryRowStore::new();
        store.insert(&model, row("a", 1)).unwrap();
        let empty = CompiledPredicate::default();
        assert!(store.delete_by_filter(&model, &empty).is_err());
        assert!(store.update_by_filter(&model, Row::new(), &empty).is_err());
        assert_eq!(store.rows(model.table()).unwrap().len(), 1);
    }

    #[test]
    fn test_select_sorts_windows_and_projects() {
        let model = descriptor();
        let store = InMemoryRowStore::new();
        for (name, qty) in [("a", 3), ("b", 1), ("c", 2), ("d", 0)] {
            store.insert(&model, row(name, qty)).unwrap();
        }

        let spec = QuerySpec::filter(ConditionSet::new().greater_than("qty", 0))
            .select(["name"])
            .sort(SortSpec::new().asc("qty"));
        let statement = StandardCompiler.compile_select(&model, None, Some(&spec)).unwrap();
        let rows = store.select(&model, &statement, Some(RowWindow { offset: 1, limit: 5 })).unwrap();

        let names: Vec<_> = rows.iter().map(|r| r["name"].clone()).collect();
        assert_eq!(names, vec![Value::from("c"), Value::from("a")]);
        assert_eq!(rows[0].len(), 1);
    }

    #[test]
    fn test_select_page_far_past_the_end() {
        let model = descriptor();
        let store = InMemoryRowStore::new();
        store.insert(&model, row("a", 1)).unwrap();

        let statement = StandardCompiler.compile_select(&model, None, Some(&QuerySpec::new())).unwrap();
        let page = store.select_page(&model, &statement, i64::MAX, 10).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.offset, i64::MAX);
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_update_and_delete_by_id() {
        let model = descriptor();
        let store = InMemoryRowStore::new();
        store.insert(&model, row("a", 1)).unwrap();

        let assignments: Row = [("qty".to_string(), Value::Integer(9))].into_iter().collect();
        assert_eq!(store.update_by_id(&model, &Value::Integer(1), assignments.clone()).unwrap(), 1);
        assert_eq!(store.update_by_id(&model, &Value::Integer(7), assignments).unwrap(), 0);
        assert_eq!(store.select_by_id(&model, &Value::Integer(1)).unwrap().unwrap()["qty"], Value::Integer(9));

        assert_eq!(store.delete_by_id(&model, &Value::Integer(1)).unwrap(), 1);
        assert!(store.select_by_id(&model, &Value::Integer(1)).unwrap().is_none());
        assert_eq!(store.table_stats(model.table()).unwrap().rows_deleted, 1);
    }
}
