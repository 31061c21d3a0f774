pub mod filter;
pub mod memory;
pub mod sort;
pub mod table;

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{DbError, Result, Row, Value};
use crate::model::ModelDescriptor;
use crate::query::{CompiledPredicate, Page, SelectStatement};

pub use memory::InMemoryRowStore;
pub use table::{Table, TableStats};

#[derive(Debug, Clone, PartialEq)]
pub struct InsertOutcome {
    pub affected: u64,
    /// Key assigned by the store, when it assigned one.
    pub generated_id: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchInsertOutcome {
    pub affected: u64,
    /// One entry per inserted row, in input order.
    pub generated_ids: Vec<Option<Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowWindow {
    pub offset: u64,
    pub limit: u64,
}

/// Backend that executes compiled statements against one table per model.
///
/// Filtered deletes and updates must refuse an empty predicate; see
/// [`refuse_unconditional`].
pub trait RowStore: Send + Sync {
    fn insert(&self, model: &ModelDescriptor, row: Row) -> Result<InsertOutcome>;

    fn batch_insert(&self, model: &ModelDescriptor, rows: Vec<Row>) -> Result<BatchInsertOutcome>;

    fn delete_by_id(&self, model: &ModelDescriptor, id: &Value) -> Result<u64>;

    fn delete_by_ids(&self, model: &ModelDescriptor, ids: &[Value]) -> Result<u64>;

    fn delete_by_filter(&self, model: &ModelDescriptor, predicate: &CompiledPredicate) -> Result<u64>;

    fn update_by_id(&self, model: &ModelDescriptor, id: &Value, assignments: Row) -> Result<u64>;

    fn update_by_filter(
        &self,
        model: &ModelDescriptor,
        assignments: Row,
        predicate: &CompiledPredicate,
    ) -> Result<u64>;

    fn select_by_id(&self, model: &ModelDescriptor, id: &Value) -> Result<Option<Row>>;

    fn select_by_ids(&self, model: &ModelDescriptor, ids: &[Value]) -> Result<Vec<Row>>;

    fn select(
        &self,
        model: &ModelDescriptor,
        statement: &SelectStatement,
        window: Option<RowWindow>,
    ) -> Result<Vec<Row>>;

    fn count(&self, model: &ModelDescriptor, predicate: &CompiledPredicate) -> Result<u64>;

    /// Counts first; a zero total returns an empty page without running the
    /// row query.
    fn select_page(
        &self,
        model: &ModelDescriptor,
        statement: &SelectStatement,
        page_num: i64,
        page_size: i64,
    ) -> Result<Page<Row>> {
        let total = self.count(model, &statement.predicate)?;
        let page = Page::of(page_num, page_size, i64::try_from(total).unwrap_or(i64::MAX));
        if total == 0 || page_size <= 0 {
            return Ok(page);
        }
        let window = RowWindow { offset: page.offset as u64, limit: page_size as u64 };
        let rows = self.select(model, statement, Some(window))?;
        Ok(page.with_items(rows))
    }
}

pub fn refuse_unconditional(operation: &str, model: &ModelDescriptor, predicate: &CompiledPredicate) -> Result<()> {
    if predicate.is_empty() {
        return Err(DbError::UnsupportedOperation(format!(
            "unconditional {} on '{}' is not supported",
            operation,
            model.table()
        )));
    }
    Ok(())
}

/// Routes a descriptor's datasource name to the store that serves it.
#[derive(Clone, Default)]
pub struct Datasources {
    stores: HashMap<String, Arc<dyn RowStore>>,
}

impl Datasources {
    pub fn new() -> Self {
        Self::default()
    }

    /// A single store serving the default (`""`) datasource.
    pub fn single(store: Arc<dyn RowStore>) -> Self {
        Self::new().with("", store)
    }

    pub fn with(mut self, name: &str, store: Arc<dyn RowStore>) -> Self {
        self.stores.insert(name.to_string(), store);
        self
    }

    pub fn store_for(&self, model: &ModelDescriptor) -> Result<Arc<dyn RowStore>> {
        self.stores.get(model.datasource()).cloned().ok_or_else(|| {
            DbError::configuration(format!(
                "no datasource '{}' registered for model '{}'",
                model.datasource(),
                model.name()
            ))
        })
    }
}
