use std::collections::BTreeMap;

use crate::core::{DbError, Result, Row, Value};
use crate::query::CompiledPredicate;
use crate::storage::filter::matches;

/// Per-table operation counters of the in-memory store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableStats {
    pub rows_inserted: u64,
    pub rows_updated: u64,
    pub rows_deleted: u64,
    pub row_queries: u64,
    pub count_queries: u64,
}

/// Rows of one table in insertion order, addressed by an internal row id.
#[derive(Debug)]
pub struct Table {
    name: String,
    id_column: Option<String>,
    rows: BTreeMap<usize, Row>,
    next_row_id: usize,
    next_key: i64,
    pub(crate) stats: TableStats,
}

impl Table {
    pub fn new(name: impl Into<String>, id_column: Option<String>) -> Self {
        Self {
            name: name.into(),
            id_column,
            rows: BTreeMap::new(),
            next_row_id: 0,
            next_key: 1,
            stats: TableStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Inserts a row. When `assign_key` is set and the identity column is
    /// empty, the next auto-increment key is assigned and returned.
    pub fn insert(&mut self, mut row: Row, assign_key: bool) -> Result<Option<Value>> {
        let mut generated = None;
        if let Some(id_column) = self.id_column.clone() {
            let current = row.get(&id_column).cloned().unwrap_or(Value::Null);
            if current.is_null() {
                if assign_key {
                    let key = Value::Integer(self.next_key);
                    self.next_key += 1;
                    row.insert(id_column, key.clone());
                    generated = Some(key);
                }
            } else {
                if self.find_row_id(&current).is_some() {
                    return Err(DbError::ExecutionError(format!(
                        "duplicate key {} in table '{}'",
                        current, self.name
                    )));
                }
                if let Some(explicit) = current.as_i64() {
                    self.next_key = self.next_key.max(explicit + 1);
                }
            }
        }

        self.rows.insert(self.next_row_id, row);
        self.next_row_id += 1;
        self.stats.rows_inserted += 1;
        Ok(generated)
    }

    pub fn find_row_id(&self, id: &Value) -> Option<usize> {
        let id_column = self.id_column.as_ref()?;
        self.rows
            .iter()
            .find(|(_, row)| row.get(id_column).is_some_and(|value| !value.is_null() && value == id))
            .map(|(row_id, _)| *row_id)
    }

    pub fn get(&self, row_id: usize) -> Option<&Row> {
        self.rows.get(&row_id)
    }

    /// Row ids matching `predicate`, in insertion order.
    pub fn matching(&self, predicate: &CompiledPredicate) -> Result<Vec<usize>> {
        let mut ids = Vec::new();
        for (row_id, row) in &self.rows {
            if matches(row, predicate)? {
                ids.push(*row_id);
            }
        }
        Ok(ids)
    }

    pub fn update(&mut self, row_id: usize, assignments: &Row) -> bool {
        let Some(row) = self.rows.get_mut(&row_id) else {
            return false;
        };
        for (column, value) in assignments {
            row.insert(column.clone(), value.clone());
        }
        self.stats.rows_updated += 1;
        true
    }

    pub fn delete(&mut self, row_id: usize) -> bool {
        let removed = self.rows.remove(&row_id).is_some();
        if removed {
            self.stats.rows_deleted += 1;
        }
        removed
    }

    pub fn scan(&self) -> Vec<Row> {
        self.rows.values().cloned().collect()
    }
}
