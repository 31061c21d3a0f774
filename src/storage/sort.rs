// ============================================================================
// src/storage/sort.rs - ORDER BY over stored rows
// ============================================================================
//
// - Multi-column sorting, stable for equal keys
// - NULLS LAST for ASC, NULLS FIRST for DESC
// - Type mismatches between compared values surface as errors
//
// ============================================================================

use crate::core::{DbError, Result, Row, Value};
use crate::query::OrderTerm;
use std::cmp::Ordering;

// ============================================================================
// NULL HANDLING STRATEGY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullOrdering {
    NullsFirst,
    NullsLast,
}

impl NullOrdering {
    pub fn default_for_direction(descending: bool) -> Self {
        if descending {
            Self::NullsFirst
        } else {
            Self::NullsLast
        }
    }
}

// ============================================================================
// SORT KEY
// ============================================================================

#[derive(Debug, Clone)]
pub struct SortKey {
    pub column: String,
    pub descending: bool,
    pub null_ordering: NullOrdering,
}

impl SortKey {
    pub fn new(column: impl Into<String>, descending: bool) -> Self {
        Self {
            column: column.into(),
            descending,
            null_ordering: NullOrdering::default_for_direction(descending),
        }
    }
}

impl From<&OrderTerm> for SortKey {
    fn from(term: &OrderTerm) -> Self {
        Self::new(term.column.clone(), !term.ascending)
    }
}

// ============================================================================
// ROW COMPARATOR
// ============================================================================

pub struct RowComparator<'a> {
    sort_keys: &'a [SortKey],
}

impl<'a> RowComparator<'a> {
    pub fn new(sort_keys: &'a [SortKey]) -> Self {
        Self { sort_keys }
    }

    pub fn compare(&self, row1: &Row, row2: &Row) -> Result<Ordering> {
        for key in self.sort_keys {
            let value1 = row1.get(&key.column).unwrap_or(&Value::Null);
            let value2 = row2.get(&key.column).unwrap_or(&Value::Null);

            let ordering = compare_values(value1, value2, key)?;
            if ordering != Ordering::Equal {
                return Ok(ordering);
            }
        }
        Ok(Ordering::Equal)
    }
}

fn compare_values(value1: &Value, value2: &Value, key: &SortKey) -> Result<Ordering> {
    let ordering = match (value1.is_null(), value2.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => match key.null_ordering {
            NullOrdering::NullsFirst => Ordering::Less,
            NullOrdering::NullsLast => Ordering::Greater,
        },
        (false, true) => match key.null_ordering {
            NullOrdering::NullsFirst => Ordering::Greater,
            NullOrdering::NullsLast => Ordering::Less,
        },
        (false, false) => value1.partial_cmp(value2).ok_or_else(|| {
            DbError::TypeMismatch(format!(
                "Cannot compare {} with {}",
                value1.type_name(),
                value2.type_name()
            ))
        })?,
    };

    // the null placement is already direction-aware
    Ok(if key.descending && !(value1.is_null() || value2.is_null()) {
        ordering.reverse()
    } else {
        ordering
    })
}

// ============================================================================
// SORT EXECUTOR
// ============================================================================

pub struct SortExecutor;

impl SortExecutor {
    /// Stable in-place sort; the first comparison error aborts the sort.
    pub fn sort(rows: &mut [Row], sort_keys: &[SortKey]) -> Result<()> {
        if rows.len() < 2 || sort_keys.is_empty() {
            return Ok(());
        }

        let comparator = RowComparator::new(sort_keys);
        let mut failure = None;
        rows.sort_by(|row1, row2| match comparator.compare(row1, row2) {
            Ok(ordering) => ordering,
            Err(e) => {
                failure.get_or_insert(e);
                Ordering::Equal
            }
        });

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_null_ordering_defaults() {
        assert_eq!(NullOrdering::default_for_direction(false), NullOrdering::NullsLast);
        assert_eq!(NullOrdering::default_for_direction(true), NullOrdering::NullsFirst);
    }

    #[test]
    fn test_multi_key_sort() {
        let mut rows = vec![
            row(&[("dept", Value::from("b")), ("age", Value::Integer(30))]),
            row(&[("dept", Value::from("a")), ("age", Value::Integer(20))]),
            row(&[("dept", Value::from("b")), ("age", Value::Integer(40))]),
        ];
        let keys = vec![SortKey::new("dept", false), SortKey::new("age", true)];
        SortExecutor::sort(&mut rows, &keys).unwrap();

        let ages: Vec<_> = rows.iter().map(|r| r["age"].clone()).collect();
        assert_eq!(ages, vec![Value::Integer(20), Value::Integer(40), Value::Integer(30)]);
    }

    #[test]
    fn test_nulls_follow_direction() {
        let mut rows = vec![
            row(&[("v", Value::Null)]),
            row(&[("v", Value::Integer(1))]),
            row(&[("v", Value::Integer(2))]),
        ];
        SortExecutor::sort(&mut rows, &[SortKey::new("v", false)]).unwrap();
        assert!(rows[2]["v"].is_null());

        SortExecutor::sort(&mut rows, &[SortKey::new("v", true)]).unwrap();
        assert!(rows[0]["v"].is_null());
        assert_eq!(rows[1]["v"], Value::Integer(2));
    }

    #[test]
    fn test_incomparable_values_fail() {
        let mut rows = vec![row(&[("v", Value::from("x"))]), row(&[("v", Value::Integer(1))])];
        assert!(SortExecutor::sort(&mut rows, &[SortKey::new("v", false)]).is_err());
    }
}
