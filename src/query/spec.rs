use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::query::condition::ConditionSet;
use crate::query::sorter::SortSpec;

pub const SELECT_ALL: &str = "*";

/// Projection, filter and ordering of one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    select: IndexSet<String>,
    conditions: ConditionSet,
    sorter: SortSpec,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(conditions: ConditionSet) -> Self {
        Self { conditions, ..Self::default() }
    }

    pub fn select<'a>(mut self, fields: impl IntoIterator<Item = &'a str>) -> Self {
        self.select.extend(fields.into_iter().map(str::to_string));
        self
    }

    pub fn conditions(mut self, conditions: ConditionSet) -> Self {
        self.conditions.combine(&conditions);
        self
    }

    pub fn sort(mut self, sorter: SortSpec) -> Self {
        self.sorter.combine(&sorter);
        self
    }

    pub fn get_conditions(&self) -> &ConditionSet {
        &self.conditions
    }

    pub fn get_sorter(&self) -> &SortSpec {
        &self.sorter
    }

    pub fn selected(&self) -> impl Iterator<Item = &str> {
        self.select.iter().map(String::as_str)
    }

    /// Fields to project out of `all_fields`, keeping their order. An empty
    /// selection, or one containing `*`, selects everything.
    pub fn select_fields<'a>(&self, all_fields: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
        let select_all = self.select.is_empty() || self.select.contains(SELECT_ALL);
        all_fields
            .into_iter()
            .filter(|field| select_all || self.select.contains(*field))
            .collect()
    }

    pub fn combine(&mut self, other: &QuerySpec) -> &mut Self {
        self.select.extend(other.select.iter().cloned());
        self.conditions.combine(&other.conditions);
        self.sorter.combine(&other.sorter);
        self
    }

    /// Folds `specs` into the first one, skipping repeated references to it.
    pub fn merge_all(specs: &[&QuerySpec]) -> QuerySpec {
        let Some((first, rest)) = specs.split_first() else {
            return QuerySpec::new();
        };
        let mut result = (*first).clone();
        for spec in rest {
            if !std::ptr::eq(*first, *spec) {
                result.combine(spec);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_fields_defaults_to_all() {
        let all = ["id", "name", "age"];
        assert_eq!(QuerySpec::new().select_fields(all), all.to_vec());
        assert_eq!(QuerySpec::new().select(["*", "name"]).select_fields(all), all.to_vec());
    }

    #[test]
    fn test_select_fields_intersects_in_declared_order() {
        let spec = QuerySpec::new().select(["age", "missing", "id"]);
        assert_eq!(spec.select_fields(["id", "name", "age"]), vec!["id", "age"]);
    }

    #[test]
    fn test_merge_all_combines_every_part() {
        let a = QuerySpec::filter(ConditionSet::new().equal("name", "x")).select(["id"]);
        let b = QuerySpec::new()
            .select(["name"])
            .conditions(ConditionSet::new().greater_than("age", 3i64))
            .sort(SortSpec::new().desc("age"));

        let merged = QuerySpec::merge_all(&[&a, &b, &a]);
        assert_eq!(merged.selected().collect::<Vec<_>>(), vec!["id", "name"]);
        assert!(merged.get_conditions().get("age").is_some());
        assert_eq!(merged.get_sorter().iter().collect::<Vec<_>>(), vec![("age", false)]);
    }
}
