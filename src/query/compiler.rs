//! Turns descriptors plus declarative queries into backend statements.

use std::any::Any;

use crate::core::{Result, Value};
use crate::model::ModelDescriptor;
use crate::query::condition::{ConditionSet, ConditionType};
use crate::query::sorter::SortSpec;
use crate::query::spec::QuerySpec;

#[derive(Debug, Clone, PartialEq)]
pub struct PredicateClause {
    pub field: String,
    pub column: String,
    pub operator: ConditionType,
    /// `Null` for `IS NULL` / `IS NOT NULL`; a list for `IN` / `NOT IN`.
    pub value: Value,
}

/// Conjunction of clauses. An empty predicate matches every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledPredicate {
    pub clauses: Vec<PredicateClause>,
}

impl CompiledPredicate {
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectedColumn {
    pub field: String,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerm {
    pub column: String,
    pub ascending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub table: String,
    pub projection: Vec<ProjectedColumn>,
    pub predicate: CompiledPredicate,
    pub order_by: Vec<OrderTerm>,
}

pub trait QueryCompiler: Send + Sync {
    /// Compiles a filter.
    ///
    /// * template only: static mode, one equality per declared field bound to
    ///   the template's value, nulls included.
    /// * conditions given: dynamic mode. Only conditioned fields take part
    ///   unless a template is present, in which case unconditioned fields bind
    ///   to the template. Entries that resolve to null are left out.
    fn compile_predicate(
        &self,
        model: &ModelDescriptor,
        template: Option<&dyn Any>,
        conditions: Option<&ConditionSet>,
    ) -> Result<CompiledPredicate>;

    fn compile_projection(&self, model: &ModelDescriptor, spec: Option<&QuerySpec>) -> Vec<ProjectedColumn>;

    fn compile_sort(&self, model: &ModelDescriptor, sorter: &SortSpec) -> Vec<OrderTerm>;

    fn compile_select(
        &self,
        model: &ModelDescriptor,
        template: Option<&dyn Any>,
        spec: Option<&QuerySpec>,
    ) -> Result<SelectStatement> {
        let predicate = self.compile_predicate(model, template, spec.map(QuerySpec::get_conditions))?;
        let order_by = spec.map(|spec| self.compile_sort(model, spec.get_sorter())).unwrap_or_default();
        Ok(SelectStatement {
            table: model.table().to_string(),
            projection: self.compile_projection(model, spec),
            predicate,
            order_by,
        })
    }
}

/// The compiler used unless a backend supplies its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCompiler;

impl QueryCompiler for StandardCompiler {
    fn compile_predicate(
        &self,
        model: &ModelDescriptor,
        template: Option<&dyn Any>,
        conditions: Option<&ConditionSet>,
    ) -> Result<CompiledPredicate> {
        let mut clauses = Vec::new();

        let Some(conditions) = conditions else {
            if let Some(template) = template {
                for field in model.fields() {
                    clauses.push(PredicateClause {
                        field: field.name.clone(),
                        column: field.column.clone(),
                        operator: ConditionType::Equal,
                        value: field.get(template)?,
                    });
                }
            }
            return Ok(CompiledPredicate { clauses });
        };

        let need_null_value = template.is_some();
        for field in model.fields() {
            for entry in conditions.condition_infos(&field.name, need_null_value) {
                let value = if entry.operator.ignores_value() {
                    Value::Null
                } else if entry.value.is_null() {
                    match template {
                        Some(template) => field.get(template)?,
                        None => Value::Null,
                    }
                } else {
                    entry.value
                };

                if value.is_null() && !entry.operator.ignores_value() {
                    continue;
                }

                let value = match (entry.operator.takes_list(), value) {
                    (true, Value::List(items)) if items.is_empty() => continue,
                    (true, Value::List(items)) => Value::List(items),
                    (true, scalar) => Value::List(vec![scalar]),
                    (false, value) => value,
                };

                clauses.push(PredicateClause {
                    field: field.name.clone(),
                    column: field.column.clone(),
                    operator: entry.operator,
                    value,
                });
            }
        }

        Ok(CompiledPredicate { clauses })
    }

    fn compile_projection(&self, model: &ModelDescriptor, spec: Option<&QuerySpec>) -> Vec<ProjectedColumn> {
        let selected = match spec {
            Some(spec) => spec.select_fields(model.field_names()),
            None => model.field_names().collect(),
        };
        selected
            .into_iter()
            .filter_map(|name| model.field(name))
            .map(|field| ProjectedColumn { field: field.name.clone(), column: field.column.clone() })
            .collect()
    }

    fn compile_sort(&self, model: &ModelDescriptor, sorter: &SortSpec) -> Vec<OrderTerm> {
        sorter
            .iter()
            .filter_map(|(name, ascending)| {
                model.field(name).map(|field| OrderTerm { column: field.column.clone(), ascending })
            })
            .collect()
    }
}
