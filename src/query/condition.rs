use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionType {
    #[default]
    Equal,
    NotEqual,
    /// `%value%`
    LikeAll,
    /// `%value`
    LikeLeft,
    /// `value%`
    LikeRight,
    GreaterThan,
    GreaterEqual,
    LessThan,
    LessEqual,
    IsNull,
    NotNull,
    In,
    NotIn,
}

impl ConditionType {
    /// `IS NULL` / `IS NOT NULL` carry no operand.
    pub fn ignores_value(&self) -> bool {
        matches!(self, Self::IsNull | Self::NotNull)
    }

    pub fn takes_list(&self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Self::Equal => "=",
            Self::NotEqual => "<>",
            Self::LikeAll | Self::LikeLeft | Self::LikeRight => "LIKE",
            Self::GreaterThan => ">",
            Self::GreaterEqual => ">=",
            Self::LessThan => "<",
            Self::LessEqual => "<=",
            Self::IsNull => "IS NULL",
            Self::NotNull => "IS NOT NULL",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
        };
        write!(f, "{}", op)
    }
}

/// One condition on a field. A [`Value::Null`] value means "no operand":
/// the entry is bound to a template instance or dropped when compiled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionEntry {
    pub index: usize,
    pub operator: ConditionType,
    pub value: Value,
}

/// Ordered field conditions; every entry is AND-ed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionSet {
    conditions: IndexMap<String, Vec<ConditionEntry>>,
}

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a condition, normalizing `values`.
    ///
    /// Nulls are dropped; `in`/`not in` operands are flattened. What remains
    /// becomes a scalar (one value), a list (several) or no value at all.
    pub fn push(&mut self, field: &str, operator: ConditionType, values: Vec<Value>) -> &mut Self {
        let value = normalize(operator, values);
        let entries = self.conditions.entry(field.to_string()).or_default();
        let index = entries.len();
        entries.push(ConditionEntry { index, operator, value });
        self
    }

    pub fn add<V: Into<Value>>(
        mut self,
        field: &str,
        operator: ConditionType,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.push(field, operator, values);
        self
    }

    /// `in` for list values, `equal` otherwise.
    pub fn add_value(self, field: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        let operator = if matches!(value, Value::List(_)) {
            ConditionType::In
        } else {
            ConditionType::Equal
        };
        self.add(field, operator, [value])
    }

    pub fn equal(self, field: &str, value: impl Into<Value>) -> Self {
        self.add(field, ConditionType::Equal, [value.into()])
    }

    pub fn not_equal(self, field: &str, value: impl Into<Value>) -> Self {
        self.add(field, ConditionType::NotEqual, [value.into()])
    }

    pub fn like(self, field: &str, value: impl Into<Value>) -> Self {
        self.add(field, ConditionType::LikeAll, [value.into()])
    }

    pub fn like_left(self, field: &str, value: impl Into<Value>) -> Self {
        self.add(field, ConditionType::LikeLeft, [value.into()])
    }

    pub fn like_right(self, field: &str, value: impl Into<Value>) -> Self {
        self.add(field, ConditionType::LikeRight, [value.into()])
    }

    pub fn greater_than(self, field: &str, value: impl Into<Value>) -> Self {
        self.add(field, ConditionType::GreaterThan, [value.into()])
    }

    pub fn greater_equal(self, field: &str, value: impl Into<Value>) -> Self {
        self.add(field, ConditionType::GreaterEqual, [value.into()])
    }

    pub fn less_than(self, field: &str, value: impl Into<Value>) -> Self {
        self.add(field, ConditionType::LessThan, [value.into()])
    }

    pub fn less_equal(self, field: &str, value: impl Into<Value>) -> Self {
        self.add(field, ConditionType::LessEqual, [value.into()])
    }

    /// Two entries on the same field: `>= low` and `<= high`.
    pub fn between(self, field: &str, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        self.greater_equal(field, low).less_equal(field, high)
    }

    pub fn is_null(self, field: &str) -> Self {
        self.add(field, ConditionType::IsNull, Vec::<Value>::new())
    }

    pub fn not_null(self, field: &str) -> Self {
        self.add(field, ConditionType::NotNull, Vec::<Value>::new())
    }

    pub fn in_list<V: Into<Value>>(self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.add(field, ConditionType::In, values)
    }

    pub fn not_in<V: Into<Value>>(self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.add(field, ConditionType::NotIn, values)
    }

    /// Appends every entry of `other`, field by field, re-indexing as it goes.
    pub fn combine(&mut self, other: &ConditionSet) -> &mut Self {
        for (field, entries) in &other.conditions {
            for entry in entries {
                self.push(field, entry.operator, vec![entry.value.clone()]);
            }
        }
        self
    }

    /// `self` combined with `other`; combining a set with itself returns it unchanged.
    pub fn merged(&self, other: &ConditionSet) -> ConditionSet {
        let mut result = self.clone();
        if !std::ptr::eq(self, other) {
            result.combine(other);
        }
        result
    }

    /// Folds `sets` into the first one, skipping repeated references to it.
    pub fn merge_all(sets: &[&ConditionSet]) -> ConditionSet {
        let Some((first, rest)) = sets.split_first() else {
            return ConditionSet::new();
        };
        let mut result = (*first).clone();
        for set in rest {
            if !std::ptr::eq(*first, *set) {
                result.combine(set);
            }
        }
        result
    }

    /// Entries for `field`.
    ///
    /// With `need_null_value` set, at least one entry is returned: an implicit
    /// `equal` without operand stands in when the field has no condition.
    /// Without it, entries lacking an operand are filtered out unless their
    /// operator takes none.
    pub fn condition_infos(&self, field: &str, need_null_value: bool) -> Vec<ConditionEntry> {
        let entries = self.conditions.get(field).map(Vec::as_slice).unwrap_or_default();
        if need_null_value {
            if entries.is_empty() {
                return vec![ConditionEntry { index: 0, operator: ConditionType::Equal, value: Value::Null }];
            }
            return entries.to_vec();
        }
        entries
            .iter()
            .filter(|entry| !entry.value.is_null() || entry.operator.ignores_value())
            .cloned()
            .collect()
    }

    /// Names from `all_fields` that carry at least one condition, in that order.
    pub fn fields<'a>(&self, all_fields: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
        all_fields
            .into_iter()
            .filter(|field| self.conditions.contains_key(*field))
            .collect()
    }

    pub fn get(&self, field: &str) -> Option<&[ConditionEntry]> {
        self.conditions.get(field).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ConditionEntry])> {
        self.conditions.iter().map(|(field, entries)| (field.as_str(), entries.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }
}

fn normalize(operator: ConditionType, values: Vec<Value>) -> Value {
    let mut kept = Vec::with_capacity(values.len());
    if operator.takes_list() {
        flatten_into(values, &mut kept);
        if kept.is_empty() {
            return Value::Null;
        }
        return Value::List(kept);
    }

    kept.extend(values.into_iter().filter(|value| !value.is_null()));
    match kept.len() {
        0 => Value::Null,
        1 => kept.pop().unwrap_or_default(),
        _ => Value::List(kept),
    }
}

fn flatten_into(values: Vec<Value>, out: &mut Vec<Value>) {
    for value in values {
        match value {
            Value::Null => {}
            Value::List(items) => flatten_into(items, out),
            other => out.push(other),
        }
    }
}
