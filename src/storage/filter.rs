use std::cmp::Ordering;

use crate::core::{Result, Row, Value};
use crate::expression::{eval_like, like_pattern};
use crate::query::{CompiledPredicate, ConditionType, PredicateClause};

/// Whether `row` satisfies every clause of `predicate`.
pub fn matches(row: &Row, predicate: &CompiledPredicate) -> Result<bool> {
    for clause in &predicate.clauses {
        let value = row.get(&clause.column).unwrap_or(&Value::Null);
        if !eval_clause(value, clause)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn eval_clause(value: &Value, clause: &PredicateClause) -> Result<bool> {
    let operand = &clause.value;
    match clause.operator {
        ConditionType::IsNull => Ok(value.is_null()),
        ConditionType::NotNull => Ok(!value.is_null()),
        // a static-mode template binds absent fields as `= NULL`
        ConditionType::Equal if operand.is_null() => Ok(value.is_null()),
        _ if value.is_null() || operand.is_null() => Ok(false),

        ConditionType::Equal => Ok(value == operand),
        ConditionType::NotEqual => Ok(value != operand),
        ConditionType::LikeAll | ConditionType::LikeLeft | ConditionType::LikeRight => {
            let Value::Text(text) = value else {
                return Ok(false);
            };
            let pattern = match operand {
                Value::Text(s) => like_pattern(clause.operator, s)?,
                other => like_pattern(clause.operator, &other.to_string())?,
            };
            eval_like(text, &pattern)
        }
        ConditionType::GreaterThan => Ok(value.compare(operand)? == Ordering::Greater),
        ConditionType::GreaterEqual => Ok(value.compare(operand)? != Ordering::Less),
        ConditionType::LessThan => Ok(value.compare(operand)? == Ordering::Less),
        ConditionType::LessEqual => Ok(value.compare(operand)? != Ordering::Greater),
        ConditionType::In => Ok(list_contains(operand, value)),
        ConditionType::NotIn => Ok(!list_contains(operand, value)),
    }
}

fn list_contains(list: &Value, value: &Value) -> bool {
    match list {
        Value::List(items) => items.iter().any(|item| item == value),
        scalar => scalar == value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clause(column: &str, operator: ConditionType, value: Value) -> PredicateClause {
        PredicateClause { field: column.to_string(), column: column.to_string(), operator, value }
    }

    fn sample() -> Row {
        [
            ("name".to_string(), Value::from("gizmo")),
            ("qty".to_string(), Value::Integer(5)),
            ("note".to_string(), Value::Null),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_comparisons() {
        let row = sample();
        let check = |op, v: Value| {
            matches(&row, &CompiledPredicate { clauses: vec![clause("qty", op, v)] }).unwrap()
        };
        assert!(check(ConditionType::GreaterThan, Value::Integer(4)));
        assert!(!check(ConditionType::GreaterThan, Value::Integer(5)));
        assert!(check(ConditionType::GreaterEqual, Value::Integer(5)));
        assert!(check(ConditionType::LessEqual, Value::Float(5.0)));
        assert!(check(ConditionType::In, Value::from(vec![1i64, 5])));
        assert!(check(ConditionType::NotIn, Value::from(vec![1i64, 2])));
        assert!(check(ConditionType::NotEqual, Value::Integer(6)));
    }

    #[test]
    fn test_null_semantics() {
        let row = sample();
        let eval = |c: PredicateClause| matches(&row, &CompiledPredicate { clauses: vec![c] }).unwrap();
        assert!(eval(clause("note", ConditionType::IsNull, Value::Null)));
        assert!(eval(clause("note", ConditionType::Equal, Value::Null)));
        assert!(!eval(clause("name", ConditionType::Equal, Value::Null)));
        assert!(!eval(clause("note", ConditionType::NotEqual, Value::from("x"))));
        assert!(!eval(clause("note", ConditionType::NotIn, Value::from(vec!["x"]))));
    }

    #[test]
    fn test_like_variants() {
        let row = sample();
        let eval = |op, v: &str| {
            matches(&row, &CompiledPredicate { clauses: vec![clause("name", op, Value::from(v))] }).unwrap()
        };
        assert!(eval(ConditionType::LikeAll, "izm"));
        assert!(eval(ConditionType::LikeLeft, "mo"));
        assert!(!eval(ConditionType::LikeLeft, "giz"));
        assert!(eval(ConditionType::LikeRight, "giz"));
    }
}
