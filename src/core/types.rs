use indexmap::IndexMap;
use super::{DataType, DbError, Result, Value};

/// A stored row, keyed by column name in declaration order.
pub type Row = IndexMap<String, Value>;

/// Declared column type of a model field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldType {
    pub data_type: DataType,
    pub nullable: bool,
}

impl FieldType {
    pub fn new(data_type: DataType) -> Self {
        Self { data_type, nullable: false }
    }

    pub fn nullable(data_type: DataType) -> Self {
        Self { data_type, nullable: true }
    }

    pub fn validate(&self, field: &str, value: &Value) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }
        if !self.data_type.is_compatible(value) {
            return Err(DbError::TypeMismatch(format!(
                "Field '{}' expects type {}, got {}",
                field,
                self.data_type,
                value.type_name()
            )));
        }
        Ok(())
    }
}

/// Conversion between a Rust field type and a column [`Value`].
///
/// Implemented for the primitive column types and `Option` of them; a
/// model field of any other type has to be mapped through one of these.
pub trait FieldValue: Sized + 'static {
    fn field_type() -> FieldType;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self>;
}

fn unexpected<T>(expected: DataType, value: &Value) -> Result<T> {
    Err(DbError::TypeMismatch(format!(
        "expected {}, got {}",
        expected,
        value.type_name()
    )))
}

impl FieldValue for i64 {
    fn field_type() -> FieldType {
        FieldType::new(DataType::Integer)
    }

    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value.as_i64() {
            Some(i) => Ok(i),
            None => unexpected(DataType::Integer, &value),
        }
    }
}

impl FieldValue for i32 {
    fn field_type() -> FieldType {
        FieldType::new(DataType::Integer)
    }

    fn to_value(&self) -> Value {
        Value::Integer(*self as i64)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value.as_i64().map(i32::try_from) {
            Some(Ok(i)) => Ok(i),
            Some(Err(_)) => Err(DbError::TypeMismatch(format!("{} does not fit into i32", value))),
            None => unexpected(DataType::Integer, &value),
        }
    }
}

impl FieldValue for f64 {
    fn field_type() -> FieldType {
        FieldType::new(DataType::Float)
    }

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value.as_f64() {
            Some(f) => Ok(f),
            None => unexpected(DataType::Float, &value),
        }
    }
}

impl FieldValue for bool {
    fn field_type() -> FieldType {
        FieldType::new(DataType::Boolean)
    }

    fn to_value(&self) -> Value {
        Value::Boolean(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Boolean(b) => Ok(b),
            other => unexpected(DataType::Boolean, &other),
        }
    }
}

impl FieldValue for String {
    fn field_type() -> FieldType {
        FieldType::new(DataType::Text)
    }

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s),
            other => unexpected(DataType::Text, &other),
        }
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn field_type() -> FieldType {
        FieldType::nullable(T::field_type().data_type)
    }

    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            return Ok(None);
        }
        T::from_value(value).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_maps_null() {
        assert_eq!(Option::<i64>::from_value(Value::Null).unwrap(), None);
        assert_eq!(Option::<i64>::from_value(Value::Integer(5)).unwrap(), Some(5));
        assert_eq!(Some("x".to_string()).to_value(), Value::from("x"));
        assert!(Option::<i64>::field_type().nullable);
    }

    #[test]
    fn test_non_nullable_rejects_null() {
        assert!(i64::from_value(Value::Null).is_err());
        assert!(String::from_value(Value::Integer(1)).is_err());
        assert!(i32::from_value(Value::Integer(i64::MAX)).is_err());
    }
}
