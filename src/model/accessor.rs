use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::core::{DbError, FieldType, Result, Value};
use crate::model::dynamic::DynamicRecord;

pub type Getter = Arc<dyn Fn(&dyn Any) -> Result<Value> + Send + Sync>;
pub type Setter = Arc<dyn Fn(&mut dyn Any, Value) -> Result<()> + Send + Sync>;

/// Get/set capability for one field, chosen once when the descriptor is built.
#[derive(Clone)]
pub enum FieldAccessor {
    /// A field of a plain Rust struct, reached through typed lenses.
    Structured { get: Getter, set: Setter },
    /// An entry of a [`DynamicRecord`].
    MapBacked { key: String, field_type: FieldType },
}

impl FieldAccessor {
    pub fn get(&self, instance: &dyn Any) -> Result<Value> {
        match self {
            Self::Structured { get, .. } => get(instance),
            Self::MapBacked { key, .. } => {
                let record = downcast_record(instance)?;
                Ok(record.get(key).cloned().unwrap_or(Value::Null))
            }
        }
    }

    pub fn set(&self, instance: &mut dyn Any, value: Value) -> Result<()> {
        match self {
            Self::Structured { set, .. } => set(instance, value),
            Self::MapBacked { key, field_type } => {
                field_type.validate(key, &value)?;
                let record = instance.downcast_mut::<DynamicRecord>().ok_or_else(|| {
                    DbError::type_mismatch(format!("field '{}' expects a dynamic record instance", key))
                })?;
                let value = match (&value, field_type.data_type) {
                    (Value::Integer(i), crate::core::DataType::Float) => Value::Float(*i as f64),
                    _ => value,
                };
                record.insert(key.clone(), value);
                Ok(())
            }
        }
    }
}

fn downcast_record(instance: &dyn Any) -> Result<&DynamicRecord> {
    instance
        .downcast_ref::<DynamicRecord>()
        .ok_or_else(|| DbError::type_mismatch("expected a dynamic record instance"))
}

impl fmt::Debug for FieldAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structured { .. } => write!(f, "Structured"),
            Self::MapBacked { key, .. } => write!(f, "MapBacked({})", key),
        }
    }
}
