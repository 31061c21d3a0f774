use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::core::{DbError, FieldType, Result, Row, Value};
use crate::model::accessor::FieldAccessor;
use crate::model::identity::Identity;
use crate::model::naming::ModelConfiguration;

pub type InstanceFactory = Arc<dyn Fn() -> Box<dyn Any> + Send + Sync>;

/// Column mapping of one model field.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub column: String,
    pub field_type: FieldType,
    pub insertable: bool,
    pub updatable: bool,
    pub accessor: FieldAccessor,
    pub identity: Option<Identity>,
}

impl FieldDescriptor {
    pub fn is_identity(&self) -> bool {
        self.identity.is_some()
    }

    pub fn get(&self, instance: &dyn Any) -> Result<Value> {
        self.accessor.get(instance)
    }

    pub fn set(&self, instance: &mut dyn Any, value: Value) -> Result<()> {
        let value = if value.is_null() || self.field_type.data_type.is_compatible(&value) {
            value
        } else {
            value.cast_to(&self.field_type.data_type)?
        };
        self.accessor.set(instance, value)
    }
}

/// Immutable mapping of a model type onto a table.
pub struct ModelDescriptor {
    pub(crate) type_id: Option<TypeId>,
    pub(crate) name: String,
    pub(crate) table: String,
    pub(crate) config: ModelConfiguration,
    pub(crate) fields: IndexMap<String, FieldDescriptor>,
    pub(crate) identity: Option<String>,
    pub(crate) factory: InstanceFactory,
}

impl ModelDescriptor {
    pub fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table name, including a `schema.` prefix when one was declared.
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn datasource(&self) -> &str {
        self.config.datasource.as_deref().unwrap_or("")
    }

    pub fn config(&self) -> &ModelConfiguration {
        &self.config
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.values()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    pub fn require_field(&self, name: &str) -> Result<&FieldDescriptor> {
        self.field(name).ok_or_else(|| {
            DbError::configuration(format!("model '{}' has no field '{}'", self.name, name))
        })
    }

    pub fn id_field(&self) -> Option<&FieldDescriptor> {
        self.identity.as_deref().and_then(|name| self.fields.get(name))
    }

    pub fn require_id_field(&self) -> Result<&FieldDescriptor> {
        self.id_field().ok_or_else(|| {
            DbError::configuration(format!("model '{}' declares no identity field", self.name))
        })
    }

    pub fn new_instance(&self) -> Box<dyn Any> {
        (self.factory)()
    }

    pub fn id_value(&self, instance: &dyn Any) -> Result<Value> {
        match self.id_field() {
            Some(field) => field.get(instance),
            None => Ok(Value::Null),
        }
    }

    /// Generates an identity when the instance carries none and the field
    /// has a generator. Returns the identity value afterwards.
    pub fn assign_id_if_absent(&self, instance: &mut dyn Any) -> Result<Value> {
        let Some(field) = self.id_field() else {
            return Ok(Value::Null);
        };
        let current = field.get(instance)?;
        if !current.is_null() {
            return Ok(current);
        }
        let Some(identity) = &field.identity else {
            return Ok(Value::Null);
        };
        match identity.next_value(field.field_type.data_type)? {
            Some(value) => {
                field.set(instance, value.clone())?;
                Ok(value)
            }
            None => Ok(Value::Null),
        }
    }

    /// Builds an instance from a stored row. Columns absent from the row
    /// keep the instance's default.
    pub fn instance_from_row(&self, row: Row) -> Result<Box<dyn Any>> {
        let mut instance = self.new_instance();
        let mut row = row;
        for field in self.fields.values() {
            if let Some(value) = row.shift_remove(&field.column) {
                field.set(instance.as_mut(), value)?;
            }
        }
        Ok(instance)
    }
}

impl fmt::Debug for ModelDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDescriptor")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("datasource", &self.datasource())
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("identity", &self.identity)
            .finish()
    }
}
