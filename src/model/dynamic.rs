//! Models declared at runtime and stored in string-keyed records.

use std::ops::{Deref, DerefMut};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::{DataType, DbError, FieldType, Result, Value};
use crate::model::identity::IdentityStrategy;
use crate::model::naming::ModelConfiguration;

/// Instance of a [`DynamicModel`]: field name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DynamicRecord {
    values: IndexMap<String, Value>,
}

impl DynamicRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(field.into(), value.into());
        self
    }
}

impl Deref for DynamicRecord {
    type Target = IndexMap<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.values
    }
}

impl DerefMut for DynamicRecord {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.values
    }
}

#[derive(Debug, Clone)]
pub(crate) struct DynamicField {
    pub(crate) name: String,
    pub(crate) column: Option<String>,
    pub(crate) field_type: FieldType,
}

/// Runtime declaration of a model; registered by name.
#[derive(Debug, Clone)]
pub struct DynamicModel {
    pub(crate) name: String,
    pub(crate) table: Option<String>,
    pub(crate) config: Option<ModelConfiguration>,
    pub(crate) id: Option<(DynamicField, IdentityStrategy)>,
    pub(crate) fields: IndexMap<String, DynamicField>,
}

impl DynamicModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            config: None,
            id: None,
            fields: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&mut self, table: impl Into<String>) -> &mut Self {
        self.table = Some(table.into());
        self
    }

    pub fn config(&mut self, config: ModelConfiguration) -> &mut Self {
        self.config = Some(config);
        self
    }

    /// Declares the identity field, replacing any previous one.
    pub fn set_id(
        &mut self,
        name: impl Into<String>,
        data_type: DataType,
        strategy: IdentityStrategy,
    ) -> Result<&mut Self> {
        let name = name.into();
        strategy.check_field_type(&name, data_type)?;
        self.fields.shift_remove(&name);
        self.id = Some((
            DynamicField { name, column: None, field_type: FieldType::nullable(data_type) },
            strategy,
        ));
        Ok(self)
    }

    pub fn add_field(&mut self, name: impl Into<String>, data_type: DataType) -> Result<&mut Self> {
        self.add_column(name, None::<String>, data_type)
    }

    pub fn add_column(
        &mut self,
        name: impl Into<String>,
        column: Option<impl Into<String>>,
        data_type: DataType,
    ) -> Result<&mut Self> {
        let name = name.into();
        if self.id.as_ref().is_some_and(|(id, _)| id.name == name) {
            return Err(DbError::configuration(format!(
                "field '{}' is the identity of dynamic model '{}'",
                name, self.name
            )));
        }
        let field = DynamicField {
            name: name.clone(),
            column: column.map(Into::into),
            field_type: FieldType::nullable(data_type),
        };
        self.fields.insert(name, field);
        Ok(self)
    }

    pub fn remove_field(&mut self, name: &str) -> &mut Self {
        if self.id.as_ref().is_some_and(|(id, _)| id.name == name) {
            self.id = None;
        }
        self.fields.shift_remove(name);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adding_identity_name_as_field_fails() {
        let mut model = DynamicModel::new("account");
        model.set_id("id", DataType::Integer, IdentityStrategy::snowflake()).unwrap();
        let err = model.add_field("id", DataType::Text).unwrap_err();
        assert!(matches!(err, DbError::Configuration(_)));
    }

    #[test]
    fn test_remove_field_keeps_order() {
        let mut model = DynamicModel::new("account");
        model
            .add_field("a", DataType::Text)
            .unwrap()
            .add_field("b", DataType::Text)
            .unwrap()
            .add_field("c", DataType::Text)
            .unwrap();
        model.remove_field("b");
        assert_eq!(model.fields.keys().collect::<Vec<_>>(), vec!["a", "c"]);
    }
}
