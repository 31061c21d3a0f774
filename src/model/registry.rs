use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use indexmap::IndexMap;
use tracing::debug;

use crate::config::CrudConfig;
use crate::core::{DbError, Result};
use crate::model::accessor::FieldAccessor;
use crate::model::descriptor::{FieldDescriptor, ModelDescriptor};
use crate::model::dynamic::{DynamicModel, DynamicRecord};
use crate::model::identity::{
    IdGenerator, Identity, IdentityStrategy, SnowflakeGenerator, Uuid32Generator, Uuid36Generator,
};
use crate::model::Model;

/// Memoized model descriptors, keyed by type and by name.
///
/// Registration is serialized by a dedicated mutex; lookups only take the
/// read side of the cache locks, which is uncontended once a type has been
/// registered. Descriptors are never evicted.
pub struct ModelRegistry {
    config: CrudConfig,
    by_type: RwLock<HashMap<TypeId, Arc<ModelDescriptor>>>,
    by_name: RwLock<HashMap<String, Arc<ModelDescriptor>>>,
    aliases: RwLock<HashMap<TypeId, TypeId>>,
    registration: Mutex<()>,
    snowflakes: Mutex<HashMap<i64, Arc<SnowflakeGenerator>>>,
}

impl ModelRegistry {
    pub fn new(config: CrudConfig) -> Self {
        Self {
            config,
            by_type: RwLock::new(HashMap::new()),
            by_name: RwLock::new(HashMap::new()),
            aliases: RwLock::new(HashMap::new()),
            registration: Mutex::new(()),
            snowflakes: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &CrudConfig {
        &self.config
    }

    /// Looks up the descriptor of `T`, building it first when
    /// `register_if_absent` is set.
    pub fn resolve<T: Model>(&self, register_if_absent: bool) -> Result<Option<Arc<ModelDescriptor>>> {
        if let Some(found) = self.resolve_type_id(TypeId::of::<T>())? {
            return Ok(Some(found));
        }
        if !register_if_absent {
            return Ok(None);
        }

        let _guard = self.registration.lock()?;
        // another thread may have won the race while we waited
        if let Some(found) = self.resolve_type_id(TypeId::of::<T>())? {
            return Ok(Some(found));
        }

        let descriptor = Arc::new(self.build::<T>()?);
        debug!(model = descriptor.name(), table = descriptor.table(), "registered model");

        self.by_type.write()?.insert(TypeId::of::<T>(), Arc::clone(&descriptor));
        self.by_name
            .write()?
            .entry(descriptor.name().to_string())
            .or_insert_with(|| Arc::clone(&descriptor));
        Ok(Some(descriptor))
    }

    pub fn require<T: Model>(&self) -> Result<Arc<ModelDescriptor>> {
        self.resolve::<T>(true)?.ok_or_else(|| {
            DbError::configuration(format!("model {} could not be registered", std::any::type_name::<T>()))
        })
    }

    pub fn resolve_type_id(&self, type_id: TypeId) -> Result<Option<Arc<ModelDescriptor>>> {
        let target = self.aliases.read()?.get(&type_id).copied().unwrap_or(type_id);
        Ok(self.by_type.read()?.get(&target).cloned())
    }

    pub fn resolve_by_name(&self, name: &str) -> Result<Option<Arc<ModelDescriptor>>> {
        Ok(self.by_name.read()?.get(name).cloned())
    }

    /// Makes lookups for the decorator type `D` answer with the descriptor of `T`.
    pub fn register_alias<D: Any, T: Model>(&self) -> Result<Arc<ModelDescriptor>> {
        let descriptor = self.require::<T>()?;
        let _guard = self.registration.lock()?;
        self.aliases.write()?.insert(TypeId::of::<D>(), TypeId::of::<T>());
        Ok(descriptor)
    }

    /// Registers a runtime model, replacing an earlier one with the same name.
    pub fn register_dynamic(&self, model: DynamicModel) -> Result<Arc<ModelDescriptor>> {
        let _guard = self.registration.lock()?;
        let descriptor = Arc::new(self.build_dynamic(model)?);
        let previous = self
            .by_name
            .write()?
            .insert(descriptor.name().to_string(), Arc::clone(&descriptor));
        debug!(
            model = descriptor.name(),
            table = descriptor.table(),
            replaced = previous.is_some(),
            "registered dynamic model"
        );
        Ok(descriptor)
    }

    fn build<T: Model>(&self) -> Result<ModelDescriptor> {
        let shape = T::shape();
        let config = self.config.model_config.resolve(shape.config.as_ref());
        let name = shape.name.clone();

        let table = shape.table.clone().unwrap_or_else(|| config.table_naming.apply(&name));
        let table = match shape.schema.as_deref() {
            Some(schema) if !schema.is_empty() => format!("{}.{}", schema, table),
            _ => table,
        };

        let specs = shape.effective_fields();
        if specs.is_empty() {
            return Err(DbError::configuration(format!("model '{}' declares no persistable fields", name)));
        }

        let explicit: Vec<&str> = specs
            .iter()
            .filter(|spec| spec.identity.is_some())
            .map(|spec| spec.name.as_str())
            .collect();
        if explicit.len() > 1 {
            return Err(DbError::configuration(format!(
                "model '{}' marks more than one identity field: {}",
                name,
                explicit.join(", ")
            )));
        }
        let identity_name = explicit
            .first()
            .map(|name| name.to_string())
            .or_else(|| specs.iter().find(|spec| spec.name == "id").map(|spec| spec.name.clone()));

        let mut fields = IndexMap::with_capacity(specs.len());
        for spec in &specs {
            let column = spec.column.clone().unwrap_or_else(|| config.column_naming.apply(&spec.name));
            let mut field = FieldDescriptor {
                name: spec.name.clone(),
                column,
                field_type: spec.field_type,
                insertable: spec.insertable,
                updatable: spec.updatable,
                accessor: FieldAccessor::Structured { get: spec.erase_get(), set: spec.erase_set() },
                identity: None,
            };
            if identity_name.as_deref() == Some(spec.name.as_str()) {
                let strategy = spec.identity.unwrap_or_default();
                let generator = match &spec.generator {
                    Some(custom) => Some(Arc::clone(custom)),
                    None => {
                        strategy.check_field_type(&spec.name, spec.field_type.data_type)?;
                        self.generator_for(strategy)?
                    }
                };
                field.insertable = generator.is_some();
                field.updatable = false;
                field.identity = Some(Identity { strategy, generator });
            }
            insert_field(&name, &mut fields, field)?;
        }

        Ok(ModelDescriptor {
            type_id: Some(TypeId::of::<T>()),
            name,
            table,
            config,
            fields,
            identity: identity_name,
            factory: Arc::new(|| Box::new(T::default()) as Box<dyn Any>),
        })
    }

    fn build_dynamic(&self, model: DynamicModel) -> Result<ModelDescriptor> {
        let config = self.config.model_config.resolve(model.config.as_ref());
        let table = model.table.clone().unwrap_or_else(|| config.table_naming.apply(&model.name));

        let mut fields = IndexMap::with_capacity(model.fields.len() + 1);
        let mut identity_name = None;

        if let Some((id, strategy)) = &model.id {
            let generator = self.generator_for(*strategy)?;
            let field = FieldDescriptor {
                name: id.name.clone(),
                column: id.column.clone().unwrap_or_else(|| config.column_naming.apply(&id.name)),
                field_type: id.field_type,
                insertable: generator.is_some(),
                updatable: false,
                accessor: FieldAccessor::MapBacked { key: id.name.clone(), field_type: id.field_type },
                identity: Some(Identity { strategy: *strategy, generator }),
            };
            identity_name = Some(id.name.clone());
            insert_field(&model.name, &mut fields, field)?;
        }

        for dynamic in model.fields.values() {
            let field = FieldDescriptor {
                name: dynamic.name.clone(),
                column: dynamic
                    .column
                    .clone()
                    .unwrap_or_else(|| config.column_naming.apply(&dynamic.name)),
                field_type: dynamic.field_type,
                insertable: true,
                updatable: true,
                accessor: FieldAccessor::MapBacked { key: dynamic.name.clone(), field_type: dynamic.field_type },
                identity: None,
            };
            insert_field(&model.name, &mut fields, field)?;
        }

        if fields.is_empty() {
            return Err(DbError::configuration(format!(
                "dynamic model '{}' declares no fields",
                model.name
            )));
        }

        Ok(ModelDescriptor {
            type_id: None,
            name: model.name,
            table,
            config,
            fields,
            identity: identity_name,
            factory: Arc::new(|| Box::new(DynamicRecord::default()) as Box<dyn Any>),
        })
    }

    fn generator_for(&self, strategy: IdentityStrategy) -> Result<Option<Arc<dyn IdGenerator>>> {
        let generator: Arc<dyn IdGenerator> = match strategy {
            IdentityStrategy::StoreAssigned => return Ok(None),
            IdentityStrategy::Uuid32 => Arc::new(Uuid32Generator),
            IdentityStrategy::Uuid36 => Arc::new(Uuid36Generator),
            IdentityStrategy::Snowflake { epoch_millis } => {
                let epoch = epoch_millis.unwrap_or(self.config.snowflake_epoch);
                let mut snowflakes = self.snowflakes.lock()?;
                let shared = match snowflakes.get(&epoch) {
                    Some(existing) => Arc::clone(existing),
                    None => {
                        let created = Arc::new(SnowflakeGenerator::new(
                            epoch,
                            self.config.snowflake_datacenter_id,
                            self.config.snowflake_worker_id,
                        )?);
                        snowflakes.insert(epoch, Arc::clone(&created));
                        created
                    }
                };
                shared as Arc<dyn IdGenerator>
            }
        };
        Ok(Some(generator))
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(CrudConfig::default())
    }
}

fn insert_field(model: &str, fields: &mut IndexMap<String, FieldDescriptor>, field: FieldDescriptor) -> Result<()> {
    if let Some(clash) = fields.values().find(|existing| existing.column == field.column) {
        return Err(DbError::configuration(format!(
            "model '{}' maps fields '{}' and '{}' onto the same column '{}'",
            model, clash.name, field.name, field.column
        )));
    }
    fields.insert(field.name.clone(), field);
    Ok(())
}
