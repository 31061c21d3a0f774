use std::any::Any;
use std::sync::Arc;

use crate::core::{DbError, FieldType, FieldValue, Result, Value};
use crate::model::identity::{IdGenerator, IdentityStrategy};
use crate::model::naming::ModelConfiguration;

type TypedGetter<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;
type TypedSetter<T> = Arc<dyn Fn(&mut T, Value) -> Result<()> + Send + Sync>;

/// Declaration of one persisted field of `T`.
pub struct FieldSpec<T> {
    pub(crate) name: String,
    pub(crate) column: Option<String>,
    pub(crate) field_type: FieldType,
    pub(crate) get: TypedGetter<T>,
    pub(crate) set: TypedSetter<T>,
    pub(crate) identity: Option<IdentityStrategy>,
    pub(crate) generator: Option<Arc<dyn IdGenerator>>,
    pub(crate) insertable: bool,
    pub(crate) updatable: bool,
    pub(crate) transient: bool,
}

impl<T: 'static> FieldSpec<T> {
    pub fn new<F: FieldValue>(
        name: impl Into<String>,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> Self {
        Self {
            name: name.into(),
            column: None,
            field_type: F::field_type(),
            get: Arc::new(move |model: &T| get(model).to_value()),
            set: Arc::new(move |model: &mut T, value: Value| {
                *get_mut(model) = F::from_value(value)?;
                Ok(())
            }),
            identity: None,
            generator: None,
            insertable: true,
            updatable: true,
            transient: false,
        }
    }

    /// Explicit column name, bypassing the naming strategy.
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn identity(mut self, strategy: IdentityStrategy) -> Self {
        self.identity = Some(strategy);
        self
    }

    /// Replaces the generator the identity strategy would pick.
    pub fn generator(mut self, generator: Arc<dyn IdGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn insertable(mut self, insertable: bool) -> Self {
        self.insertable = insertable;
        self
    }

    pub fn updatable(mut self, updatable: bool) -> Self {
        self.updatable = updatable;
        self
    }

    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    fn lift<P: 'static>(self, lens: fn(&P) -> &T, lens_mut: fn(&mut P) -> &mut T) -> FieldSpec<P> {
        let get = self.get;
        let set = self.set;
        FieldSpec {
            name: self.name,
            column: self.column,
            field_type: self.field_type,
            get: Arc::new(move |parent: &P| get(lens(parent))),
            set: Arc::new(move |parent: &mut P, value: Value| set(lens_mut(parent), value)),
            identity: self.identity,
            generator: self.generator,
            insertable: self.insertable,
            updatable: self.updatable,
            transient: self.transient,
        }
    }

    pub(crate) fn erase_get(&self) -> crate::model::accessor::Getter
    where
        T: Any,
    {
        let get = Arc::clone(&self.get);
        let name = self.name.clone();
        Arc::new(move |instance: &dyn Any| {
            let model = instance.downcast_ref::<T>().ok_or_else(|| wrong_instance::<T>(&name))?;
            Ok(get(model))
        })
    }

    pub(crate) fn erase_set(&self) -> crate::model::accessor::Setter
    where
        T: Any,
    {
        let set = Arc::clone(&self.set);
        let name = self.name.clone();
        Arc::new(move |instance: &mut dyn Any, value: Value| {
            let model = instance.downcast_mut::<T>().ok_or_else(|| wrong_instance::<T>(&name))?;
            set(model, value)
                .map_err(|e| DbError::type_mismatch(format!("field '{}': {}", name, e)))
        })
    }
}

fn wrong_instance<T>(field: &str) -> DbError {
    DbError::type_mismatch(format!(
        "field '{}' belongs to {}, got an instance of another type",
        field,
        std::any::type_name::<T>()
    ))
}

/// Declarative shape of a model type: what the registry turns into a
/// [`ModelDescriptor`](crate::model::ModelDescriptor).
pub struct ModelShape<T> {
    pub(crate) name: String,
    pub(crate) table: Option<String>,
    pub(crate) schema: Option<String>,
    pub(crate) config: Option<ModelConfiguration>,
    pub(crate) own: Vec<FieldSpec<T>>,
    pub(crate) inherited: Vec<FieldSpec<T>>,
}

impl<T: 'static> ModelShape<T> {
    pub fn new() -> Self {
        Self {
            name: short_type_name::<T>().to_string(),
            table: None,
            schema: None,
            config: None,
            own: Vec::new(),
            inherited: Vec::new(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Explicit table name, bypassing the naming strategy.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn config(mut self, config: ModelConfiguration) -> Self {
        self.config = Some(config);
        self
    }

    pub fn field(mut self, field: FieldSpec<T>) -> Self {
        self.own.push(field);
        self
    }

    /// Pulls in the fields of an embedded parent shape. Fields declared on
    /// this shape win over parent fields of the same name.
    pub fn inherit<P: 'static>(
        mut self,
        parent: ModelShape<P>,
        lens: fn(&T) -> &P,
        lens_mut: fn(&mut T) -> &mut P,
    ) -> Self {
        let ModelShape { own, inherited, .. } = parent;
        for field in own.into_iter().chain(inherited) {
            self.inherited.push(field.lift(lens, lens_mut));
        }
        self
    }

    /// Own fields first, then inherited ones not shadowed, minus transient ones.
    pub(crate) fn effective_fields(self) -> Vec<FieldSpec<T>> {
        let mut fields: Vec<FieldSpec<T>> = Vec::with_capacity(self.own.len() + self.inherited.len());
        for field in self.own.into_iter().chain(self.inherited) {
            if fields.iter().any(|existing| existing.name == field.name) {
                continue;
            }
            fields.push(field);
        }
        fields.retain(|field| !field.transient);
        fields
    }
}

impl<T: 'static> Default for ModelShape<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
