use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tracing::debug;

use crate::core::{DbError, Result, Value};
use crate::domain::descriptor::{AggregateDescriptor, HolderKind, SlotChildren, SlotId, SlotNode};
use crate::domain::shape::{SlotContent, SlotDecl};
use crate::domain::Aggregate;
use crate::model::{ModelDescriptor, ModelRegistry};
use crate::query::{ConditionSet, ConditionType};

/// Memoized aggregate descriptors, validated when first built.
pub struct AggregateRegistry {
    models: Arc<ModelRegistry>,
    cache: RwLock<HashMap<TypeId, Arc<AggregateDescriptor>>>,
    registration: Mutex<()>,
}

impl AggregateRegistry {
    pub fn new(models: Arc<ModelRegistry>) -> Self {
        Self {
            models,
            cache: RwLock::new(HashMap::new()),
            registration: Mutex::new(()),
        }
    }

    pub fn models(&self) -> &Arc<ModelRegistry> {
        &self.models
    }

    pub fn resolve<A: Aggregate>(&self) -> Result<Arc<AggregateDescriptor>> {
        let type_id = TypeId::of::<A>();
        if let Some(found) = self.cache.read()?.get(&type_id) {
            return Ok(Arc::clone(found));
        }

        let _guard = self.registration.lock()?;
        if let Some(found) = self.cache.read()?.get(&type_id) {
            return Ok(Arc::clone(found));
        }

        let descriptor = Arc::new(self.build::<A>()?);
        debug!(
            aggregate = descriptor.name(),
            root = descriptor.root_model().name(),
            slots = descriptor.slot_count(),
            "registered aggregate"
        );
        self.cache.write()?.insert(type_id, Arc::clone(&descriptor));
        Ok(descriptor)
    }

    fn build<A: Aggregate>(&self) -> Result<AggregateDescriptor> {
        let shape = A::shape();
        let name = shape.name;

        let mut roots = shape.roots.into_iter();
        let root = match (roots.next(), roots.next()) {
            (Some(root), None) => root,
            (None, _) => {
                return Err(DbError::configuration(format!("aggregate '{}' declares no root entity", name)));
            }
            (Some(_), Some(_)) => {
                return Err(DbError::configuration(format!(
                    "aggregate '{}' declares more than one root entity",
                    name
                )));
            }
        };
        let root_model = (root.model)(&self.models)?;
        root_model.require_id_field()?;

        let mut builder = ArenaBuilder { models: &self.models, aggregate: &name, arena: Vec::new() };
        let mut slots = Vec::with_capacity(shape.slots.len());
        for decl in shape.slots {
            if slots.iter().any(|id: &SlotId| builder.arena[id.0].name == decl.name) {
                return Err(DbError::configuration(format!(
                    "aggregate '{}' declares slot '{}' twice",
                    name, decl.name
                )));
            }
            slots.push(builder.add(decl, None, false)?);
        }
        let arena = builder.arena;

        let descriptor = AggregateDescriptor {
            type_id: TypeId::of::<A>(),
            name,
            root_model,
            root: root.access,
            slots,
            arena,
        };

        for index in 0..descriptor.arena.len() {
            let node = descriptor.node(SlotId(index));
            if let Some(model) = &node.model {
                if !descriptor.children(SlotId(index)).is_empty() && model.id_field().is_none() {
                    return Err(DbError::configuration(format!(
                        "slot '{}' of aggregate '{}' has nested slots but model '{}' declares no identity field",
                        node.name,
                        descriptor.name,
                        model.name()
                    )));
                }
            }
        }
        Ok(descriptor)
    }
}

struct Links<'a> {
    slot: &'a str,
    domain_key: Option<&'a str>,
    entity_key: Option<&'a str>,
}

struct ArenaBuilder<'a> {
    models: &'a ModelRegistry,
    aggregate: &'a str,
    arena: Vec<SlotNode>,
}

impl ArenaBuilder<'_> {
    /// Adds `decl` and, recursively, its nested slots. `linked` tells whether
    /// an ancestor slot carries an entity.
    fn add(&mut self, decl: SlotDecl, parent: Option<SlotId>, linked: bool) -> Result<SlotId> {
        let SlotDecl {
            name,
            collection,
            holder_type,
            holder_name,
            content,
            domain_key,
            entity_key,
            conditions,
            access,
        } = decl;
        let id = SlotId(self.arena.len());
        let self_referential = parent.filter(|parent| self.arena[parent.0].holder_type == holder_type);

        let (kind, model, entity, factory, nested) = match (content, self_referential) {
            (SlotContent::Entity { model }, _) => (HolderKind::Entity, Some(model(self.models)?), None, None, Vec::new()),
            (SlotContent::ValueObject { factory, .. }, Some(parent)) => {
                let parent = &self.arena[parent.0];
                if parent.kind == HolderKind::Composite {
                    return Err(self.error(&name, "self-referential slot needs an entity".to_string()));
                }
                (parent.kind, parent.model.clone(), parent.entity.clone(), Some(factory), Vec::new())
            }
            (SlotContent::ValueObject { shape, factory }, None) => {
                let shape = shape();
                let mut entities = shape.entities.into_iter();
                match (entities.next(), entities.next()) {
                    (Some(_), Some(_)) => {
                        return Err(self.error(&name, "holder declares more than one entity field".to_string()));
                    }
                    (Some(entity), None) => (
                        HolderKind::Wrapper,
                        Some((entity.model)(self.models)?),
                        Some(entity.access),
                        Some(factory),
                        shape.slots,
                    ),
                    (None, _) => (HolderKind::Composite, None, None, Some(factory), shape.slots),
                }
            }
        };

        let links = Links { slot: &name, domain_key: domain_key.as_deref(), entity_key: entity_key.as_deref() };
        let conditions = match &model {
            Some(model) => self.validate_links(&links, model, &conditions, linked)?,
            None => {
                if !conditions.is_empty() {
                    return Err(self.error(&name, "conditions need a slot entity".to_string()));
                }
                if domain_key.is_some() || entity_key.is_some() {
                    return Err(self.error(&name, "link fields need a slot entity".to_string()));
                }
                ConditionSet::new()
            }
        };

        let children = match self_referential {
            Some(parent) => SlotChildren::Shared(parent),
            None => SlotChildren::Own(Vec::new()),
        };
        let has_entity = model.is_some();
        self.arena.push(SlotNode {
            name,
            collection,
            holder_type,
            holder_name,
            kind,
            model,
            entity,
            factory,
            domain_key,
            entity_key,
            conditions,
            access,
            children,
        });

        let mut child_ids: Vec<SlotId> = Vec::with_capacity(nested.len());
        for child in nested {
            if child_ids.iter().any(|existing| self.arena[existing.0].name == child.name) {
                return Err(self.error(&child.name, "slot declared twice".to_string()));
            }
            child_ids.push(self.add(child, Some(id), linked || has_entity)?);
        }
        if let SlotChildren::Own(children) = &mut self.arena[id.0].children {
            *children = child_ids;
        }
        Ok(id)
    }

    fn validate_links(
        &self,
        links: &Links<'_>,
        model: &ModelDescriptor,
        declared: &[(String, ConditionType, Value)],
        linked: bool,
    ) -> Result<ConditionSet> {
        for key in [links.domain_key, links.entity_key].into_iter().flatten() {
            if model.field(key).is_none() {
                return Err(self.error(links.slot, format!("link field '{}' not found on model '{}'", key, model.name())));
            }
        }
        if linked && links.entity_key.is_none() {
            return Err(self.error(links.slot, "nested slot needs an entity key".to_string()));
        }
        if links.domain_key.is_none() && links.entity_key.is_none() {
            return Err(self.error(links.slot, "slot needs a domain key or an entity key".to_string()));
        }

        let mut conditions = ConditionSet::new();
        for (field_name, operator, value) in declared {
            let field = model.field(field_name).ok_or_else(|| {
                self.error(
                    links.slot,
                    format!("condition field '{}' not found on model '{}'", field_name, model.name()),
                )
            })?;
            if value.is_null() && !operator.ignores_value() {
                continue;
            }
            let value = match value {
                Value::List(items) => Value::List(
                    items
                        .iter()
                        .map(|item| item.cast_to(&field.field_type.data_type))
                        .collect::<Result<Vec<_>>>()?,
                ),
                Value::Null => Value::Null,
                scalar => scalar.cast_to(&field.field_type.data_type)?,
            };
            conditions.push(field_name, *operator, vec![value]);
        }
        Ok(conditions)
    }

    fn error(&self, slot: &str, message: String) -> DbError {
        DbError::configuration(format!("slot '{}' of aggregate '{}': {}", slot, self.aggregate, message))
    }
}
