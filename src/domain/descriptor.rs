use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::core::{Result, Value};
use crate::domain::shape::{EntityAccess, HolderFactory, SlotAccess};
use crate::model::{FieldDescriptor, ModelDescriptor};
use crate::query::{ConditionSet, ConditionType};

/// Index of a slot in its aggregate's slot arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HolderKind {
    /// The holder is the entity model itself.
    Entity,
    /// A value object wrapping one entity plus nested slots.
    Wrapper,
    /// A value object made only of nested slots.
    Composite,
}

#[derive(Debug, Clone)]
pub(crate) enum SlotChildren {
    Own(Vec<SlotId>),
    /// Self-referential holder: reuses the child list of the given slot.
    Shared(SlotId),
}

/// One node of the slot tree.
pub struct SlotNode {
    pub(crate) name: String,
    pub(crate) collection: bool,
    pub(crate) holder_type: TypeId,
    pub(crate) holder_name: &'static str,
    pub(crate) kind: HolderKind,
    pub(crate) model: Option<Arc<ModelDescriptor>>,
    pub(crate) entity: Option<Arc<dyn EntityAccess>>,
    pub(crate) factory: Option<HolderFactory>,
    pub(crate) domain_key: Option<String>,
    pub(crate) entity_key: Option<String>,
    pub(crate) conditions: ConditionSet,
    pub(crate) access: Arc<dyn SlotAccess>,
    pub(crate) children: SlotChildren,
}

impl SlotNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_collection(&self) -> bool {
        self.collection
    }

    pub fn holder_name(&self) -> &str {
        self.holder_name
    }

    pub fn kind(&self) -> HolderKind {
        self.kind
    }

    /// Descriptor of the slot's entity; `None` for composites.
    pub fn model(&self) -> Option<&Arc<ModelDescriptor>> {
        self.model.as_ref()
    }

    pub fn domain_key(&self) -> Option<&str> {
        self.domain_key.as_deref()
    }

    pub fn entity_key(&self) -> Option<&str> {
        self.entity_key.as_deref()
    }

    pub fn conditions(&self) -> &ConditionSet {
        &self.conditions
    }

    pub(crate) fn entity_of<'a>(&self, holder: &'a dyn Any) -> Result<Option<&'a dyn Any>> {
        match (&self.kind, &self.entity) {
            (HolderKind::Entity, _) => Ok(Some(holder)),
            (HolderKind::Wrapper, Some(entity)) => entity.get(holder),
            _ => Ok(None),
        }
    }

    pub(crate) fn entity_of_mut<'a>(&self, holder: &'a mut dyn Any) -> Result<Option<&'a mut dyn Any>> {
        match (&self.kind, &self.entity) {
            (HolderKind::Entity, _) => Ok(Some(holder)),
            (HolderKind::Wrapper, Some(entity)) => entity.get_mut(holder),
            _ => Ok(None),
        }
    }

    /// Fixed conditions plus the link fields bound to `domain_id` and
    /// `entity_id`. `None` when a declared link field would be bound to null,
    /// in which case no persisted row can belong to the owner.
    pub(crate) fn linkage(&self, domain_id: &Value, entity_id: &Value) -> Option<ConditionSet> {
        let mut conditions = self.conditions.clone();
        for (key, value) in [(&self.domain_key, domain_id), (&self.entity_key, entity_id)] {
            if let Some(key) = key {
                if value.is_null() {
                    return None;
                }
                conditions.push(key, ConditionType::Equal, vec![value.clone()]);
            }
        }
        Some(conditions)
    }

    /// Values written onto every saved entity: the link fields plus the
    /// first equality value of each fixed condition.
    pub(crate) fn stamps(&self, domain_id: &Value, entity_id: &Value) -> Vec<(&FieldDescriptor, Value)> {
        let Some(model) = &self.model else {
            return Vec::new();
        };
        let mut stamps = Vec::new();
        for (key, value) in [(&self.domain_key, domain_id), (&self.entity_key, entity_id)] {
            if let Some(field) = key.as_deref().and_then(|key| model.field(key)) {
                stamps.push((field, value.clone()));
            }
        }
        for (name, entries) in self.conditions.iter() {
            let first_equal = entries
                .iter()
                .find(|entry| entry.operator == ConditionType::Equal && !entry.value.is_null());
            if let (Some(entry), Some(field)) = (first_equal, model.field(name)) {
                stamps.push((field, entry.value.clone()));
            }
        }
        stamps
    }
}

impl fmt::Debug for SlotNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotNode")
            .field("name", &self.name)
            .field("holder", &self.holder_name)
            .field("kind", &self.kind)
            .field("collection", &self.collection)
            .field("model", &self.model.as_ref().map(|model| model.name()))
            .field("domain_key", &self.domain_key)
            .field("entity_key", &self.entity_key)
            .field("children", &self.children)
            .finish()
    }
}

/// Immutable slot tree of an aggregate type.
pub struct AggregateDescriptor {
    pub(crate) type_id: TypeId,
    pub(crate) name: String,
    pub(crate) root_model: Arc<ModelDescriptor>,
    pub(crate) root: Arc<dyn EntityAccess>,
    pub(crate) slots: Vec<SlotId>,
    pub(crate) arena: Vec<SlotNode>,
}

impl AggregateDescriptor {
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root_model(&self) -> &Arc<ModelDescriptor> {
        &self.root_model
    }

    /// Top-level slots in declaration order.
    pub fn slot_ids(&self) -> &[SlotId] {
        &self.slots
    }

    pub fn node(&self, id: SlotId) -> &SlotNode {
        &self.arena[id.0]
    }

    pub fn slot(&self, name: &str) -> Option<SlotId> {
        self.slots.iter().copied().find(|id| self.node(*id).name == name)
    }

    /// Nested slots of `id`, following a shared child list at most once per
    /// arena entry.
    pub fn children(&self, id: SlotId) -> &[SlotId] {
        let mut current = id;
        for _ in 0..self.arena.len() {
            match &self.node(current).children {
                SlotChildren::Own(children) => return children,
                SlotChildren::Shared(target) => current = *target,
            }
        }
        &[]
    }

    pub fn slot_count(&self) -> usize {
        self.arena.len()
    }
}

impl fmt::Debug for AggregateDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateDescriptor")
            .field("name", &self.name)
            .field("root", &self.root_model.name())
            .field("slots", &self.arena)
            .finish()
    }
}
