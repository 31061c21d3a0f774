use std::any::Any;

use tracing::trace;

use crate::core::{DbError, Result, Value};
use crate::domain::descriptor::{HolderKind, SlotId};
use crate::domain::engine::Engine;
use crate::query::QuerySpec;

impl Engine {
    /// Loads the root row and every slot into `aggregate`. Returns `false`
    /// when no root row exists for `domain_id`.
    pub(crate) fn find(&self, aggregate: &mut dyn Any, domain_id: &Value) -> Result<bool> {
        if domain_id.is_null() {
            return Ok(false);
        }
        let Some(root) = self.root.find_by_id(domain_id)? else {
            return Ok(false);
        };
        self.descriptor.root.put(aggregate, root)?;

        for &slot in self.descriptor.slot_ids() {
            let holders = self.load_slot(slot, domain_id, domain_id)?;
            self.descriptor.node(slot).access.assign(aggregate, holders)?;
        }
        Ok(true)
    }

    fn load_slot(&self, slot: SlotId, domain_id: &Value, entity_id: &Value) -> Result<Vec<Box<dyn Any>>> {
        let node = self.descriptor.node(slot);
        match node.kind {
            HolderKind::Entity => {
                let mut entities = self.query_entities(slot, domain_id, entity_id)?;
                if !node.collection {
                    entities.truncate(1);
                }
                Ok(entities)
            }
            HolderKind::Wrapper => {
                let mut entities = self.query_entities(slot, domain_id, entity_id)?;
                if !node.collection {
                    entities.truncate(1);
                }
                let model = self.mapper(slot)?.descriptor();
                let mut holders = Vec::with_capacity(entities.len());
                for entity in entities {
                    let child_entity_id = model.id_value(entity.as_ref())?;
                    let mut holder = self.new_holder(slot)?;
                    if let Some(access) = &node.entity {
                        access.put(holder.as_mut(), entity)?;
                    }
                    self.load_children(slot, holder.as_mut(), domain_id, &child_entity_id)?;
                    holders.push(holder);
                }
                Ok(holders)
            }
            HolderKind::Composite => {
                let mut holder = self.new_holder(slot)?;
                self.load_children(slot, holder.as_mut(), domain_id, entity_id)?;
                Ok(vec![holder])
            }
        }
    }

    fn load_children(&self, slot: SlotId, holder: &mut dyn Any, domain_id: &Value, entity_id: &Value) -> Result<()> {
        for &child in self.descriptor.children(slot) {
            let holders = self.load_slot(child, domain_id, entity_id)?;
            self.descriptor.node(child).access.assign(holder, holders)?;
        }
        Ok(())
    }

    fn query_entities(&self, slot: SlotId, domain_id: &Value, entity_id: &Value) -> Result<Vec<Box<dyn Any>>> {
        let node = self.descriptor.node(slot);
        let Some(conditions) = node.linkage(domain_id, entity_id) else {
            trace!(slot = node.name(), "owner identity is null, slot stays empty");
            return Ok(Vec::new());
        };
        let spec = QuerySpec::filter(conditions);
        self.mapper(slot)?.list_by_condition(None, &[&spec])
    }

    fn new_holder(&self, slot: SlotId) -> Result<Box<dyn Any>> {
        let node = self.descriptor.node(slot);
        node.factory.map(|factory| factory()).ok_or_else(|| {
            DbError::configuration(format!("slot '{}' cannot create holders of {}", node.name(), node.holder_name()))
        })
    }
}
