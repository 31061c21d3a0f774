use std::any::Any;
use std::collections::HashSet;

use tracing::{debug, trace};

use crate::core::{DbError, Result, Value};
use crate::domain::descriptor::{HolderKind, SlotId};
use crate::domain::engine::Engine;

impl Engine {
    /// Persists the root, then every slot (or only `changed` ones), and
    /// returns the root identity.
    pub(crate) fn save(&self, aggregate: &mut dyn Any, changed: Option<&HashSet<String>>) -> Result<Value> {
        let domain_id = self.save_root(aggregate)?;

        for &slot in self.descriptor.slot_ids() {
            let node = self.descriptor.node(slot);
            if changed.is_some_and(|changed| !changed.contains(node.name())) {
                trace!(slot = node.name(), "slot unchanged, skipped");
                continue;
            }
            self.save_slot(slot, aggregate, &domain_id, &domain_id)?;
        }
        Ok(domain_id)
    }

    /// Updates the root by id when it has one; inserts when it has none or
    /// the update matched nothing.
    fn save_root(&self, aggregate: &mut dyn Any) -> Result<Value> {
        let model = self.root.descriptor();
        let root = self.descriptor.root.get_mut(aggregate)?.ok_or_else(|| {
            DbError::PersistFailed(format!("aggregate '{}' carries no root entity", self.descriptor.name()))
        })?;

        let mut domain_id = model.id_value(root)?;
        let mut saved = false;
        if !domain_id.is_null() {
            saved = self.root.update_by_id(root, false)?;
        }
        if !saved {
            saved = self.root.insert(root)?;
            domain_id = model.id_value(root)?;
        }
        if !saved || domain_id.is_null() {
            return Err(DbError::PersistFailed(format!(
                "root '{}' of aggregate '{}' was neither updated nor inserted",
                model.name(),
                self.descriptor.name()
            )));
        }
        debug!(aggregate = self.descriptor.name(), id = %domain_id, "saved aggregate root");
        Ok(domain_id)
    }

    fn save_slot(&self, slot: SlotId, parent: &mut dyn Any, domain_id: &Value, entity_id: &Value) -> Result<()> {
        let node = self.descriptor.node(slot);
        let mut holders = node.access.holders_mut(parent)?;

        if node.kind != HolderKind::Composite {
            let mapper = self.mapper(slot)?;
            let model = mapper.descriptor();
            let stamps = node.stamps(domain_id, entity_id);

            let mut inserts: Vec<&mut dyn Any> = Vec::new();
            let mut updates: Vec<&mut dyn Any> = Vec::new();
            let mut retain: Vec<Value> = Vec::new();
            for holder in holders.iter_mut() {
                let Some(entity) = node.entity_of_mut(&mut **holder)? else {
                    continue;
                };
                for (field, value) in &stamps {
                    field.set(&mut *entity, value.clone())?;
                }
                let id = model.id_value(&*entity)?;
                if id.is_null() {
                    inserts.push(entity);
                } else {
                    retain.push(id);
                    updates.push(entity);
                }
            }

            self.delete_value_objects(slot, domain_id, entity_id, &retain)?;
            if !inserts.is_empty() {
                mapper.batch_insert(&mut inserts)?;
            }
            for entity in updates {
                if !mapper.update_by_id(entity, false)? {
                    trace!(slot = node.name(), "update matched no row");
                }
            }
            trace!(slot = node.name(), inserted = inserts.len(), retained = retain.len(), "saved slot");
        }

        let children = self.descriptor.children(slot);
        if children.is_empty() {
            return Ok(());
        }
        for holder in holders.iter_mut() {
            let child_entity_id = match node.kind {
                HolderKind::Composite => entity_id.clone(),
                _ => match node.entity_of(&**holder)? {
                    Some(entity) => self.mapper(slot)?.descriptor().id_value(entity)?,
                    None => continue,
                },
            };
            for &child in children {
                self.save_slot(child, &mut **holder, domain_id, &child_entity_id)?;
            }
        }
        Ok(())
    }
}
