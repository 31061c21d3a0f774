use tracing::{debug, trace};

use crate::core::{Result, Value};
use crate::domain::descriptor::{HolderKind, SlotId};
use crate::domain::engine::Engine;
use crate::query::ConditionType;

impl Engine {
    /// Removes every slot row of the aggregate, then the root row.
    pub(crate) fn delete(&self, domain_id: &Value) -> Result<()> {
        if domain_id.is_null() {
            return Ok(());
        }
        for &slot in self.descriptor.slot_ids() {
            self.delete_value_objects(slot, domain_id, domain_id, &[])?;
        }
        let removed = self.root.delete_by_id(domain_id)?;
        debug!(aggregate = self.descriptor.name(), id = %domain_id, removed, "deleted aggregate");
        Ok(())
    }

    /// Depth-first removal of the persisted rows of `slot` owned by
    /// `entity_id`, except those whose identity is in `retain`.
    pub(crate) fn delete_value_objects(
        &self,
        slot: SlotId,
        domain_id: &Value,
        entity_id: &Value,
        retain: &[Value],
    ) -> Result<()> {
        let node = self.descriptor.node(slot);
        let children = self.descriptor.children(slot);

        if !children.is_empty() {
            if node.kind == HolderKind::Composite {
                for &child in children {
                    self.delete_value_objects(child, domain_id, entity_id, retain)?;
                }
            } else if let Some(conditions) = node.linkage(domain_id, entity_id) {
                for id in self.mapper(slot)?.select_ids(&conditions)? {
                    if id.is_null() || retain.contains(&id) {
                        continue;
                    }
                    for &child in children {
                        self.delete_value_objects(child, domain_id, &id, &[])?;
                    }
                }
            }
        }

        if node.kind == HolderKind::Composite {
            return Ok(());
        }
        let Some(mut conditions) = node.linkage(domain_id, entity_id) else {
            return Ok(());
        };
        let mapper = self.mapper(slot)?;
        if !retain.is_empty() {
            let id_field = mapper.descriptor().require_id_field()?;
            conditions.push(&id_field.name, ConditionType::NotIn, retain.to_vec());
        }
        let deleted = mapper.delete_by_conditions(&conditions)?;
        trace!(slot = node.name(), deleted, retained = retain.len(), "cleaned slot");
        Ok(())
    }
}
