use std::sync::Arc;

use crate::core::{DbError, Result};
use crate::domain::descriptor::{AggregateDescriptor, SlotId};
use crate::mapper::MapperCore;
use crate::model::ModelDescriptor;
use crate::query::QueryCompiler;
use crate::storage::Datasources;

/// Aggregate descriptor with a row mapper resolved for the root and for
/// every slot that stores an entity.
pub(crate) struct Engine {
    pub(crate) descriptor: Arc<AggregateDescriptor>,
    pub(crate) root: MapperCore,
    mappers: Vec<Option<MapperCore>>,
}

impl Engine {
    pub(crate) fn new(
        descriptor: Arc<AggregateDescriptor>,
        datasources: &Datasources,
        compiler: &Arc<dyn QueryCompiler>,
    ) -> Result<Self> {
        let mapper_for = |model: &Arc<ModelDescriptor>| -> Result<MapperCore> {
            let store = datasources.store_for(model)?;
            Ok(MapperCore::new(Arc::clone(model), store, Arc::clone(compiler)))
        };

        let root = mapper_for(descriptor.root_model())?;
        let mappers = descriptor
            .arena
            .iter()
            .map(|node| node.model.as_ref().map(&mapper_for).transpose())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { descriptor, root, mappers })
    }

    pub(crate) fn mapper(&self, slot: SlotId) -> Result<&MapperCore> {
        self.mappers.get(slot.0).and_then(Option::as_ref).ok_or_else(|| {
            DbError::configuration(format!(
                "slot '{}' of aggregate '{}' has no entity to persist",
                self.descriptor.node(slot).name(),
                self.descriptor.name()
            ))
        })
    }
}
