use std::any::Any;
use std::sync::Arc;

use tracing::{trace, warn};

use crate::core::Result;

/// An opaque domain event handed to the publisher after persistence.
pub type DomainEvent = Box<dyn Any + Send + Sync>;

/// Receives domain events once a save or delete has completed.
pub trait DomainEventPublisher: Send + Sync {
    fn publish(&self, event: &dyn Any) -> Result<()>;
}

impl<F> DomainEventPublisher for F
where
    F: Fn(&dyn Any) -> Result<()> + Send + Sync,
{
    fn publish(&self, event: &dyn Any) -> Result<()> {
        self(event)
    }
}

/// Best-effort delivery; a failing publisher is logged and skipped.
pub(crate) fn publish_all(publisher: Option<&Arc<dyn DomainEventPublisher>>, events: Vec<DomainEvent>) {
    if events.is_empty() {
        return;
    }
    let Some(publisher) = publisher else {
        trace!(events = events.len(), "no event publisher registered, dropping events");
        return;
    };
    for event in events {
        let event: &dyn Any = &*event;
        if let Err(error) = publisher.publish(event) {
            warn!(%error, "failed to publish domain event");
        }
    }
}
