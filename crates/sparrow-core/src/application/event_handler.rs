use async_trait::async_trait;
use tracing::{debug, warn};

use crate::{domain::events::DomainEvent, CoreError};

/// Handler for domain events
#[async_trait]
pub trait DomainEventHandler: Send + Sync {
    /// Handle a domain event
    async fn handle_event(&self, event: Box<dyn DomainEvent>) -> Result<(), CoreError>;
}

/// Event handler that writes every event to the tracing subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventHandler;

#[async_trait]
impl DomainEventHandler for TracingEventHandler {
    async fn handle_event(&self, event: Box<dyn DomainEvent>) -> Result<(), CoreError> {
        debug!(
            event_type = event.event_type(),
            instance_id = %event.instance_id(),
            timestamp = %event.timestamp().to_rfc3339(),
            ?event,
            "Domain event"
        );
        Ok(())
    }
}

/// Forward events to `handler`
///
/// Events are published after the state change is stored, so a failing
/// handler is logged rather than reported to the caller.
pub(crate) async fn publish_events(handler: &dyn DomainEventHandler, events: Vec<Box<dyn DomainEvent>>) {
    for event in events {
        let event_type = event.event_type();
        if let Err(e) = handler.handle_event(event).await {
            warn!(event_type, error = %e, "Domain event handler failed");
        }
    }
}
