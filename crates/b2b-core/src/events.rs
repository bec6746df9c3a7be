//! Record change events and the broadcast bus that carries them.
//!
//! Every store emits a [`RecordEvent`] after each successful mutation. Live
//! subscriptions listen on the bus and re-list the owner's records whenever
//! an event for that owner arrives, so consumers always receive complete
//! record sets rather than deltas.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::OwnerId;

// ============================================================================
// Event Envelope
// ============================================================================

/// Actor metadata for event attribution.
#[derive(Debug, Clone, Serialize)]
pub struct EventActor {
    /// Actor type: `"system"` or `"user"`.
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl EventActor {
    /// System actor (admin wipe, cross-process notifications).
    pub fn system() -> Self {
        Self {
            kind: "system".to_string(),
            id: None,
        }
    }

    /// Signed-in owner.
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            kind: "user".to_string(),
            id: Some(id.into()),
        }
    }
}

/// Envelope wrapping a [`RecordEvent`] with id, timestamp and actor.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    /// Unique event identifier (UUIDv7 for temporal ordering).
    pub event_id: Uuid,
    /// Namespaced event type (e.g., `"customer.created"`).
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub actor: EventActor,
    pub payload: RecordEvent,
}

impl EventEnvelope {
    /// Wrap an event, attributing it to its owner when it has one.
    pub fn new(event: RecordEvent) -> Self {
        let actor = match &event {
            RecordEvent::OwnerChanged { .. } => EventActor::system(),
            other => EventActor::user(other.owner().as_str()),
        };
        Self::with_actor(event, actor)
    }

    pub fn with_actor(event: RecordEvent, actor: EventActor) -> Self {
        Self {
            event_id: crate::uuid_utils::new_v7(),
            event_type: event.namespaced_event_type().to_string(),
            occurred_at: Utc::now(),
            actor,
            payload: event,
        }
    }
}

// ============================================================================
// Record Event (domain payloads)
// ============================================================================

/// A change to an owner's customer records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum RecordEvent {
    CustomerCreated { owner: OwnerId, customer_id: Uuid },
    CustomerUpdated { owner: OwnerId, customer_id: Uuid },
    CustomerDeleted { owner: OwnerId, customer_id: Uuid },
    /// Records changed in bulk (wipe, change from another process).
    OwnerChanged { owner: OwnerId },
}

impl RecordEvent {
    pub fn owner(&self) -> &OwnerId {
        match self {
            RecordEvent::CustomerCreated { owner, .. }
            | RecordEvent::CustomerUpdated { owner, .. }
            | RecordEvent::CustomerDeleted { owner, .. }
            | RecordEvent::OwnerChanged { owner } => owner,
        }
    }

    pub fn customer_id(&self) -> Option<Uuid> {
        match self {
            RecordEvent::CustomerCreated { customer_id, .. }
            | RecordEvent::CustomerUpdated { customer_id, .. }
            | RecordEvent::CustomerDeleted { customer_id, .. } => Some(*customer_id),
            RecordEvent::OwnerChanged { .. } => None,
        }
    }

    pub fn namespaced_event_type(&self) -> &'static str {
        match self {
            RecordEvent::CustomerCreated { .. } => "customer.created",
            RecordEvent::CustomerUpdated { .. } => "customer.updated",
            RecordEvent::CustomerDeleted { .. } => "customer.deleted",
            RecordEvent::OwnerChanged { .. } => "owner.changed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Broadcast-based event bus for record changes.
///
/// Slow receivers that fall behind get a `Lagged` error; live feeds answer
/// that by re-listing, so no change is ever lost from the consumer's view.
pub struct EventBus {
    tx: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all subscribers. Dropped silently when nobody listens.
    pub fn emit(&self, event: RecordEvent) {
        self.send(EventEnvelope::new(event));
    }

    /// Emit an event attributed to an explicit actor.
    pub fn emit_as(&self, event: RecordEvent, actor: EventActor) {
        self.send(EventEnvelope::with_actor(event, actor));
    }

    fn send(&self, envelope: EventEnvelope) {
        tracing::debug!(
            event_type = %envelope.event_type,
            event_id = %envelope.event_id,
            owner = %envelope.payload.owner(),
            subscriber_count = self.tx.receiver_count(),
            "EventBus emit"
        );
        let _ = self.tx.send(envelope);
    }

    /// Subscribe to receive enveloped events.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.tx.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::defaults::EVENT_BUS_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> OwnerId {
        OwnerId::new("owner-1").unwrap()
    }

    #[tokio::test]
    async fn test_event_bus_emit_subscribe() {
        let bus = EventBus::new(32);
        let mut rx = bus.subscribe();

        bus.emit(RecordEvent::CustomerCreated {
            owner: owner(),
            customer_id: Uuid::nil(),
        });

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.event_type, "customer.created");
        assert_eq!(envelope.actor.kind, "user");
        assert_eq!(envelope.actor.id.as_deref(), Some("owner-1"));
        assert_eq!(envelope.payload.customer_id(), Some(Uuid::nil()));
    }

    #[tokio::test]
    async fn test_owner_changed_attributed_to_system() {
        let bus = EventBus::new(32);
        let mut rx = bus.subscribe();
        bus.emit(RecordEvent::OwnerChanged { owner: owner() });
        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.actor.kind, "system");
        assert_eq!(envelope.payload.customer_id(), None);
    }

    #[tokio::test]
    async fn test_event_bus_no_subscribers_ok() {
        let bus = EventBus::new(4);
        bus.emit(RecordEvent::OwnerChanged { owner: owner() });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_event_bus_subscriber_count() {
        let bus = EventBus::new(32);
        let rx1 = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
        drop(rx1);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_record_event_json() {
        let event = RecordEvent::CustomerDeleted {
            owner: owner(),
            customer_id: Uuid::nil(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"CustomerDeleted""#));
        assert!(json.contains(r#""owner":"owner-1""#));
    }
}
