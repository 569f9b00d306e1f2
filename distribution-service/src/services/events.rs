//! Change event hub.
//!
//! Every successful write publishes a [`ChangeEvent`] on a process-wide
//! broadcast channel. Dashboard clients subscribe per tenant over SSE and
//! fold the events into local views with [`crate::services::live::LiveView`].
//!
//! Delivery is best-effort: a subscriber that falls behind the channel
//! capacity loses the oldest events (tokio broadcast semantics) and is
//! expected to re-fetch.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Which table the event concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Product,
    Customer,
    Invoice,
    Payment,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Product => "product",
            EntityKind::Customer => "customer",
            EntityKind::Invoice => "invoice",
            EntityKind::Payment => "payment",
        }
    }
}

/// What happened to the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Inserted,
    Updated,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Inserted => "inserted",
            ChangeKind::Updated => "updated",
            ChangeKind::Deleted => "deleted",
        }
    }
}

/// A single row change, scoped to one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub tenant_id: Uuid,
    pub entity: EntityKind,
    pub change: ChangeKind,
    pub entity_id: Uuid,
    /// Full row as JSON for inserts/updates, absent for deletes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

/// Broadcast hub shared through `AppState`.
#[derive(Clone)]
pub struct EventHub {
    sender: broadcast::Sender<ChangeEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a change event. Lagging or absent subscribers are not an
    /// error; writes never fail because nobody is listening.
    pub fn publish(&self, event: ChangeEvent) {
        if self.sender.send(event).is_err() {
            tracing::trace!("No active event subscribers");
        }
    }

    /// Subscribe to the raw event stream. Callers filter by tenant.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }
}

impl ChangeEvent {
    pub fn inserted<T: Serialize>(
        tenant_id: Uuid,
        entity: EntityKind,
        entity_id: Uuid,
        row: &T,
    ) -> Self {
        Self {
            tenant_id,
            entity,
            change: ChangeKind::Inserted,
            entity_id,
            payload: serde_json::to_value(row).ok(),
        }
    }

    pub fn updated<T: Serialize>(
        tenant_id: Uuid,
        entity: EntityKind,
        entity_id: Uuid,
        row: &T,
    ) -> Self {
        Self {
            tenant_id,
            entity,
            change: ChangeKind::Updated,
            entity_id,
            payload: serde_json::to_value(row).ok(),
        }
    }

    pub fn deleted(tenant_id: Uuid, entity: EntityKind, entity_id: Uuid) -> Self {
        Self {
            tenant_id,
            entity,
            change: ChangeKind::Deleted,
            entity_id,
            payload: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_reach_subscribers() {
        let hub = EventHub::new(16);
        let mut rx = hub.subscribe();
        let tenant = Uuid::new_v4();
        let id = Uuid::new_v4();

        hub.publish(ChangeEvent::deleted(tenant, EntityKind::Payment, id));

        let event = rx.recv().await.expect("event");
        assert_eq!(event.tenant_id, tenant);
        assert_eq!(event.entity, EntityKind::Payment);
        assert_eq!(event.change, ChangeKind::Deleted);
        assert_eq!(event.entity_id, id);
        assert!(event.payload.is_none());
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let hub = EventHub::new(4);
        hub.publish(ChangeEvent::deleted(
            Uuid::new_v4(),
            EntityKind::Product,
            Uuid::new_v4(),
        ));
    }
}
