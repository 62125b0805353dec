use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::Item;

/// What happened to the entity a push event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushEventKind {
    Created,
    Updated,
    Deleted,
}

/// One change notification from the push collaborator.
///
/// Delivery is best-effort and at-least-once: events may duplicate, arrive
/// out of order, or arrive before/after the matching REST state exists. The
/// absence of an expected event is normal; the next snapshot reconciles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushEvent {
    pub channel: String,
    #[serde(rename = "type")]
    pub kind: PushEventKind,
    pub entity_id: Uuid,
    pub entity_type: String,
    #[serde(default)]
    pub payload: Value,
}

impl PushEvent {
    /// Decode the embedded item carried by `created`/`updated` events.
    /// `deleted` events carry no payload and return `None`.
    pub fn item(&self) -> Option<Item> {
        serde_json::from_value(self.payload.clone()).ok()
    }
}

/// Commands sent from the client to the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayCommand {
    /// Subscribe to the named event streams. The gateway only forwards
    /// events for subscribed channels.
    Subscribe { channels: Vec<String> },
}
