use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::tenancy::SchemaName;

const CHANNEL_CAPACITY: usize = 64;

/// Message pushed to subscribers of a tenant channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeEvent {
    pub event_type: String,
    pub channel: String,
    pub payload: Value,
    pub emitted_at: DateTime<Utc>,
}

impl RealtimeEvent {
    pub fn new(event_type: &str, channel: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.to_string(),
            channel: channel.into(),
            payload,
            emitted_at: Utc::now(),
        }
    }
}

/// Outbound broadcast hook (websocket fan-out, message bus, ...).
pub trait EventPublisher: Send + Sync {
    fn broadcast(&self, schema: &SchemaName, event: RealtimeEvent) -> Result<(), PublishError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("realtime transport unavailable: {0}")]
    Transport(String),
}

/// Broadcast that never fails the caller; transport errors are logged.
pub(crate) fn publish(publisher: &dyn EventPublisher, schema: &SchemaName, event: RealtimeEvent) {
    let event_type = event.event_type.clone();
    let channel = event.channel.clone();
    if let Err(err) = publisher.broadcast(schema, event) {
        tracing::warn!(%schema, %channel, event = %event_type, error = %err, "broadcast failed");
    }
}

/// In-process fan-out with one `tokio::sync::broadcast` channel per tenant channel.
#[derive(Debug, Default)]
pub struct RealtimeHub {
    channels: Mutex<HashMap<(SchemaName, String), broadcast::Sender<RealtimeEvent>>>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(
        &self,
        schema: &SchemaName,
        channel: &str,
    ) -> Result<broadcast::Sender<RealtimeEvent>, PublishError> {
        let mut channels = self
            .channels
            .lock()
            .map_err(|_| PublishError::Transport("channel registry poisoned".to_string()))?;
        let sender = channels
            .entry((schema.clone(), channel.to_string()))
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        Ok(sender.clone())
    }

    pub fn subscribe(
        &self,
        schema: &SchemaName,
        channel: &str,
    ) -> Result<broadcast::Receiver<RealtimeEvent>, PublishError> {
        Ok(self.sender(schema, channel)?.subscribe())
    }
}

impl EventPublisher for RealtimeHub {
    fn broadcast(&self, schema: &SchemaName, event: RealtimeEvent) -> Result<(), PublishError> {
        let sender = self.sender(schema, &event.channel)?;
        match sender.send(event) {
            Ok(receivers) => {
                tracing::debug!(%schema, receivers, "realtime event delivered");
            }
            Err(_) => {
                tracing::trace!(%schema, "realtime event dropped without subscribers");
            }
        }
        Ok(())
    }
}
