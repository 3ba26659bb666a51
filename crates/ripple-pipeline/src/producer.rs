use std::sync::Arc;

use ripple_core::{EventEnvelope, EventId, EventPayload, SessionId};
use ripple_log::EventLog;

/// Accepts domain events and hands them to the log without waiting for the
/// broker. The caller-visible contract is "accepted for processing", not
/// "durably stored": publish failures are logged and never surfaced.
pub struct Producer {
    log: Arc<dyn EventLog>,
    topic: String,
}

impl Producer {
    pub fn new(log: Arc<dyn EventLog>, topic: impl Into<String>) -> Self {
        Self {
            log,
            topic: topic.into(),
        }
    }

    /// Build an envelope with a fresh id and current timestamp, then enqueue
    /// it. Returns once the publish is handed off.
    pub fn produce(
        &self,
        payload: EventPayload,
        user_id: impl Into<String>,
        session_id: SessionId,
    ) -> EventId {
        self.produce_envelope(EventEnvelope::new(payload, user_id, session_id))
    }

    /// Enqueue a pre-built envelope. The envelope id doubles as the
    /// partition key.
    pub fn produce_envelope(&self, envelope: EventEnvelope) -> EventId {
        let event_id = envelope.event_id.clone();
        let bytes = match envelope.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(event_id = %event_id, error = %e, "event encode failed, dropping");
                return event_id;
            }
        };

        let log = Arc::clone(&self.log);
        let topic = self.topic.clone();
        let key = event_id.as_str().to_owned();
        tokio::spawn(async move {
            if let Err(e) = log.publish(&topic, &key, bytes).await {
                tracing::warn!(event_id = %key, error = %e, "event publish failed");
            }
        });

        event_id
    }
}
