use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use ripple_core::EventEnvelope;

/// Why a record left the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeadLetterReason {
    /// The wire bytes did not decode to a valid envelope.
    Decode,
    /// The envelope decoded but the durable store rejected it.
    Persist,
}

/// Optional sink for records the pipeline would otherwise silently drop.
/// When no sink is configured, decode and persist failures are logged and
/// discarded.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    /// Raw bytes that never became an envelope.
    async fn record(&self, reason: DeadLetterReason, key: &str, value: Bytes);

    /// A decoded envelope that failed a later stage.
    async fn record_envelope(&self, reason: DeadLetterReason, envelope: &EventEnvelope);
}

/// In-memory dead-letter sink for tests and single-node deployments.
#[derive(Default)]
pub struct MemoryDeadLetter {
    entries: Mutex<Vec<DeadLetterEntry>>,
}

#[derive(Clone, Debug)]
pub struct DeadLetterEntry {
    pub reason: DeadLetterReason,
    pub key: String,
    pub value: Bytes,
}

impl MemoryDeadLetter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<DeadLetterEntry> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl DeadLetterSink for MemoryDeadLetter {
    async fn record(&self, reason: DeadLetterReason, key: &str, value: Bytes) {
        self.entries.lock().push(DeadLetterEntry {
            reason,
            key: key.to_owned(),
            value,
        });
    }

    async fn record_envelope(&self, reason: DeadLetterReason, envelope: &EventEnvelope) {
        let value = envelope.encode().unwrap_or_default();
        self.entries.lock().push(DeadLetterEntry {
            reason,
            key: envelope.event_id.as_str().to_owned(),
            value,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_raw_bytes() {
        let sink = MemoryDeadLetter::new();
        sink.record(DeadLetterReason::Decode, "k1", Bytes::from_static(b"junk"))
            .await;

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].reason, DeadLetterReason::Decode);
        assert_eq!(entries[0].key, "k1");
    }

    #[tokio::test]
    async fn records_envelope_by_event_id() {
        use ripple_core::{EventPayload, OperationMeasured, SessionId};

        let sink = MemoryDeadLetter::new();
        let envelope = EventEnvelope::new(
            EventPayload::OperationMeasured(OperationMeasured {
                operation: "persist".into(),
                duration_ms: 1,
                success: false,
                metadata: serde_json::json!({}),
            }),
            "u",
            SessionId::new(),
        );
        sink.record_envelope(DeadLetterReason::Persist, &envelope).await;

        let entries = sink.entries();
        assert_eq!(entries[0].reason, DeadLetterReason::Persist);
        assert_eq!(entries[0].key, envelope.event_id.as_str());
    }
}
