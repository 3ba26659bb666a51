use ripple_core::EventEnvelope;
use ripple_store::{EventStore, StoreError};

/// The consumer loop's view of the durable store: one insert attempt per
/// envelope, no retry. Failures are reported but never stop the stream.
pub trait EventSink: Send + Sync {
    fn persist(&self, envelope: &EventEnvelope) -> Result<(), StoreError>;
}

impl EventSink for EventStore {
    fn persist(&self, envelope: &EventEnvelope) -> Result<(), StoreError> {
        self.insert(envelope)
    }
}
