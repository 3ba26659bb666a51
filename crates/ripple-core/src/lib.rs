pub mod envelope;
pub mod error;
pub mod ids;
pub mod payload;

pub use envelope::EventEnvelope;
pub use error::CodecError;
pub use ids::{ChannelId, EventId, SessionId};
pub use payload::{EventPayload, InferenceCompleted, OperationMeasured, StateChanged};
