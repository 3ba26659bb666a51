//! The streaming path: producer → durable log → consumer → {store, fan-out}
//! → broadcaster → live push sessions.

pub mod broadcaster;
pub mod consumer;
pub mod dead_letter;
pub mod orchestrator;
pub mod producer;
pub mod registry;
pub mod sink;

pub use dead_letter::{DeadLetterReason, DeadLetterSink, MemoryDeadLetter};
pub use orchestrator::{Pipeline, PipelineConfig, PipelineError};
pub use producer::Producer;
pub use registry::{PushSession, SessionRegistry};
pub use sink::EventSink;
