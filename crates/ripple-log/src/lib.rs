//! Client interface to the durable, partitioned event log, plus an
//! in-process implementation for single-node deployments and tests.
//!
//! The pipeline only ever sees [`EventLog`] / [`LogSubscription`]; a broker
//! client for an external log plugs in at the same seam.

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

pub use memory::MemoryLog;

/// Acknowledgment for a published record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ack {
    pub partition: u32,
    pub offset: u64,
}

/// One record read back from the log.
#[derive(Clone, Debug)]
pub struct LogRecord {
    pub key: String,
    pub value: Bytes,
    pub partition: u32,
    pub offset: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// The log has been shut down. Fatal for a consumer loop.
    #[error("log closed")]
    Closed,

    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    /// Transient transport failure. Logged, never retried.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Append-only, partitioned, offset-addressable log.
///
/// Records sharing a partition key land on the same partition and preserve
/// publish order there. No order is defined across keys.
#[async_trait]
pub trait EventLog: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, value: Bytes) -> Result<Ack, LogError>;

    /// Open a subscription starting at the current tail of the topic.
    async fn subscribe(&self, topic: &str) -> Result<Box<dyn LogSubscription>, LogError>;

    /// Cheap reachability probe for health reporting.
    async fn ping(&self) -> Result<(), LogError>;

    /// Shut the log down. In-flight and future polls fail with
    /// [`LogError::Closed`] so blocked consumers unwind promptly.
    async fn close(&self);
}

/// A pollable cursor over one topic.
#[async_trait]
pub trait LogSubscription: Send + Sync {
    /// Wait up to `max_wait` for records. An empty batch is not an error;
    /// per-partition order is preserved within and across batches.
    async fn poll(&mut self, max_wait: Duration) -> Result<Vec<LogRecord>, LogError>;
}
