use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::{Ack, EventLog, LogError, LogRecord, LogSubscription};

const DEFAULT_PARTITIONS: u32 = 4;

/// In-process partitioned log. Topics are created on first use; records are
/// routed to a partition by key hash and addressed by per-partition offset.
pub struct MemoryLog {
    topics: Mutex<HashMap<String, Arc<Topic>>>,
    partitions: u32,
    closed: Arc<AtomicBool>,
}

struct Topic {
    partitions: Mutex<Vec<Vec<(String, Bytes)>>>,
    notify: Notify,
}

impl Topic {
    fn new(partitions: u32) -> Self {
        Self {
            partitions: Mutex::new(vec![Vec::new(); partitions as usize]),
            notify: Notify::new(),
        }
    }
}

impl MemoryLog {
    pub fn new(partitions: u32) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            partitions: partitions.max(1),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    fn topic(&self, name: &str) -> Arc<Topic> {
        let mut topics = self.topics.lock();
        topics
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(Topic::new(self.partitions)))
            .clone()
    }

    fn partition_for(&self, key: &str) -> u32 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % u64::from(self.partitions)) as u32
    }
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new(DEFAULT_PARTITIONS)
    }
}

#[async_trait]
impl EventLog for MemoryLog {
    async fn publish(&self, topic: &str, key: &str, value: Bytes) -> Result<Ack, LogError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(LogError::Closed);
        }
        let topic = self.topic(topic);
        let partition = self.partition_for(key);
        let offset = {
            let mut partitions = topic.partitions.lock();
            let slot = &mut partitions[partition as usize];
            slot.push((key.to_owned(), value));
            (slot.len() - 1) as u64
        };
        topic.notify.notify_waiters();
        Ok(Ack { partition, offset })
    }

    async fn subscribe(&self, topic: &str) -> Result<Box<dyn LogSubscription>, LogError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(LogError::Closed);
        }
        let topic = self.topic(topic);
        // Start at the tail: only records published after this point are seen.
        let cursors = topic.partitions.lock().iter().map(|p| p.len() as u64).collect();
        Ok(Box::new(MemorySubscription {
            topic,
            cursors,
            closed: Arc::clone(&self.closed),
        }))
    }

    async fn ping(&self) -> Result<(), LogError> {
        if self.closed.load(Ordering::Relaxed) {
            Err(LogError::Closed)
        } else {
            Ok(())
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
        let topics: Vec<Arc<Topic>> = self.topics.lock().values().cloned().collect();
        for topic in topics {
            topic.notify.notify_waiters();
        }
    }
}

struct MemorySubscription {
    topic: Arc<Topic>,
    cursors: Vec<u64>,
    closed: Arc<AtomicBool>,
}

impl MemorySubscription {
    fn drain(&mut self) -> Vec<LogRecord> {
        let partitions = self.topic.partitions.lock();
        let mut records = Vec::new();
        for (idx, slot) in partitions.iter().enumerate() {
            let cursor = self.cursors[idx] as usize;
            for (offset, (key, value)) in slot.iter().enumerate().skip(cursor) {
                records.push(LogRecord {
                    key: key.clone(),
                    value: value.clone(),
                    partition: idx as u32,
                    offset: offset as u64,
                });
            }
            self.cursors[idx] = slot.len() as u64;
        }
        records
    }
}

#[async_trait]
impl LogSubscription for MemorySubscription {
    async fn poll(&mut self, max_wait: Duration) -> Result<Vec<LogRecord>, LogError> {
        let deadline = Instant::now() + max_wait;
        loop {
            let batch = self.drain();
            if !batch.is_empty() {
                return Ok(batch);
            }
            if self.closed.load(Ordering::Relaxed) {
                return Err(LogError::Closed);
            }
            tokio::select! {
                _ = self.topic.notify.notified() => {}
                _ = tokio::time::sleep_until(deadline) => return Ok(Vec::new()),
            }
        }
    }
}
