use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use ripple_log::{EventLog, LogError};

use crate::broadcaster::run_broadcaster;
use crate::consumer::run_consumer;
use crate::dead_letter::DeadLetterSink;
use crate::producer::Producer;
use crate::registry::SessionRegistry;
use crate::sink::EventSink;

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub topic: String,
    /// Bounded wait inside each consumer poll.
    pub poll_wait: Duration,
    /// Capacity of the fan-out queue between consumer and broadcaster.
    /// Overflow blocks the consumer rather than growing memory.
    pub fanout_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            topic: "llm-events".into(),
            poll_wait: Duration::from_secs(1),
            fanout_capacity: 1024,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("pipeline already running")]
    AlreadyRunning,

    #[error("subscribe failed: {0}")]
    Subscribe(#[from] LogError),
}

struct Running {
    cancel: CancellationToken,
    consumer: JoinHandle<()>,
    broadcaster: JoinHandle<()>,
}

/// Owns the two long-running loops and the client lifecycles. Clients are
/// injected at construction; nothing here is lazily created or global.
pub struct Pipeline {
    log: Arc<dyn EventLog>,
    sink: Arc<dyn EventSink>,
    registry: Arc<SessionRegistry>,
    dead_letter: Option<Arc<dyn DeadLetterSink>>,
    config: PipelineConfig,
    running: Mutex<Option<Running>>,
}

impl Pipeline {
    pub fn new(
        log: Arc<dyn EventLog>,
        sink: Arc<dyn EventSink>,
        registry: Arc<SessionRegistry>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            log,
            sink,
            registry,
            dead_letter: None,
            config,
            running: Mutex::new(None),
        }
    }

    pub fn with_dead_letter(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.dead_letter = Some(sink);
        self
    }

    /// A producer sharing this pipeline's log client and topic.
    pub fn producer(&self) -> Producer {
        Producer::new(Arc::clone(&self.log), self.config.topic.clone())
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Subscribe and schedule both loops. Returns once they are spawned.
    pub async fn start(&self) -> Result<(), PipelineError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(PipelineError::AlreadyRunning);
        }

        let subscription = self.log.subscribe(&self.config.topic).await?;
        let cancel = CancellationToken::new();
        let (fanout_tx, fanout_rx) = tokio::sync::mpsc::channel(self.config.fanout_capacity);

        let consumer = tokio::spawn(run_consumer(
            subscription,
            Arc::clone(&self.sink),
            self.dead_letter.clone(),
            fanout_tx,
            self.config.poll_wait,
            cancel.clone(),
        ));
        let broadcaster = tokio::spawn(run_broadcaster(
            fanout_rx,
            Arc::clone(&self.registry),
            cancel.clone(),
        ));

        *running = Some(Running {
            cancel,
            consumer,
            broadcaster,
        });
        tracing::info!(topic = %self.config.topic, "pipeline started");
        Ok(())
    }

    /// Idempotent shutdown: cancel both loops (unblocking any in-flight
    /// poll or dequeue), close the log client, wait for the loops, clear
    /// the registry.
    pub async fn stop(&self) {
        let running = self.running.lock().await.take();
        let Some(running) = running else {
            return;
        };

        running.cancel.cancel();
        self.log.close().await;

        if let Err(e) = running.consumer.await {
            tracing::warn!(error = %e, "consumer task join failed");
        }
        if let Err(e) = running.broadcaster.await {
            tracing::warn!(error = %e, "broadcaster task join failed");
        }

        self.registry.clear();
        tracing::info!("pipeline stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }
}
