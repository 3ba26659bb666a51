use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use ripple_core::EventEnvelope;
use ripple_log::{LogError, LogSubscription};

use crate::dead_letter::{DeadLetterReason, DeadLetterSink};
use crate::sink::EventSink;

/// Long-running poll loop: log → decode → persist (best-effort) → fan-out.
///
/// A decode failure skips that record; a persist failure is logged but the
/// envelope is still forwarded — the live stream keeps flowing even when the
/// durable record of one event is lost. Only cancellation or a closed log
/// stops the loop.
pub(crate) async fn run_consumer(
    mut subscription: Box<dyn LogSubscription>,
    sink: Arc<dyn EventSink>,
    dead_letter: Option<Arc<dyn DeadLetterSink>>,
    fanout: mpsc::Sender<EventEnvelope>,
    poll_wait: Duration,
    cancel: CancellationToken,
) {
    tracing::info!("consumer loop started");

    loop {
        let batch = tokio::select! {
            _ = cancel.cancelled() => break,
            polled = subscription.poll(poll_wait) => match polled {
                Ok(batch) => batch,
                Err(LogError::Closed) => {
                    tracing::info!("log closed, consumer loop stopping");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "log poll failed");
                    continue;
                }
            },
        };

        for record in batch {
            let envelope = match EventEnvelope::decode(&record.value) {
                Ok(envelope) => envelope,
                Err(e) => {
                    tracing::warn!(
                        partition = record.partition,
                        offset = record.offset,
                        error = %e,
                        "skipping undecodable record"
                    );
                    if let Some(dl) = &dead_letter {
                        dl.record(DeadLetterReason::Decode, &record.key, record.value)
                            .await;
                    }
                    continue;
                }
            };

            if let Err(e) = sink.persist(&envelope) {
                tracing::warn!(
                    event_id = %envelope.event_id,
                    error = %e,
                    "event persist failed, forwarding to fan-out anyway"
                );
                if let Some(dl) = &dead_letter {
                    dl.record_envelope(DeadLetterReason::Persist, &envelope).await;
                }
            }

            // Bounded queue: a stalled broadcaster backpressures the
            // consumer here instead of growing memory without bound.
            tokio::select! {
                _ = cancel.cancelled() => return,
                sent = fanout.send(envelope) => {
                    if sent.is_err() {
                        tracing::info!("fan-out queue closed, consumer loop stopping");
                        return;
                    }
                }
            }
        }
    }
}
