use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use ripple_core::EventEnvelope;

use crate::registry::SessionRegistry;

/// Long-running fan-out loop: dequeue → push to every live session → prune
/// dead sessions.
///
/// Delivery is present-tense only: the membership snapshot is taken when an
/// envelope is dequeued, so late joiners never see it through this path.
/// Failure handling is two-phase — attempt every session first, evict the
/// failures after the full pass — so one broken session cannot block the
/// rest.
pub(crate) async fn run_broadcaster(
    mut fanout: mpsc::Receiver<EventEnvelope>,
    registry: Arc<SessionRegistry>,
    cancel: CancellationToken,
) {
    tracing::info!("broadcaster loop started");

    loop {
        let envelope = tokio::select! {
            _ = cancel.cancelled() => break,
            next = fanout.recv() => match next {
                Some(envelope) => envelope,
                None => {
                    tracing::info!("fan-out queue closed, broadcaster loop stopping");
                    break;
                }
            },
        };

        let frame = match serde_json::to_string(&envelope) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(event_id = %envelope.event_id, error = %e, "frame serialize failed");
                continue;
            }
        };

        let sessions = registry.snapshot();
        let mut failed = Vec::new();
        for (id, tx) in &sessions {
            match tx.try_send(frame.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    // Slow client: drop this frame for it, keep the session.
                    tracing::warn!(channel_id = %id, "push queue full, dropping frame");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    failed.push(id.clone());
                }
            }
        }

        for id in failed {
            registry.remove(&id);
            tracing::info!(channel_id = %id, "evicted dead push session");
        }

        tracing::debug!(
            event_id = %envelope.event_id,
            sessions = sessions.len(),
            "event broadcast"
        );
    }
}
