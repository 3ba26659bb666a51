use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc;

use ripple_core::ChannelId;

/// One connected observer. The registry holds the send half of the channel;
/// the transport (WebSocket task) owns the connection itself.
pub struct PushSession {
    pub id: ChannelId,
    pub tx: mpsc::Sender<String>,
    pub connected_at: DateTime<Utc>,
}

/// Concurrency-safe registry of live push channels. Mutated from three
/// contexts: new-connection handler, disconnect handler, and broadcaster.
pub struct SessionRegistry {
    sessions: DashMap<ChannelId, PushSession>,
    send_queue: usize,
}

impl SessionRegistry {
    pub fn new(send_queue: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            send_queue,
        }
    }

    /// Register a new session and return its id + the receive half for the
    /// transport to drain.
    pub fn register(&self) -> (ChannelId, mpsc::Receiver<String>) {
        let id = ChannelId::new();
        let (tx, rx) = mpsc::channel(self.send_queue);
        self.add(id.clone(), tx);
        (id, rx)
    }

    pub fn add(&self, id: ChannelId, tx: mpsc::Sender<String>) {
        self.sessions.insert(
            id.clone(),
            PushSession {
                id,
                tx,
                connected_at: Utc::now(),
            },
        );
    }

    pub fn remove(&self, id: &ChannelId) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Copy the current membership. The broadcaster sends against this copy
    /// so no map guard is held across a send.
    pub fn snapshot(&self) -> Vec<(ChannelId, mpsc::Sender<String>)> {
        self.sessions
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().tx.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn clear(&self) {
        self.sessions.clear();
    }
}
