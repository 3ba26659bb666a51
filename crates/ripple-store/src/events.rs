use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use ripple_core::{EventEnvelope, EventPayload, SessionId};

use crate::database::Database;
use crate::error::StoreError;

/// A persisted event row: the envelope fields plus the server-assigned
/// insertion time. Payload is schema-on-read.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: String,
    pub event_type: String,
    pub timestamp_ms: i64,
    pub user_id: String,
    pub session_id: String,
    pub payload: serde_json::Value,
    pub created_at: String,
}

impl StoredEvent {
    /// Decode the stored payload back into its typed variant.
    pub fn decode_payload(&self) -> Result<EventPayload, ripple_core::CodecError> {
        EventPayload::from_parts(&self.event_type, self.payload.clone())
    }
}

pub struct EventStore {
    db: Database,
}

impl EventStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persist one envelope. A duplicate `event_id` is a conflict; callers
    /// make exactly one attempt and do not retry.
    #[instrument(skip(self, envelope), fields(event_id = %envelope.event_id))]
    pub fn insert(&self, envelope: &EventEnvelope) -> Result<(), StoreError> {
        let payload = serde_json::to_string(&envelope.payload.data())?;
        let created_at = Utc::now().to_rfc3339();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO events (event_id, event_type, timestamp_ms, user_id, session_id, payload, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    envelope.event_id.as_str(),
                    envelope.event_type(),
                    envelope.timestamp_ms,
                    envelope.user_id,
                    envelope.session_id.as_str(),
                    payload,
                    created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Most-recent-first slice of the event history. Rowid breaks ties so
    /// same-millisecond inserts keep a stable order.
    #[instrument(skip(self))]
    pub fn recent(&self, limit: u32) -> Result<Vec<StoredEvent>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT event_id, event_type, timestamp_ms, user_id, session_id, payload, created_at
                 FROM events
                 ORDER BY timestamp_ms DESC, rowid DESC
                 LIMIT ?1",
            )?;
            let mut rows = stmt.query([limit])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_event(row)?);
            }
            Ok(results)
        })
    }

    /// Events for one correlation session, most-recent-first.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub fn for_session(
        &self,
        session_id: &SessionId,
        limit: u32,
    ) -> Result<Vec<StoredEvent>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT event_id, event_type, timestamp_ms, user_id, session_id, payload, created_at
                 FROM events
                 WHERE session_id = ?1
                 ORDER BY timestamp_ms DESC, rowid DESC
                 LIMIT ?2",
            )?;
            let mut rows = stmt.query(rusqlite::params![session_id.as_str(), limit])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_event(row)?);
            }
            Ok(results)
        })
    }

    pub fn count(&self) -> Result<i64, StoreError> {
        self.db.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?)
        })
    }
}

fn row_to_event(row: &rusqlite::Row<'_>) -> Result<StoredEvent, StoreError> {
    let payload_raw: String = row.get(5)?;
    Ok(StoredEvent {
        event_id: row.get(0)?,
        event_type: row.get(1)?,
        timestamp_ms: row.get(2)?,
        user_id: row.get(3)?,
        session_id: row.get(4)?,
        payload: serde_json::from_str(&payload_raw)?,
        created_at: row.get(6)?,
    })
}
