use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Typed event payloads, discriminated by the envelope's `event_type` field.
/// The envelope layer is agnostic to payload internals beyond this tag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "payload")]
pub enum EventPayload {
    #[serde(rename = "llm.inference.completed")]
    InferenceCompleted(InferenceCompleted),

    #[serde(rename = "system.state_change")]
    StateChanged(StateChanged),

    #[serde(rename = "performance.operation")]
    OperationMeasured(OperationMeasured),
}

/// One completed inference call, success or failure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InferenceCompleted {
    pub prompt: String,
    pub response: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub response_tokens: u32,
    pub latency_ms: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub intent: String,
    pub confidence: f64,
}

/// A state transition on some tracked entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateChanged {
    pub entity_type: String,
    pub entity_id: String,
    pub change_type: String,
    #[serde(default)]
    pub field_changes: serde_json::Value,
}

/// A timed operation measurement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperationMeasured {
    pub operation: String,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl EventPayload {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::InferenceCompleted(_) => "llm.inference.completed",
            Self::StateChanged(_) => "system.state_change",
            Self::OperationMeasured(_) => "performance.operation",
        }
    }

    /// Per-variant field invariants. The envelope codec rejects payloads
    /// that fail here.
    pub fn validate(&self) -> Result<(), CodecError> {
        match self {
            Self::InferenceCompleted(p) => {
                if !(0.0..=1.0).contains(&p.confidence) {
                    return Err(CodecError::Invalid(format!(
                        "confidence out of range: {}",
                        p.confidence
                    )));
                }
                Ok(())
            }
            Self::StateChanged(p) => {
                if p.entity_id.is_empty() {
                    return Err(CodecError::Invalid("empty entity_id".into()));
                }
                Ok(())
            }
            Self::OperationMeasured(p) => {
                if p.operation.is_empty() {
                    return Err(CodecError::Invalid("empty operation name".into()));
                }
                Ok(())
            }
        }
    }

    /// The type-specific payload object alone, without the `event_type` tag.
    pub fn data(&self) -> serde_json::Value {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(mut map)) => {
                map.remove("payload").unwrap_or(serde_json::Value::Null)
            }
            _ => serde_json::Value::Null,
        }
    }

    /// Rebuild a typed payload from a stored `event_type` + payload object.
    pub fn from_parts(
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<Self, CodecError> {
        let tagged = serde_json::json!({
            "event_type": event_type,
            "payload": payload,
        });
        let parsed: Self = serde_json::from_value(tagged)?;
        parsed.validate()?;
        Ok(parsed)
    }
}
