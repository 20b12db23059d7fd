//! Wire format of the coordination event stream.
//!
//! Outbound control frames: `{"op": "join"|"leave", "coordination_id": ...}`.
//! Inbound frames are tagged by `kind` with the payload under `data`, which
//! is exactly the serde shape of [`WorkflowEvent`].

use conclave_domain::{CoordinationId, WorkflowEvent};
use serde::{Deserialize, Serialize};

/// Membership operation sent to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlOp {
    Join,
    Leave,
}

/// Outbound control frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFrame {
    pub op: ControlOp,
    pub coordination_id: CoordinationId,
}

impl ControlFrame {
    pub fn join(coordination_id: &CoordinationId) -> Self {
        Self {
            op: ControlOp::Join,
            coordination_id: coordination_id.clone(),
        }
    }

    pub fn leave(coordination_id: &CoordinationId) -> Self {
        Self {
            op: ControlOp::Leave,
            coordination_id: coordination_id.clone(),
        }
    }

    pub fn to_text(&self) -> String {
        // Two plain string fields cannot fail to serialize
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Classification of an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    /// A decoded event for routing
    Event,
    /// Valid JSON carrying a `kind` this client does not consume
    Unsupported(String),
    /// Not JSON, or missing the `kind` tag
    Malformed,
}

/// Classify a raw inbound frame without fully decoding it.
pub fn classify_frame(value: &serde_json::Value) -> FrameKind {
    match value.get("kind").and_then(|k| k.as_str()) {
        Some("coordination_event" | "session_updated" | "agent_updated") => FrameKind::Event,
        Some(other) => FrameKind::Unsupported(other.to_string()),
        None => FrameKind::Malformed,
    }
}

/// Decode an inbound frame already parsed as JSON.
pub fn decode_event(value: serde_json::Value) -> Result<WorkflowEvent, serde_json::Error> {
    serde_json::from_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_control_frames() {
        let id = CoordinationId::new("c1");
        assert_eq!(
            ControlFrame::join(&id).to_text(),
            r#"{"op":"join","coordination_id":"c1"}"#
        );
        assert_eq!(
            ControlFrame::leave(&id).to_text(),
            r#"{"op":"leave","coordination_id":"c1"}"#
        );
    }

    #[test]
    fn test_classify_frame() {
        assert_eq!(
            classify_frame(&json!({"kind": "agent_updated", "data": {}})),
            FrameKind::Event
        );
        assert_eq!(
            classify_frame(&json!({"kind": "heartbeat"})),
            FrameKind::Unsupported("heartbeat".to_string())
        );
        assert_eq!(classify_frame(&json!({"op": "join"})), FrameKind::Malformed);
        assert_eq!(classify_frame(&json!([1, 2])), FrameKind::Malformed);
    }

    #[test]
    fn test_decode_event() {
        let value = json!({
            "kind": "agent_updated",
            "data": {"id": "a1", "coordination_id": "c1", "role": "coder", "domain": "api", "status": "idle"}
        });
        let event = decode_event(value).unwrap();
        assert_eq!(event.coordination_id().as_str(), "c1");

        // coordination_id is required for routing
        assert!(decode_event(json!({"kind": "agent_updated", "data": {"id": "a1"}})).is_err());
    }
}
