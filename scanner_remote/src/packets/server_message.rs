use serde::{Deserialize, Serialize};

use crate::{OperationStatus, Position, ScannerError};

/// Full description of the remote's state. Every required field must be
/// present for the snapshot to be accepted; extra fields are ignored.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    pub current_position: Position,
    pub operation_status: OperationStatus,
    pub horizontal_movement_pending: i64,
    pub vertical_movement_pending: i64,
    pub captured_positions: Vec<[i64; 2]>,
    /// Visualization eligibility. `None` when the remote omits it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<bool>,
    /// Unix seconds at which the running operation started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_start_time: Option<f64>,
    /// Seconds the current movement is expected to take.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_movement_duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<f64>,
}

impl StateSnapshot {
    pub fn from_value(data: serde_json::Value) -> Result<Self, ScannerError> {
        serde_json::from_value(data).map_err(|e| ScannerError::MalformedSnapshot(e.to_string()))
    }

    /// Highlighting may be recomputed unless the remote explicitly says no.
    pub fn visualization_ready(&self) -> bool {
        self.flag.unwrap_or(true)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    StateUpdate(StateSnapshot),
    Error { message: String },
    Pong { timestamp: Option<f64> },
    /// Operation log line broadcast by the remote, e.g. "Image captured at (3, 4)".
    Log { timestamp: Option<String>, message: String },
    /// Any `type` this client does not know. Ignored by the dispatcher.
    Unknown(String),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize)]
struct ErrorData {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize, Default)]
struct PongData {
    timestamp: Option<f64>,
}

#[derive(Deserialize)]
struct LogData {
    timestamp: Option<String>,
    message: String,
}

impl ServerMessage {
    /// Decodes one inbound text frame.
    ///
    /// Fails with [`ScannerError::Protocol`] when the frame is not a JSON
    /// object with a string `type`, and with [`ScannerError::MalformedSnapshot`]
    /// when a `state_update` is missing required fields. Unrecognized types
    /// decode successfully as [`ServerMessage::Unknown`].
    pub fn from_json(text: &str) -> Result<Self, ScannerError> {
        let envelope: Envelope =
            serde_json::from_str(text).map_err(|e| ScannerError::Protocol(e.to_string()))?;

        let message = match envelope.kind.as_str() {
            "state_update" => ServerMessage::StateUpdate(StateSnapshot::from_value(envelope.data)?),
            "error" => {
                let data: ErrorData = serde_json::from_value(envelope.data)
                    .map_err(|e| ScannerError::Protocol(format!("error notice: {}", e)))?;
                ServerMessage::Error { message: data.message }
            }
            "pong" => {
                let data: PongData = serde_json::from_value(envelope.data).unwrap_or_default();
                ServerMessage::Pong { timestamp: data.timestamp }
            }
            "log" => {
                let data: LogData = serde_json::from_value(envelope.data)
                    .map_err(|e| ScannerError::Protocol(format!("log line: {}", e)))?;
                ServerMessage::Log {
                    timestamp: data.timestamp,
                    message: data.message,
                }
            }
            _ => ServerMessage::Unknown(envelope.kind),
        };
        Ok(message)
    }

    pub fn name(&self) -> &str {
        match self {
            ServerMessage::StateUpdate(_) => "state_update",
            ServerMessage::Error { .. } => "error",
            ServerMessage::Pong { .. } => "pong",
            ServerMessage::Log { .. } => "log",
            ServerMessage::Unknown(kind) => kind,
        }
    }
}
