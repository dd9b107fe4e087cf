use serde::{Deserialize, Serialize};

use crate::Direction;

/// Messages this client sends to the remote controller.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Ask for a full state snapshot; sent right after every successful open.
    #[serde(rename = "get_state")]
    GetState,

    #[serde(rename = "move")]
    Move { direction: Direction },

    #[serde(rename = "ping")]
    Ping,
}

impl ClientMessage {
    pub fn to_json(&self) -> String {
        // infallible for these variants
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientMessage::GetState => "get_state",
            ClientMessage::Move { .. } => "move",
            ClientMessage::Ping => "ping",
        }
    }
}
