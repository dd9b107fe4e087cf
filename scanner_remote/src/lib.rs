use serde::{Deserialize, Serialize};
use std::fmt;

pub mod client;
pub mod config;
pub mod drivers;
pub mod errors;
pub mod identity;
pub mod jog;
pub mod packets;
pub mod reset;
pub mod state;
pub mod timers;

pub use client::{ClientEvent, ClientNotice, ScannerClient, Telemetry};
pub use config::ScannerClientConfig;
pub use drivers::ScannerDriver;
pub use errors::*;
pub use identity::IdentityToken;

/// Movement direction of the stage. What a direction means physically is up
/// to the remote controller.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grid cell of the stage.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

impl Position {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

impl From<[i64; 2]> for Position {
    fn from(pair: [i64; 2]) -> Self {
        Self { x: pair[0], y: pair[1] }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Operation status reported by the remote. Values the remote adds later are
/// kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OperationStatus {
    #[default]
    Ready,
    Moving,
    Focusing,
    Completed,
    Other(String),
}

impl OperationStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OperationStatus::Ready => "ready",
            OperationStatus::Moving => "moving",
            OperationStatus::Focusing => "focusing",
            OperationStatus::Completed => "completed",
            OperationStatus::Other(s) => s,
        }
    }
}

impl From<String> for OperationStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "ready" => OperationStatus::Ready,
            "moving" => OperationStatus::Moving,
            "focusing" => OperationStatus::Focusing,
            "completed" => OperationStatus::Completed,
            _ => OperationStatus::Other(value),
        }
    }
}

impl From<OperationStatus> for String {
    fn from(value: OperationStatus) -> Self {
        value.as_str().to_string()
    }
}

impl Serialize for OperationStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for OperationStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(OperationStatus::from)
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
