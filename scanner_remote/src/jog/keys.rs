use serde::{Deserialize, Serialize};

use crate::Direction;

/// Device family a press came from.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum InputSource {
    Keyboard,
    Pointer,
    Touch,
}

/// Source-qualified press identifier. Keyboard-up and pointer-up are two
/// different keys driving the same direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PressKey {
    pub source: InputSource,
    pub direction: Direction,
}

impl PressKey {
    pub fn new(source: InputSource, direction: Direction) -> Self {
        Self { source, direction }
    }

    pub fn keyboard(direction: Direction) -> Self {
        Self::new(InputSource::Keyboard, direction)
    }

    pub fn pointer(direction: Direction) -> Self {
        Self::new(InputSource::Pointer, direction)
    }

    pub fn touch(direction: Direction) -> Self {
        Self::new(InputSource::Touch, direction)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Up,
    /// Pointer left the button while held.
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchPhase {
    Start,
    End,
    Cancel,
}

/// Raw device event before it is funneled into press/release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSignal {
    /// Key name as reported by the platform, e.g. `ArrowUp` or `w`.
    KeyDown(String),
    KeyUp(String),
    Pointer(Direction, PointerPhase),
    Touch(Direction, TouchPhase),
}

/// What an [`InputSignal`] resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    Press(PressKey),
    Release(PressKey),
}

impl InputSignal {
    /// `None` for keys that are not bound to a direction.
    pub fn resolve(&self) -> Option<InputAction> {
        let action = match self {
            InputSignal::KeyDown(name) => InputAction::Press(PressKey::keyboard(key_direction(name)?)),
            InputSignal::KeyUp(name) => InputAction::Release(PressKey::keyboard(key_direction(name)?)),
            InputSignal::Pointer(direction, PointerPhase::Down) => {
                InputAction::Press(PressKey::pointer(*direction))
            }
            InputSignal::Pointer(direction, PointerPhase::Up | PointerPhase::Leave) => {
                InputAction::Release(PressKey::pointer(*direction))
            }
            InputSignal::Touch(direction, TouchPhase::Start) => InputAction::Press(PressKey::touch(*direction)),
            InputSignal::Touch(direction, TouchPhase::End | TouchPhase::Cancel) => {
                InputAction::Release(PressKey::touch(*direction))
            }
        };
        Some(action)
    }
}

/// Keyboard binding: arrow keys plus WASD.
pub fn key_direction(name: &str) -> Option<Direction> {
    match name {
        "ArrowUp" | "w" | "W" => Some(Direction::Up),
        "ArrowDown" | "s" | "S" => Some(Direction::Down),
        "ArrowLeft" | "a" | "A" => Some(Direction::Left),
        "ArrowRight" | "d" | "D" => Some(Direction::Right),
        _ => None,
    }
}
