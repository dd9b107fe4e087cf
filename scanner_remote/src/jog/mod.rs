//! Input repeat engine.
//!
//! Turns press/release of source-qualified keys into move intents:
//!
//! ```text
//! Idle --press--> Pressed(armed) --arm delay--> Pressed(repeating) --release--> Idle
//!                       |                                                  ^
//!                       +-------------------release------------------------+
//! ```
//!
//! A press emits one move immediately. If the key is still held when the arm
//! timer fires, that tick emits another move and starts a periodic repeat for
//! the key's direction. There is never more than one repeat stream per
//! direction; who may stop it is decided by [`RepeatPolicy`].
//!
//! The engine only says *which* direction to move and *when*; sending is the
//! caller's job, and nothing is buffered here.

mod keys;
pub use keys::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use crate::timers::{next_tick, TimerQueue};
use crate::Direction;

/// Who stops a direction's repeat stream when several sources hold it.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RepeatPolicy {
    /// Any release of a key for the direction stops the shared repeat, even if
    /// another source still holds it.
    LastReleaseWins,
    /// The repeat keeps running until every source holding the direction has
    /// released.
    #[default]
    UntilLastRelease,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum JogTimer {
    Arm(PressKey),
    Repeat(Direction),
}

#[derive(Debug, Clone)]
pub struct RepeatEngine {
    policy: RepeatPolicy,
    arm_delay: Duration,
    repeat_interval: Duration,
    held: BTreeSet<PressKey>,
    timers: TimerQueue<JogTimer>,
}

impl RepeatEngine {
    pub fn new(policy: RepeatPolicy, arm_delay: Duration, repeat_interval: Duration) -> Self {
        Self {
            policy,
            arm_delay,
            repeat_interval,
            held: BTreeSet::new(),
            timers: TimerQueue::new(),
        }
    }

    pub fn policy(&self) -> RepeatPolicy {
        self.policy
    }

    /// Returns the direction to move right now, or `None` when the key is
    /// already held (OS key auto-repeat lands here).
    pub fn press(&mut self, key: PressKey, now: Instant) -> Option<Direction> {
        if !self.held.insert(key) {
            return None;
        }
        self.timers.schedule(JogTimer::Arm(key), now + self.arm_delay);
        Some(key.direction)
    }

    /// Returns `false` for a key that was not held; nothing changes then.
    pub fn release(&mut self, key: PressKey) -> bool {
        if !self.held.remove(&key) {
            return false;
        }
        self.timers.cancel(&JogTimer::Arm(key));

        let stop_repeat = match self.policy {
            RepeatPolicy::LastReleaseWins => true,
            RepeatPolicy::UntilLastRelease => !self.is_direction_held(key.direction),
        };
        if stop_repeat {
            self.timers.cancel(&JogTimer::Repeat(key.direction));
        }
        true
    }

    /// Drops every held key and timer, e.g. when the window loses focus.
    pub fn release_all(&mut self) -> Vec<PressKey> {
        self.timers.clear();
        std::mem::take(&mut self.held).into_iter().collect()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Fires the earliest timer due at `now`, if any. The returned direction
    /// must be sent immediately.
    ///
    /// Periodic ticks are rescheduled from their own deadline, so a slightly
    /// late call does not stretch the interval. Ticks missed entirely (the
    /// caller stalled past the next deadline) are skipped, not replayed.
    pub fn fire_due(&mut self, now: Instant) -> Option<Direction> {
        let (at, timer) = self.timers.pop_due(now)?;
        match timer {
            JogTimer::Arm(key) => {
                let repeat = JogTimer::Repeat(key.direction);
                if !self.held.contains(&key) || self.timers.is_scheduled(&repeat) {
                    return None;
                }
                self.timers.schedule(repeat, next_tick(at, self.repeat_interval, now));
                Some(key.direction)
            }
            JogTimer::Repeat(direction) => {
                if !self.is_direction_held(direction) {
                    return None;
                }
                self.timers
                    .schedule(JogTimer::Repeat(direction), next_tick(at, self.repeat_interval, now));
                Some(direction)
            }
        }
    }

    pub fn is_held(&self, key: &PressKey) -> bool {
        self.held.contains(key)
    }

    pub fn is_direction_held(&self, direction: Direction) -> bool {
        self.held.iter().any(|k| k.direction == direction)
    }

    pub fn is_repeating(&self, direction: Direction) -> bool {
        self.timers.is_scheduled(&JogTimer::Repeat(direction))
    }

    pub fn is_armed(&self, key: &PressKey) -> bool {
        self.timers.is_scheduled(&JogTimer::Arm(*key))
    }

    pub fn held_keys(&self) -> impl Iterator<Item = &PressKey> {
        self.held.iter()
    }

    /// Directions to draw as pressed.
    pub fn pressed_directions(&self) -> BTreeSet<Direction> {
        self.held.iter().map(|k| k.direction).collect()
    }
}
