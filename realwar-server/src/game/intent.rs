//! Player Intents
//!
//! What a client may ask its avatar to do, and the per-player slots those
//! requests wait in until the next tick.
//!
//! Slots are last-writer-wins: a new intent of the same kind replaces the
//! pending one. The navigation target is not a slot; it persists on the
//! player until reached or aborted.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::vec2::Vec2;

/// Why an intent was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum IntentError {
    /// Sender is not in the arena
    #[error("unknown player")]
    UnknownPlayer,

    /// Sender has been eliminated
    #[error("player is eliminated")]
    Eliminated,

    /// Round has not started yet
    #[error("round is not active")]
    RoundNotActive,

    /// Round is over
    #[error("round has ended")]
    RoundEnded,

    /// Target coordinates are not finite
    #[error("invalid target")]
    InvalidTarget,

    /// Target lies outside the arena
    #[error("target outside the arena")]
    OutOfBounds,

    /// Direction vector is zero, not finite, or too large to normalize
    #[error("invalid direction")]
    InvalidDirection,

    /// Not enough units to pay for the action
    #[error("not enough units")]
    InsufficientUnits,
}

/// Cardinal direction for nudges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Toward y = 0
    Up,
    /// Toward y = height
    Down,
    /// Toward x = 0
    Left,
    /// Toward x = width
    Right,
}

impl Direction {
    /// Unit vector for this direction (screen space, +Y down).
    pub fn unit(self) -> Vec2 {
        match self {
            Direction::Up => Vec2::UP,
            Direction::Down => Vec2::DOWN,
            Direction::Left => Vec2::LEFT,
            Direction::Right => Vec2::RIGHT,
        }
    }
}

/// An inbound request from a player.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    /// Walk toward a point
    Move {
        /// Destination
        target: Vec2,
    },
    /// Launch a projectile
    Fire {
        /// Aim vector (any non-zero length)
        direction: Vec2,
    },
    /// Drop a mine at the current position
    PlaceMine,
    /// Step once in a cardinal direction
    Nudge {
        /// Step direction
        direction: Direction,
    },
}

impl Intent {
    /// Reject malformed coordinates before they reach the store.
    pub fn validate(&self) -> Result<(), IntentError> {
        match self {
            Intent::Move { target } if !target.is_finite() => Err(IntentError::InvalidTarget),
            Intent::Fire { direction } if direction.normalize() == Vec2::ZERO => {
                Err(IntentError::InvalidDirection)
            }
            _ => Ok(()),
        }
    }
}

/// One-shot intents waiting for the next tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingIntents {
    /// Normalized aim of a pending shot
    pub fire: Option<Vec2>,
    /// A mine should be dropped
    pub place_mine: bool,
    /// Pending nudge
    pub nudge: Option<Direction>,
}

impl PendingIntents {
    /// Nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.fire.is_none() && !self.place_mine && self.nudge.is_none()
    }

    /// Take the pending shot, if any.
    pub fn take_fire(&mut self) -> Option<Vec2> {
        self.fire.take()
    }

    /// Take the pending mine flag.
    pub fn take_mine(&mut self) -> bool {
        std::mem::take(&mut self.place_mine)
    }

    /// Take the pending nudge, if any.
    pub fn take_nudge(&mut self) -> Option<Direction> {
        self.nudge.take()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
