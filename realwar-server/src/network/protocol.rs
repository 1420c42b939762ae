//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! All messages travel as JSON text frames.

use serde::{Serialize, Deserialize};

use crate::core::vec2::Vec2;
use crate::game::events::GameEvent;
use crate::game::intent::{Direction, Intent};
use crate::game::state::{ArenaSnapshot, PlayerColor, PlayerId};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Answer to `ask_password`.
    CheckPassword { password: String },

    /// Pick a display name and enter the arena.
    SetName { name: String },

    /// Ready for the round to start.
    SetReady,

    /// Steer toward an arena point.
    ClickMove { x: f32, y: f32 },

    /// Fire a projectile along `(dx, dy)`.
    Fire { dx: f32, dy: f32 },

    /// Drop a mine at the current position.
    PlaceMine,

    /// One-step keyboard nudge.
    Nudge { direction: Direction },

    /// Ping for latency measurement.
    Ping { timestamp: u64 },
}

impl ClientMessage {
    /// Simulation intent carried by this message, if any.
    pub fn to_intent(&self) -> Option<Intent> {
        match self {
            ClientMessage::ClickMove { x, y } => Some(Intent::Move { target: Vec2::new(*x, *y) }),
            ClientMessage::Fire { dx, dy } => Some(Intent::Fire { direction: Vec2::new(*dx, *dy) }),
            ClientMessage::PlaceMine => Some(Intent::PlaceMine),
            ClientMessage::Nudge { direction } => Some(Intent::Nudge { direction: *direction }),
            ClientMessage::CheckPassword { .. }
            | ClientMessage::SetName { .. }
            | ClientMessage::SetReady
            | ClientMessage::Ping { .. } => None,
        }
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First message on every connection.
    AskPassword,

    /// Password accepted, pick a name.
    AskName,

    /// Joined the arena.
    Welcome { player_id: PlayerId, color: PlayerColor },

    /// Lobby roster changed.
    LobbyUpdate { players: Vec<LobbyEntry> },

    /// Everyone is ready; the round starts in `seconds`.
    StartCountdown { seconds: u32 },

    /// Simulation is running.
    RoundStarted,

    /// Per-tick arena snapshot.
    State { snapshot: ArenaSnapshot },

    /// Point event from the simulation.
    Event { event: GameEvent },

    /// Round over.
    Win { player_name: String },

    /// A player left the arena.
    RemovePlayer { player_id: PlayerId },

    /// Pong response.
    Pong { timestamp: u64, server_time: u64 },

    /// Error message.
    Error(ServerError),

    /// Server is shutting down.
    Shutdown { reason: String },
}

/// One lobby roster line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyEntry {
    /// Display name.
    pub name: String,
    /// Sent `set_ready`.
    pub ready: bool,
}

/// Server error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Message could not be decoded.
    InvalidMessage,
    /// Password not checked yet.
    NotAuthorized,
    /// Name rejected.
    InvalidName,
    /// Already in the arena.
    AlreadyJoined,
    /// Round is over.
    RoundEnded,
    /// Internal error.
    InternalError,
}

impl ServerMessage {
    /// Build an error message.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error(ServerError { code, message: message.into() })
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
