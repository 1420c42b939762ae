//! Network Layer
//!
//! WebSocket gateway for real-time multiplayer communication.
//! This layer is **non-deterministic** - all game logic runs through `game/`.

pub mod protocol;
pub mod session;
pub mod server;

pub use protocol::{ClientMessage, ServerMessage, LobbyEntry, ErrorCode};
pub use session::{ArenaSession, SessionConfig, SessionError};
pub use server::{GameServer, ServerConfig, GameServerError};
