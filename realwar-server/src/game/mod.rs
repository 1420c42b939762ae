//! Game Logic Module
//!
//! All arena simulation code. Deterministic for a given seed and intent
//! stream.
//!
//! ## Module Structure
//!
//! - `config`: Arena rules and their defaults
//! - `geometry`: Walls, safe positions, push-out
//! - `state`: Entity store and round phase
//! - `intent`: Inbound player intents and pending slots
//! - `movement`: Target steering, nudges, projectile flight
//! - `combat`: Projectile hits, mines, absorption
//! - `bonus`: Bonus spawning and pickup
//! - `win`: Victory threshold
//! - `tick`: Authoritative simulation step and timer queue
//! - `events`: Point events for clients and replay

pub mod config;
pub mod geometry;
pub mod state;
pub mod intent;
pub mod movement;
pub mod combat;
pub mod bonus;
pub mod win;
pub mod tick;
pub mod events;

// Re-export key types
pub use config::{ArenaConfig, BlockedMovePolicy, ConfigError};
pub use geometry::{ArenaBounds, Wall};
pub use intent::{Direction, Intent, IntentError};
pub use state::{ArenaSnapshot, ArenaState, JoinError, PlayerColor, PlayerId, PlayerState, RoundPhase};
pub use tick::{TickResult, tick};
pub use events::{GameEvent, GameEventData};
