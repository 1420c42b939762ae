//! # RealWar Arena Server
//!
//! Authoritative simulation for RealWar, a real-time multiplayer arena where
//! players grow by absorbing smaller rivals, collecting bonuses, firing
//! projectiles and laying mines.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    REALWAR SERVER                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── vec2.rs     - 2D vector math                            │
//! │  ├── rng.rs      - Seeded Xorshift128+ PRNG                  │
//! │  └── hash.rs     - State hashing for replay checks           │
//! │                                                              │
//! │  game/           - Arena simulation (deterministic)          │
//! │  ├── config.rs   - Arena rules                               │
//! │  ├── geometry.rs - Walls and safe positions                  │
//! │  ├── state.rs    - Entity store and round phase              │
//! │  ├── intent.rs   - Player intents                            │
//! │  ├── movement.rs - Steering, nudges, projectile flight       │
//! │  ├── combat.rs   - Hits, mines, absorption                   │
//! │  ├── bonus.rs    - Bonus spawning and pickup                 │
//! │  ├── win.rs      - Victory threshold                         │
//! │  └── tick.rs     - Authoritative simulation step             │
//! │                                                              │
//! │  network/        - Networking (non-deterministic)            │
//! │  ├── server.rs   - WebSocket server                          │
//! │  ├── protocol.rs - Message types                             │
//! │  └── session.rs  - Lobby and arena ownership                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! The `core/` and `game/` modules replay identically for a given seed and
//! intent stream on the same platform:
//! - No HashMap (uses BTreeMap for sorted iteration)
//! - No system time dependencies
//! - All randomness from seeded Xorshift128+

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::vec2::Vec2;
pub use core::rng::DeterministicRng;
pub use game::config::ArenaConfig;
pub use game::intent::{Direction, Intent, IntentError};
pub use game::state::{ArenaState, PlayerState, PlayerId};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulation tick rate (Hz)
pub const TICK_RATE: u32 = 30;
