//! Core deterministic primitives.
//!
//! Vector math, seeded randomness and state hashing shared by the
//! simulation.

pub mod vec2;
pub mod rng;
pub mod hash;

// Re-export core types
pub use vec2::Vec2;
pub use rng::DeterministicRng;
pub use hash::compute_state_hash;
