//! Arena Geometry
//!
//! Static walls and the spatial queries built on them: the wall-overlap
//! predicate, safe-position sampling, and push-out after growth.
//!
//! Walls are axis-aligned rectangles; players are circles. A circle
//! overlaps a wall when it intersects the wall's rectangle expanded by the
//! circle's radius (strict comparison, so touching edges do not overlap).

use serde::{Serialize, Deserialize};
use tracing::warn;

use crate::core::rng::{DeterministicRng, derive_seed};
use crate::core::vec2::Vec2;
use crate::game::config::{ArenaConfig, SpawnConfig};

/// Maximum push-out passes before giving up.
const MAX_PUSH_ITERATIONS: usize = 8;

/// Clearance added after a push so the strict overlap test fails.
const PUSH_EPSILON: f32 = 0.01;

// =============================================================================
// WALL
// =============================================================================

/// Static axis-aligned obstacle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Width
    pub w: f32,
    /// Height
    pub h: f32,
}

impl Wall {
    /// Create a wall from its top-left corner and size.
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Whether a circle at `pos` with `radius` intrudes into this wall.
    #[inline]
    pub fn overlaps_circle(&self, pos: Vec2, radius: f32) -> bool {
        pos.x + radius > self.x
            && pos.x - radius < self.x + self.w
            && pos.y + radius > self.y
            && pos.y - radius < self.y + self.h
    }

    /// Candidate exits for an overlapping circle, one per side,
    /// paired with the penetration depth on that side.
    fn exits(&self, pos: Vec2, radius: f32) -> [(f32, Vec2); 4] {
        let reach = radius + PUSH_EPSILON;
        [
            (pos.x + radius - self.x, Vec2::new(self.x - reach, pos.y)),
            (self.x + self.w - (pos.x - radius), Vec2::new(self.x + self.w + reach, pos.y)),
            (pos.y + radius - self.y, Vec2::new(pos.x, self.y - reach)),
            (self.y + self.h - (pos.y - radius), Vec2::new(pos.x, self.y + self.h + reach)),
        ]
    }
}

// =============================================================================
// ARENA BOUNDS
// =============================================================================

/// Playable rectangle `[0, width] x [0, height]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArenaBounds {
    /// Arena width
    pub width: f32,
    /// Arena height
    pub height: f32,
}

impl ArenaBounds {
    /// Create bounds of the given size.
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Bounds described by a config.
    pub fn from_config(config: &ArenaConfig) -> Self {
        Self::new(config.width, config.height)
    }

    /// Whether a point lies inside the arena (edges included).
    #[inline]
    pub fn contains(&self, pos: Vec2) -> bool {
        pos.x >= 0.0 && pos.x <= self.width && pos.y >= 0.0 && pos.y <= self.height
    }
}

// =============================================================================
// QUERIES
// =============================================================================

/// Whether a circle at `pos` overlaps any wall.
pub fn inside_any_wall(walls: &[Wall], pos: Vec2, radius: f32) -> bool {
    walls.iter().any(|w| w.overlaps_circle(pos, radius))
}

/// Sample for a wall-free point, giving up after `spawn.attempts` tries.
pub fn try_find_safe_position(
    walls: &[Wall],
    bounds: ArenaBounds,
    spawn: &SpawnConfig,
    rng: &mut DeterministicRng,
) -> Option<Vec2> {
    for _ in 0..spawn.attempts {
        let x = rng.next_range(spawn.margin, bounds.width - spawn.margin);
        let y = rng.next_range(spawn.margin, bounds.height - spawn.margin);
        let candidate = Vec2::new(x, y);
        if !inside_any_wall(walls, candidate, spawn.probe_radius) {
            return Some(candidate);
        }
    }
    None
}

/// Wall-free point, or the configured fallback when sampling is exhausted.
///
/// The fallback is not guaranteed to be wall-free.
pub fn find_safe_position(
    walls: &[Wall],
    bounds: ArenaBounds,
    spawn: &SpawnConfig,
    rng: &mut DeterministicRng,
) -> Vec2 {
    try_find_safe_position(walls, bounds, spawn, rng).unwrap_or_else(|| {
        warn!(
            "No safe position after {} samples, using fallback {}",
            spawn.attempts, spawn.fallback
        );
        spawn.fallback
    })
}

/// Move a circle out of any walls it overlaps.
///
/// Each pass resolves the first overlapping wall along its shallowest
/// in-bounds side. Returns `None` when no wall-free in-bounds position is
/// reached within the pass limit.
pub fn push_out_of_walls(
    walls: &[Wall],
    bounds: ArenaBounds,
    pos: Vec2,
    radius: f32,
) -> Option<Vec2> {
    let mut pos = pos;
    for _ in 0..MAX_PUSH_ITERATIONS {
        let Some(wall) = walls.iter().find(|w| w.overlaps_circle(pos, radius)) else {
            return Some(pos);
        };

        let mut exits = wall.exits(pos, radius);
        exits.sort_by(|a, b| a.0.total_cmp(&b.0));
        pos = exits
            .iter()
            .map(|(_, exit)| *exit)
            .find(|exit| bounds.contains(*exit))?;
    }

    if inside_any_wall(walls, pos, radius) {
        None
    } else {
        Some(pos)
    }
}

// =============================================================================
// LAYOUTS
// =============================================================================

/// Curated layout used when procedural walls are disabled.
pub fn default_fixed_layout() -> Vec<Wall> {
    vec![
        Wall::new(300.0, 200.0, 200.0, 80.0),
        Wall::new(300.0, 680.0, 200.0, 80.0),
        Wall::new(1420.0, 200.0, 200.0, 80.0),
        Wall::new(1420.0, 680.0, 200.0, 80.0),
        Wall::new(860.0, 120.0, 200.0, 120.0),
        Wall::new(860.0, 720.0, 200.0, 120.0),
        Wall::new(600.0, 420.0, 120.0, 120.0),
        Wall::new(1200.0, 420.0, 120.0, 120.0),
    ]
}

/// Build the round's wall set.
///
/// Procedural layouts draw from `rng` unless the config pins a wall seed,
/// in which case the layout is independent of the round seed.
pub fn generate_walls(config: &ArenaConfig, rng: &mut DeterministicRng) -> Vec<Wall> {
    let layout = &config.walls;
    if !layout.procedural {
        return layout.fixed.clone();
    }

    let mut pinned = layout.seed.map(|seed| DeterministicRng::new(derive_seed(seed, b"walls")));
    let rng = pinned.as_mut().unwrap_or(rng);

    (0..layout.count)
        .map(|_| {
            let x = rng.next_range(layout.x_range.0, layout.x_range.1);
            let y = rng.next_range(layout.y_range.0, layout.y_range.1);
            let w = rng.next_range(layout.size_range.0, layout.size_range.1);
            let h = rng.next_range(layout.size_range.0, layout.size_range.1);
            Wall::new(x, y, w, h)
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
