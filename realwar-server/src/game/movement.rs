//! Movement Integration
//!
//! Moves living players toward their targets, applies nudges, and advances
//! projectiles. Every player move is wall- and bounds-checked at the
//! player's current radius; projectiles ignore walls.

use crate::core::vec2::Vec2;
use crate::game::config::BlockedMovePolicy;
use crate::game::geometry::{ArenaBounds, Wall, inside_any_wall};
use crate::game::state::ArenaState;

/// Whether a circle may stand at `pos`.
#[inline]
pub fn is_open(walls: &[Wall], bounds: ArenaBounds, pos: Vec2, radius: f32) -> bool {
    bounds.contains(pos) && !inside_any_wall(walls, pos, radius)
}

/// Apply nudges and target steps for every living player, ascending id.
pub fn integrate_players(state: &mut ArenaState) {
    let config = &state.config;
    let walls = &state.walls;
    let bounds = state.bounds;
    let speed = config.movement.speed;
    let step = config.movement.nudge_step;
    let policy = config.movement.blocked_policy;

    for player in state.players.values_mut() {
        if !player.is_alive() {
            continue;
        }
        let radius = config.radius(player.units);

        // Nudge first, independent of the target
        if let Some(direction) = player.pending.take_nudge() {
            let dir = direction.unit();
            let next = player.position + dir.scale(step);
            if is_open(walls, bounds, next, radius) {
                player.position = next;
                player.facing = Some(dir);
            }
        }

        let Some(target) = player.target else {
            continue;
        };

        let delta = target - player.position;
        let distance = delta.length();
        let (next, arrives) = if distance > speed {
            (player.position + delta.scale(speed / distance), false)
        } else {
            (target, true)
        };

        if is_open(walls, bounds, next, radius) {
            player.position = next;
            if distance > 0.0 {
                player.facing = Some(delta.normalize());
            }
            if arrives {
                player.target = None;
            }
        } else if policy == BlockedMovePolicy::Abort {
            player.target = None;
        }
    }
}

/// Advance every projectile by its velocity.
pub fn advance_projectiles(state: &mut ArenaState) {
    for projectile in state.projectiles.values_mut() {
        projectile.position = projectile.position + projectile.velocity;
    }
}

// =============================================================================
// TESTS
// =============================================================================
