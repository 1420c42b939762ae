//! Interaction Resolution
//!
//! Resolves every contact between entities once per tick, in a fixed order:
//! projectiles, mines, absorption, bonus pickup, then wall push-out for
//! players that grew into a wall. All loops run over ascending ids.

use tracing::{debug, warn};

use crate::core::vec2::Vec2;
use crate::game::bonus::collect_bonuses;
use crate::game::events::GameEvent;
use crate::game::geometry::{inside_any_wall, push_out_of_walls};
use crate::game::state::{ArenaState, PlayerId};

/// Check if two circles overlap (touching does not count).
#[inline]
pub fn circles_overlap(pos_a: Vec2, radius_a: f32, pos_b: Vec2, radius_b: f32) -> bool {
    let combined = radius_a + radius_b;
    pos_a.distance_squared(pos_b) < combined * combined
}

/// Run the whole interaction pass.
pub fn resolve_interactions(state: &mut ArenaState) {
    resolve_projectiles(state);
    resolve_mines(state);
    resolve_absorptions(state);
    collect_bonuses(state);
    resolve_wall_overlaps(state);
}

/// First living player other than `exclude` that `hits` accepts.
fn first_living_player(
    state: &ArenaState,
    exclude: PlayerId,
    mut hits: impl FnMut(Vec2, f32) -> bool,
) -> Option<PlayerId> {
    state
        .players
        .values()
        .filter(|p| p.is_alive() && p.id != exclude)
        .find(|p| hits(p.position, state.radius(p.units)))
        .map(|p| p.id)
}

// ===== PROJECTILES =====

/// Drop out-of-bounds projectiles and resolve hits.
pub fn resolve_projectiles(state: &mut ArenaState) {
    let bounds = state.bounds;
    let reward = state.config.projectile.hit_reward;
    let damage = state.config.projectile.hit_damage;
    let ids: Vec<u32> = state.projectiles.keys().copied().collect();

    for projectile_id in ids {
        let Some(projectile) = state.projectiles.get(&projectile_id).cloned() else {
            continue;
        };

        if !bounds.contains(projectile.position) {
            state.remove_projectile(projectile_id);
            continue;
        }

        let target = first_living_player(state, projectile.owner, |pos, radius| {
            pos.distance_squared(projectile.position) <= radius * radius
        });
        let Some(target_id) = target else {
            continue;
        };

        state.remove_projectile(projectile_id);

        let owner_alive = state.get_player(&projectile.owner).is_some_and(|p| p.is_alive());
        if owner_alive {
            state.grant_units(&projectile.owner, reward);
        }
        state.take_units(&target_id, damage);

        let target_units = state.get_player(&target_id).map_or(0, |p| p.units);
        debug!("Projectile {} from {} hit {}", projectile_id, projectile.owner, target_id);
        let event = GameEvent::hit(state.tick, projectile.owner, target_id, target_units);
        state.push_event(event);

        state.eliminate_if_lethal(&target_id, Some(projectile.owner));
    }
}

// ===== MINES =====

/// Expire old mines and detonate triggered ones.
pub fn resolve_mines(state: &mut ArenaState) {
    let lifetime = state.config.mine.lifetime_ticks;
    let trigger_sq = state.config.mine.trigger_radius * state.config.mine.trigger_radius;
    let damage = state.config.mine.damage;
    let now = state.tick;

    state.retain_mines(|m| now.saturating_sub(m.created_tick) <= lifetime);

    let ids: Vec<u32> = state.mines.keys().copied().collect();
    for mine_id in ids {
        let Some(mine) = state.mines.get(&mine_id).cloned() else {
            continue;
        };

        let victim = first_living_player(state, mine.owner, |pos, _| {
            pos.distance_squared(mine.position) < trigger_sq
        });
        let Some(victim_id) = victim else {
            continue;
        };

        state.remove_mine(mine_id);

        let taken = state.take_units(&victim_id, damage);
        let owner_alive = state.get_player(&mine.owner).is_some_and(|p| p.is_alive());
        if owner_alive {
            state.grant_units(&mine.owner, taken);
        }

        debug!("Mine {} detonated under {}", mine_id, victim_id);
        let event = GameEvent::detonation(state.tick, mine_id, mine.owner, victim_id, taken);
        state.push_event(event);

        state.eliminate_if_lethal(&victim_id, Some(mine.owner));
    }
}

// ===== ABSORPTION =====

/// Units the winner takes from a loser holding `loser_units`.
#[inline]
pub fn absorption_amount(loser_units: u32, fraction: f32) -> u32 {
    (f64::from(loser_units) * f64::from(fraction)).floor() as u32
}

/// Resolve every overlapping pair of living players with unequal units.
pub fn resolve_absorptions(state: &mut ArenaState) {
    let ids = state.alive_ids();

    for (i, a_id) in ids.iter().enumerate() {
        for b_id in &ids[i + 1..] {
            // Liveness and positions are read at evaluation time
            let (Some(a), Some(b)) = (state.get_player(a_id), state.get_player(b_id)) else {
                continue;
            };
            if !a.is_alive() || !b.is_alive() || a.units == b.units {
                continue;
            }
            if !circles_overlap(a.position, state.radius(a.units), b.position, state.radius(b.units)) {
                continue;
            }

            let (winner, loser) = if a.units > b.units { (*a_id, *b_id) } else { (*b_id, *a_id) };
            absorb(state, winner, loser);
        }
    }
}

/// Move units from `loser` to `winner`, then eliminate or relocate the loser.
fn absorb(state: &mut ArenaState, winner: PlayerId, loser: PlayerId) {
    let loser_units = state.get_player(&loser).map_or(0, |p| p.units);
    let amount = absorption_amount(loser_units, state.config.absorption_fraction);

    let taken = state.take_units(&loser, amount);
    if let Some(player) = state.get_player_mut(&winner) {
        player.units = player.units.saturating_add(taken);
        player.score = player.score.saturating_add(taken);
    }

    debug!("Player {} absorbed {} units from {}", winner, taken, loser);
    let event = GameEvent::absorbed(state.tick, winner, loser, taken);
    state.push_event(event);

    if !state.eliminate_if_lethal(&loser, Some(winner)) {
        state.relocate(&loser);
    }
}

// ===== WALLS =====

/// Push out (or relocate) living players whose radius now overlaps a wall.
pub fn resolve_wall_overlaps(state: &mut ArenaState) {
    for id in state.alive_ids() {
        let Some((position, units)) = state.get_player(&id).map(|p| (p.position, p.units)) else {
            continue;
        };
        let radius = state.radius(units);
        if !inside_any_wall(&state.walls, position, radius) {
            continue;
        }

        let resolved = push_out_of_walls(&state.walls, state.bounds, position, radius).or_else(|| {
            let fresh = state.safe_position();
            push_out_of_walls(&state.walls, state.bounds, fresh, radius)
        });

        match resolved {
            Some(pos) => {
                if let Some(player) = state.get_player_mut(&id) {
                    player.position = pos;
                }
            }
            None => warn!("Player {} could not be moved clear of walls", id),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::config::ArenaConfig;
    use crate::game::events::GameEventData;
    use crate::game::geometry::Wall;
    use crate::game::state::{LifeState, PlayerColor};

    fn arena(walls: Vec<Wall>) -> ArenaState {
        let mut config = ArenaConfig::default();
        config.walls.procedural = false;
        config.walls.fixed = walls;
        let mut state = ArenaState::new(config, 9);
        state.begin_countdown();
        state.activate();
        state
    }

    fn place(state: &mut ArenaState, byte: u8, pos: Vec2, units: u32) -> PlayerId {
        let id = PlayerId::new([byte; 16]);
        state.join(id, format!("p{}", byte)).unwrap();
        let player = state.get_player_mut(&id).unwrap();
        player.position = pos;
        player.units = units;
        id
    }

    #[test]
    fn test_circles_overlap() {
        assert!(circles_overlap(Vec2::ZERO, 1.0, Vec2::new(1.5, 0.0), 1.0));
        assert!(!circles_overlap(Vec2::ZERO, 1.0, Vec2::new(2.0, 0.0), 1.0));
        assert!(!circles_overlap(Vec2::ZERO, 1.0, Vec2::new(3.0, 0.0), 1.0));
    }

    #[test]
    fn test_absorption_amounts() {
        let mut state = arena(vec![]);
        let a = place(&mut state, 1, Vec2::new(0.0, 0.0), 100);
        let b = place(&mut state, 2, Vec2::new(5.0, 0.0), 50);

        resolve_absorptions(&mut state);

        let pa = state.get_player(&a).unwrap();
        let pb = state.get_player(&b).unwrap();
        assert_eq!(pa.units, 112);
        assert_eq!(pa.score, 12);
        assert_eq!(pb.units, 38);
        assert!(pb.is_alive());
        // Loser relocated to a safe position
        assert_ne!(pb.position, Vec2::new(5.0, 0.0));

        let events = state.take_events();
        assert!(matches!(events[0].data, GameEventData::Absorbed { amount: 12, .. }));
    }

    #[test]
    fn test_equal_units_noop() {
        let mut state = arena(vec![]);
        let a = place(&mut state, 1, Vec2::new(100.0, 100.0), 40);
        let b = place(&mut state, 2, Vec2::new(101.0, 100.0), 40);

        resolve_absorptions(&mut state);

        assert_eq!(state.get_player(&a).unwrap().units, 40);
        assert_eq!(state.get_player(&b).unwrap().units, 40);
        assert!(state.take_events().is_empty());
    }

    #[test]
    fn test_lethal_absorption() {
        let mut state = arena(vec![]);
        state.config.absorption_fraction = 1.0;
        let a = place(&mut state, 1, Vec2::new(100.0, 100.0), 40);
        let b = place(&mut state, 2, Vec2::new(101.0, 100.0), 8);

        resolve_absorptions(&mut state);

        assert_eq!(state.get_player(&a).unwrap().units, 48);
        let loser = state.get_player(&b).unwrap();
        assert_eq!(loser.units, 0);
        assert_eq!(loser.life, LifeState::Eliminated);

        let events = state.take_events();
        assert!(events.iter().any(|e| matches!(e.data, GameEventData::Death { .. })));
    }

    #[test]
    fn test_projectile_hits_target_not_owner() {
        let mut state = arena(vec![]);
        let owner = place(&mut state, 1, Vec2::new(100.0, 100.0), 20);
        let target = place(&mut state, 2, Vec2::new(300.0, 100.0), 20);

        // Sits on the owner: must be ignored
        state.spawn_projectile(owner, Vec2::new(100.0, 100.0), Vec2::RIGHT, PlayerColor::Red);
        // Sits on the target
        state.spawn_projectile(owner, Vec2::new(302.0, 100.0), Vec2::RIGHT, PlayerColor::Red);

        resolve_projectiles(&mut state);

        assert_eq!(state.get_player(&owner).unwrap().units, 25);
        assert_eq!(state.get_player(&target).unwrap().units, 15);
        assert_eq!(state.projectiles.len(), 1);

        let events = state.take_events();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0].data, GameEventData::Hit { target_units: 15, .. }));
    }

    #[test]
    fn test_projectile_kill() {
        let mut state = arena(vec![]);
        let owner = place(&mut state, 1, Vec2::new(100.0, 100.0), 20);
        let target = place(&mut state, 2, Vec2::new(300.0, 100.0), 3);
        state.spawn_projectile(owner, Vec2::new(300.0, 100.0), Vec2::RIGHT, PlayerColor::Red);

        resolve_projectiles(&mut state);

        let victim = state.get_player(&target).unwrap();
        assert_eq!(victim.units, 0);
        assert!(!victim.is_alive());
    }

    #[test]
    fn test_projectile_out_of_bounds() {
        let mut state = arena(vec![]);
        let owner = PlayerId::new([1; 16]);
        state.spawn_projectile(owner, Vec2::new(-1.0, 10.0), Vec2::LEFT, PlayerColor::Red);
        state.spawn_projectile(owner, Vec2::new(10.0, 961.0), Vec2::DOWN, PlayerColor::Red);

        resolve_projectiles(&mut state);
        assert!(state.projectiles.is_empty());
    }

    #[test]
    fn test_mine_detonation_transfers_units() {
        let mut state = arena(vec![]);
        let owner = place(&mut state, 1, Vec2::new(100.0, 100.0), 10);
        let victim = place(&mut state, 2, Vec2::new(500.0, 500.0), 30);
        state.spawn_mine(owner, Vec2::new(510.0, 500.0));

        resolve_mines(&mut state);

        assert_eq!(state.get_player(&victim).unwrap().units, 10);
        assert_eq!(state.get_player(&owner).unwrap().units, 30);
        assert!(state.mines.is_empty());
    }

    #[test]
    fn test_mine_ignores_owner() {
        let mut state = arena(vec![]);
        let owner = place(&mut state, 1, Vec2::new(500.0, 500.0), 10);
        state.spawn_mine(owner, Vec2::new(500.0, 500.0));

        resolve_mines(&mut state);

        assert_eq!(state.get_player(&owner).unwrap().units, 10);
        assert_eq!(state.mines.len(), 1);
    }

    #[test]
    fn test_mine_damage_capped_and_lethal() {
        let mut state = arena(vec![]);
        let owner = place(&mut state, 1, Vec2::new(100.0, 100.0), 10);
        let victim = place(&mut state, 2, Vec2::new(500.0, 500.0), 7);
        state.spawn_mine(owner, Vec2::new(500.0, 500.0));

        resolve_mines(&mut state);

        assert_eq!(state.get_player(&owner).unwrap().units, 17);
        let v = state.get_player(&victim).unwrap();
        assert_eq!(v.units, 0);
        assert!(!v.is_alive());
    }

    #[test]
    fn test_mine_expires() {
        let mut state = arena(vec![]);
        let owner = PlayerId::new([1; 16]);
        state.spawn_mine(owner, Vec2::new(500.0, 500.0));

        state.tick += 900;
        resolve_mines(&mut state);
        assert_eq!(state.mines.len(), 1);

        state.tick += 1;
        resolve_mines(&mut state);
        assert!(state.mines.is_empty());
    }

    #[test]
    fn test_grown_player_pushed_out() {
        let wall = Wall::new(100.0, 100.0, 200.0, 200.0);
        let mut state = arena(vec![wall]);
        // Radius 10.2 at 10 units; clear of the wall
        let id = place(&mut state, 1, Vec2::new(85.0, 200.0), 10);
        assert!(!inside_any_wall(&state.walls, Vec2::new(85.0, 200.0), state.radius(10)));

        // Growth to 1000 units doubles the radius (30)
        state.get_player_mut(&id).unwrap().units = 1000;
        resolve_wall_overlaps(&mut state);

        let player = state.get_player(&id).unwrap();
        assert!(!inside_any_wall(&state.walls, player.position, state.radius(1000)));
    }
}
