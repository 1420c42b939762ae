//! Bonus Spawning and Collection
//!
//! Deterministic bonus spawning based on the arena RNG.

use tracing::debug;

use crate::core::rng::DeterministicRng;
use crate::game::config::BonusTier;
use crate::game::events::GameEvent;
use crate::game::state::ArenaState;

/// Pick a tier from the weighted table.
pub fn roll_bonus_tier(table: &[BonusTier], rng: &mut DeterministicRng) -> Option<BonusTier> {
    let total: u32 = table.iter().map(|t| t.weight).sum();
    if total == 0 {
        return None;
    }

    let mut roll = rng.next_int(total);
    for tier in table {
        if roll < tier.weight {
            return Some(*tier);
        }
        roll -= tier.weight;
    }
    None
}

/// Spawn one bonus at a safe position unless the field is full.
pub fn spawn_bonus(state: &mut ArenaState) -> Option<u32> {
    if state.bonuses.len() >= state.config.bonus.max_live as usize {
        return None;
    }

    let tier = roll_bonus_tier(&state.config.bonus.table, &mut state.rng)?;
    let position = state.safe_position();
    let id = state.spawn_bonus(position, tier.kind, tier.amount);

    let event = GameEvent::bonus_spawned(state.tick, id, tier.kind, position);
    state.push_event(event);
    Some(id)
}

/// Hand every bonus within pickup range to the living player standing on it.
///
/// Players are visited in ascending id order, so a contested bonus goes to
/// the lowest id.
pub fn collect_bonuses(state: &mut ArenaState) {
    let radius_sq = state.config.bonus.pickup_radius * state.config.bonus.pickup_radius;

    for player_id in state.alive_ids() {
        let Some(position) = state.get_player(&player_id).map(|p| p.position) else {
            continue;
        };

        let in_reach: Vec<u32> = state
            .bonuses
            .values()
            .filter(|b| b.position.distance_squared(position) < radius_sq)
            .map(|b| b.id)
            .collect();

        for bonus_id in in_reach {
            let Some(bonus) = state.remove_bonus(bonus_id) else {
                continue;
            };
            if let Some(player) = state.get_player_mut(&player_id) {
                player.units = player.units.saturating_add(bonus.amount);
                player.score = player.score.saturating_add(bonus.amount);
            }
            debug!("Player {} picked up {:?} bonus", player_id, bonus.kind);

            let event = GameEvent::pickup(state.tick, player_id, bonus.id, bonus.kind, bonus.amount);
            state.push_event(event);
        }
    }
}
