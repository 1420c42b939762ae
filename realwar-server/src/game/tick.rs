//! Authoritative Simulation Tick
//!
//! The fixed-rate step that advances an active round. Everything here is
//! synchronous and bounded; the caller owns the clock.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::game::bonus::spawn_bonus;
use crate::game::combat::resolve_interactions;
use crate::game::config::ArenaConfig;
use crate::game::events::{EventLog, GameEvent};
use crate::game::intent::Intent;
use crate::game::movement::{advance_projectiles, integrate_players};
use crate::game::state::{ArenaState, PlayerId, RoundPhase};
use crate::game::win::evaluate_win;

// =============================================================================
// TIMER QUEUE
// =============================================================================

/// Work scheduled for a future tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerTask {
    /// Spawn one bonus and re-arm
    SpawnBonus,
}

/// Tick-ordered task queue drained by the simulation owner.
///
/// Tasks due on the same tick run in scheduling order.
#[derive(Clone, Debug, Default)]
pub struct TimerQueue {
    entries: BTreeMap<(u32, u64), TimerTask>,
    next_seq: u64,
}

impl TimerQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` once `due_tick` is reached.
    pub fn schedule(&mut self, due_tick: u32, task: TimerTask) {
        self.entries.insert((due_tick, self.next_seq), task);
        self.next_seq += 1;
    }

    /// Remove and return every task due at or before `now`.
    pub fn drain_due(&mut self, now: u32) -> Vec<TimerTask> {
        let later = self.entries.split_off(&(now.saturating_add(1), 0));
        let due = std::mem::replace(&mut self.entries, later);
        due.into_values().collect()
    }

    /// Earliest due tick, if any.
    pub fn next_due(&self) -> Option<u32> {
        self.entries.keys().next().map(|(tick, _)| *tick)
    }

    /// Drop every task.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// TICK
// =============================================================================

/// Result of a tick.
#[derive(Debug, Default)]
pub struct TickResult {
    /// Events generated this tick
    pub events: Vec<GameEvent>,
    /// Whether the round is over
    pub round_ended: bool,
    /// Winner (once ended)
    pub winner: Option<PlayerId>,
}

/// Run one simulation tick.
///
/// Order: due timers, pending one-shot intents (fire, mine), movement,
/// interactions, win check. Nothing is mutated unless the round is active.
pub fn tick(state: &mut ArenaState) -> TickResult {
    let mut result = TickResult::default();

    match state.phase {
        RoundPhase::Idle | RoundPhase::Countdown => return result,
        RoundPhase::Ended => {
            result.round_ended = true;
            result.winner = state.winner;
            return result;
        }
        RoundPhase::Active => {}
    }

    // 0. Advance tick counter
    state.tick += 1;

    // 1. Scheduled work
    run_timers(state);

    // 2. Fire and mine intents
    apply_one_shots(state);

    // 3. Movement
    integrate_players(state);
    advance_projectiles(state);

    // 4. Interactions
    resolve_interactions(state);

    // 5. Win
    if let Some(winner) = evaluate_win(state) {
        result.round_ended = true;
        result.winner = Some(winner);
    }

    result.events = state.take_events();

    #[cfg(feature = "debug-tracing")]
    tracing::trace!(
        tick = state.tick,
        events = result.events.len(),
        projectiles = state.projectiles.len(),
        bonuses = state.bonuses.len(),
        "tick complete"
    );

    result
}

/// Execute every timer due this tick.
fn run_timers(state: &mut ArenaState) {
    for task in state.timers.drain_due(state.tick) {
        match task {
            TimerTask::SpawnBonus => {
                spawn_bonus(state);
                let due = state.tick + state.config.bonus.interval_ticks;
                state.timers.schedule(due, TimerTask::SpawnBonus);
            }
        }
    }
}

/// Turn pending fire and mine intents into entities, ascending id.
///
/// Costs are re-checked here since units may have changed since submission.
fn apply_one_shots(state: &mut ArenaState) {
    let projectile = state.config.projectile.clone();
    let mine = state.config.mine.clone();

    for id in state.alive_ids() {
        let Some(player) = state.get_player_mut(&id) else {
            continue;
        };
        let shot = player.pending.take_fire();
        let drop_mine = player.pending.take_mine();
        let (position, color) = (player.position, player.color);

        if let Some(direction) = shot {
            if player.units > projectile.min_units {
                player.units -= projectile.cost.min(player.units);
                player.facing = Some(direction);
                state.spawn_projectile(id, position, direction.scale(projectile.speed), color);
            } else {
                debug!("Player {} cannot afford to fire", id);
            }
        }

        if drop_mine {
            let units = state.get_player(&id).map_or(0, |p| p.units);
            if units >= mine.min_units {
                state.take_units(&id, mine.cost);
                state.spawn_mine(id, position);
            } else {
                debug!("Player {} cannot afford a mine", id);
            }
        }
    }
}

// =============================================================================
// REPLAY
// =============================================================================

/// Intents to submit before a given tick, per tick.
pub type IntentScript = BTreeMap<u32, Vec<(PlayerId, Intent)>>;

/// Replay a round from a seed, a roster and a scripted intent stream.
///
/// The round is activated immediately. Rejected intents are skipped, as the
/// gateway would. Stops early when the round ends.
pub fn replay_round(
    config: ArenaConfig,
    seed: u64,
    roster: &[(PlayerId, String)],
    script: &IntentScript,
    tick_count: u32,
) -> (ArenaState, EventLog) {
    let mut state = ArenaState::new(config, seed);
    let mut log = EventLog::new();

    for (id, name) in roster {
        // Duplicate ids in the roster are ignored
        let _ = state.join(*id, name.clone());
    }
    state.begin_countdown();
    state.activate();

    for t in 0..tick_count {
        if let Some(intents) = script.get(&t) {
            for (id, intent) in intents {
                let _ = state.submit(id, *intent);
            }
        }

        let result = tick(&mut state);
        log.extend(result.events);

        if result.round_ended {
            break;
        }
    }

    (state, log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vec2::Vec2;
    use crate::game::events::GameEventData;
    use crate::game::intent::Direction;
    use crate::game::state::BonusKind;

    fn roster(n: u8) -> Vec<(PlayerId, String)> {
        (1..=n).map(|i| (PlayerId::new([i; 16]), format!("p{}", i))).collect()
    }

    fn active_arena(seed: u64) -> ArenaState {
        let mut state = ArenaState::new(ArenaConfig::default(), seed);
        for (id, name) in roster(4) {
            state.join(id, name).unwrap();
        }
        state.begin_countdown();
        state.activate();
        state
    }

    #[test]
    fn test_timer_queue_order() {
        let mut timers = TimerQueue::new();
        timers.schedule(10, TimerTask::SpawnBonus);
        timers.schedule(5, TimerTask::SpawnBonus);
        timers.schedule(20, TimerTask::SpawnBonus);

        assert_eq!(timers.next_due(), Some(5));
        assert!(timers.drain_due(4).is_empty());
        assert_eq!(timers.drain_due(10).len(), 2);
        assert_eq!(timers.len(), 1);
        assert_eq!(timers.next_due(), Some(20));
    }

    #[test]
    fn test_idle_and_countdown_do_nothing() {
        let mut state = ArenaState::new(ArenaConfig::default(), 1);
        state.join(PlayerId::new([1; 16]), "p").unwrap();

        let before = state.compute_hash();
        tick(&mut state);
        assert_eq!(state.compute_hash(), before);

        state.begin_countdown();
        let before = state.compute_hash();
        tick(&mut state);
        assert_eq!(state.compute_hash(), before);
        assert_eq!(state.tick, 0);
    }

    #[test]
    fn test_bonus_spawn_interval() {
        let mut state = active_arena(2);

        for _ in 0..14 {
            tick(&mut state);
        }
        assert!(state.bonuses.is_empty());

        let result = tick(&mut state);
        assert_eq!(state.tick, 15);
        assert!(result
            .events
            .iter()
            .any(|e| matches!(e.data, GameEventData::BonusSpawned { .. })));

        for _ in 0..15 {
            tick(&mut state);
        }
        // Bonuses may already have been picked up
        assert!(state.bonuses.len() <= 2);
        assert_eq!(state.timers.len(), 1);
    }

    #[test]
    fn test_fire_spawns_projectile() {
        let mut state = active_arena(3);
        let id = PlayerId::new([1; 16]);
        state.fire(&id, Vec2::new(0.0, -5.0)).unwrap();

        tick(&mut state);

        // Cost paid before any hit could refund it
        assert!(state.projectiles.len() <= 1);
        let player = state.get_player(&id).unwrap();
        assert_eq!(player.facing, Some(Vec2::UP));
        assert!(player.pending.fire.is_none());
    }

    #[test]
    fn test_fire_recheck_at_tick() {
        let mut state = active_arena(3);
        let id = PlayerId::new([1; 16]);
        state.fire(&id, Vec2::RIGHT).unwrap();
        // Lost units between submission and tick
        state.get_player_mut(&id).unwrap().units = 1;

        tick(&mut state);

        assert!(state.projectiles.is_empty());
        assert_eq!(state.get_player(&id).unwrap().units, 1);
    }

    #[test]
    fn test_place_mine_costs_units() {
        let mut state = active_arena(4);
        let id = PlayerId::new([1; 16]);
        state.place_mine(&id).unwrap();

        tick(&mut state);

        assert_eq!(state.mines.len(), 1);
        let mine = state.mines.values().next().unwrap();
        assert_eq!(mine.owner, id);
        assert_eq!(mine.created_tick, 1);
    }

    #[test]
    fn test_win_ends_round_once() {
        let mut state = active_arena(5);
        let id = PlayerId::new([2; 16]);
        {
            let player = state.get_player_mut(&id).unwrap();
            player.units = 200;
            player.position = Vec2::new(960.0, 480.0);
        }
        // Spread bonuses along the player's spot, one per tick
        let mut wins = 0;
        for _ in 0..40 {
            let pos = state.get_player(&id).unwrap().position;
            state.spawn_bonus(pos, BonusKind::Brown, 25);
            let result = tick(&mut state);
            wins += result.events.iter().filter(|e| e.is_win()).count();
        }

        assert_eq!(wins, 1);
        assert!(state.is_ended());
        assert_eq!(state.winner, Some(id));

        // Ended rounds are frozen
        let hash = state.compute_hash();
        let result = tick(&mut state);
        assert!(result.round_ended);
        assert!(result.events.is_empty());
        assert_eq!(state.compute_hash(), hash);
    }

    #[test]
    fn test_tick_determinism() {
        let mut state1 = active_arena(12345);
        let mut state2 = active_arena(12345);

        for t in 0..200u32 {
            for (i, (id, _)) in roster(4).iter().enumerate() {
                let target = Vec2::new(
                    ((t * 37 + i as u32 * 311) % 1900) as f32,
                    ((t * 53 + i as u32 * 173) % 940) as f32,
                );
                let _ = state1.set_target(id, target);
                let _ = state2.set_target(id, target);
                if t % 10 == i as u32 {
                    let _ = state1.nudge(id, Direction::Down);
                    let _ = state2.nudge(id, Direction::Down);
                }
            }
            tick(&mut state1);
            tick(&mut state2);
        }

        assert_eq!(state1.tick, state2.tick);
        assert_eq!(state1.compute_hash(), state2.compute_hash());
    }

    #[test]
    fn test_replay_determinism() {
        let players = roster(3);
        let mut script = IntentScript::new();
        for t in 0..120u32 {
            let intents = players
                .iter()
                .enumerate()
                .map(|(i, (id, _))| {
                    let intent = match (t + i as u32) % 4 {
                        0 => Intent::Move { target: Vec2::new(100.0 + t as f32 * 7.0, 400.0) },
                        1 => Intent::Fire { direction: Vec2::new(1.0, i as f32) },
                        2 => Intent::PlaceMine,
                        _ => Intent::Nudge { direction: Direction::Up },
                    };
                    (*id, intent)
                })
                .collect();
            script.insert(t, intents);
        }

        let (final1, log1) = replay_round(ArenaConfig::default(), 99, &players, &script, 120);
        let (final2, log2) = replay_round(ArenaConfig::default(), 99, &players, &script, 120);

        assert_eq!(final1.compute_hash(), final2.compute_hash());
        assert_eq!(log1.events, log2.events);
    }
}
