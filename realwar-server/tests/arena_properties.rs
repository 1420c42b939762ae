//! Property tests for the arena simulation.

use proptest::prelude::*;

use realwar::core::rng::DeterministicRng;
use realwar::core::vec2::Vec2;
use realwar::game::combat::{resolve_absorptions, resolve_projectiles};
use realwar::game::config::{ArenaConfig, SpawnConfig};
use realwar::game::geometry::{inside_any_wall, try_find_safe_position, ArenaBounds, Wall};
use realwar::game::intent::{Direction, Intent, IntentError};
use realwar::game::state::{ArenaState, PlayerColor, PlayerId};
use realwar::game::tick::{replay_round, tick, IntentScript};

fn fixed_layout_config() -> ArenaConfig {
    let mut config = ArenaConfig::default();
    config.walls.procedural = false;
    config
}

fn roster(n: u8) -> Vec<(PlayerId, String)> {
    (1..=n).map(|i| (PlayerId::new([i; 16]), format!("p{}", i))).collect()
}

fn arb_direction() -> impl Strategy<Value = Direction> {
    prop_oneof![
        Just(Direction::Up),
        Just(Direction::Down),
        Just(Direction::Left),
        Just(Direction::Right),
    ]
}

fn arb_intent() -> impl Strategy<Value = Intent> {
    prop_oneof![
        (-200.0f32..2200.0, -200.0f32..1200.0)
            .prop_map(|(x, y)| Intent::Move { target: Vec2::new(x, y) }),
        (-1.0f32..1.0, -1.0f32..1.0)
            .prop_map(|(dx, dy)| Intent::Fire { direction: Vec2::new(dx, dy) }),
        Just(Intent::PlaceMine),
        arb_direction().prop_map(|direction| Intent::Nudge { direction }),
    ]
}

/// (tick, player index, intent)
fn arb_script() -> impl Strategy<Value = Vec<(u32, u8, Intent)>> {
    prop::collection::vec((0u32..90, 0u8..5, arb_intent()), 0..120)
}

fn build_script(entries: &[(u32, u8, Intent)], players: &[(PlayerId, String)]) -> IntentScript {
    let mut script = IntentScript::new();
    for (t, idx, intent) in entries {
        let (id, _) = &players[*idx as usize % players.len()];
        script.entry(*t).or_default().push((*id, *intent));
    }
    script
}

fn active_arena(config: ArenaConfig, seed: u64, players: &[(PlayerId, String)]) -> ArenaState {
    let mut state = ArenaState::new(config, seed);
    for (id, name) in players {
        state.join(*id, name.clone()).unwrap();
    }
    state.begin_countdown();
    state.activate();
    state
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn living_players_stay_solvent_and_clear_of_walls(
        seed in any::<u64>(),
        n in 2u8..6,
        entries in arb_script(),
    ) {
        let players = roster(n);
        let script = build_script(&entries, &players);
        let mut state = active_arena(fixed_layout_config(), seed, &players);

        for t in 0..90u32 {
            if let Some(intents) = script.get(&t) {
                for (id, intent) in intents {
                    let _ = state.submit(id, *intent);
                }
            }
            let result = tick(&mut state);

            for player in state.players.values().filter(|p| p.is_alive()) {
                let radius = state.radius(player.units);
                prop_assert!(player.units > state.config.lethal_floor);
                prop_assert!(state.bounds.contains(player.position));
                prop_assert!(
                    !inside_any_wall(&state.walls, player.position, radius),
                    "player {} inside a wall at {}", player.id, player.position
                );
            }

            if result.round_ended {
                break;
            }
        }
    }

    #[test]
    fn absorption_conserves_units(
        a_units in 1u32..5000,
        b_units in 1u32..5000,
        offset in 0.0f32..5.0,
    ) {
        prop_assume!(a_units != b_units);

        let players = roster(2);
        let mut state = active_arena(fixed_layout_config(), 1, &players);
        let (a, b) = (players[0].0, players[1].0);
        {
            let pa = state.get_player_mut(&a).unwrap();
            pa.units = a_units;
            pa.position = Vec2::new(960.0, 900.0);
        }
        {
            let pb = state.get_player_mut(&b).unwrap();
            pb.units = b_units;
            pb.position = Vec2::new(960.0 + offset, 900.0);
        }

        resolve_absorptions(&mut state);

        let after: u32 = state.players.values().map(|p| p.units).sum();
        prop_assert_eq!(after, a_units + b_units);
        prop_assert_eq!(state.alive_count(), 2);

        let loser_units = a_units.min(b_units);
        let loser = if a_units < b_units { a } else { b };
        prop_assert_eq!(state.get_player(&loser).unwrap().units, loser_units - loser_units / 4);
    }

    #[test]
    fn safe_positions_avoid_walls(
        seed in any::<u64>(),
        walls in prop::collection::vec(
            (0.0f32..1800.0, 0.0f32..900.0, 20.0f32..300.0, 20.0f32..300.0),
            0..30,
        ),
    ) {
        let walls: Vec<Wall> = walls.into_iter().map(|(x, y, w, h)| Wall::new(x, y, w, h)).collect();
        let bounds = ArenaBounds::new(1920.0, 960.0);
        let spawn = SpawnConfig::default();
        let mut rng = DeterministicRng::new(seed);

        if let Some(pos) = try_find_safe_position(&walls, bounds, &spawn, &mut rng) {
            prop_assert!(!inside_any_wall(&walls, pos, spawn.probe_radius));
            prop_assert!(pos.x >= spawn.margin && pos.x <= 1920.0 - spawn.margin);
            prop_assert!(pos.y >= spawn.margin && pos.y <= 960.0 - spawn.margin);
        }
    }

    #[test]
    fn projectiles_never_hit_their_owner(
        x in 50.0f32..1850.0,
        y in 50.0f32..900.0,
        units in 2u32..1000,
    ) {
        let players = roster(1);
        let mut state = active_arena(fixed_layout_config(), 3, &players);
        let owner = players[0].0;
        {
            let player = state.get_player_mut(&owner).unwrap();
            player.position = Vec2::new(x, y);
            player.units = units;
        }
        let projectile = state.spawn_projectile(owner, Vec2::new(x, y), Vec2::new(10.0, 0.0), PlayerColor::Red);

        resolve_projectiles(&mut state);

        prop_assert_eq!(state.get_player(&owner).unwrap().units, units);
        prop_assert!(state.projectiles.contains_key(&projectile));
        prop_assert!(state.take_events().is_empty());
    }

    #[test]
    fn ended_round_is_frozen(
        seed in any::<u64>(),
        entries in arb_script(),
        extra_ticks in 1u32..30,
    ) {
        let players = roster(3);
        let script = build_script(&entries, &players);
        let (mut state, _) = replay_round(fixed_layout_config(), seed, &players, &script, 45);

        state.end_round(None);
        let frozen = state.compute_hash();

        for _ in 0..extra_ticks {
            let result = tick(&mut state);
            prop_assert!(result.round_ended);
            prop_assert!(result.events.is_empty());
        }
        for (id, _) in &players {
            prop_assert_eq!(state.submit(id, Intent::PlaceMine), Err(IntentError::RoundEnded));
        }
        prop_assert_eq!(state.compute_hash(), frozen);
    }

    #[test]
    fn replay_is_deterministic(
        seed in any::<u64>(),
        entries in arb_script(),
    ) {
        let players = roster(4);
        let script = build_script(&entries, &players);

        let (first, first_log) = replay_round(ArenaConfig::default(), seed, &players, &script, 90);
        let (second, second_log) = replay_round(ArenaConfig::default(), seed, &players, &script, 90);

        prop_assert_eq!(first.compute_hash(), second.compute_hash());
        prop_assert_eq!(first_log.events, second_log.events);
    }
}
