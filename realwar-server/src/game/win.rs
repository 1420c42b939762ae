//! Win Evaluation
//!
//! Ends the round the first time a living player reaches the unit
//! threshold. Players are checked in ascending id order, so the lowest id
//! wins a simultaneous crossing.

use tracing::info;

use crate::game::events::GameEvent;
use crate::game::state::{ArenaState, PlayerId};

/// End the round if someone reached `win_units`. Returns the winner.
pub fn evaluate_win(state: &mut ArenaState) -> Option<PlayerId> {
    if state.is_ended() {
        return None;
    }

    let threshold = state.config.win_units;
    let (winner, name) = state
        .players
        .values()
        .find(|p| p.is_alive() && p.units >= threshold)
        .map(|p| (p.id, p.name.clone()))?;

    state.end_round(Some(winner));
    info!("Player {} ({}) wins at tick {}", winner, name, state.tick);

    let event = GameEvent::win(state.tick, winner, name);
    state.push_event(event);
    Some(winner)
}
