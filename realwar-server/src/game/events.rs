//! Game Events
//!
//! Point events emitted by the simulation alongside the per-tick snapshot.
//! Each event knows who should hear about it.

use serde::{Serialize, Deserialize};
use crate::core::vec2::Vec2;
use crate::game::state::{BonusKind, PlayerId};

/// Who an event is delivered to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Audience {
    /// Every connected session
    All,
    /// Only the listed players
    Players(Vec<PlayerId>),
}

impl Audience {
    /// Whether `player` is part of this audience.
    pub fn includes(&self, player: &PlayerId) -> bool {
        match self {
            Audience::All => true,
            Audience::Players(ids) => ids.contains(player),
        }
    }
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEventData {
    /// Projectile struck a player
    Hit {
        shooter_id: PlayerId,
        target_id: PlayerId,
        target_units: u32,
    },

    /// Player fell to the lethal floor
    Death {
        player_id: PlayerId,
        killer_id: Option<PlayerId>,
    },

    /// Mine went off under a player
    Detonation {
        mine_id: u32,
        owner_id: PlayerId,
        victim_id: PlayerId,
        units: u32,
    },

    /// Player collected a bonus
    Pickup {
        player_id: PlayerId,
        bonus_id: u32,
        kind: BonusKind,
        amount: u32,
    },

    /// Larger player absorbed part of a smaller one
    Absorbed {
        winner_id: PlayerId,
        loser_id: PlayerId,
        amount: u32,
    },

    /// Bonus appeared on the field
    BonusSpawned {
        bonus_id: u32,
        kind: BonusKind,
        position: Vec2,
    },

    /// Round won
    Win {
        player_id: PlayerId,
        name: String,
    },
}

/// A game event stamped with its tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Tick when event occurred
    pub tick: u32,

    /// Event data
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(tick: u32, data: GameEventData) -> Self {
        Self { tick, data }
    }

    /// Sessions that should receive this event.
    pub fn audience(&self) -> Audience {
        match &self.data {
            GameEventData::Hit { shooter_id, target_id, .. } => {
                Audience::Players(vec![*shooter_id, *target_id])
            }
            GameEventData::Absorbed { winner_id, loser_id, .. } => {
                Audience::Players(vec![*winner_id, *loser_id])
            }
            GameEventData::Pickup { player_id, .. } => Audience::Players(vec![*player_id]),
            GameEventData::Death { .. }
            | GameEventData::Detonation { .. }
            | GameEventData::BonusSpawned { .. }
            | GameEventData::Win { .. } => Audience::All,
        }
    }

    /// Create hit event.
    pub fn hit(tick: u32, shooter_id: PlayerId, target_id: PlayerId, target_units: u32) -> Self {
        Self::new(tick, GameEventData::Hit { shooter_id, target_id, target_units })
    }

    /// Create death event.
    pub fn death(tick: u32, player_id: PlayerId, killer_id: Option<PlayerId>) -> Self {
        Self::new(tick, GameEventData::Death { player_id, killer_id })
    }

    /// Create detonation event.
    pub fn detonation(
        tick: u32,
        mine_id: u32,
        owner_id: PlayerId,
        victim_id: PlayerId,
        units: u32,
    ) -> Self {
        Self::new(
            tick,
            GameEventData::Detonation {
                mine_id,
                owner_id,
                victim_id,
                units,
            },
        )
    }

    /// Create pickup event.
    pub fn pickup(tick: u32, player_id: PlayerId, bonus_id: u32, kind: BonusKind, amount: u32) -> Self {
        Self::new(
            tick,
            GameEventData::Pickup {
                player_id,
                bonus_id,
                kind,
                amount,
            },
        )
    }

    /// Create absorption event.
    pub fn absorbed(tick: u32, winner_id: PlayerId, loser_id: PlayerId, amount: u32) -> Self {
        Self::new(tick, GameEventData::Absorbed { winner_id, loser_id, amount })
    }

    /// Create bonus spawned event.
    pub fn bonus_spawned(tick: u32, bonus_id: u32, kind: BonusKind, position: Vec2) -> Self {
        Self::new(tick, GameEventData::BonusSpawned { bonus_id, kind, position })
    }

    /// Create win event.
    pub fn win(tick: u32, player_id: PlayerId, name: String) -> Self {
        Self::new(tick, GameEventData::Win { player_id, name })
    }

    /// Whether this is the round's win event.
    pub fn is_win(&self) -> bool {
        matches!(self.data, GameEventData::Win { .. })
    }
}

/// Event log for replay verification.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EventLog {
    /// All events in chronological order
    pub events: Vec<GameEvent>,
}

impl EventLog {
    /// Create empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tick's events.
    pub fn extend(&mut self, events: impl IntoIterator<Item = GameEvent>) {
        self.events.extend(events);
    }

    /// Get events for a specific tick.
    pub fn events_at_tick(&self, tick: u32) -> impl Iterator<Item = &GameEvent> {
        self.events.iter().filter(move |e| e.tick == tick)
    }

    /// Number of win events recorded.
    pub fn win_count(&self) -> usize {
        self.events.iter().filter(|e| e.is_win()).count()
    }

    /// Total event count.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
