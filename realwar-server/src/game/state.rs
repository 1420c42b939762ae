//! Arena State
//!
//! The entity store: every player, projectile, mine, bonus and wall of the
//! running arena, plus round phase and the simulation RNG.
//! Uses BTreeMap for deterministic iteration order.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::debug;

use crate::core::vec2::Vec2;
use crate::core::rng::{DeterministicRng, derive_seed};
use crate::core::hash::{StateHash, StateHasher, compute_state_hash};
use crate::game::config::ArenaConfig;
use crate::game::events::GameEvent;
use crate::game::geometry::{ArenaBounds, Wall, find_safe_position, generate_walls};
use crate::game::intent::{Direction, Intent, IntentError, PendingIntents};
use crate::game::tick::{TimerQueue, TimerTask};

// =============================================================================
// PLAYER ID
// =============================================================================

/// Unique player identifier (UUID as bytes).
///
/// Implements Ord for deterministic BTreeMap ordering. Serializes as the
/// hyphenated UUID string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PlayerId(pub [u8; 16]);

impl PlayerId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Fresh random id.
    pub fn random() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }

    /// Create from UUID string.
    pub fn from_uuid_str(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s)
            .ok()
            .map(|u| Self(*u.as_bytes()))
    }

    /// Convert to UUID string.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form for logs
        write!(f, "{}", hex::encode(&self.0[..4]))
    }
}

impl From<PlayerId> for String {
    fn from(id: PlayerId) -> Self {
        id.to_uuid_string()
    }
}

impl TryFrom<String> for PlayerId {
    type Error = uuid::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        uuid::Uuid::parse_str(&s).map(|u| Self(*u.as_bytes()))
    }
}

// =============================================================================
// PLAYER
// =============================================================================

/// Cosmetic color tag assigned on join.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum PlayerColor {
    Red = 0,
    Blue = 1,
    Green = 2,
    Purple = 3,
    Orange = 4,
}

impl PlayerColor {
    /// Every color, in draw order.
    pub const ALL: [PlayerColor; 5] = [
        PlayerColor::Red,
        PlayerColor::Blue,
        PlayerColor::Green,
        PlayerColor::Purple,
        PlayerColor::Orange,
    ];
}

/// Whether a player still takes part in the round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifeState {
    #[default]
    Alive,
    /// Stays in the store but no longer moves, interacts or wins
    Eliminated,
}

/// State of a single player in the arena.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerState {
    /// Unique player ID
    pub id: PlayerId,

    /// Display name
    pub name: String,

    /// Color tag
    pub color: PlayerColor,

    /// Center of the player's circle
    pub position: Vec2,

    /// Unit count (size and currency)
    pub units: u32,

    /// Alive or eliminated
    pub life: LifeState,

    /// Units gained from bonuses and absorption
    pub score: u32,

    /// Last direction of travel or aim
    pub facing: Option<Vec2>,

    /// Navigation target
    pub target: Option<Vec2>,

    /// One-shot intents for the next tick
    pub pending: PendingIntents,
}

impl PlayerState {
    /// Create a new living player.
    pub fn new(id: PlayerId, name: String, color: PlayerColor, position: Vec2, units: u32) -> Self {
        Self {
            id,
            name,
            color,
            position,
            units,
            life: LifeState::Alive,
            score: 0,
            facing: None,
            target: None,
            pending: PendingIntents::default(),
        }
    }

    /// Still in the round?
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.life == LifeState::Alive
    }

    /// Hash this player's state for verification.
    pub fn hash_into(&self, hasher: &mut StateHasher) {
        hasher.update_id(&self.id.0);
        hasher.update_bytes(self.name.as_bytes());
        hasher.update_u8(self.color as u8);
        hasher.update_vec2(self.position);
        hasher.update_u32(self.units);
        hasher.update_bool(self.is_alive());
        hasher.update_u32(self.score);
        hasher.update_bool(self.target.is_some());
        if let Some(target) = self.target {
            hasher.update_vec2(target);
        }
    }
}

// =============================================================================
// PROJECTILES, MINES, BONUSES
// =============================================================================

/// A fired projectile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    /// Monotonic id
    pub id: u32,
    /// Firing player
    pub owner: PlayerId,
    /// Current position
    pub position: Vec2,
    /// Displacement per tick
    pub velocity: Vec2,
    /// Owner's color at fire time
    pub color: PlayerColor,
}

/// A placed mine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mine {
    /// Monotonic id
    pub id: u32,
    /// Placing player
    pub owner: PlayerId,
    /// Fixed position
    pub position: Vec2,
    /// Tick the mine was placed
    pub created_tick: u32,
}

/// Bonus rarity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum BonusKind {
    Gold = 0,
    Brown = 1,
    Red = 2,
    Blue = 3,
    Green = 4,
}

/// A collectible bonus.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bonus {
    /// Monotonic id
    pub id: u32,
    /// Fixed position
    pub position: Vec2,
    /// Rarity
    pub kind: BonusKind,
    /// Units granted on pickup
    pub amount: u32,
}

// =============================================================================
// ROUND PHASE
// =============================================================================

/// Lifecycle of a round. Moves forward only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    /// Lobby open, waiting for ready players
    #[default]
    Idle,
    /// Everyone ready, countdown running
    Countdown,
    /// Simulation running
    Active,
    /// A player won; nothing changes any more
    Ended,
}

/// Why a join was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum JoinError {
    /// Round is over
    #[error("round has ended")]
    RoundEnded,

    /// Id already present
    #[error("player already joined")]
    AlreadyJoined,
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Player as seen by clients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub color: PlayerColor,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub units: u32,
    pub score: u32,
    pub alive: bool,
    pub facing: Option<Vec2>,
}

/// Full state broadcast after every tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArenaSnapshot {
    /// Tick the snapshot was taken after
    pub tick: u32,
    /// Round phase
    pub phase: RoundPhase,
    /// Players in ascending id order
    pub players: Vec<PlayerView>,
    /// Live projectiles
    pub projectiles: Vec<Projectile>,
    /// Live mines
    pub mines: Vec<Mine>,
    /// Live bonuses
    pub bonuses: Vec<Bonus>,
    /// Wall layout
    pub walls: Vec<Wall>,
}

impl ArenaSnapshot {
    /// Drop eliminated players from the roster.
    pub fn without_eliminated(mut self) -> Self {
        self.players.retain(|p| p.alive);
        self
    }
}

// =============================================================================
// ARENA STATE
// =============================================================================

/// Complete state of the arena.
///
/// Single writer for every entity collection. Uses BTreeMap for
/// deterministic iteration order.
#[derive(Clone, Debug)]
pub struct ArenaState {
    /// Rules in effect
    pub config: ArenaConfig,

    /// Playable rectangle
    pub bounds: ArenaBounds,

    /// Round seed (for verification)
    pub seed: u64,

    /// Deterministic RNG state
    pub rng: DeterministicRng,

    /// Simulated ticks since activation
    pub tick: u32,

    /// Current round phase
    pub phase: RoundPhase,

    /// Winner once ended
    pub winner: Option<PlayerId>,

    /// All players
    pub players: BTreeMap<PlayerId, PlayerState>,

    /// Live projectiles by id
    pub projectiles: BTreeMap<u32, Projectile>,

    /// Live mines by id
    pub mines: BTreeMap<u32, Mine>,

    /// Live bonuses by id
    pub bonuses: BTreeMap<u32, Bonus>,

    /// Static walls
    pub walls: Vec<Wall>,

    /// Tick-scheduled tasks
    pub timers: TimerQueue,

    next_projectile_id: u32,
    next_mine_id: u32,
    next_bonus_id: u32,

    /// Events generated this tick (cleared each tick)
    pending_events: Vec<GameEvent>,
}

impl ArenaState {
    /// Create an idle arena and lay out its walls.
    pub fn new(config: ArenaConfig, seed: u64) -> Self {
        let mut rng = DeterministicRng::new(derive_seed(seed, b"arena"));
        let walls = generate_walls(&config, &mut rng);
        let bounds = ArenaBounds::from_config(&config);

        Self {
            config,
            bounds,
            seed,
            rng,
            tick: 0,
            phase: RoundPhase::Idle,
            winner: None,
            players: BTreeMap::new(),
            projectiles: BTreeMap::new(),
            mines: BTreeMap::new(),
            bonuses: BTreeMap::new(),
            walls,
            timers: TimerQueue::new(),
            next_projectile_id: 0,
            next_mine_id: 0,
            next_bonus_id: 0,
            pending_events: Vec::new(),
        }
    }

    // ===== PLAYERS =====

    /// Add a player at a safe position with starting units.
    pub fn join(&mut self, id: PlayerId, name: impl Into<String>) -> Result<PlayerColor, JoinError> {
        if self.phase == RoundPhase::Ended {
            return Err(JoinError::RoundEnded);
        }
        if self.players.contains_key(&id) {
            return Err(JoinError::AlreadyJoined);
        }

        let color = self.rng.choose(&PlayerColor::ALL).copied().unwrap_or(PlayerColor::Red);
        let position = self.safe_position();
        let player = PlayerState::new(id, name.into(), color, position, self.config.starting_units);
        debug!("Player {} joined at {}", id, position);
        self.players.insert(id, player);
        Ok(color)
    }

    /// Remove a player and its pending intents. Idempotent.
    pub fn leave(&mut self, id: &PlayerId) -> bool {
        self.players.remove(id).is_some()
    }

    /// Get a player by ID.
    pub fn get_player(&self, id: &PlayerId) -> Option<&PlayerState> {
        self.players.get(id)
    }

    /// Get a player mutably by ID.
    pub fn get_player_mut(&mut self, id: &PlayerId) -> Option<&mut PlayerState> {
        self.players.get_mut(id)
    }

    /// Ids of living players, ascending.
    pub fn alive_ids(&self) -> Vec<PlayerId> {
        self.players
            .values()
            .filter(|p| p.is_alive())
            .map(|p| p.id)
            .collect()
    }

    /// Count of living players.
    pub fn alive_count(&self) -> usize {
        self.players.values().filter(|p| p.is_alive()).count()
    }

    /// Radius of a player holding `units`.
    #[inline]
    pub fn radius(&self, units: u32) -> f32 {
        self.config.radius(units)
    }

    /// Wall-free sample (or fallback) from the arena RNG.
    pub fn safe_position(&mut self) -> Vec2 {
        find_safe_position(&self.walls, self.bounds, &self.config.spawn, &mut self.rng)
    }

    /// Move a player to a fresh safe position and drop its target.
    pub fn relocate(&mut self, id: &PlayerId) {
        let position = self.safe_position();
        if let Some(player) = self.players.get_mut(id) {
            player.position = position;
            player.target = None;
        }
    }

    /// Add units to a player. Returns the new total.
    pub fn grant_units(&mut self, id: &PlayerId, amount: u32) -> Option<u32> {
        let player = self.players.get_mut(id)?;
        player.units = player.units.saturating_add(amount);
        Some(player.units)
    }

    /// Remove up to `amount` units. Returns how many were actually removed.
    pub fn take_units(&mut self, id: &PlayerId, amount: u32) -> u32 {
        match self.players.get_mut(id) {
            Some(player) => {
                let taken = amount.min(player.units);
                player.units -= taken;
                taken
            }
            None => 0,
        }
    }

    /// Eliminate a player if it is at or below the lethal floor.
    pub fn eliminate_if_lethal(&mut self, id: &PlayerId, killer: Option<PlayerId>) -> bool {
        let lethal = self
            .players
            .get(id)
            .is_some_and(|p| p.is_alive() && p.units <= self.config.lethal_floor);
        lethal && self.eliminate(id, killer)
    }

    /// Tag a player as eliminated and broadcast its death.
    pub fn eliminate(&mut self, id: &PlayerId, killer: Option<PlayerId>) -> bool {
        let Some(player) = self.players.get_mut(id) else {
            return false;
        };
        if !player.is_alive() {
            return false;
        }

        player.life = LifeState::Eliminated;
        player.target = None;
        player.pending.clear();
        debug!("Player {} eliminated", id);

        let event = GameEvent::death(self.tick, *id, killer);
        self.push_event(event);
        true
    }

    // ===== INTENTS =====

    fn intent_player(&mut self, id: &PlayerId) -> Result<&mut PlayerState, IntentError> {
        match self.phase {
            RoundPhase::Active => {}
            RoundPhase::Ended => return Err(IntentError::RoundEnded),
            RoundPhase::Idle | RoundPhase::Countdown => return Err(IntentError::RoundNotActive),
        }
        let player = self.players.get_mut(id).ok_or(IntentError::UnknownPlayer)?;
        if !player.is_alive() {
            return Err(IntentError::Eliminated);
        }
        Ok(player)
    }

    /// Route any intent to its handler.
    pub fn submit(&mut self, id: &PlayerId, intent: Intent) -> Result<(), IntentError> {
        match intent {
            Intent::Move { target } => self.set_target(id, target),
            Intent::Fire { direction } => self.fire(id, direction),
            Intent::PlaceMine => self.place_mine(id),
            Intent::Nudge { direction } => self.nudge(id, direction),
        }
    }

    /// Set the navigation target, clamped into the arena.
    pub fn set_target(&mut self, id: &PlayerId, target: Vec2) -> Result<(), IntentError> {
        Intent::Move { target }.validate()?;
        if !self.bounds.contains(target) {
            return Err(IntentError::OutOfBounds);
        }
        let player = self.intent_player(id)?;
        player.target = Some(target);
        Ok(())
    }

    /// Queue a shot for the next tick.
    pub fn fire(&mut self, id: &PlayerId, direction: Vec2) -> Result<(), IntentError> {
        Intent::Fire { direction }.validate()?;
        let min_units = self.config.projectile.min_units;
        let player = self.intent_player(id)?;
        if player.units <= min_units {
            return Err(IntentError::InsufficientUnits);
        }
        player.pending.fire = Some(direction.normalize());
        Ok(())
    }

    /// Queue a mine for the next tick.
    pub fn place_mine(&mut self, id: &PlayerId) -> Result<(), IntentError> {
        let min_units = self.config.mine.min_units;
        let player = self.intent_player(id)?;
        if player.units < min_units {
            return Err(IntentError::InsufficientUnits);
        }
        player.pending.place_mine = true;
        Ok(())
    }

    /// Queue a nudge for the next tick.
    pub fn nudge(&mut self, id: &PlayerId, direction: Direction) -> Result<(), IntentError> {
        let player = self.intent_player(id)?;
        player.pending.nudge = Some(direction);
        Ok(())
    }

    // ===== ENTITIES =====

    /// Add a projectile. Returns its id.
    pub fn spawn_projectile(&mut self, owner: PlayerId, position: Vec2, velocity: Vec2, color: PlayerColor) -> u32 {
        let id = self.next_projectile_id;
        self.next_projectile_id = self.next_projectile_id.wrapping_add(1);
        self.projectiles.insert(id, Projectile { id, owner, position, velocity, color });
        id
    }

    /// Add a mine. Returns its id.
    pub fn spawn_mine(&mut self, owner: PlayerId, position: Vec2) -> u32 {
        let id = self.next_mine_id;
        self.next_mine_id = self.next_mine_id.wrapping_add(1);
        let created_tick = self.tick;
        self.mines.insert(id, Mine { id, owner, position, created_tick });
        id
    }

    /// Add a bonus. Returns its id.
    pub fn spawn_bonus(&mut self, position: Vec2, kind: BonusKind, amount: u32) -> u32 {
        let id = self.next_bonus_id;
        self.next_bonus_id = self.next_bonus_id.wrapping_add(1);
        self.bonuses.insert(id, Bonus { id, position, kind, amount });
        id
    }

    /// Remove a projectile by id.
    pub fn remove_projectile(&mut self, id: u32) -> Option<Projectile> {
        self.projectiles.remove(&id)
    }

    /// Remove a mine by id.
    pub fn remove_mine(&mut self, id: u32) -> Option<Mine> {
        self.mines.remove(&id)
    }

    /// Remove a bonus by id.
    pub fn remove_bonus(&mut self, id: u32) -> Option<Bonus> {
        self.bonuses.remove(&id)
    }

    /// Keep only projectiles matching `keep`.
    pub fn retain_projectiles(&mut self, mut keep: impl FnMut(&Projectile) -> bool) {
        self.projectiles.retain(|_, p| keep(p));
    }

    /// Keep only mines matching `keep`.
    pub fn retain_mines(&mut self, mut keep: impl FnMut(&Mine) -> bool) {
        self.mines.retain(|_, m| keep(m));
    }

    /// Keep only bonuses matching `keep`.
    pub fn retain_bonuses(&mut self, mut keep: impl FnMut(&Bonus) -> bool) {
        self.bonuses.retain(|_, b| keep(b));
    }

    // ===== ROUND PHASE =====

    /// Idle -> Countdown.
    pub fn begin_countdown(&mut self) -> bool {
        if self.phase != RoundPhase::Idle {
            return false;
        }
        self.phase = RoundPhase::Countdown;
        true
    }

    /// Countdown -> Active. Arms the bonus spawner.
    pub fn activate(&mut self) -> bool {
        if self.phase != RoundPhase::Countdown {
            return false;
        }
        self.phase = RoundPhase::Active;
        let due = self.tick + self.config.bonus.interval_ticks;
        self.timers.schedule(due, TimerTask::SpawnBonus);
        true
    }

    /// Any phase -> Ended. Returns false if already ended.
    pub fn end_round(&mut self, winner: Option<PlayerId>) -> bool {
        if self.phase == RoundPhase::Ended {
            return false;
        }
        self.phase = RoundPhase::Ended;
        self.winner = winner;
        self.timers.clear();
        true
    }

    /// Simulation running?
    pub fn is_active(&self) -> bool {
        self.phase == RoundPhase::Active
    }

    /// Round over?
    pub fn is_ended(&self) -> bool {
        self.phase == RoundPhase::Ended
    }

    // ===== OUTPUT =====

    /// Full-state snapshot for broadcast.
    pub fn snapshot(&self) -> ArenaSnapshot {
        ArenaSnapshot {
            tick: self.tick,
            phase: self.phase,
            players: self
                .players
                .values()
                .map(|p| PlayerView {
                    id: p.id,
                    name: p.name.clone(),
                    color: p.color,
                    x: p.position.x,
                    y: p.position.y,
                    radius: self.radius(p.units),
                    units: p.units,
                    score: p.score,
                    alive: p.is_alive(),
                    facing: p.facing,
                })
                .collect(),
            projectiles: self.projectiles.values().cloned().collect(),
            mines: self.mines.values().cloned().collect(),
            bonuses: self.bonuses.values().cloned().collect(),
            walls: self.walls.clone(),
        }
    }

    /// Compute hash of current state for verification.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.tick, self.seed, |hasher| {
            hasher.update_u8(self.phase as u8);

            for player in self.players.values() {
                player.hash_into(hasher);
            }

            for projectile in self.projectiles.values() {
                hasher.update_u32(projectile.id);
                hasher.update_id(&projectile.owner.0);
                hasher.update_vec2(projectile.position);
                hasher.update_vec2(projectile.velocity);
            }

            for mine in self.mines.values() {
                hasher.update_u32(mine.id);
                hasher.update_id(&mine.owner.0);
                hasher.update_vec2(mine.position);
                hasher.update_u32(mine.created_tick);
            }

            for bonus in self.bonuses.values() {
                hasher.update_u32(bonus.id);
                hasher.update_vec2(bonus.position);
                hasher.update_u8(bonus.kind as u8);
                hasher.update_u32(bonus.amount);
            }

            for wall in &self.walls {
                hasher.update_f32(wall.x);
                hasher.update_f32(wall.y);
                hasher.update_f32(wall.w);
                hasher.update_f32(wall.h);
            }
        })
    }

    /// Take pending events (consumes them).
    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.pending_events)
    }

    /// Push a game event.
    pub fn push_event(&mut self, event: GameEvent) {
        self.pending_events.push(event);
    }
}

// =============================================================================
// TESTS
// =============================================================================
