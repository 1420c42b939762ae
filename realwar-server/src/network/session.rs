//! Arena Session Management
//!
//! Owns the one arena of this process and the connections attached to it.
//! Coordinates the lobby (password, name, ready check) with the
//! deterministic simulation. The session is the single writer: connection
//! tasks only reach the simulation through `submit_intent`.

use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use crate::game::config::ArenaConfig;
use crate::game::events::{GameEvent, GameEventData};
use crate::game::intent::{Intent, IntentError};
use crate::game::state::{ArenaSnapshot, ArenaState, JoinError, PlayerColor, PlayerId, RoundPhase};
use crate::game::tick::{tick, TickResult};
use crate::network::protocol::{LobbyEntry, ServerMessage};

/// Longest accepted display name, in characters.
pub const MAX_NAME_LEN: usize = 24;

/// Lobby configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Shared lobby password.
    pub password: String,
    /// Players needed before a ready check can start the round.
    pub min_players: usize,
    /// Delay between the ready check and the first tick.
    pub countdown: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            password: "MMS".to_string(),
            min_players: 2,
            countdown: Duration::from_secs(15),
        }
    }
}

/// A connection attached to the session.
#[derive(Debug)]
pub struct SessionClient {
    /// Id assigned on connect, reused as the arena player id.
    pub player_id: PlayerId,
    /// Password accepted.
    pub authorized: bool,
    /// Display name once joined.
    pub name: Option<String>,
    /// Ready for the round.
    pub ready: bool,
    /// Message channel to this client.
    pub sender: mpsc::Sender<ServerMessage>,
}

impl SessionClient {
    /// Has an entity in the arena.
    pub fn is_joined(&self) -> bool {
        self.name.is_some()
    }

    /// Queue a message without waiting. A full queue drops the message.
    pub fn deliver(&self, message: ServerMessage) -> bool {
        match self.sender.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Client {} is lagging, message dropped", self.player_id);
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Client {} channel closed", self.player_id);
                false
            }
        }
    }
}

/// The arena session.
pub struct ArenaSession {
    /// Lobby configuration.
    pub config: SessionConfig,
    /// Simulation state.
    arena: ArenaState,
    /// Attached connections, by player id.
    clients: BTreeMap<PlayerId, SessionClient>,
}

impl ArenaSession {
    /// Create a session around a fresh arena.
    pub fn new(arena_config: ArenaConfig, seed: u64, config: SessionConfig) -> Self {
        info!("Arena created with seed {}", seed);
        Self {
            config,
            arena: ArenaState::new(arena_config, seed),
            clients: BTreeMap::new(),
        }
    }

    // =========================================================================
    // LOBBY
    // =========================================================================

    /// Attach a new connection. Returns its player id.
    pub fn connect(&mut self, sender: mpsc::Sender<ServerMessage>) -> PlayerId {
        let mut player_id = PlayerId::random();
        while self.clients.contains_key(&player_id) {
            player_id = PlayerId::random();
        }

        self.clients.insert(player_id, SessionClient {
            player_id,
            authorized: false,
            name: None,
            ready: false,
            sender,
        });
        player_id
    }

    /// Check the lobby password.
    pub fn check_password(&mut self, player_id: &PlayerId, password: &str) -> Result<(), SessionError> {
        let client = self.clients.get_mut(player_id).ok_or(SessionError::UnknownClient)?;
        if password != self.config.password {
            return Err(SessionError::WrongPassword);
        }
        client.authorized = true;
        Ok(())
    }

    /// Name the player and put it in the arena.
    pub fn set_name(&mut self, player_id: &PlayerId, name: &str) -> Result<PlayerColor, SessionError> {
        let client = self.clients.get(player_id).ok_or(SessionError::UnknownClient)?;
        if !client.authorized {
            return Err(SessionError::NotAuthorized);
        }
        if client.is_joined() {
            return Err(SessionError::AlreadyJoined);
        }

        let name: String = name.trim().chars().take(MAX_NAME_LEN).collect();
        if name.is_empty() {
            return Err(SessionError::InvalidName);
        }

        let color = self.arena.join(*player_id, name.clone())?;
        if let Some(client) = self.clients.get_mut(player_id) {
            client.name = Some(name);
        }
        info!("Player {} joined the arena", player_id);
        Ok(color)
    }

    /// Mark a joined player ready.
    ///
    /// Returns true when this call started the countdown; the caller owns
    /// running it.
    pub fn set_ready(&mut self, player_id: &PlayerId) -> Result<bool, SessionError> {
        let client = self.clients.get_mut(player_id).ok_or(SessionError::UnknownClient)?;
        if !client.is_joined() {
            return Err(SessionError::NotJoined);
        }
        client.ready = true;

        if self.ready_to_start() {
            self.arena.begin_countdown();
            info!("All {} players ready, countdown started", self.player_count());
            return Ok(true);
        }
        Ok(false)
    }

    /// Idle, enough players, and every joined player ready.
    pub fn ready_to_start(&self) -> bool {
        let mut joined = self.clients.values().filter(|c| c.is_joined()).peekable();
        self.arena.phase == RoundPhase::Idle
            && self.player_count() >= self.config.min_players
            && joined.peek().is_some()
            && joined.all(|c| c.ready)
    }

    /// Roster for `lobby_update`, ascending id.
    pub fn lobby_roster(&self) -> Vec<LobbyEntry> {
        self.clients
            .values()
            .filter_map(|c| {
                c.name.as_ref().map(|name| LobbyEntry {
                    name: name.clone(),
                    ready: c.ready,
                })
            })
            .collect()
    }

    /// Detach a connection and remove its entity.
    ///
    /// Returns true if the connection had joined the arena. Idempotent.
    pub fn disconnect(&mut self, player_id: &PlayerId) -> bool {
        let Some(client) = self.clients.remove(player_id) else {
            return false;
        };
        let joined = client.is_joined();
        if joined {
            self.arena.leave(player_id);
            info!("Player {} left the arena", player_id);
        }
        joined
    }

    // =========================================================================
    // SIMULATION
    // =========================================================================

    /// Countdown -> Active.
    pub fn begin_playing(&mut self) -> bool {
        let started = self.arena.activate();
        if started {
            info!("Round started with {} players", self.player_count());
        }
        started
    }

    /// Store an intent for the next tick.
    pub fn submit_intent(&mut self, player_id: &PlayerId, intent: Intent) -> Result<(), IntentError> {
        match self.clients.get(player_id) {
            Some(client) if client.is_joined() => {}
            _ => return Err(IntentError::UnknownPlayer),
        }
        self.arena.submit(player_id, intent)
    }

    /// Run a single game tick. `None` before the round starts.
    pub fn run_tick(&mut self) -> Option<TickResult> {
        match self.arena.phase {
            RoundPhase::Idle | RoundPhase::Countdown => None,
            RoundPhase::Active | RoundPhase::Ended => Some(tick(&mut self.arena)),
        }
    }

    /// Snapshot for broadcast, without eliminated players.
    pub fn generate_state_update(&self) -> ArenaSnapshot {
        self.arena.snapshot().without_eliminated()
    }

    /// Name of the round winner, once decided.
    pub fn winner_name(&self) -> Option<String> {
        let winner = self.arena.winner?;
        self.arena.get_player(&winner).map(|p| p.name.clone())
    }

    // =========================================================================
    // MESSAGING
    // =========================================================================

    /// Send a message to every attached connection.
    pub fn broadcast(&self, message: ServerMessage) {
        for client in self.clients.values() {
            client.deliver(message.clone());
        }
    }

    /// Route a simulation event to its audience.
    pub fn dispatch_event(&self, event: GameEvent) {
        let audience = event.audience();
        let message = ServerMessage::Event { event };
        for client in self.clients.values().filter(|c| audience.includes(&c.player_id)) {
            client.deliver(message.clone());
        }
    }

    /// Publish one tick's outcome.
    ///
    /// Events go to their audiences and the snapshot to everyone. When the
    /// round is over the winner is announced once, as `win`.
    pub fn publish_tick(&self, result: TickResult, snapshot: ArenaSnapshot) {
        let mut winner = None;
        for event in result.events {
            if let GameEventData::Win { name, .. } = &event.data {
                winner = Some(name.clone());
                continue;
            }
            self.dispatch_event(event);
        }
        self.broadcast(ServerMessage::State { snapshot });

        if result.round_ended {
            let player_name = winner.or_else(|| self.winner_name()).unwrap_or_default();
            info!("Round ended, winner: {}", player_name);
            self.broadcast(ServerMessage::Win { player_name });
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Current round phase.
    pub fn phase(&self) -> RoundPhase {
        self.arena.phase
    }

    /// Current tick.
    pub fn current_tick(&self) -> u32 {
        self.arena.tick
    }

    /// Players with an entity in the arena.
    pub fn player_count(&self) -> usize {
        self.clients.values().filter(|c| c.is_joined()).count()
    }

    /// Attached connections, joined or not.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Read-only view of the simulation.
    pub fn arena(&self) -> &ArenaState {
        &self.arena
    }
}

/// Session errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No connection with that id.
    #[error("Unknown client")]
    UnknownClient,

    /// Password mismatch.
    #[error("Wrong password")]
    WrongPassword,

    /// Password not checked yet.
    #[error("Password required")]
    NotAuthorized,

    /// Name empty after trimming.
    #[error("Invalid name")]
    InvalidName,

    /// Name already set.
    #[error("Already joined")]
    AlreadyJoined,

    /// Ready before joining.
    #[error("Not joined")]
    NotJoined,

    /// Arena refused the join.
    #[error("Join rejected: {0}")]
    Join(#[from] JoinError),
}
