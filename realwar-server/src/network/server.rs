//! WebSocket Game Server
//!
//! Async WebSocket gateway for the arena.
//! Handles the lobby handshake, intent routing, and the round loop.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock, broadcast};
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn, error, debug, instrument};

use crate::game::config::{ArenaConfig, ConfigError};
use crate::game::state::{JoinError, PlayerId, RoundPhase};
use crate::network::protocol::{ClientMessage, ErrorCode, ServerMessage};
use crate::network::session::{ArenaSession, SessionConfig, SessionError};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 3000;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Lobby password.
    pub password: String,
    /// Arena seed. Drawn from the clock when unset.
    pub seed: Option<u64>,
    /// Arena rules.
    pub arena: ArenaConfig,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 64,
            password: SessionConfig::default().password,
            seed: None,
            arena: ArenaConfig::default(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `REALWAR_BIND`, `REALWAR_PASSWORD`,
    /// `REALWAR_SEED` and `REALWAR_CONFIG`.
    pub fn from_env() -> Result<Self, GameServerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, GameServerError> {
        let mut config = Self::default();

        if let Some(bind) = lookup("REALWAR_BIND") {
            config.bind_addr = bind
                .parse()
                .map_err(|_| GameServerError::InvalidEnv("REALWAR_BIND", bind))?;
        }
        if let Some(password) = lookup("REALWAR_PASSWORD") {
            config.password = password;
        }
        if let Some(seed) = lookup("REALWAR_SEED") {
            let parsed = seed
                .parse()
                .map_err(|_| GameServerError::InvalidEnv("REALWAR_SEED", seed))?;
            config.seed = Some(parsed);
        }
        if let Some(path) = lookup("REALWAR_CONFIG") {
            config.arena = ArenaConfig::load(PathBuf::from(path))?;
        }

        config.arena.validate()?;
        Ok(config)
    }

    /// Lobby settings derived from this config.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            password: self.password.clone(),
            countdown: Duration::from_secs(u64::from(self.arena.countdown_secs)),
            ..SessionConfig::default()
        }
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Arena config rejected.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Environment variable could not be parsed.
    #[error("Invalid value for {0}: {1:?}")]
    InvalidEnv(&'static str, String),

    /// Session error.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Map a lobby failure to its wire code.
fn error_code(err: &SessionError) -> ErrorCode {
    match err {
        SessionError::NotAuthorized | SessionError::NotJoined => ErrorCode::NotAuthorized,
        SessionError::InvalidName => ErrorCode::InvalidName,
        SessionError::AlreadyJoined | SessionError::Join(JoinError::AlreadyJoined) => ErrorCode::AlreadyJoined,
        SessionError::Join(JoinError::RoundEnded) => ErrorCode::RoundEnded,
        SessionError::UnknownClient | SessionError::WrongPassword => ErrorCode::InternalError,
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// The arena session.
    session: Arc<RwLock<ArenaSession>>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        let seed = config.seed.unwrap_or_else(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos() as u64
        });
        let session = ArenaSession::new(config.arena.clone(), seed, config.session_config());

        Self {
            config,
            session: Arc::new(RwLock::new(session)),
            shutdown_tx,
        }
    }

    /// Bind the configured address and run the server.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Game server listening on {}", self.config.bind_addr);
        self.serve(listener).await
    }

    /// Accept connections on `listener` until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.session.read().await.client_count();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let session = self.session.clone();
        let shutdown_tx = self.shutdown_tx.clone();
        let tick_rate = self.config.arena.tick_rate;

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(64);
            let mut shutdown_rx = shutdown_tx.subscribe();

            // Register client
            let player_id = session.write().await.connect(msg_tx.clone());
            debug!("Client {} registered as {}", addr, player_id);

            // Spawn message sender task; closes the socket once every sender is gone
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        return;
                    }
                }
                let _ = ws_sender.close().await;
            });

            let _ = msg_tx.send(ServerMessage::AskPassword).await;

            // Handle incoming messages
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        let client_msg = match msg {
                            Some(Ok(Message::Text(text))) => ClientMessage::from_json(&text).ok(),
                            Some(Ok(Message::Binary(_))) => None,
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            Some(Ok(_)) => continue,
                        };

                        let Some(client_msg) = client_msg else {
                            debug!("Invalid message from {}", addr);
                            let _ = msg_tx.send(ServerMessage::error(
                                ErrorCode::InvalidMessage,
                                "Invalid message format",
                            )).await;
                            continue;
                        };

                        let keep_open = Self::handle_client_message(
                            player_id,
                            client_msg,
                            &session,
                            &shutdown_tx,
                            tick_rate,
                            &msg_tx,
                        ).await;
                        if !keep_open {
                            break;
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            // Cleanup
            let (joined, phase, roster) = {
                let mut s = session.write().await;
                let joined = s.disconnect(&player_id);
                (joined, s.phase(), s.lobby_roster())
            };
            if joined {
                let s = session.read().await;
                s.broadcast(ServerMessage::RemovePlayer { player_id });
                if matches!(phase, RoundPhase::Idle | RoundPhase::Countdown) {
                    s.broadcast(ServerMessage::LobbyUpdate { players: roster });
                }
            }

            // Let queued messages drain before the socket closes
            drop(msg_tx);
            if tokio::time::timeout(Duration::from_secs(1), sender_task).await.is_err() {
                debug!("Sender for {} did not drain in time", addr);
            }

            info!("Client {} cleaned up", addr);
        });
    }

    /// Handle a client message. Returns false when the connection must close.
    async fn handle_client_message(
        player_id: PlayerId,
        msg: ClientMessage,
        session: &Arc<RwLock<ArenaSession>>,
        shutdown_tx: &broadcast::Sender<()>,
        tick_rate: u32,
        sender: &mpsc::Sender<ServerMessage>,
    ) -> bool {
        match msg {
            ClientMessage::CheckPassword { password } => {
                let result = session.write().await.check_password(&player_id, &password);
                match result {
                    Ok(()) => {
                        let _ = sender.send(ServerMessage::AskName).await;
                    }
                    Err(e) => {
                        warn!("Client {} rejected: {}", player_id, e);
                        return false;
                    }
                }
            }
            ClientMessage::SetName { name } => {
                let result = {
                    let mut s = session.write().await;
                    s.set_name(&player_id, &name).map(|color| (color, s.lobby_roster()))
                };
                match result {
                    Ok((color, roster)) => {
                        let _ = sender.send(ServerMessage::Welcome { player_id, color }).await;
                        session.read().await.broadcast(ServerMessage::LobbyUpdate { players: roster });
                    }
                    Err(e) => {
                        let _ = sender.send(ServerMessage::error(error_code(&e), e.to_string())).await;
                    }
                }
            }
            ClientMessage::SetReady => {
                let result = {
                    let mut s = session.write().await;
                    s.set_ready(&player_id).map(|started| (started, s.lobby_roster()))
                };
                match result {
                    Ok((started, roster)) => {
                        session.read().await.broadcast(ServerMessage::LobbyUpdate { players: roster });
                        if started {
                            let session = session.clone();
                            let shutdown_rx = shutdown_tx.subscribe();
                            tokio::spawn(async move {
                                Self::run_round(session, tick_rate, shutdown_rx).await;
                            });
                        }
                    }
                    Err(e) => {
                        let _ = sender.send(ServerMessage::error(error_code(&e), e.to_string())).await;
                    }
                }
            }
            ClientMessage::Ping { timestamp } => {
                let _ = sender.send(ServerMessage::Pong {
                    timestamp,
                    server_time: now_millis(),
                }).await;
            }
            other => {
                if let Some(intent) = other.to_intent() {
                    let result = session.write().await.submit_intent(&player_id, intent);
                    if let Err(e) = result {
                        debug!("Dropped intent from {}: {}", player_id, e);
                    }
                }
            }
        }
        true
    }

    /// Run the round: countdown, tick loop, win broadcast.
    async fn run_round(
        session: Arc<RwLock<ArenaSession>>,
        tick_rate: u32,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        // Phase 1: Countdown
        let countdown = {
            let s = session.read().await;
            let countdown = s.config.countdown;
            s.broadcast(ServerMessage::StartCountdown { seconds: countdown.as_secs() as u32 });
            countdown
        };
        tokio::select! {
            _ = tokio::time::sleep(countdown) => {}
            _ = shutdown_rx.recv() => return,
        }

        {
            let mut s = session.write().await;
            if !s.begin_playing() {
                warn!("Round could not start from {:?}", s.phase());
                return;
            }
            s.broadcast(ServerMessage::RoundStarted);
        }

        // Phase 2: Tick loop
        let tick_duration = Duration::from_micros(1_000_000 / u64::from(tick_rate.max(1)));
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {}
                _ = shutdown_rx.recv() => break,
            }

            // Sends never wait, so the guard is held for the whole tick
            let round_ended = {
                let mut s = session.write().await;
                let Some(result) = s.run_tick() else {
                    break;
                };
                let round_ended = result.round_ended;
                let snapshot = s.generate_state_update();
                s.publish_tick(result, snapshot);
                round_ended
            };

            // Phase 3: Round end
            if round_ended {
                break;
            }
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.session.read().await.client_count()
    }

    /// Shared handle to the arena session.
    pub fn session(&self) -> Arc<RwLock<ArenaSession>> {
        self.session.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(config.password, "MMS");
        assert_eq!(config.seed, None);
        assert_eq!(config.session_config().countdown, Duration::from_secs(15));
    }

    #[test]
    fn test_config_from_lookup() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("REALWAR_BIND", "127.0.0.1:4000"),
            ("REALWAR_PASSWORD", "secret"),
            ("REALWAR_SEED", "77"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:4000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.password, "secret");
        assert_eq!(config.seed, Some(77));
    }

    #[test]
    fn test_config_rejects_bad_env() {
        let result = ServerConfig::from_lookup(lookup_from(&[("REALWAR_SEED", "soon")]));
        assert!(matches!(result, Err(GameServerError::InvalidEnv("REALWAR_SEED", _))));

        let result = ServerConfig::from_lookup(lookup_from(&[("REALWAR_CONFIG", "/nonexistent/arena.json")]));
        assert!(matches!(result, Err(GameServerError::Config(ConfigError::Io(_)))));
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(error_code(&SessionError::InvalidName), ErrorCode::InvalidName);
        assert_eq!(error_code(&SessionError::Join(JoinError::RoundEnded)), ErrorCode::RoundEnded);
        assert_eq!(error_code(&SessionError::NotJoined), ErrorCode::NotAuthorized);
    }

    #[tokio::test]
    async fn test_server_creation() {
        let config = ServerConfig {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            seed: Some(5),
            ..Default::default()
        };
        let server = GameServer::new(config);

        assert_eq!(server.connection_count().await, 0);
        assert_eq!(server.session().read().await.phase(), RoundPhase::Idle);
    }

    #[tokio::test]
    async fn test_server_shutdown() {
        let server = GameServer::new(ServerConfig::default());
        server.shutdown();
        // Should not panic
    }
}
