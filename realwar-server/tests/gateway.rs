//! End-to-end tests for the WebSocket gateway.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use realwar::game::state::{PlayerId, RoundPhase};
use realwar::network::{ClientMessage, ErrorCode, GameServer, ServerConfig, ServerMessage};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn start_server() -> (Arc<GameServer>, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut config = ServerConfig {
        seed: Some(7),
        ..Default::default()
    };
    config.arena.countdown_secs = 0;

    let server = Arc::new(GameServer::new(config));
    let serving = server.clone();
    tokio::spawn(async move {
        let _ = serving.serve(listener).await;
    });
    (server, addr)
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
    ws
}

async fn send(ws: &mut Client, msg: ClientMessage) {
    ws.send(Message::Text(msg.to_json().unwrap())).await.unwrap();
}

async fn recv(ws: &mut Client) -> ServerMessage {
    loop {
        match timeout(WAIT, ws.next()).await.expect("timed out waiting for message") {
            Some(Ok(Message::Text(text))) => return ServerMessage::from_json(&text).unwrap(),
            Some(Ok(_)) => continue,
            other => panic!("connection ended: {:?}", other),
        }
    }
}

/// Read until `pick` accepts a message.
async fn wait_for<T>(ws: &mut Client, mut pick: impl FnMut(&ServerMessage) -> Option<T>) -> T {
    for _ in 0..500 {
        let msg = recv(ws).await;
        if let Some(found) = pick(&msg) {
            return found;
        }
    }
    panic!("expected message never arrived");
}

/// Password, name, welcome. Returns the assigned id.
async fn join(ws: &mut Client, name: &str) -> PlayerId {
    assert!(matches!(recv(ws).await, ServerMessage::AskPassword));
    send(ws, ClientMessage::CheckPassword { password: "MMS".to_string() }).await;
    assert!(matches!(recv(ws).await, ServerMessage::AskName));
    send(ws, ClientMessage::SetName { name: name.to_string() }).await;

    wait_for(ws, |msg| match msg {
        ServerMessage::Welcome { player_id, .. } => Some(*player_id),
        _ => None,
    })
    .await
}

#[tokio::test]
async fn test_lobby_handshake() {
    let (server, addr) = start_server().await;
    let mut ws = connect(addr).await;

    join(&mut ws, "ana").await;

    let roster = wait_for(&mut ws, |msg| match msg {
        ServerMessage::LobbyUpdate { players } => Some(players.clone()),
        _ => None,
    })
    .await;
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].name, "ana");
    assert!(!roster[0].ready);

    assert_eq!(server.connection_count().await, 1);
    server.shutdown();
}

#[tokio::test]
async fn test_wrong_password_closes_connection() {
    let (server, addr) = start_server().await;
    let mut ws = connect(addr).await;

    assert!(matches!(recv(&mut ws).await, ServerMessage::AskPassword));
    send(&mut ws, ClientMessage::CheckPassword { password: "guess".to_string() }).await;

    loop {
        match timeout(WAIT, ws.next()).await.expect("connection stayed open") {
            Some(Ok(Message::Text(text))) => {
                let msg = ServerMessage::from_json(&text).unwrap();
                assert!(!matches!(msg, ServerMessage::AskName));
            }
            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
            Some(Ok(_)) => continue,
        }
    }
    server.shutdown();
}

#[tokio::test]
async fn test_binary_frame_rejected_connection_kept() {
    let (server, addr) = start_server().await;
    let mut ws = connect(addr).await;

    assert!(matches!(recv(&mut ws).await, ServerMessage::AskPassword));
    ws.send(Message::Binary(vec![0, 0, 0, 0, 7])).await.unwrap();

    let code = wait_for(&mut ws, |msg| match msg {
        ServerMessage::Error(err) => Some(err.code),
        _ => None,
    })
    .await;
    assert_eq!(code, ErrorCode::InvalidMessage);

    send(&mut ws, ClientMessage::CheckPassword { password: "MMS".to_string() }).await;
    assert!(matches!(recv(&mut ws).await, ServerMessage::AskName));
    server.shutdown();
}

#[tokio::test]
async fn test_ready_check_starts_round() {
    let (server, addr) = start_server().await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;

    join(&mut a, "ana").await;
    join(&mut b, "bo").await;
    send(&mut a, ClientMessage::SetReady).await;
    send(&mut b, ClientMessage::SetReady).await;

    let seconds = wait_for(&mut a, |msg| match msg {
        ServerMessage::StartCountdown { seconds } => Some(*seconds),
        _ => None,
    })
    .await;
    assert_eq!(seconds, 0);

    wait_for(&mut a, |msg| matches!(msg, ServerMessage::RoundStarted).then_some(())).await;

    let snapshot = wait_for(&mut a, |msg| match msg {
        ServerMessage::State { snapshot } => Some(snapshot.clone()),
        _ => None,
    })
    .await;
    assert_eq!(snapshot.players.len(), 2);
    assert_eq!(snapshot.phase, RoundPhase::Active);
    assert!(!snapshot.walls.is_empty());

    server.shutdown();
}

#[tokio::test]
async fn test_disconnect_broadcasts_removal() {
    let (server, addr) = start_server().await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;

    join(&mut a, "ana").await;
    let b_id = join(&mut b, "bo").await;

    b.close(None).await.unwrap();

    let removed = wait_for(&mut a, |msg| match msg {
        ServerMessage::RemovePlayer { player_id } => Some(*player_id),
        _ => None,
    })
    .await;
    assert_eq!(removed, b_id);

    let roster = wait_for(&mut a, |msg| match msg {
        ServerMessage::LobbyUpdate { players } if players.len() == 1 => Some(players.clone()),
        _ => None,
    })
    .await;
    assert_eq!(roster[0].name, "ana");

    server.shutdown();
}
