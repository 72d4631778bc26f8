#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use sqlx::sqlite::SqlitePoolOptions;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use xcaro::auth::{DEFAULT_TOKEN_TTL, TokenVerifier};
use xcaro::config::Config;
use xcaro::messages::{ClientMessage, EventBody, ServerEvent};

pub type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub const SECRET: &str = "test-secret";

pub struct TestServer {
    addr: String,
}

impl TestServer {
    pub fn ws_url(&self, token: &str) -> String {
        format!("ws://{}/ws?token={}", self.addr, token)
    }

    pub fn ws_url_without_token(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

pub fn test_config() -> Config {
    Config {
        jwt_secret: SECRET.to_string(),
        ..Config::default()
    }
}

pub async fn spawn_test_server() -> TestServer {
    spawn_test_server_with_config(test_config()).await
}

pub async fn spawn_test_server_with_config(config: Config) -> TestServer {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!().run(&pool).await.unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let app = xcaro::app_with_config(pool, &config);
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        addr: addr.to_string(),
    }
}

pub fn token_for(user_id: &str) -> String {
    TokenVerifier::new(SECRET)
        .issue(user_id, DEFAULT_TOKEN_TTL)
        .unwrap()
}

pub async fn connect_as(server: &TestServer, user_id: &str) -> WsStream {
    let (ws, _) = connect_async(server.ws_url(&token_for(user_id)))
        .await
        .expect("Failed to connect");
    ws
}

pub async fn send(ws: &mut WsStream, msg: &ClientMessage) {
    let json = serde_json::to_string(msg).unwrap();
    ws.send(Message::Text(json.into())).await.unwrap();
}

/// Next application event, skipping transport heartbeats.
pub async fn recv(ws: &mut WsStream) -> ServerEvent {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("Timed out waiting for an event")
            .unwrap()
            .unwrap();
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Unexpected frame: {other:?}"),
        }
    }
}

pub async fn recv_kind(ws: &mut WsStream, kind: &str) -> ServerEvent {
    let event = recv(ws).await;
    assert_eq!(event.kind(), kind, "unexpected event: {event:?}");
    event
}

/// Asserts nothing arrives within a short window.
pub async fn expect_silence(ws: &mut WsStream) {
    let next = tokio::time::timeout(Duration::from_millis(200), ws.next()).await;
    assert!(next.is_err(), "expected no event, got {next:?}");
}

pub fn create_game(creator_id: &str) -> ClientMessage {
    ClientMessage::CreateGame {
        creator_id: creator_id.to_string(),
    }
}

pub fn join_game(game_id: &str, joiner_id: &str) -> ClientMessage {
    ClientMessage::JoinGame {
        game_id: game_id.to_string(),
        joiner_id: joiner_id.to_string(),
    }
}

pub fn make_move(game_id: &str, player_id: &str, row: i32, col: i32) -> ClientMessage {
    ClientMessage::MakeMove {
        game_id: game_id.to_string(),
        player_id: player_id.to_string(),
        row,
        col,
    }
}

pub fn join_room(room_id: &str) -> ClientMessage {
    ClientMessage::JoinRoom {
        room_id: room_id.to_string(),
    }
}

pub fn error_code(event: &ServerEvent) -> &str {
    match &event.body {
        EventBody::Error { code, .. } => code,
        other => panic!("expected error event, got {other:?}"),
    }
}

/// Creates a game as `creator` and returns its id, consuming the creator's
/// `room_update` and `game_state` events.
pub async fn create_and_get_id(ws: &mut WsStream, creator: &str) -> String {
    send(ws, &create_game(creator)).await;
    recv_kind(ws, "room_update").await;
    let event = recv_kind(ws, "game_state").await;
    event.room_id.expect("game_state carries the game room")
}

/// Creator and joiner both connected and the game Active, all setup events consumed.
pub async fn start_game(server: &TestServer, x: &str, o: &str) -> (WsStream, WsStream, String) {
    let mut ws_x = connect_as(server, x).await;
    let mut ws_o = connect_as(server, o).await;
    let game_id = create_and_get_id(&mut ws_x, x).await;

    send(&mut ws_o, &join_game(&game_id, o)).await;
    recv_kind(&mut ws_o, "room_update").await;
    recv_kind(&mut ws_o, "game_start").await;
    recv_kind(&mut ws_o, "game_state").await;

    recv_kind(&mut ws_x, "player_join").await;
    recv_kind(&mut ws_x, "game_start").await;
    recv_kind(&mut ws_x, "game_state").await;

    (ws_x, ws_o, game_id)
}
