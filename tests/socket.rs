use std::{net::SocketAddr, sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use gittogether::{
    auth::{JwtVerifier, TokenVerifier},
    db,
    notify::ServerEvent,
    swipes::{swipe, Direction},
    users::{self, NewUser, PublicProfile},
    AppState,
};
use serde_json::json;
use tokio::{net::{TcpListener, TcpStream}, time::timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Server {
    addr: SocketAddr,
    state: AppState,
}

async fn spawn_server() -> Server {
    let db_pool = db::connect("sqlite::memory:", 1).await.unwrap();
    let state = AppState::new(db_pool, Arc::new(JwtVerifier::new(b"socket-secret")));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = gittogether::app(state.clone());
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    Server { addr, state }
}

impl Server {
    async fn user(&self, name: &str) -> PublicProfile {
        users::create_user(&self.state.db_pool, NewUser::new(format!("{name}@uni.edu"), name))
            .await
            .unwrap()
    }

    async fn connect(&self, user: &PublicProfile) -> Socket {
        let token = self.state.verifier.issue(user.id, "x@uni.edu").unwrap();
        let (mut socket, _) = connect_async(format!("ws://{}/ws?token={token}", self.addr)).await.unwrap();
        send(&mut socket, json!({ "event": "join_room", "data": user.id })).await;
        assert_eq!(next_event(&mut socket).await, ServerEvent::RoomJoined(user.id));
        socket
    }

    async fn match_pair(&self, a: &PublicProfile, b: &PublicProfile) {
        swipe(&self.state.db_pool, &self.state.rooms, a.id, b.id, Direction::Right).await.unwrap();
        swipe(&self.state.db_pool, &self.state.rooms, b.id, a.id, Direction::Right).await.unwrap();
    }
}

async fn send(socket: &mut Socket, value: serde_json::Value) {
    socket.send(Message::Text(value.to_string().into())).await.unwrap();
}

async fn next_event(socket: &mut Socket) -> ServerEvent {
    loop {
        let frame = timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for an event")
            .unwrap()
            .unwrap();
        if frame.is_text() {
            return serde_json::from_str(frame.to_text().unwrap()).unwrap();
        }
    }
}

async fn assert_quiet(socket: &mut Socket) {
    assert!(timeout(Duration::from_millis(200), socket.next()).await.is_err());
}

#[tokio::test]
async fn second_swiper_triggers_match_push_to_first() {
    let server = spawn_server().await;
    let a = server.user("a").await;
    let b = server.user("b").await;
    let mut a_socket = server.connect(&a).await;

    swipe(&server.state.db_pool, &server.state.rooms, a.id, b.id, Direction::Right).await.unwrap();
    assert_quiet(&mut a_socket).await;

    let outcome = swipe(&server.state.db_pool, &server.state.rooms, b.id, a.id, Direction::Right).await.unwrap();
    assert!(outcome.matched);
    assert_eq!(next_event(&mut a_socket).await, ServerEvent::MatchFound(b.clone()));
}

#[tokio::test]
async fn message_reaches_every_connection_exactly_once() {
    let server = spawn_server().await;
    let a = server.user("a").await;
    let b = server.user("b").await;
    server.match_pair(&a, &b).await;

    let mut a_laptop = server.connect(&a).await;
    let mut a_phone = server.connect(&a).await;
    let mut b_socket = server.connect(&b).await;

    send(&mut a_laptop, json!({
        "event": "send_message",
        "data": { "senderId": a.id, "receiverId": b.id, "content": "wanna team up?" },
    }))
    .await;

    let mut received = Vec::new();
    for socket in [&mut a_laptop, &mut a_phone, &mut b_socket] {
        match next_event(socket).await {
            ServerEvent::ReceiveMessage(message) => received.push(message),
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert!(received.iter().all(|m| m == &received[0]));
    assert_eq!(received[0].content, "wanna team up?");

    for socket in [&mut a_laptop, &mut a_phone, &mut b_socket] {
        assert_quiet(socket).await;
    }
}

#[tokio::test]
async fn rejected_send_reports_back_to_sender_only() {
    let server = spawn_server().await;
    let a = server.user("a").await;
    let b = server.user("b").await;
    let mut a_socket = server.connect(&a).await;
    let mut b_socket = server.connect(&b).await;

    send(&mut a_socket, json!({
        "event": "send_message",
        "data": { "senderId": a.id, "receiverId": b.id, "content": "hi", "clientId": "local-1" },
    }))
    .await;

    match next_event(&mut a_socket).await {
        ServerEvent::SendFailed(failure) => {
            assert_eq!(failure.error, "not_matched");
            assert_eq!(failure.client_id.as_deref(), Some("local-1"));
            assert_eq!(failure.content, "hi");
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_quiet(&mut b_socket).await;
}

#[tokio::test]
async fn cannot_join_or_send_as_someone_else() {
    let server = spawn_server().await;
    let a = server.user("a").await;
    let b = server.user("b").await;
    server.match_pair(&a, &b).await;
    let mut a_socket = server.connect(&a).await;

    send(&mut a_socket, json!({ "event": "join_room", "data": b.id })).await;
    assert!(matches!(next_event(&mut a_socket).await, ServerEvent::Error(_)));

    send(&mut a_socket, json!({
        "event": "send_message",
        "data": { "senderId": b.id, "receiverId": a.id, "content": "spoofed" },
    }))
    .await;
    match next_event(&mut a_socket).await {
        ServerEvent::SendFailed(failure) => assert_eq!(failure.error, "unauthenticated"),
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn malformed_frames_keep_the_socket_open() {
    let server = spawn_server().await;
    let a = server.user("a").await;
    let mut socket = server.connect(&a).await;

    socket.send(Message::Text("{not json".to_owned().into())).await.unwrap();
    assert!(matches!(next_event(&mut socket).await, ServerEvent::Error(_)));

    send(&mut socket, json!({ "event": "join_room", "data": a.id })).await;
    assert_eq!(next_event(&mut socket).await, ServerEvent::RoomJoined(a.id));
}

#[tokio::test]
async fn closing_the_socket_leaves_the_room() {
    let server = spawn_server().await;
    let a = server.user("a").await;
    let mut socket = server.connect(&a).await;
    assert_eq!(server.state.rooms.connections(a.id), 1);

    socket.close(None).await.unwrap();
    drop(socket);

    timeout(Duration::from_secs(5), async {
        while server.state.rooms.connections(a.id) != 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("connection never left the room");
}

#[tokio::test]
async fn upgrade_requires_a_valid_token() {
    let server = spawn_server().await;
    assert!(connect_async(format!("ws://{}/ws", server.addr)).await.is_err());
    assert!(connect_async(format!("ws://{}/ws?token=bogus", server.addr)).await.is_err());

    let ghost = server.state.verifier.issue(Uuid::now_v7(), "ghost@uni.edu").unwrap();
    assert!(connect_async(format!("ws://{}/ws?token={ghost}", server.addr)).await.is_err());
}
