//! End-to-end tests: the real client connection against the relay

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use chatstack_client::connection::{Connection, ConnectionEvent, ConnectionState, ReconnectPolicy};
use chatstack_protocol::{
    ChatSender, ClientMessage, ConfigData, Frame, Repository, ServerMessage,
};
use chatstack_server::services::Services;
use chatstack_server::{serve, ServerState};

struct Relay {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Relay {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let state = ServerState::new(Services::in_memory());
        tokio::spawn(async move {
            serve(listener, state, async {
                let _ = rx.await;
            })
            .await
            .unwrap();
        });
        Self {
            addr,
            shutdown: Some(tx),
        }
    }

    fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn next_event(conn: &mut Connection) -> ConnectionEvent {
    tokio::time::timeout(Duration::from_secs(5), conn.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

async fn open(relay: &Relay) -> Connection {
    let mut conn = Connection::from_base(
        &relay.base_url(),
        ReconnectPolicy::new(3, Duration::from_millis(20)),
    )
    .unwrap();
    conn.connect().await;
    loop {
        if next_event(&mut conn).await == ConnectionEvent::StateChanged(ConnectionState::Open) {
            return conn;
        }
    }
}

/// Collect frames until one matches `done`
async fn collect_until<F>(conn: &mut Connection, done: F) -> Vec<Frame<ServerMessage>>
where
    F: Fn(&ServerMessage) -> bool,
{
    let mut frames = Vec::new();
    loop {
        if let ConnectionEvent::Message(frame) = next_event(conn).await {
            let finished = done(&frame.message);
            frames.push(frame);
            if finished {
                return frames;
            }
        }
    }
}

fn repo(name: &str) -> Repository {
    Repository::new("github.com", "octo", name, "main", Some("ghp_x".into()))
}

#[tokio::test]
async fn test_health_endpoint() {
    let relay = Relay::start().await;
    let mut stream = TcpStream::connect(relay.addr).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains(r#"{"status":"ok"}"#));
}

#[tokio::test]
async fn test_config_flow_is_correlated() {
    let relay = Relay::start().await;
    let mut conn = open(&relay).await;

    let request = Frame::request(
        ClientMessage::SubmitConfig(ConfigData {
            gemini_token: "gem".into(),
            repositories: vec![repo("app")],
        }),
        4,
    );
    assert!(conn.sender().send(&request));

    let frames = collect_until(&mut conn, |m| *m == ServerMessage::ConfigSuccess).await;
    assert!(frames
        .iter()
        .all(|f| f.request_id == request.request_id && f.epoch == Some(4)));

    let tree = frames
        .iter()
        .find_map(|f| match &f.message {
            ServerMessage::FileTreeData { tree, repository } => Some((tree, repository)),
            _ => None,
        })
        .expect("config should send the first repository's tree");
    assert!(!tree.0.is_empty());
    let repository = tree.1.as_ref().unwrap();
    assert_eq!(repository.name, "octo/app");
    assert!(repository.token.is_none());

    conn.close().await;
}

#[tokio::test]
async fn test_chat_round_trip() {
    let relay = Relay::start().await;
    let mut conn = open(&relay).await;
    let sender = conn.sender();

    sender.send(&Frame::request(
        ClientMessage::SubmitConfig(ConfigData {
            gemini_token: "gem".into(),
            repositories: vec![],
        }),
        0,
    ));
    collect_until(&mut conn, |m| *m == ServerMessage::ConfigSuccess).await;

    sender.send(&Frame::request(
        ClientMessage::SendChatMessage {
            text: "hello".into(),
        },
        0,
    ));
    let frames = collect_until(&mut conn, |m| matches!(m, ServerMessage::NewChatMessage(_))).await;

    assert_eq!(
        frames[0].message,
        ServerMessage::AgentTyping { is_typing: true }
    );
    match &frames.last().unwrap().message {
        ServerMessage::NewChatMessage(message) => {
            assert_eq!(message.sender, ChatSender::Agent);
            assert!(message.text.starts_with("Hello!"));
        }
        other => panic!("unexpected {other:?}"),
    }

    conn.close().await;
}

#[tokio::test]
async fn test_repositories_are_per_connection() {
    let relay = Relay::start().await;
    let mut first = open(&relay).await;
    let mut second = open(&relay).await;

    first.sender().send(&Frame::request(
        ClientMessage::AddRepository {
            repository: repo("app"),
        },
        0,
    ));
    let frames = collect_until(&mut first, |m| {
        matches!(m, ServerMessage::RepositoriesList { .. })
    })
    .await;
    let id = frames
        .iter()
        .find_map(|f| match &f.message {
            ServerMessage::RepositoryActionSuccess { repository, .. } => {
                repository.as_ref().and_then(|r| r.id.clone())
            }
            _ => None,
        })
        .unwrap();

    second.sender().send(&Frame::request(
        ClientMessage::SelectRepository { repository_id: id },
        0,
    ));
    let frames = collect_until(&mut second, |m| {
        matches!(m, ServerMessage::RepositoryActionError { .. })
    })
    .await;
    assert_eq!(
        frames.last().unwrap().message,
        ServerMessage::RepositoryActionError {
            message: "Repository not found".into()
        }
    );

    first.close().await;
    second.close().await;
}
