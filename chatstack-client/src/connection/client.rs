//! WebSocket connection to the chatstack relay

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

use chatstack_protocol::{decode_frame, Frame, ServerMessage, WS_PATH};
use chatstack_utils::{ChatstackError, Result};

use super::handler::MessageSender;
use super::reconnect::ReconnectPolicy;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Capacity of the outgoing frame queue
const OUTGOING_CAPACITY: usize = 100;

/// Capacity of the event queue towards the application
const EVENT_CAPACITY: usize = 256;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninstantiated,
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Event delivered by the connection to the application
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    StateChanged(ConnectionState),
    Message(Frame<ServerMessage>),
    Reconnecting { attempt: u32, max_attempts: u32 },
    Exhausted,
}

/// Derive the relay endpoint from a server base URL
///
/// `http` becomes `ws` and `https` becomes `wss`; host and port are kept and
/// the path is replaced with `/ws`.
pub fn derive_ws_url(base: &str) -> Result<Url> {
    let invalid = |reason: String| ChatstackError::InvalidUrl {
        url: base.to_string(),
        reason,
    };

    let mut url = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(invalid(format!("unsupported scheme '{}'", other))),
    };
    url.set_scheme(scheme)
        .map_err(|_| invalid(format!("cannot switch to {}", scheme)))?;
    url.set_path(WS_PATH);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Client connection to the relay
///
/// One supervisor task owns the socket and performs every connection
/// attempt, so attempts never overlap. The supervisor reconnects on its own
/// after an unexpected close until the [`ReconnectPolicy`] budget is spent.
pub struct Connection {
    url: Url,
    policy: ReconnectPolicy,
    state: Arc<watch::Sender<ConnectionState>>,
    state_rx: watch::Receiver<ConnectionState>,
    outgoing_tx: mpsc::Sender<String>,
    /// Held here while no supervisor is running
    outgoing_rx: Option<mpsc::Receiver<String>>,
    events_tx: mpsc::Sender<ConnectionEvent>,
    events_rx: mpsc::Receiver<ConnectionEvent>,
    cancel: CancellationToken,
    /// Set by the running supervisor once its reconnect budget is spent
    exhausted: Arc<AtomicBool>,
    task: Option<JoinHandle<mpsc::Receiver<String>>>,
}

impl Connection {
    /// Create a connection to `url` (not yet connected)
    pub fn new(url: Url, policy: ReconnectPolicy) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Uninstantiated);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(OUTGOING_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);

        Self {
            url,
            policy,
            state: Arc::new(state_tx),
            state_rx,
            outgoing_tx,
            outgoing_rx: Some(outgoing_rx),
            events_tx,
            events_rx,
            cancel: CancellationToken::new(),
            exhausted: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }

    /// Create from a server base URL such as `http://localhost:8000`
    pub fn from_base(base: &str, policy: ReconnectPolicy) -> Result<Self> {
        Ok(Self::new(derive_ws_url(base)?, policy))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    /// Get current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Get a message sender that can be cloned
    pub fn sender(&self) -> MessageSender {
        MessageSender::new(self.outgoing_tx.clone(), self.state_rx.clone())
    }

    /// Whether a supervisor is still connecting or connected
    pub fn is_running(&self) -> bool {
        !self.exhausted.load(Ordering::Acquire)
            && self.task.as_ref().map_or(false, |t| !t.is_finished())
    }

    /// Start connecting
    ///
    /// Returns immediately; progress is reported through [`ConnectionEvent`]s.
    /// A no-op while a supervisor is already running. After the reconnect
    /// budget was exhausted or [`Connection::close`] was called this starts a
    /// fresh budget.
    pub async fn connect(&mut self) {
        if self.is_running() {
            return;
        }
        if let Some(task) = self.task.take() {
            self.reclaim(task).await;
        }

        let outgoing = match self.outgoing_rx.take() {
            Some(rx) => rx,
            None => {
                // Previous supervisor died without handing the queue back
                let (tx, rx) = mpsc::channel(OUTGOING_CAPACITY);
                self.outgoing_tx = tx;
                rx
            }
        };

        self.cancel = CancellationToken::new();
        self.exhausted = Arc::new(AtomicBool::new(false));
        let supervisor = Supervisor {
            url: self.url.clone(),
            policy: self.policy,
            state: Arc::clone(&self.state),
            events: self.events_tx.clone(),
            cancel: self.cancel.clone(),
            exhausted: Arc::clone(&self.exhausted),
        };

        tracing::info!(url = %self.url, "Connecting to relay");
        self.task = Some(tokio::spawn(supervisor.run(outgoing)));
    }

    /// Close the connection and stop reconnecting
    pub async fn close(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            self.reclaim(task).await;
        }
        self.state.send_if_modified(|s| {
            let changed = *s != ConnectionState::Closed;
            *s = ConnectionState::Closed;
            changed
        });
    }

    async fn reclaim(&mut self, task: JoinHandle<mpsc::Receiver<String>>) {
        match task.await {
            Ok(rx) => self.outgoing_rx = Some(rx),
            Err(e) => tracing::error!("Connection task failed: {}", e),
        }
    }

    /// Receive the next connection event
    pub async fn recv(&mut self) -> Option<ConnectionEvent> {
        self.events_rx.recv().await
    }

    /// Try to receive without blocking
    pub fn try_recv(&mut self) -> Option<ConnectionEvent> {
        self.events_rx.try_recv().ok()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// How a single open session ended
enum SessionEnd {
    /// Socket dropped or errored; reconnect
    Dropped(ChatstackError),
    /// Local close requested
    Closed,
    /// Nobody listens to events anymore
    Abandoned,
}

/// Background task that owns the socket and the reconnect loop
struct Supervisor {
    url: Url,
    policy: ReconnectPolicy,
    state: Arc<watch::Sender<ConnectionState>>,
    events: mpsc::Sender<ConnectionEvent>,
    cancel: CancellationToken,
    exhausted: Arc<AtomicBool>,
}

impl Supervisor {
    async fn run(self, mut outgoing: mpsc::Receiver<String>) -> mpsc::Receiver<String> {
        let mut failures: u32 = 0;

        loop {
            if !self.set_state(ConnectionState::Connecting).await {
                break;
            }

            let attempt = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = connect_async(self.url.as_str()) => result,
            };

            match attempt {
                Ok((stream, _response)) => {
                    failures = 0;
                    tracing::info!(url = %self.url, "Connection open");
                    if !self.set_state(ConnectionState::Open).await {
                        break;
                    }
                    match self.session(stream, &mut outgoing).await {
                        SessionEnd::Dropped(e) => tracing::info!("Session ended: {}", e),
                        SessionEnd::Closed | SessionEnd::Abandoned => break,
                    }
                }
                Err(e) => {
                    let error = handshake_error(&self.url, e);
                    tracing::warn!(url = %self.url, "Connection attempt failed: {}", error);
                    if !error.is_retryable() {
                        self.set_state(ConnectionState::Closed).await;
                        self.give_up().await;
                        break;
                    }
                }
            }

            if !self.set_state(ConnectionState::Closed).await {
                break;
            }
            // Frames queued for the dead socket are not replayed on the next one
            let discarded = discard_queued(&mut outgoing);
            if discarded > 0 {
                tracing::debug!(discarded, "Dropped frames queued before the drop");
            }

            failures += 1;
            if !self.policy.allows(failures) {
                tracing::error!(
                    attempts = self.policy.max_attempts,
                    "{}",
                    ChatstackError::ReconnectExhausted {
                        attempts: self.policy.max_attempts
                    }
                );
                self.give_up().await;
                break;
            }

            tracing::info!(
                attempt = failures,
                max_attempts = self.policy.max_attempts,
                "Reconnecting in {:?}",
                self.policy.interval
            );
            let reconnecting = ConnectionEvent::Reconnecting {
                attempt: failures,
                max_attempts: self.policy.max_attempts,
            };
            if self.events.send(reconnecting).await.is_err() {
                break;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.policy.interval) => {}
            }
        }

        self.set_state(ConnectionState::Closed).await;
        outgoing
    }

    /// Stop for good; the application has to reconnect by hand
    async fn give_up(&self) {
        self.exhausted.store(true, Ordering::Release);
        let _ = self.events.send(ConnectionEvent::Exhausted).await;
    }

    /// Pump one open socket until it drops or is closed locally
    async fn session(&self, stream: WsStream, outgoing: &mut mpsc::Receiver<String>) -> SessionEnd {
        let (mut sink, mut source) = stream.split();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.set_state(ConnectionState::Closing).await;
                    if let Err(e) = sink.send(Message::Close(None)).await {
                        tracing::debug!("Close frame not delivered: {}", e);
                    }
                    return SessionEnd::Closed;
                }

                Some(text) = outgoing.recv() => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        tracing::warn!("Failed to send frame: {}", e);
                        return SessionEnd::Dropped(ChatstackError::connection(e.to_string()));
                    }
                }

                incoming = source.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if !self.deliver(&text).await {
                            return SessionEnd::Abandoned;
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        tracing::debug!(len = data.len(), "Ignoring binary frame");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::debug!(?frame, "Close frame received");
                        return SessionEnd::Dropped(ChatstackError::ConnectionClosed);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!("Failed to receive frame: {}", e);
                        return SessionEnd::Dropped(ChatstackError::connection(e.to_string()));
                    }
                    None => return SessionEnd::Dropped(ChatstackError::ConnectionClosed),
                }
            }
        }
    }

    /// Decode a text frame and forward it; malformed frames are dropped
    async fn deliver(&self, text: &str) -> bool {
        match decode_frame::<ServerMessage>(text) {
            Ok(frame) => self.events.send(ConnectionEvent::Message(frame)).await.is_ok(),
            Err(e) if e.is_unknown_kind() => {
                tracing::warn!("Ignoring frame: {}", e);
                true
            }
            Err(e) => {
                tracing::warn!(len = text.len(), "Dropping malformed frame: {}", e);
                true
            }
        }
    }

    /// Publish a state transition; false once the application stopped listening
    async fn set_state(&self, next: ConnectionState) -> bool {
        let changed = self.state.send_if_modified(|s| {
            let changed = *s != next;
            *s = next;
            changed
        });
        if !changed {
            return true;
        }
        tracing::debug!(state = ?next, "Connection state changed");
        self.events
            .send(ConnectionEvent::StateChanged(next))
            .await
            .is_ok()
    }
}

/// Map a failed handshake onto the shared error type
///
/// Refused or reset connections are worth retrying; a bad URL or a server
/// that answers the upgrade with a plain HTTP response is not.
fn handshake_error(url: &Url, error: WsError) -> ChatstackError {
    match error {
        WsError::Url(e) => ChatstackError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        },
        WsError::Http(response) => {
            ChatstackError::protocol(format!("upgrade rejected with HTTP {}", response.status()))
        }
        other => ChatstackError::connection(other.to_string()),
    }
}

/// Drop frames the previous session never wrote
fn discard_queued(outgoing: &mut mpsc::Receiver<String>) -> usize {
    let mut discarded = 0;
    while outgoing.try_recv().is_ok() {
        discarded += 1;
    }
    discarded
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chatstack_protocol::{encode_frame, ClientMessage};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::error::UrlError;
    use tokio::time::timeout;
    use tokio_tungstenite::accept_async;

    const WAIT: Duration = Duration::from_secs(5);

    fn fast_policy(max_attempts: u32) -> ReconnectPolicy {
        ReconnectPolicy::new(max_attempts, Duration::from_millis(5))
    }

    async fn listener() -> (TcpListener, Url) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = Url::parse(&format!("ws://127.0.0.1:{}/ws", port)).unwrap();
        (listener, url)
    }

    /// Port that refuses connections
    async fn closed_port_url() -> Url {
        let (listener, url) = listener().await;
        drop(listener);
        url
    }

    async fn next_event(conn: &mut Connection) -> ConnectionEvent {
        timeout(WAIT, conn.recv()).await.unwrap().unwrap()
    }

    async fn wait_for_state(conn: &mut Connection, wanted: ConnectionState) {
        loop {
            if let ConnectionEvent::StateChanged(state) = next_event(conn).await {
                if state == wanted {
                    return;
                }
            }
        }
    }

    #[test]
    fn test_derive_ws_url() {
        assert_eq!(
            derive_ws_url("http://localhost:8000").unwrap().as_str(),
            "ws://localhost:8000/ws"
        );
        assert_eq!(
            derive_ws_url("https://chat.example.com/app?x=1#top").unwrap().as_str(),
            "wss://chat.example.com/ws"
        );
        assert_eq!(
            derive_ws_url("wss://chat.example.com").unwrap().as_str(),
            "wss://chat.example.com/ws"
        );
    }

    #[test]
    fn test_derive_ws_url_rejects_other_schemes() {
        assert!(matches!(
            derive_ws_url("ftp://example.com"),
            Err(ChatstackError::InvalidUrl { .. })
        ));
        assert!(derive_ws_url("not a url").is_err());
    }

    #[tokio::test]
    async fn test_connection_state_initial() {
        let conn = Connection::new(closed_port_url().await, fast_policy(1));
        assert_eq!(conn.state(), ConnectionState::Uninstantiated);
        assert!(!conn.is_running());
        assert!(!conn.sender().send(&Frame::request(
            ClientMessage::SendChatMessage { text: "x".into() },
            0
        )));
    }

    #[tokio::test]
    async fn test_connect_open_and_exchange_frames() {
        let (listener, url) = listener().await;

        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();

            // Echo back a reply to the first request
            let text = match ws.next().await.unwrap().unwrap() {
                Message::Text(text) => text,
                other => panic!("unexpected frame {other:?}"),
            };
            let request: Frame<ClientMessage> = decode_frame(&text).unwrap();
            let reply = Frame::reply_to(ServerMessage::ConfigSuccess, &request);
            ws.send(Message::Text(encode_frame(&reply).unwrap()))
                .await
                .unwrap();
            ws
        });

        let mut conn = Connection::new(url, fast_policy(1));
        conn.connect().await;
        assert!(matches!(
            next_event(&mut conn).await,
            ConnectionEvent::StateChanged(ConnectionState::Connecting)
        ));
        assert!(matches!(
            next_event(&mut conn).await,
            ConnectionEvent::StateChanged(ConnectionState::Open)
        ));
        assert_eq!(conn.state(), ConnectionState::Open);

        let request = Frame::request(
            ClientMessage::SubmitConfig(chatstack_protocol::ConfigData::default()),
            0,
        );
        assert!(conn.sender().send(&request));

        match next_event(&mut conn).await {
            ConnectionEvent::Message(frame) => {
                assert_eq!(frame.message, ServerMessage::ConfigSuccess);
                assert_eq!(frame.request_id, request.request_id);
            }
            other => panic!("unexpected event {other:?}"),
        }

        conn.close().await;
        assert_eq!(conn.state(), ConnectionState::Closed);
        let _ws = server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_while_running_is_noop() {
        let (listener, url) = listener().await;
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = accept_async(tcp).await.unwrap();
            // A second accept would hang; only one connection may arrive
            (listener, ws)
        });

        let mut conn = Connection::new(url, fast_policy(1));
        conn.connect().await;
        wait_for_state(&mut conn, ConnectionState::Open).await;
        conn.connect().await;
        assert!(conn.is_running());

        let (listener, _ws) = server.await.unwrap();
        assert!(timeout(Duration::from_millis(100), listener.accept())
            .await
            .is_err());
        conn.close().await;
    }

    #[tokio::test]
    async fn test_malformed_and_unknown_frames_are_dropped() {
        let (listener, url) = listener().await;
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            for text in [
                "not json".to_string(),
                r#"{"type":"GITHUB_ISSUES_LIST","payload":{}}"#.to_string(),
                r#"{"type":"CONFIG_ERROR","payload":{}}"#.to_string(),
                r#"{"type":"AGENT_TYPING","payload":{"isTyping":true}}"#.to_string(),
            ] {
                ws.send(Message::Text(text)).await.unwrap();
            }
            ws.send(Message::Binary(vec![1, 2, 3])).await.unwrap();
            ws
        });

        let mut conn = Connection::new(url, fast_policy(1));
        conn.connect().await;
        wait_for_state(&mut conn, ConnectionState::Open).await;

        // Only the valid frame comes through, and the connection stays open
        match next_event(&mut conn).await {
            ConnectionEvent::Message(frame) => {
                assert_eq!(frame.message, ServerMessage::AgentTyping { is_typing: true })
            }
            other => panic!("unexpected event {other:?}"),
        }
        let _ws = server.await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Open);
        conn.close().await;
    }

    #[tokio::test]
    async fn test_reconnect_attempts_bounded_then_exhausted() {
        let mut conn = Connection::new(closed_port_url().await, fast_policy(10));
        conn.connect().await;

        let mut attempts = Vec::new();
        loop {
            match next_event(&mut conn).await {
                ConnectionEvent::Reconnecting {
                    attempt,
                    max_attempts,
                } => {
                    assert_eq!(max_attempts, 10);
                    attempts.push(attempt);
                }
                ConnectionEvent::Exhausted => break,
                ConnectionEvent::StateChanged(_) => {}
                ConnectionEvent::Message(frame) => panic!("unexpected frame {frame:?}"),
            }
        }

        assert_eq!(attempts, (1..=10).collect::<Vec<_>>());
        assert_eq!(conn.state(), ConnectionState::Closed);

        // Supervisor stops once exhausted
        timeout(WAIT, async {
            while conn.is_running() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_reconnects_after_drop_and_resets_budget() {
        let (listener, url) = listener().await;
        let server = tokio::spawn(async move {
            // First session is dropped right away, second one stays
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = accept_async(tcp).await.unwrap();
            drop(ws);
            let (tcp, _) = listener.accept().await.unwrap();
            accept_async(tcp).await.unwrap()
        });

        let mut conn = Connection::new(url, fast_policy(1));
        conn.connect().await;
        wait_for_state(&mut conn, ConnectionState::Open).await;

        let mut saw_reconnecting = false;
        loop {
            match next_event(&mut conn).await {
                ConnectionEvent::Reconnecting { attempt, .. } => {
                    assert_eq!(attempt, 1);
                    saw_reconnecting = true;
                }
                ConnectionEvent::StateChanged(ConnectionState::Open) => break,
                ConnectionEvent::Exhausted => panic!("budget should reset on open"),
                _ => {}
            }
        }
        assert!(saw_reconnecting);

        let _ws = server.await.unwrap();
        conn.close().await;
    }

    #[tokio::test]
    async fn test_close_reports_closing_then_closed() {
        let (listener, url) = listener().await;
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(tcp).await.unwrap();
            // Wait for the client's close frame
            while let Some(Ok(msg)) = ws.next().await {
                if msg.is_close() {
                    return true;
                }
            }
            false
        });

        let mut conn = Connection::new(url, fast_policy(1));
        conn.connect().await;
        wait_for_state(&mut conn, ConnectionState::Open).await;

        conn.close().await;
        assert!(matches!(
            conn.try_recv(),
            Some(ConnectionEvent::StateChanged(ConnectionState::Closing))
        ));
        assert!(matches!(
            conn.try_recv(),
            Some(ConnectionEvent::StateChanged(ConnectionState::Closed))
        ));
        assert!(!conn.is_running());
        assert!(server.await.unwrap());
    }

    #[tokio::test]
    async fn test_manual_reconnect_after_exhaustion() {
        let (listener, url) = listener().await;
        drop(listener);

        let mut conn = Connection::new(url.clone(), fast_policy(0));
        conn.connect().await;
        loop {
            if next_event(&mut conn).await == ConnectionEvent::Exhausted {
                break;
            }
        }

        // Relay comes back on the same port
        let addr = format!("127.0.0.1:{}", url.port().unwrap());
        let listener = TcpListener::bind(addr).await.unwrap();
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            accept_async(tcp).await.unwrap()
        });

        conn.connect().await;
        wait_for_state(&mut conn, ConnectionState::Open).await;
        assert!(conn.sender().send(&Frame::request(
            ClientMessage::SendChatMessage { text: "back".into() },
            0
        )));

        let _ws = server.await.unwrap();
        conn.close().await;
    }

    #[test]
    fn test_handshake_error_classification() {
        let url = Url::parse("ws://127.0.0.1:1/ws").unwrap();

        let refused = handshake_error(&url, WsError::ConnectionClosed);
        assert!(matches!(refused, ChatstackError::Connection(_)));
        assert!(refused.is_retryable());

        let bad_url = handshake_error(&url, WsError::Url(UrlError::UnsupportedUrlScheme));
        assert!(matches!(bad_url, ChatstackError::InvalidUrl { .. }));
        assert!(!bad_url.is_retryable());
    }

    #[test]
    fn test_discard_queued_empties_outgoing() {
        let (tx, mut rx) = mpsc::channel(4);
        for text in ["a", "b", "c"] {
            tx.try_send(text.to_string()).unwrap();
        }

        assert_eq!(discard_queued(&mut rx), 3);
        assert!(rx.try_recv().is_err());
        assert_eq!(discard_queued(&mut rx), 0);
    }

    #[tokio::test]
    async fn test_rejected_upgrade_gives_up_without_retrying() {
        let (listener, url) = listener().await;
        let server = tokio::spawn(async move {
            let (mut tcp, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2048];
            let _ = tcp.read(&mut buf).await.unwrap();
            tcp.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n")
                .await
                .unwrap();
            listener
        });

        let mut conn = Connection::new(url, fast_policy(10));
        conn.connect().await;
        loop {
            match next_event(&mut conn).await {
                ConnectionEvent::Exhausted => break,
                ConnectionEvent::Reconnecting { .. } => panic!("rejected upgrade was retried"),
                _ => {}
            }
        }
        assert_eq!(conn.state(), ConnectionState::Closed);

        let listener = server.await.unwrap();
        assert!(timeout(Duration::from_millis(100), listener.accept())
            .await
            .is_err());
    }
}
