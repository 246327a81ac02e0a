//! Client event loop
//!
//! [`App`] wires stdin, the relay connection and the fallback timer into the
//! state machine. Every event is reduced by [`AppState`], the returned effects
//! are executed here, and the [`View`] prints whatever changed.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use chatstack_protocol::{Frame, ServerMessage, WireMessage};
use chatstack_utils::Result;

use crate::commands::{parse_input, Command, Panel, ParseError, HELP};
use crate::config::ClientConfig;
use crate::connection::{
    dispatch_event, Connection, ConnectionState, MessageHandler, MessageSender,
};
use crate::fallback::{FallbackExpired, FallbackTimer};
use crate::state::{AppState, Effect};
use crate::view::{render_repositories, render_status, render_tree, View};

/// Main application
pub struct App {
    state: AppState,
    connection: Connection,
    sender: MessageSender,
    fallback: FallbackTimer,
    fallback_rx: mpsc::UnboundedReceiver<FallbackExpired>,
    view: View,
    /// Command output not derived from state
    output: Vec<String>,
    quitting: bool,
}

impl App {
    /// Build the app from configuration
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let connection = Connection::from_base(&config.server_url, config.reconnect.policy())?;
        Ok(Self::with_connection(connection, config))
    }

    /// Build the app around an existing connection
    pub fn with_connection(connection: Connection, config: &ClientConfig) -> Self {
        let (fallback_tx, fallback_rx) = mpsc::unbounded_channel();
        let sender = connection.sender();
        Self {
            state: AppState::new(config.fallback.enabled),
            connection,
            sender,
            fallback: FallbackTimer::new(config.fallback.delay(), fallback_tx),
            fallback_rx,
            view: View::new(),
            output: Vec::new(),
            quitting: false,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn is_quitting(&self) -> bool {
        self.quitting
    }

    /// Run until stdin closes or the user quits
    pub async fn run(&mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        self.connection.connect().await;
        self.flush();

        while !self.quitting {
            tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => self.handle_line(&line).await,
                    None => {
                        tracing::debug!("stdin closed");
                        break;
                    }
                },
                event = self.connection.recv() => match event {
                    Some(event) => dispatch_event(self, event),
                    None => break,
                },
                Some(expired) = self.fallback_rx.recv() => self.on_fallback_expired(expired),
            }
            self.flush();
        }

        self.fallback.cancel();
        self.connection.close().await;
        Ok(())
    }

    /// Handle one line of user input
    pub async fn handle_line(&mut self, line: &str) {
        let command = match parse_input(line) {
            Ok(command) => command,
            Err(ParseError::Empty) => return,
            Err(e) => {
                self.output.push(format!("! {}", e));
                return;
            }
        };

        match command {
            Command::Quit => self.quitting = true,
            Command::Help => self.output.extend(HELP.lines().map(String::from)),
            Command::Show(panel) => self.show(panel),
            Command::Reconnect => {
                if self.connection.is_running() {
                    self.output.push("* already connected".into());
                } else {
                    self.connection.connect().await;
                }
            }
            Command::Unknown(name) => {
                self.output
                    .push(format!("! unknown command /{}, /help for usage", name));
            }
            other => {
                if let Some(action) = other.into_action() {
                    let effects = self.state.dispatch(action);
                    self.execute(effects);
                }
            }
        }
    }

    pub fn on_fallback_expired(&mut self, expired: FallbackExpired) {
        let effects = self.state.apply_fallback_expired(expired.ticket);
        self.execute(effects);
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send(frame) => {
                    if !self.sender.send(&frame) {
                        tracing::debug!(kind = frame.message.kind(), "Frame dropped while offline");
                    }
                }
                Effect::StartFallbackTimer { ticket } => self.fallback.arm(ticket),
                Effect::CancelFallbackTimer => self.fallback.cancel(),
            }
        }
    }

    fn show(&mut self, panel: Panel) {
        let lines = match panel {
            Panel::Tree if self.state.tree().is_empty() => vec!["no file tree loaded".into()],
            Panel::Tree => render_tree(self.state.tree(), self.state.selection()),
            Panel::Repositories => render_repositories(&self.state),
            Panel::Status => render_status(&self.state),
        };
        self.output.extend(lines);
    }

    /// Lines to print since the previous call
    pub fn take_output(&mut self) -> Vec<String> {
        let mut lines = self.view.update(&self.state);
        lines.append(&mut self.output);
        lines
    }

    fn flush(&mut self) {
        for line in self.take_output() {
            println!("{}", line);
        }
    }
}

impl MessageHandler for App {
    fn handle(&mut self, frame: Frame<ServerMessage>) {
        let effects = self.state.apply_frame(frame);
        self.execute(effects);
    }

    fn on_state_changed(&mut self, state: ConnectionState) {
        tracing::debug!(?state, "Connection state changed");
        self.state.apply_connection_state(state);
    }

    fn on_reconnecting(&mut self, attempt: u32, max_attempts: u32) {
        self.state.apply_reconnecting(attempt, max_attempts);
    }

    fn on_exhausted(&mut self) {
        tracing::warn!("Relay unreachable, giving up");
        self.state.apply_exhausted();
    }
}
