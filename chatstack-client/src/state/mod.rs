//! Application state machine
//!
//! [`AppState`] is the only writer of client state. User intents arrive as
//! [`Action`]s, server frames and connection events arrive through the
//! `apply_*` methods, and every call returns the [`Effect`]s the event loop
//! has to carry out. Nothing in here performs I/O.

mod pending;
mod repositories;
mod selection;

pub use pending::{PendingRequest, PendingRequests, RequestKind};
pub use repositories::{RepositoryCache, Rollback};
pub use selection::Selection;

use chatstack_protocol::{
    ChatMessage, ChatSender, ClientMessage, ConfigData, FileNode, Frame, Repository,
    RepositoryAction, RequestId, ServerMessage, WireMessage,
};

use crate::connection::ConnectionState;
use crate::fallback::placeholder_tree;

/// Top-level UI phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No configuration accepted yet
    Unconfigured,
    /// A tree has been fetched or displayed before configuration succeeded
    ConfiguringFiles,
    /// Configuration accepted; chatting
    Chatting,
}

/// Which action a notice belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Config,
    FileTree,
    Repository,
    Input,
}

/// Transient, dismissible error message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub kind: NoticeKind,
    pub message: String,
}

/// User intent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SubmitConfig(ConfigData),
    FetchFiles { repository_id: String },
    SendChat { text: String },
    AddRepository(Repository),
    UpdateRepository {
        repository_id: String,
        repository: Repository,
    },
    DeleteRepository { repository_id: String },
    SelectRepository { repository_id: String },
    ToggleSelection { path: String },
    ResetConfiguration,
    DismissNotice(u64),
}

/// Side effect requested by the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Hand a frame to the connection
    Send(Frame<ClientMessage>),
    /// Arm the fallback countdown for `ticket`, replacing any armed one
    StartFallbackTimer { ticket: u64 },
    /// Disarm the fallback countdown
    CancelFallbackTimer,
}

/// Client state container
#[derive(Debug)]
pub struct AppState {
    phase: Phase,
    epoch: u64,
    connection: ConnectionState,
    reconnect_attempt: Option<(u32, u32)>,
    disconnected: bool,

    transcript: Vec<ChatMessage>,
    agent_typing: bool,

    repositories: RepositoryCache,
    selected_repository_id: Option<String>,
    tree_repository: Option<Repository>,

    tree: Vec<FileNode>,
    tree_version: u64,
    tree_is_placeholder: bool,
    tree_error: Option<String>,
    loading: bool,
    selection: Selection,

    config_error: Option<String>,
    notices: Vec<Notice>,
    next_notice_id: u64,

    pending: PendingRequests,
    fallback_enabled: bool,
    fallback_ticket: Option<u64>,
    next_ticket: u64,
}

impl AppState {
    pub fn new(fallback_enabled: bool) -> Self {
        Self {
            phase: Phase::Unconfigured,
            epoch: 0,
            connection: ConnectionState::Uninstantiated,
            reconnect_attempt: None,
            disconnected: false,
            transcript: Vec::new(),
            agent_typing: false,
            repositories: RepositoryCache::new(),
            selected_repository_id: None,
            tree_repository: None,
            tree: Vec::new(),
            tree_version: 0,
            tree_is_placeholder: false,
            tree_error: None,
            loading: false,
            selection: Selection::new(),
            config_error: None,
            notices: Vec::new(),
            next_notice_id: 1,
            pending: PendingRequests::new(),
            fallback_enabled,
            fallback_ticket: None,
            next_ticket: 1,
        }
    }

    // ==================== Accessors ====================

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_configured(&self) -> bool {
        self.phase == Phase::Chatting
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    /// `(attempt, max_attempts)` while a reconnect is under way
    pub fn reconnect_attempt(&self) -> Option<(u32, u32)> {
        self.reconnect_attempt
    }

    /// Whether the reconnect budget ran out
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn agent_typing(&self) -> bool {
        self.agent_typing
    }

    pub fn repositories(&self) -> &RepositoryCache {
        &self.repositories
    }

    pub fn selected_repository_id(&self) -> Option<&str> {
        self.selected_repository_id.as_deref()
    }

    /// Repository the current tree belongs to, as reported by the server
    pub fn tree_repository(&self) -> Option<&Repository> {
        self.tree_repository.as_ref()
    }

    pub fn tree(&self) -> &[FileNode] {
        &self.tree
    }

    /// Bumped whenever the tree is replaced or cleared
    pub fn tree_version(&self) -> u64 {
        self.tree_version
    }

    pub fn tree_is_placeholder(&self) -> bool {
        self.tree_is_placeholder
    }

    pub fn tree_error(&self) -> Option<&str> {
        self.tree_error.as_deref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn config_error(&self) -> Option<&str> {
        self.config_error.as_deref()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn pending(&self) -> &PendingRequests {
        &self.pending
    }

    pub fn fallback_ticket(&self) -> Option<u64> {
        self.fallback_ticket
    }

    // ==================== User intents ====================

    /// Reduce a user intent
    pub fn dispatch(&mut self, action: Action) -> Vec<Effect> {
        match action {
            Action::SubmitConfig(config) => {
                self.config_error = None;
                vec![self.request(ClientMessage::SubmitConfig(config), None)]
            }

            Action::FetchFiles { repository_id } => {
                self.issue_fetch(ClientMessage::FetchFiles { repository_id })
            }

            Action::SelectRepository { repository_id } => {
                self.issue_fetch(ClientMessage::SelectRepository { repository_id })
            }

            Action::SendChat { text } => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    return Vec::new();
                }
                self.transcript
                    .push(ChatMessage::new(ChatSender::User, text.clone()));
                vec![self.request(ClientMessage::SendChatMessage { text }, None)]
            }

            Action::AddRepository(repository) => {
                if let Err(e) = repository.validate() {
                    self.push_notice(NoticeKind::Input, e.to_string());
                    return Vec::new();
                }
                let rollback = self.repositories.add_provisional(&repository);
                vec![self.request(ClientMessage::AddRepository { repository }, Some(rollback))]
            }

            Action::UpdateRepository {
                repository_id,
                repository,
            } => {
                if let Err(e) = repository.validate() {
                    self.push_notice(NoticeKind::Input, e.to_string());
                    return Vec::new();
                }
                let rollback = self.repositories.update(&repository_id, &repository);
                vec![self.request(
                    ClientMessage::UpdateRepository {
                        repository_id,
                        repository,
                    },
                    rollback,
                )]
            }

            Action::DeleteRepository { repository_id } => {
                let rollback = self.repositories.remove(&repository_id);
                vec![self.request(ClientMessage::DeleteRepository { repository_id }, rollback)]
            }

            Action::ToggleSelection { path } => {
                if !self.selection.toggle(&self.tree, &path) {
                    tracing::debug!(path = %path, "Toggle ignored, path not in tree");
                }
                Vec::new()
            }

            Action::ResetConfiguration => self.reset(),

            Action::DismissNotice(id) => {
                self.notices.retain(|n| n.id != id);
                Vec::new()
            }
        }
    }

    fn request(&mut self, message: ClientMessage, rollback: Option<Rollback>) -> Effect {
        let kind = RequestKind::of(&message, rollback);
        let frame = Frame::request(message, self.epoch);
        if let Some(id) = frame.request_id {
            self.pending.push(id, kind, self.epoch);
        }
        Effect::Send(frame)
    }

    fn issue_fetch(&mut self, message: ClientMessage) -> Vec<Effect> {
        self.loading = true;
        self.tree_error = None;
        if self.phase == Phase::Unconfigured {
            self.phase = Phase::ConfiguringFiles;
        }

        let mut effects = vec![self.request(message, None)];

        if self.fallback_enabled {
            let ticket = self.next_ticket;
            self.next_ticket += 1;
            self.fallback_ticket = Some(ticket);
            effects.push(Effect::StartFallbackTimer { ticket });
        }
        effects
    }

    /// Start a new session: everything tied to the old one is dropped and
    /// responses still in flight for it will be discarded on arrival
    fn reset(&mut self) -> Vec<Effect> {
        self.epoch += 1;
        self.phase = Phase::Unconfigured;
        self.transcript.clear();
        self.agent_typing = false;
        self.selected_repository_id = None;
        self.tree_repository = None;
        self.replace_tree(Vec::new(), false);
        self.tree_error = None;
        self.loading = false;
        self.config_error = None;
        self.pending.clear();

        tracing::info!(epoch = self.epoch, "Configuration reset");

        match self.fallback_ticket.take() {
            Some(_) => vec![Effect::CancelFallbackTimer],
            None => Vec::new(),
        }
    }

    // ==================== Inbound frames ====================

    /// Reduce a frame received from the server
    pub fn apply_frame(&mut self, frame: Frame<ServerMessage>) -> Vec<Effect> {
        if let Some(epoch) = frame.epoch {
            if epoch != self.epoch {
                tracing::debug!(
                    kind = frame.message.kind(),
                    frame_epoch = epoch,
                    current_epoch = self.epoch,
                    "Discarding response from a previous session"
                );
                return Vec::new();
            }
        }

        let request_id = frame.request_id;
        match frame.message {
            ServerMessage::ConfigSuccess => {
                self.pending
                    .take_correlated(request_id, |k| matches!(k, RequestKind::Config));
                self.phase = Phase::Chatting;
                self.config_error = None;
                Vec::new()
            }

            ServerMessage::ConfigError { message } => {
                self.pending
                    .take_correlated(request_id, |k| matches!(k, RequestKind::Config));
                self.config_error = Some(message.clone());
                self.push_notice(NoticeKind::Config, message);
                Vec::new()
            }

            ServerMessage::FileTreeData { tree, repository } => {
                if self.settle_fetch(request_id) {
                    return Vec::new();
                }
                self.replace_tree(tree, false);
                self.tree_error = None;
                if let Some(id) = repository.as_ref().and_then(|r| r.id.clone()) {
                    self.selected_repository_id = Some(id);
                }
                self.tree_repository = repository;
                if self.phase == Phase::Unconfigured {
                    self.phase = Phase::ConfiguringFiles;
                }
                self.finish_fetch()
            }

            ServerMessage::FileTreeError { message } => {
                if self.settle_fetch(request_id) {
                    return Vec::new();
                }
                self.replace_tree(Vec::new(), false);
                self.tree_repository = None;
                self.tree_error = Some(message.clone());
                self.push_notice(NoticeKind::FileTree, message);
                self.finish_fetch()
            }

            ServerMessage::NewChatMessage(message) => {
                if message.sender != ChatSender::User {
                    self.pending
                        .take_correlated(request_id, |k| matches!(k, RequestKind::Chat));
                }
                if message.sender == ChatSender::Agent {
                    self.agent_typing = false;
                }
                self.transcript.push(message);
                Vec::new()
            }

            ServerMessage::AgentTyping { is_typing } => {
                self.agent_typing = is_typing;
                Vec::new()
            }

            ServerMessage::RepositoriesList { repositories } => {
                self.repositories.replace_all(repositories);
                Vec::new()
            }

            ServerMessage::RepositoryActionSuccess {
                repository,
                repository_id,
                action,
            } => {
                self.pending
                    .take_correlated(request_id, |k| matches!(k, RequestKind::Repository { .. }));
                match action {
                    RepositoryAction::Add | RepositoryAction::Update => {
                        if let Some(repository) = &repository {
                            self.repositories.commit(repository);
                        }
                    }
                    RepositoryAction::Delete => {
                        if let Some(id) = &repository_id {
                            self.repositories.remove(id);
                            if self.selected_repository_id.as_deref() == Some(id.as_str()) {
                                self.selected_repository_id = None;
                            }
                        }
                    }
                    RepositoryAction::Select => {
                        if repository_id.is_some() {
                            self.selected_repository_id = repository_id;
                        }
                    }
                }
                Vec::new()
            }

            ServerMessage::RepositoryActionError { message } => {
                let settled = self
                    .pending
                    .take_correlated(request_id, RequestKind::fails_as_repository_action);
                let mut effects = Vec::new();
                match settled.map(|p| p.kind) {
                    Some(RequestKind::Repository {
                        rollback: Some(rollback),
                        action,
                    }) => {
                        tracing::debug!(%action, "Rolling back optimistic repository update");
                        self.repositories.rollback(rollback);
                    }
                    // A failed SELECT_REPOSITORY never produces a tree
                    Some(RequestKind::TreeFetch {
                        superseded: false, ..
                    }) => {
                        effects = self.finish_fetch();
                    }
                    _ => {}
                }
                self.push_notice(NoticeKind::Repository, message);
                effects
            }
        }
    }

    /// Install a new tree; any selection refers to the old one and is dropped
    fn replace_tree(&mut self, tree: Vec<FileNode>, placeholder: bool) {
        self.tree = tree;
        self.tree_is_placeholder = placeholder;
        self.tree_version += 1;
        self.selection.clear();
    }

    /// Settle the fetch a tree response answers; true if the response
    /// belongs to a superseded fetch and must be ignored
    fn settle_fetch(&mut self, request_id: Option<RequestId>) -> bool {
        let Some(id) = request_id else {
            return false;
        };
        if self.pending.is_superseded(id) {
            self.pending.take(id);
            tracing::debug!(request_id = %id, "Discarding tree for a superseded fetch");
            return true;
        }
        if matches!(
            self.pending.get(id).map(|p| &p.kind),
            Some(RequestKind::TreeFetch { .. })
        ) {
            self.pending.take(id);
        }
        false
    }

    fn finish_fetch(&mut self) -> Vec<Effect> {
        self.loading = self.pending.any_fetch_in_flight();
        if self.loading {
            return Vec::new();
        }
        match self.fallback_ticket.take() {
            Some(_) => vec![Effect::CancelFallbackTimer],
            None => Vec::new(),
        }
    }

    /// The fallback countdown for `ticket` ran out
    pub fn apply_fallback_expired(&mut self, ticket: u64) -> Vec<Effect> {
        if self.fallback_ticket != Some(ticket) {
            tracing::debug!(ticket, "Ignoring stale fallback expiry");
            return Vec::new();
        }
        self.fallback_ticket = None;

        tracing::info!("Server did not answer in time, showing placeholder tree");
        self.replace_tree(placeholder_tree(), true);
        self.tree_error = None;
        self.loading = false;
        Vec::new()
    }

    // ==================== Connection events ====================

    pub fn apply_connection_state(&mut self, state: ConnectionState) {
        self.connection = state;
        if state == ConnectionState::Open {
            self.reconnect_attempt = None;
            self.disconnected = false;
        }
    }

    pub fn apply_reconnecting(&mut self, attempt: u32, max_attempts: u32) {
        self.reconnect_attempt = Some((attempt, max_attempts));
    }

    pub fn apply_exhausted(&mut self) {
        self.reconnect_attempt = None;
        self.disconnected = true;
    }

    fn push_notice(&mut self, kind: NoticeKind, message: String) {
        let id = self.next_notice_id;
        self.next_notice_id += 1;
        self.notices.push(Notice { id, kind, message });
    }
}
