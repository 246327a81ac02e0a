//! Line-oriented rendering of client state
//!
//! [`View::update`] compares the state with what has already been printed and
//! returns only the new lines, so the terminal reads like a chat log. The
//! `render_*` functions produce full listings on demand.

use chatstack_protocol::{ChatMessage, ChatSender, FileNode};

use crate::connection::ConnectionState;
use crate::state::{AppState, NoticeKind, Phase, Selection};

/// Tracks what has been printed so far
#[derive(Debug, Default)]
pub struct View {
    messages_shown: usize,
    last_notice_shown: u64,
    connection: Option<ConnectionState>,
    reconnect_attempt: Option<(u32, u32)>,
    disconnected: bool,
    phase: Option<Phase>,
    agent_typing: bool,
    loading: bool,
    tree_version: u64,
    repositories: Vec<(Option<String>, String)>,
}

impl View {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines describing what changed since the previous call
    pub fn update(&mut self, state: &AppState) -> Vec<String> {
        let mut lines = Vec::new();

        if self.connection != Some(state.connection()) {
            self.connection = Some(state.connection());
            lines.push(format!("* connection {}", connection_label(state.connection())));
        }

        if state.reconnect_attempt() != self.reconnect_attempt {
            self.reconnect_attempt = state.reconnect_attempt();
            if let Some((attempt, max)) = self.reconnect_attempt {
                lines.push(format!("* reconnecting ({}/{})", attempt, max));
            }
        }

        if state.is_disconnected() != self.disconnected {
            self.disconnected = state.is_disconnected();
            if self.disconnected {
                lines.push("* DISCONNECTED: relay unreachable, /reconnect to try again".into());
            }
        }

        if self.phase != Some(state.phase()) {
            let previous = self.phase.replace(state.phase());
            match state.phase() {
                Phase::Chatting => lines.push("* configured, ready to chat".into()),
                Phase::Unconfigured if previous.is_some() => {
                    lines.push("* session reset, /config to start again".into())
                }
                _ => {}
            }
        }

        // Transcript shrinks only on reset
        if state.transcript().len() < self.messages_shown {
            self.messages_shown = 0;
        }
        for message in &state.transcript()[self.messages_shown..] {
            lines.push(render_message(message));
        }
        self.messages_shown = state.transcript().len();

        if state.agent_typing() != self.agent_typing {
            self.agent_typing = state.agent_typing();
            if self.agent_typing {
                lines.push("* agent is typing...".into());
            }
        }

        if state.is_loading() != self.loading {
            self.loading = state.is_loading();
            if self.loading {
                lines.push("* loading file tree...".into());
            }
        }

        if state.tree_version() != self.tree_version {
            self.tree_version = state.tree_version();
            if !state.tree().is_empty() {
                let source = if state.tree_is_placeholder() {
                    "placeholder tree"
                } else {
                    "file tree"
                };
                lines.push(format!(
                    "* {} with {} entries, /tree to show",
                    source,
                    FileNode::count(state.tree())
                ));
            }
        }

        let repositories: Vec<(Option<String>, String)> = state
            .repositories()
            .list()
            .iter()
            .map(|r| (r.id.clone(), r.name.clone()))
            .collect();
        if repositories != self.repositories {
            self.repositories = repositories;
            lines.push(format!(
                "* {} repositories, /repos to list",
                self.repositories.len()
            ));
        }

        for notice in state.notices() {
            if notice.id > self.last_notice_shown {
                lines.push(format!(
                    "! [{}] {}: {}",
                    notice.id,
                    notice_label(notice.kind),
                    notice.message
                ));
            }
        }
        if let Some(last) = state.notices().last() {
            self.last_notice_shown = self.last_notice_shown.max(last.id);
        }

        lines
    }
}

fn connection_label(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Uninstantiated => "idle",
        ConnectionState::Connecting => "connecting",
        ConnectionState::Open => "open",
        ConnectionState::Closing => "closing",
        ConnectionState::Closed => "closed",
    }
}

fn notice_label(kind: NoticeKind) -> &'static str {
    match kind {
        NoticeKind::Config => "config",
        NoticeKind::FileTree => "files",
        NoticeKind::Repository => "repository",
        NoticeKind::Input => "input",
    }
}

pub fn render_message(message: &ChatMessage) -> String {
    let who = match message.sender {
        ChatSender::User => "you",
        ChatSender::Agent => "agent",
        ChatSender::System => "system",
    };
    format!("{}> {}", who, message.text)
}

/// Indented tree with selection markers
pub fn render_tree(tree: &[FileNode], selection: &Selection) -> Vec<String> {
    fn walk(nodes: &[FileNode], selection: &Selection, depth: usize, out: &mut Vec<String>) {
        for node in nodes {
            let mark = if selection.contains(&node.path) { "x" } else { " " };
            let suffix = if node.is_directory() { "/" } else { "" };
            out.push(format!(
                "{}[{}] {}{}",
                "  ".repeat(depth),
                mark,
                node.name,
                suffix
            ));
            walk(node.children(), selection, depth + 1, out);
        }
    }

    let mut out = Vec::new();
    walk(tree, selection, 0, &mut out);
    out
}

pub fn render_repositories(state: &AppState) -> Vec<String> {
    if state.repositories().is_empty() {
        return vec!["no repositories".into()];
    }
    state
        .repositories()
        .list()
        .iter()
        .map(|r| {
            let id = r.id.as_deref().unwrap_or("(pending)");
            let active = if r.id.is_some() && r.id.as_deref() == state.selected_repository_id() {
                "*"
            } else {
                " "
            };
            format!("{} {} {} [{}]", active, id, r.name, r.branch)
        })
        .collect()
}

pub fn render_status(state: &AppState) -> Vec<String> {
    let phase = match state.phase() {
        Phase::Unconfigured => "unconfigured",
        Phase::ConfiguringFiles => "choosing files",
        Phase::Chatting => "chatting",
    };
    let mut lines = vec![
        format!("phase: {}", phase),
        format!("connection: {}", connection_label(state.connection())),
        format!("session: {}", state.epoch()),
        format!("selected files: {}", state.selection().files(state.tree()).count()),
        format!("requests in flight: {}", state.pending().len()),
    ];
    if let Some(error) = state.config_error() {
        lines.push(format!("config error: {}", error));
    }
    if let Some(error) = state.tree_error() {
        lines.push(format!("tree error: {}", error));
    }
    lines
}
