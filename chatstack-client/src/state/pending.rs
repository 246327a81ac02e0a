//! In-flight request log keyed by correlation id

use chatstack_protocol::{ClientMessage, RepositoryAction, RequestId};

use super::repositories::Rollback;

/// Superseded fetches remembered so their late trees can be recognised
const MAX_SUPERSEDED_FETCHES: usize = 16;

/// What an in-flight request is waiting for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    Config,
    /// FETCH_FILES or SELECT_REPOSITORY, both answered with a tree
    ///
    /// `via_select` marks SELECT_REPOSITORY, which can also fail with a
    /// repository error.
    TreeFetch { superseded: bool, via_select: bool },
    Chat,
    Repository {
        action: RepositoryAction,
        rollback: Option<Rollback>,
    },
}

impl RequestKind {
    /// Classify an outgoing request; `rollback` undoes its optimistic update
    pub fn of(message: &ClientMessage, rollback: Option<Rollback>) -> Self {
        if message.is_tree_fetch() {
            return RequestKind::TreeFetch {
                superseded: false,
                via_select: message.is_repository_action(),
            };
        }
        let action = match message {
            ClientMessage::SubmitConfig(_) => return RequestKind::Config,
            ClientMessage::AddRepository { .. } => RepositoryAction::Add,
            ClientMessage::UpdateRepository { .. } => RepositoryAction::Update,
            ClientMessage::DeleteRepository { .. } => RepositoryAction::Delete,
            _ => return RequestKind::Chat,
        };
        RequestKind::Repository { action, rollback }
    }

    /// Whether a REPOSITORY_ACTION_ERROR can be the answer
    pub fn fails_as_repository_action(&self) -> bool {
        matches!(
            self,
            RequestKind::Repository { .. } | RequestKind::TreeFetch { via_select: true, .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub id: RequestId,
    pub kind: RequestKind,
    pub epoch: u64,
}

/// Issue-ordered log of requests still awaiting a terminal response
#[derive(Debug, Clone, Default)]
pub struct PendingRequests {
    entries: Vec<PendingRequest>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: RequestId) -> Option<&PendingRequest> {
        self.entries.iter().find(|p| p.id == id)
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &PendingRequest> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Record a request
    ///
    /// A tree fetch supersedes every older one. Only the newest
    /// [`MAX_SUPERSEDED_FETCHES`] superseded fetches are kept; older ones are
    /// forgotten in case the server never answers them.
    pub fn push(&mut self, id: RequestId, kind: RequestKind, epoch: u64) {
        if matches!(kind, RequestKind::TreeFetch { .. }) {
            for entry in &mut self.entries {
                if let RequestKind::TreeFetch { superseded, .. } = &mut entry.kind {
                    *superseded = true;
                }
            }
            self.prune_superseded(MAX_SUPERSEDED_FETCHES);
        }
        self.entries.push(PendingRequest { id, kind, epoch });
    }

    fn prune_superseded(&mut self, keep: usize) {
        let superseded = self
            .entries
            .iter()
            .filter(|p| matches!(p.kind, RequestKind::TreeFetch { superseded: true, .. }))
            .count();
        let mut excess = superseded.saturating_sub(keep);
        self.entries.retain(|p| {
            if excess > 0 && matches!(p.kind, RequestKind::TreeFetch { superseded: true, .. }) {
                excess -= 1;
                return false;
            }
            true
        });
    }

    /// Remove and return the entry for `id`
    pub fn take(&mut self, id: RequestId) -> Option<PendingRequest> {
        let index = self.entries.iter().position(|p| p.id == id)?;
        Some(self.entries.remove(index))
    }

    /// Whether `id` names a tree fetch that a newer fetch replaced
    pub fn is_superseded(&self, id: RequestId) -> bool {
        matches!(
            self.get(id).map(|p| &p.kind),
            Some(RequestKind::TreeFetch {
                superseded: true,
                ..
            })
        )
    }

    /// Remove the request a response answers
    ///
    /// A response carrying a correlation id settles exactly that request,
    /// provided its kind matches `pred`. A response without one settles the
    /// oldest request whose kind matches.
    pub fn take_correlated<F>(&mut self, id: Option<RequestId>, pred: F) -> Option<PendingRequest>
    where
        F: Fn(&RequestKind) -> bool,
    {
        let index = match id {
            Some(id) => self
                .entries
                .iter()
                .position(|p| p.id == id && pred(&p.kind))?,
            None => self.entries.iter().position(|p| pred(&p.kind))?,
        };
        Some(self.entries.remove(index))
    }

    /// Whether the newest tree fetch is still unanswered
    pub fn any_fetch_in_flight(&self) -> bool {
        self.entries
            .iter()
            .any(|p| matches!(p.kind, RequestKind::TreeFetch { superseded: false, .. }))
    }
}
