//! Client-side repository cache with optimistic updates

use chatstack_protocol::Repository;

/// Inverse of an optimistic cache update, replayed if the server refuses it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rollback {
    /// Drop the provisional (id-less) entry added under `name`
    RemoveProvisional { name: String },
    /// Put back the entry that `id` held before an update
    Replace { id: String, previous: Repository },
    /// Re-insert a deleted entry at its former position
    Reinsert { index: usize, repository: Repository },
}

/// Ordered cache of the server's repository list
///
/// Entries never hold access tokens. A repository added optimistically sits
/// in the cache without an id until the server acknowledges it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryCache {
    entries: Vec<Repository>,
}

impl RepositoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self) -> &[Repository] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Repository> {
        self.entries.iter().find(|r| r.id.as_deref() == Some(id))
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|r| r.id.as_deref() == Some(id))
    }

    /// Replace the whole cache with the server's authoritative list
    pub fn replace_all(&mut self, repositories: Vec<Repository>) {
        self.entries = repositories.iter().map(Repository::redacted).collect();
    }

    /// Optimistically add a repository that has no id yet
    pub fn add_provisional(&mut self, repository: &Repository) -> Rollback {
        let mut entry = repository.redacted();
        entry.id = None;
        let name = entry.name.clone();
        self.entries.push(entry);
        Rollback::RemoveProvisional { name }
    }

    /// Optimistically replace the entry for `id`
    pub fn update(&mut self, id: &str, repository: &Repository) -> Option<Rollback> {
        let index = self.position(id)?;
        let replacement = repository.redacted().with_id(id);
        let previous = std::mem::replace(&mut self.entries[index], replacement);
        Some(Rollback::Replace {
            id: id.to_string(),
            previous,
        })
    }

    /// Optimistically remove the entry for `id`
    pub fn remove(&mut self, id: &str) -> Option<Rollback> {
        let index = self.position(id)?;
        let repository = self.entries.remove(index);
        Some(Rollback::Reinsert { index, repository })
    }

    /// Settle an acknowledged add: the provisional entry becomes the
    /// persisted one, or the persisted one is upserted if none is pending
    pub fn commit(&mut self, persisted: &Repository) {
        let persisted = persisted.redacted();
        let provisional = self
            .entries
            .iter()
            .position(|r| r.id.is_none() && r.name == persisted.name);

        match (provisional, persisted.id.as_deref()) {
            (Some(index), _) => self.entries[index] = persisted,
            (None, Some(id)) => match self.position(id) {
                Some(index) => self.entries[index] = persisted,
                None => self.entries.push(persisted),
            },
            (None, None) => {}
        }
    }

    /// Replay the inverse of an optimistic update
    pub fn rollback(&mut self, rollback: Rollback) {
        match rollback {
            Rollback::RemoveProvisional { name } => {
                self.entries.retain(|r| !(r.id.is_none() && r.name == name));
            }
            Rollback::Replace { id, previous } => {
                if let Some(index) = self.position(&id) {
                    self.entries[index] = previous;
                }
            }
            Rollback::Reinsert { index, repository } => {
                let present = repository
                    .id
                    .as_deref()
                    .map_or(false, |id| self.position(id).is_some());
                if !present {
                    let index = index.min(self.entries.len());
                    self.entries.insert(index, repository);
                }
            }
        }
    }
}
