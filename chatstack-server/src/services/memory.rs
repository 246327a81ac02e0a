//! In-memory repository store

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use chatstack_protocol::Repository;

use super::{RepositoryStore, ServiceError};
use crate::registry::ClientId;

/// Repositories per client, lost on restart
#[derive(Default)]
pub struct MemoryRepositoryStore {
    clients: DashMap<ClientId, Vec<Repository>>,
}

impl MemoryRepositoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RepositoryStore for MemoryRepositoryStore {
    async fn list(&self, client: ClientId) -> Vec<Repository> {
        self.clients
            .get(&client)
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    async fn get(&self, client: ClientId, id: &str) -> Option<Repository> {
        self.clients
            .get(&client)?
            .iter()
            .find(|r| r.id.as_deref() == Some(id))
            .cloned()
    }

    async fn upsert(
        &self,
        client: ClientId,
        mut repository: Repository,
    ) -> Result<Repository, ServiceError> {
        let mut entries = self.clients.entry(client).or_default();
        match entries.iter_mut().find(|r| r.name == repository.name) {
            Some(existing) => {
                repository.id = existing.id.clone();
                *existing = repository.clone();
            }
            None => {
                repository.id = Some(Uuid::new_v4().to_string());
                entries.push(repository.clone());
            }
        }
        Ok(repository)
    }

    async fn update(
        &self,
        client: ClientId,
        id: &str,
        mut repository: Repository,
    ) -> Result<Repository, ServiceError> {
        let mut entries = self
            .clients
            .get_mut(&client)
            .ok_or(ServiceError::NotFound("Repository"))?;
        let existing = entries
            .iter_mut()
            .find(|r| r.id.as_deref() == Some(id))
            .ok_or(ServiceError::NotFound("Repository"))?;

        repository.id = Some(id.to_string());
        // An update without a token keeps the stored one
        if repository.token.is_none() {
            repository.token = existing.token.take();
        }
        *existing = repository.clone();
        Ok(repository)
    }

    async fn delete(&self, client: ClientId, id: &str) -> Result<(), ServiceError> {
        let mut entries = self
            .clients
            .get_mut(&client)
            .ok_or(ServiceError::NotFound("Repository"))?;
        let before = entries.len();
        entries.retain(|r| r.id.as_deref() != Some(id));
        if entries.len() == before {
            return Err(ServiceError::NotFound("Repository"));
        }
        Ok(())
    }

    async fn forget(&self, client: ClientId) {
        self.clients.remove(&client);
    }
}
