//! Repository descriptor shared by client and server

use serde::{Deserialize, Serialize};
use url::Url;

/// Host assumed when a repository does not name one
pub const DEFAULT_HOST: &str = "github.com";

/// Branch assumed when a repository does not name one
pub const DEFAULT_BRANCH: &str = "main";

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

/// Problems with a repository descriptor
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("Invalid repository URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Repository {0} is required")]
    MissingField(&'static str),

    #[error("Repository URL '{url}' does not match {expected}")]
    UrlMismatch { url: String, expected: String },
}

/// A source repository registered by the user
///
/// `id` is assigned by the server when the repository is persisted. The
/// access `token` travels client to server only; the server never echoes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub url: String,
    #[serde(default = "default_host")]
    pub host: String,
    pub owner: String,
    pub repo: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Repository {
    /// Build a repository from its location parts, deriving `name` and `url`
    pub fn new(
        host: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        let host = host.into();
        let owner = owner.into();
        let repo = repo.into();
        Self {
            id: None,
            name: format!("{}/{}", owner, repo),
            url: canonical_url(&host, &owner, &repo),
            host,
            owner,
            repo,
            branch: branch.into(),
            token,
        }
    }

    /// Parse a web URL such as `https://github.com/owner/repo.git`
    pub fn from_url(
        url: &str,
        token: Option<String>,
        branch: Option<&str>,
    ) -> Result<Self, RepositoryError> {
        let (host, owner, repo) = parse_location(url)?;
        Ok(Self::new(
            host,
            owner,
            repo,
            branch.unwrap_or(DEFAULT_BRANCH),
            token,
        ))
    }

    /// The URL implied by host, owner and repo
    pub fn canonical_url(&self) -> String {
        canonical_url(&self.host, &self.owner, &self.repo)
    }

    /// Check the descriptor is complete enough to submit
    pub fn validate(&self) -> Result<(), RepositoryError> {
        if self.name.trim().is_empty() {
            return Err(RepositoryError::MissingField("name"));
        }
        if self.owner.trim().is_empty() {
            return Err(RepositoryError::MissingField("owner"));
        }
        if self.repo.trim().is_empty() {
            return Err(RepositoryError::MissingField("repo"));
        }
        if self.token.as_deref().map_or(true, |t| t.trim().is_empty()) {
            return Err(RepositoryError::MissingField("token"));
        }
        self.check_url()
    }

    /// Check that `url` agrees with host/owner/repo
    pub fn check_url(&self) -> Result<(), RepositoryError> {
        let mismatch = || RepositoryError::UrlMismatch {
            url: self.url.clone(),
            expected: self.canonical_url(),
        };
        let (host, owner, repo) = parse_location(&self.url).map_err(|_| mismatch())?;
        if host.eq_ignore_ascii_case(&self.host) && owner == self.owner && repo == self.repo {
            Ok(())
        } else {
            Err(mismatch())
        }
    }

    /// Copy without the access token
    pub fn redacted(&self) -> Self {
        Self {
            token: None,
            ..self.clone()
        }
    }

    /// Copy carrying the given id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

fn canonical_url(host: &str, owner: &str, repo: &str) -> String {
    format!("https://{}/{}/{}", host, owner, repo)
}

/// Split a repository web URL into (host, owner, repo)
fn parse_location(raw: &str) -> Result<(String, String, String), RepositoryError> {
    let invalid = |reason: &str| RepositoryError::InvalidUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
    let host = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    let mut segments = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect::<Vec<_>>())
        .unwrap_or_default()
        .into_iter();
    let owner = segments.next().ok_or_else(|| invalid("missing owner"))?;
    let repo = segments.next().ok_or_else(|| invalid("missing repository name"))?;
    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    if repo.is_empty() {
        return Err(invalid("missing repository name"));
    }

    Ok((host, owner.to_string(), repo.to_string()))
}
