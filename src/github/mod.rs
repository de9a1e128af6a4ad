/// GitHub REST client
///
/// Only repository metadata is needed: the branch list shown when a user picks
/// which branch to snapshot.

use crate::config::GitHubConfig;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Branch {
    pub name: String,
    pub sha: String,
    pub protected: bool,
}

#[derive(Debug, Deserialize)]
struct BranchPayload {
    name: String,
    commit: CommitRef,
    #[serde(default)]
    protected: bool,
}

#[derive(Debug, Deserialize)]
struct CommitRef {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    message: String,
}

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("invalid repository name '{0}', expected owner/name")]
    InvalidRepo(String),

    #[error("repository not found or not accessible")]
    NotFound,

    #[error("GitHub rejected the request ({status}): {message}")]
    Rejected { status: StatusCode, message: String },

    #[error("RequestSend: {source}")]
    RequestSend { source: reqwest::Error },

    #[error("ResponseRead: {source}")]
    ResponseRead { source: reqwest::Error },
}

/// Split `owner/name` into its parts, checking GitHub's allowed characters
pub fn parse_repo_name(repo_name: &str) -> Result<(&str, &str), GitHubError> {
    let invalid = || GitHubError::InvalidRepo(repo_name.to_string());
    let (owner, name) = repo_name.split_once('/').ok_or_else(invalid)?;

    let valid_part = |part: &str| {
        !part.is_empty()
            && part.len() <= 100
            && part != "."
            && part != ".."
            && part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    };

    if valid_part(owner) && valid_part(name) {
        Ok((owner, name))
    } else {
        Err(invalid())
    }
}

#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    api_base: String,
    user_agent: String,
}

impl GitHubClient {
    pub fn new(client: Client, config: &GitHubConfig) -> Self {
        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
        }
    }

    /// List up to 100 branches of `owner/name`
    ///
    /// The token is optional; public repositories work without one.
    pub async fn list_branches(
        &self,
        repo_name: &str,
        token: Option<&str>,
    ) -> Result<Vec<Branch>, GitHubError> {
        let (owner, name) = parse_repo_name(repo_name)?;
        let url = format!("{}/repos/{}/{}/branches", self.api_base, owner, name);
        tracing::debug!("🌐 Fetching branches: {}", url);

        let mut request = self
            .client
            .get(&url)
            .query(&[("per_page", "100")])
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", &self.user_agent);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|source| GitHubError::RequestSend { source })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(GitHubError::NotFound);
        }

        let body = response
            .text()
            .await
            .map_err(|source| GitHubError::ResponseRead { source })?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorPayload>(&body)
                .map(|e| e.message)
                .unwrap_or(body);
            return Err(GitHubError::Rejected { status, message });
        }

        parse_branches(&body).map_err(|e| GitHubError::Rejected {
            status,
            message: format!("unexpected branches payload: {}", e),
        })
    }
}

fn parse_branches(body: &str) -> Result<Vec<Branch>, serde_json::Error> {
    let payload: Vec<BranchPayload> = serde_json::from_str(body)?;
    Ok(payload
        .into_iter()
        .map(|b| Branch {
            name: b.name,
            sha: b.commit.sha,
            protected: b.protected,
        })
        .collect())
}
