//! GitHub REST client for organization repositories.
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use serde::Serialize;
use urlencoding::encode;

use crate::errors::{DroverError, DroverErrorKind};

/// GitHub API URL.
const GITHUB_API_URL: &str = "https://api.github.com";

/// GitHub API Header.
const GITHUB_API_HEADER: &str = "X-GitHub-Api-Version";

/// GitHub API Version.
const GITHUB_API_VERSION: &str = "2022-11-28";

/// Repository-creation payload.
#[derive(Serialize, Debug)]
struct CreateRepoPayload<'a> {
    /// Repository name.
    name: &'a str,

    /// Repository description.
    description: &'a str,

    /// Whether the repository is private.
    private: bool,

    /// Whether issues are enabled.
    has_issues: bool,

    /// Whether projects are enabled.
    has_projects: bool,

    /// Whether the wiki is enabled.
    has_wiki: bool,
}

/// GitHub client authenticated with a bearer token.
#[derive(Debug, Clone)]
pub struct GithubClient {
    /// API base URL.
    api_url: String,

    /// GitHub token.
    token: String,

    /// Reqwest client.
    client: reqwest::Client,
}

impl GithubClient {
    /// Create a client against the public GitHub API.
    pub fn new(token: String) -> Self {
        Self::with_api_url(GITHUB_API_URL.to_string(), token)
    }

    /// Create a client against a custom API base URL.
    pub fn with_api_url(api_url: String, token: String) -> Self {
        Self {
            api_url,
            token,
            client: reqwest::Client::new(),
        }
    }

    /// Create a private repository in `org`. Succeeds on 201 only.
    pub async fn create_repo(&self, org: &str, name: &str) -> Result<(), DroverError> {
        let url = format!("{}/orgs/{}/repos", self.api_url, encode(org));
        let payload = CreateRepoPayload {
            name,
            description: "Migrated from Bitbucket",
            private: true,
            has_issues: true,
            has_projects: true,
            has_wiki: true,
        };
        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, "git-drover")
            .header(GITHUB_API_HEADER, GITHUB_API_VERSION)
            .json(&payload)
            .send()
            .await?;
        expect_status(response, StatusCode::CREATED, &format!("create {name}"))
            .await
            .map(|_| ())
    }

    /// Delete `org/name`. Succeeds on 204 only.
    pub async fn delete_repo(&self, org: &str, name: &str) -> Result<(), DroverError> {
        let url = format!("{}/repos/{}/{}", self.api_url, encode(org), encode(name));
        let response = self
            .client
            .delete(&url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, "git-drover")
            .header(GITHUB_API_HEADER, GITHUB_API_VERSION)
            .send()
            .await?;
        expect_status(response, StatusCode::NO_CONTENT, &format!("delete {name}"))
            .await
            .map(|_| ())
    }
}

/// Pass the response through unless its status differs from `expected`.
///
/// 5xx responses are marked transient for the retry loop; anything else
/// (bad token, missing org, name collision) is permanent.
pub(crate) async fn expect_status(
    response: reqwest::Response,
    expected: StatusCode,
    action: &str,
) -> Result<reqwest::Response, DroverError> {
    let status = response.status();
    if status == expected {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let err = DroverError::new(DroverErrorKind::Http).with_text(&format!(
        "{action}: status_code {status}, response_text: {body}"
    ));
    if status.is_server_error() {
        Err(err.transient())
    } else {
        Err(err)
    }
}

/// Repository creation as an orchestrated operation.
pub struct CreateRepoOp {
    /// Shared GitHub client.
    client: std::sync::Arc<GithubClient>,

    /// Organization name.
    org: String,

    /// Repository name.
    name: String,
}

impl CreateRepoOp {
    /// Create the operation for one repository.
    pub fn new(client: std::sync::Arc<GithubClient>, org: String, name: String) -> Self {
        Self { client, org, name }
    }
}

impl crate::runner::ExternalOp for CreateRepoOp {
    fn attempt(
        &self,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<(), DroverError>> + Send + '_>,
    > {
        Box::pin(async move {
            self.client.create_repo(&self.org, &self.name).await?;
            log::info!("Repository {} created successfully", self.name);
            Ok(())
        })
    }
}

/// Repository deletion as an orchestrated operation.
pub struct DeleteRepoOp {
    /// Shared GitHub client.
    client: std::sync::Arc<GithubClient>,

    /// Organization name.
    org: String,

    /// Repository name.
    name: String,
}

impl DeleteRepoOp {
    /// Create the operation for one repository.
    pub fn new(client: std::sync::Arc<GithubClient>, org: String, name: String) -> Self {
        Self { client, org, name }
    }
}

impl crate::runner::ExternalOp for DeleteRepoOp {
    fn attempt(
        &self,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<(), DroverError>> + Send + '_>,
    > {
        Box::pin(async move {
            self.client.delete_repo(&self.org, &self.name).await?;
            log::info!("Repository {} deleted successfully", self.name);
            Ok(())
        })
    }
}
