//! Bitbucket Server REST client for listing project repositories.
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::time::sleep;
use urlencoding::encode;

use crate::backoff::BackoffPolicy;
use crate::errors::DroverError;
use crate::github::expect_status;

/// Page size for repository listing.
const PAGE_LIMIT: u32 = 1000;

/// One page of the repository listing.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RepoPage {
    /// Repositories on this page.
    values: Vec<BitbucketRepo>,

    /// Whether this is the last page.
    is_last_page: bool,

    /// Offset of the next page, when there is one.
    next_page_start: Option<u32>,
}

/// One repository entry.
#[derive(Deserialize, Debug)]
struct BitbucketRepo {
    /// Repository name.
    name: String,

    /// Link collections.
    links: RepoLinks,
}

/// Link collections of a repository entry.
#[derive(Deserialize, Debug)]
struct RepoLinks {
    /// Clone links, one per protocol.
    clone: Vec<CloneLink>,
}

/// One clone link.
#[derive(Deserialize, Debug)]
struct CloneLink {
    /// Protocol name (`ssh` or `http`).
    name: String,

    /// Clone URL.
    href: String,
}

/// Bitbucket Server client authenticated with a bearer token.
#[derive(Debug, Clone)]
pub struct BitbucketClient {
    /// Server base URL.
    base_url: String,

    /// Bitbucket token.
    token: String,

    /// Retry budget for transient responses.
    attempts: u32,

    /// Delay policy between retries.
    backoff: BackoffPolicy,

    /// Reqwest client.
    client: reqwest::Client,
}

impl BitbucketClient {
    /// Create a client for the server at `base_url`.
    pub fn new(base_url: String, token: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            attempts: 4,
            backoff: BackoffPolicy::default().with_jitter(0.2),
            client: reqwest::Client::new(),
        }
    }

    /// Override the retry budget and backoff.
    pub fn with_retry(mut self, attempts: u32, backoff: BackoffPolicy) -> Self {
        self.attempts = attempts;
        self.backoff = backoff;
        self
    }

    /// List the SSH clone URLs of every repository in `project_key`.
    ///
    /// Pages through the listing endpoint; each page expects a 200 and is
    /// retried with backoff on 5xx or connection failures.
    pub async fn list_clone_urls(&self, project_key: &str) -> Result<Vec<String>, DroverError> {
        let url = format!(
            "{}/rest/api/1.0/projects/{}/repos",
            self.base_url,
            encode(project_key)
        );
        let mut urls = vec![];
        let mut start: u32 = 0;
        loop {
            let page = self.fetch_page(&url, start).await?;
            log::info!(
                "Requested bitbucket (start {start}): {} repos",
                page.values.len()
            );
            for repo in &page.values {
                match repo.links.clone.iter().find(|link| link.name == "ssh") {
                    Some(link) => urls.push(link.href.clone()),
                    None => log::warn!("{}: no ssh clone link, skipping", repo.name),
                }
            }
            if page.is_last_page {
                break;
            }
            start = match page.next_page_start {
                Some(next) => next,
                None => break,
            };
        }
        Ok(urls)
    }

    /// Fetch one listing page, retrying transient failures.
    async fn fetch_page(&self, url: &str, start: u32) -> Result<RepoPage, DroverError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetch_page_once(url, start).await {
                Ok(page) => return Ok(page),
                Err(e) if e.is_transient() && attempt < self.attempts => {
                    let duration = self.backoff.jittered(attempt);
                    log::info!(
                        "repo list: backing off {:.1}s, try {attempt}...",
                        duration.as_secs_f64()
                    );
                    sleep(duration).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Fetch one listing page without retrying.
    async fn fetch_page_once(&self, url: &str, start: u32) -> Result<RepoPage, DroverError> {
        let response = self
            .client
            .get(url)
            .query(&[
                ("limit", PAGE_LIMIT.to_string()),
                ("start", start.to_string()),
            ])
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let response = expect_status(response, StatusCode::OK, "repo list").await?;
        let text = response.text().await?;
        let page: RepoPage = serde_json::from_str(&text)?;
        Ok(page)
    }
}
