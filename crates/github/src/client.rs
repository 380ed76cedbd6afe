//! REST client for the issue comments endpoint.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, info};
use url::Url;

use crate::error::{Error, Result};
use crate::issue::IssueRef;
use crate::sender::CommentSender;

/// Public GitHub API root.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Sent with every request; GitHub rejects requests without one.
pub const DEFAULT_USER_AGENT: &str = concat!("herald/", env!("CARGO_PKG_VERSION"));

const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";
const API_VERSION_HEADER: &str = "x-github-api-version";
const API_VERSION: &str = "2022-11-28";

/// Connection settings for [`GithubClient`].
#[derive(Clone)]
pub struct GithubConfig {
    pub api_base: Url,
    pub token: String,
    pub user_agent: String,
    /// Per-request timeout enforced by the HTTP client.
    pub timeout: Duration,
}

impl GithubConfig {
    /// # Errors
    ///
    /// Returns an error if the built-in API base fails to parse.
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let api_base =
            Url::parse(DEFAULT_API_BASE).map_err(|_| Error::invalid_base_url(DEFAULT_API_BASE))?;
        Ok(Self {
            api_base,
            token: token.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
        })
    }

    #[must_use]
    pub fn with_api_base(mut self, api_base: Url) -> Self {
        self.api_base = api_base;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubConfig")
            .field("api_base", &self.api_base.as_str())
            .field("token", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Posts issue comments through the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GithubClient {
    config: GithubConfig,
    http: reqwest::Client,
}

impl GithubClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: GithubConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_MEDIA_TYPE));
        headers.insert(API_VERSION_HEADER, HeaderValue::from_static(API_VERSION));
        let agent = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| Error::client_init(format!("invalid user agent: {e}")))?;
        headers.insert(USER_AGENT, agent);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::client_init(e.to_string()))?;

        info!(api_base = %config.api_base, "GitHub client ready");
        Ok(Self { config, http })
    }

    /// `{api_base}/repos/{owner}/{repo}/issues/{number}/comments`
    ///
    /// # Errors
    ///
    /// Returns an error if the API base cannot have path segments.
    pub fn comments_url(&self, target: &IssueRef) -> Result<Url> {
        let mut url = self.config.api_base.clone();
        let number = target.number.to_string();
        url.path_segments_mut()
            .map_err(|()| Error::invalid_base_url(self.config.api_base.as_str()))?
            .pop_if_empty()
            .extend([
                "repos",
                target.owner.as_str(),
                target.repo.as_str(),
                "issues",
                number.as_str(),
                "comments",
            ]);
        Ok(url)
    }
}

#[async_trait]
impl CommentSender for GithubClient {
    async fn send(&self, target: &IssueRef, body: &str) -> Result<()> {
        let url = self.comments_url(target)?;
        debug!(target = %target, "Posting comment");

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.config.token)
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::api(status.as_u16(), detail));
        }

        info!(target = %target, status = status.as_u16(), "Comment posted");
        Ok(())
    }
}
