//! Generic GitHub REST/GraphQL client over a [`SharedTransport`].

use ghapp_core::{Error, Result, SharedTransport};
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Method, Request, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::LazyLock;
use tracing::debug;
use url::Url;

use crate::types::{
    GitHubApp, GitHubInstallation, GitHubRepository, GraphQlResponse, InstallationRepositories,
};
use crate::DEFAULT_GITHUB_URL;

/// Public API root, with the trailing slash endpoints are joined onto.
static DEFAULT_BASE_URL: LazyLock<Url> = LazyLock::new(|| {
    Url::parse(&format!("{}/", DEFAULT_GITHUB_URL)).expect("Default GitHub URL is valid")
});

/// Page size for paginated listings.
const PER_PAGE: usize = 100;

/// GitHub API client.
///
/// Authentication, headers and routing are the transport's job; the client
/// only resolves endpoints against its base URL and decodes responses.
#[derive(Clone)]
pub struct GitHubClient {
    base_url: Url,
    transport: SharedTransport,
}

impl GitHubClient {
    /// Create a client for the public API.
    pub fn new(transport: SharedTransport) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.clone(),
            transport,
        }
    }

    /// Replace the base URL. It must end with a slash.
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn set_base_url(&mut self, base_url: Url) {
        self.base_url = base_url;
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve `path` against the base URL. Absolute URLs are returned as-is.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        if !self.base_url.path().ends_with('/') {
            return Err(Error::Config(format!(
                "Base URL must have a trailing slash, but '{}' does not",
                self.base_url
            )));
        }

        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::InvalidData(format!("Invalid API path '{}': {}", path, e)))
    }

    /// Build a request for `path` with an optional JSON body.
    pub fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Request> {
        build_request(method, self.endpoint(path)?, body)
    }

    /// Send a request through the transport, failing on non-2xx statuses.
    pub async fn execute(&self, request: Request) -> Result<Response> {
        let response = self.transport.execute(request).await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::from_status(status.as_u16(), message));
        }

        Ok(response)
    }

    /// Make a GET request and decode the JSON response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = self.request::<()>(Method::GET, path, None)?;
        decode(self.execute(request).await?).await
    }

    /// Make a POST request with a JSON body and decode the JSON response.
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let request = self.request(Method::POST, path, Some(body))?;
        decode(self.execute(request).await?).await
    }

    /// Run a GraphQL query and return its `data`.
    pub async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T> {
        let body = serde_json::json!({ "query": query, "variables": variables });
        let request = build_request(Method::POST, self.graphql_url()?, Some(&body))?;
        let response: GraphQlResponse<T> = decode(self.execute(request).await?).await?;

        if !response.errors.is_empty() {
            let messages: Vec<_> = response.errors.into_iter().map(|e| e.message).collect();
            return Err(Error::GraphQl(messages.join("; ")));
        }

        response
            .data
            .ok_or_else(|| Error::InvalidData("GraphQL response has no data".to_string()))
    }

    /// GraphQL lives at `/api/graphql` next to Enterprise's `/api/v3/`.
    fn graphql_url(&self) -> Result<Url> {
        match self.base_url.path().strip_suffix("/api/v3/") {
            Some(prefix) => {
                let mut url = self.base_url.clone();
                url.set_path(&format!("{}/api/graphql", prefix));
                Ok(url)
            }
            None => self.endpoint("graphql"),
        }
    }

    // =========================================================================
    // App endpoints (App JWT)
    // =========================================================================

    /// Get the authenticated App.
    pub async fn get_app(&self) -> Result<GitHubApp> {
        self.get("app").await
    }

    /// List every installation of the authenticated App.
    pub async fn list_installations(&self) -> Result<Vec<GitHubInstallation>> {
        let mut installations = Vec::new();
        let mut page = 1;

        loop {
            let batch: Vec<GitHubInstallation> = self
                .get(&format!("app/installations?per_page={}&page={}", PER_PAGE, page))
                .await?;
            let done = batch.len() < PER_PAGE;
            installations.extend(batch);
            if done {
                break;
            }
            page += 1;
        }

        debug!(count = installations.len(), "Listed installations");
        Ok(installations)
    }

    /// Get a single installation of the authenticated App.
    pub async fn get_installation(&self, installation_id: u64) -> Result<GitHubInstallation> {
        self.get(&format!("app/installations/{}", installation_id))
            .await
    }

    // =========================================================================
    // Installation endpoints (installation token)
    // =========================================================================

    /// List every repository the installation can access.
    pub async fn list_installation_repositories(&self) -> Result<Vec<GitHubRepository>> {
        let mut repositories = Vec::new();
        let mut page = 1;

        loop {
            let batch: InstallationRepositories = self
                .get(&format!(
                    "installation/repositories?per_page={}&page={}",
                    PER_PAGE, page
                ))
                .await?;
            let done = batch.repositories.len() < PER_PAGE
                || repositories.len() + batch.repositories.len() >= batch.total_count as usize;
            repositories.extend(batch.repositories);
            if done {
                break;
            }
            page += 1;
        }

        debug!(count = repositories.len(), "Listed installation repositories");
        Ok(repositories)
    }
}

fn build_request<B: Serialize + ?Sized>(
    method: Method,
    url: Url,
    body: Option<&B>,
) -> Result<Request> {
    let mut request = Request::new(method, url);
    if let Some(body) = body {
        let bytes = serde_json::to_vec(body)?;
        request
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        *request.body_mut() = Some(bytes.into());
    }
    Ok(request)
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| Error::InvalidData(format!("Failed to parse response: {}", e)))
}
