//! GitHub API response types.
//!
//! These types represent the raw JSON responses from the GitHub API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// App
// =============================================================================

/// The authenticated GitHub App (`GET /app`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubApp {
    pub id: u64,
    #[serde(default)]
    pub slug: Option<String>,
    pub name: String,
    #[serde(default)]
    pub owner: Option<GitHubAccount>,
    #[serde(default)]
    pub description: Option<String>,
    pub html_url: String,
    #[serde(default)]
    pub installations_count: Option<u64>,
}

/// User or organization owning an App or installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubAccount {
    pub id: u64,
    pub login: String,
    #[serde(rename = "type", default)]
    pub account_type: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

// =============================================================================
// Installation
// =============================================================================

/// An installation of the App on a user or organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubInstallation {
    pub id: u64,
    #[serde(default)]
    pub account: Option<GitHubAccount>,
    #[serde(default)]
    pub app_id: Option<u64>,
    #[serde(default)]
    pub target_type: Option<String>,
    #[serde(default)]
    pub repository_selection: Option<String>,
    #[serde(default)]
    pub permissions: serde_json::Value,
    #[serde(default)]
    pub events: Vec<String>,
    #[serde(default)]
    pub suspended_at: Option<String>,
}

/// Response of `POST /app/installations/{id}/access_tokens`.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessTokenResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub permissions: serde_json::Value,
    #[serde(default)]
    pub repository_selection: Option<String>,
}

// =============================================================================
// Repository
// =============================================================================

/// A repository visible to an installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRepository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub private: bool,
    pub html_url: String,
    #[serde(default)]
    pub default_branch: Option<String>,
}

/// Response of `GET /installation/repositories`.
#[derive(Debug, Clone, Deserialize)]
pub struct InstallationRepositories {
    pub total_count: u64,
    pub repositories: Vec<GitHubRepository>,
}

// =============================================================================
// GraphQL
// =============================================================================

/// GraphQL response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlError {
    pub message: String,
}
