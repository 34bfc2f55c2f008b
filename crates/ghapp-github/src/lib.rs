//! GitHub App client for ghapp-tools.
//!
//! Builds an App-level API client from the App's ID and private key, and
//! derives installation-scoped clients from it. Every request carries the
//! machine-man preview media type and targets the configured API root, which
//! may be a GitHub Enterprise endpoint.
//!
//! # Example
//!
//! ```ignore
//! use ghapp_github::Client;
//!
//! let pem = std::fs::read("app.pem")?;
//! let client = Client::new(12345, &pem, "https://ghe.example.com/api/v3", false)?;
//!
//! let app = client.get_app().await?;
//! let installation = client.installation(678);
//! let repos = installation.list_installation_repositories().await?;
//! ```

mod api;
mod auth;
mod client;
mod transport;
mod types;

#[cfg(test)]
mod testing;

pub use api::GitHubClient;
pub use auth::{AccessToken, AppTransport, InstallationTransport};
pub use client::Client;
pub use transport::{AcceptHeaderTransport, BaseUrlTransport, HttpTransport};
pub use types::*;

/// Default GitHub API URL.
pub const DEFAULT_GITHUB_URL: &str = "https://api.github.com";

/// Media type forced onto every request.
pub const MACHINE_MAN_PREVIEW: &str = "application/vnd.github.machine-man-preview+json";

/// User agent sent by the low-level transport.
pub const USER_AGENT: &str = "ghapp-tools";
