//! App-level client and installation client factory.

use std::ops::Deref;
use std::sync::Arc;

use ghapp_core::{reject_control_characters, AppConfig, Error, Result, SharedTransport};
use tracing::{debug, info};
use url::Url;

use crate::api::GitHubClient;
use crate::auth::{AppTransport, InstallationTransport};
use crate::transport::{AcceptHeaderTransport, BaseUrlTransport, HttpTransport};
use crate::DEFAULT_GITHUB_URL;

/// GitHub client authenticated as a GitHub App, able to act on behalf of any
/// of its installations.
///
/// Dereferences to the App-level [`GitHubClient`].
pub struct Client {
    api: GitHubClient,
    transport: Arc<AppTransport>,
    http: Arc<HttpTransport>,
}

impl Client {
    /// Create a client for the App `app_id`.
    ///
    /// `base_url` is the API root (e.g. `https://ghe.example.com/api/v3`); an
    /// empty string selects the public API. With `insecure_skip_verify` TLS
    /// certificates are not verified.
    ///
    /// The base URL is checked before the private key.
    pub fn new(
        app_id: u64,
        private_key: &[u8],
        base_url: &str,
        insecure_skip_verify: bool,
    ) -> Result<Self> {
        reject_control_characters(base_url)?;
        let (auth_base_url, api_base_url) = normalize_base_url(base_url);
        let api_base_url =
            Url::parse(&api_base_url).map_err(|e| Error::invalid_base_url(base_url, e))?;

        let http = Arc::new(HttpTransport::new(insecure_skip_verify)?);
        let routed: SharedTransport = Arc::new(BaseUrlTransport::new(
            http.clone(),
            auth_base_url.clone().unwrap_or_default(),
        ));

        let mut app = AppTransport::new(routed, app_id, private_key)?;
        if let Some(auth_base_url) = auth_base_url {
            app = app.with_base_url(auth_base_url);
        }
        let transport = Arc::new(app);

        let api = GitHubClient::new(Arc::new(AcceptHeaderTransport::new(transport.clone())))
            .with_base_url(api_base_url);

        info!(app_id, base_url = %api.base_url(), "GitHub App client created");

        Ok(Self {
            api,
            transport,
            http,
        })
    }

    /// Create a client from configuration, reading the private key from disk.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let private_key = config.read_private_key()?;
        Self::new(
            config.app_id,
            &private_key,
            config.base_url_or_default(),
            config.insecure_skip_verify,
        )
    }

    /// Transport authenticating as the App.
    pub fn app_transport(&self) -> &Arc<AppTransport> {
        &self.transport
    }

    pub fn app_id(&self) -> u64 {
        self.transport.app_id()
    }

    /// Whether TLS certificate verification is disabled.
    pub fn accepts_invalid_certs(&self) -> bool {
        self.http.accepts_invalid_certs()
    }

    /// Derive a transport authenticating as `installation_id`.
    pub fn installation_transport(&self, installation_id: u64) -> InstallationTransport {
        let base_url = self.api.base_url().as_str();
        InstallationTransport::from_app(Arc::clone(&self.transport), installation_id)
            .with_base_url(base_url.strip_suffix('/').unwrap_or(base_url))
    }

    /// Create a client acting as `installation_id`.
    ///
    /// Every call returns a new client with its own token cache.
    pub fn installation(&self, installation_id: u64) -> GitHubClient {
        let transport = self.installation_transport(installation_id);
        debug!(installation_id, "Creating installation client");

        GitHubClient::new(Arc::new(AcceptHeaderTransport::new(Arc::new(transport))))
            .with_base_url(self.api.base_url().clone())
    }
}

impl Deref for Client {
    type Target = GitHubClient;

    fn deref(&self) -> &GitHubClient {
        &self.api
    }
}

/// Split a base URL into the form used for token exchange (no trailing
/// slash, `None` for the public API) and the API client form (trailing slash).
fn normalize_base_url(base_url: &str) -> (Option<String>, String) {
    if base_url.is_empty() {
        return (None, format!("{}/", DEFAULT_GITHUB_URL));
    }

    let auth_base_url = base_url.strip_suffix('/').unwrap_or(base_url).to_string();
    let api_base_url = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{}/", base_url)
    };

    (Some(auth_base_url), api_base_url)
}
