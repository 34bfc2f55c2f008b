//! GitHub App authentication transports.
//!
//! GitHub Apps authenticate in two steps:
//! 1. App JWT - short-lived RS256 JWT signed with the App's private key, used
//!    for App-level endpoints (`/app`, `/app/installations`, ...)
//! 2. Installation access token - exchanged with the App JWT for a single
//!    installation and used for everything that installation can access
//!
//! [`AppTransport`] covers the first step and [`InstallationTransport`] the
//! second. Both decorate an inner [`Transport`].

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use ghapp_core::{Error, Result, SharedTransport, Transport};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Method, Request, Response};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;

use crate::types::AccessTokenResponse;
use crate::{DEFAULT_GITHUB_URL, MACHINE_MAN_PREVIEW};

/// Tokens closer than this to expiry (seconds) are refreshed before use.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// JWT claims for GitHub App authentication.
#[derive(Debug, Serialize)]
struct AppClaims {
    /// Issued at (Unix timestamp)
    iat: i64,
    /// Expiration (Unix timestamp), at most 10 minutes ahead
    exp: i64,
    /// Issuer, the App ID
    iss: String,
}

fn authorization(scheme: &str, credential: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("{} {}", scheme, credential))
        .map_err(|_| Error::InvalidData("Credential is not a valid header value".to_string()))?;
    value.set_sensitive(true);
    Ok(value)
}

// =============================================================================
// App transport
// =============================================================================

/// Authenticates requests as the App itself with a freshly signed JWT.
pub struct AppTransport {
    inner: SharedTransport,
    app_id: u64,
    key: EncodingKey,
    base_url: String,
}

impl AppTransport {
    /// Create a transport for `app_id` from a PEM-encoded RSA private key.
    ///
    /// The key is used to sign once up front, so a key that parses as PEM but
    /// is not a usable RSA key is rejected here rather than on first request.
    pub fn new(inner: SharedTransport, app_id: u64, private_key: &[u8]) -> Result<Self> {
        let key = EncodingKey::from_rsa_pem(private_key)?;
        let transport = Self {
            inner,
            app_id,
            key,
            base_url: DEFAULT_GITHUB_URL.to_string(),
        };
        transport.jwt()?;
        Ok(transport)
    }

    /// Set the API root used for token exchange, without trailing slash.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn app_id(&self) -> u64 {
        self.app_id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Transport the App transport delegates to.
    pub fn inner(&self) -> &SharedTransport {
        &self.inner
    }

    /// Sign a new App JWT.
    pub fn jwt(&self) -> Result<String> {
        let now = Utc::now();
        let claims = AppClaims {
            // Backdated to tolerate clock drift
            iat: (now - TimeDelta::seconds(60)).timestamp(),
            exp: (now + TimeDelta::minutes(10)).timestamp(),
            iss: self.app_id.to_string(),
        };

        Ok(encode(&Header::new(Algorithm::RS256), &claims, &self.key)?)
    }
}

#[async_trait]
impl Transport for AppTransport {
    async fn execute(&self, mut request: Request) -> Result<Response> {
        let jwt = self.jwt()?;
        request
            .headers_mut()
            .insert(AUTHORIZATION, authorization("Bearer", &jwt)?);
        self.inner.execute(request).await
    }
}

// =============================================================================
// Installation transport
// =============================================================================

/// Installation access token with its expiry.
#[derive(Clone)]
pub struct AccessToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the token can still be used without refreshing.
    pub fn is_fresh(&self) -> bool {
        self.expires_at - TimeDelta::seconds(TOKEN_REFRESH_MARGIN_SECS) > Utc::now()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"***")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Authenticates requests as one installation of the App.
///
/// The access token is minted on first use through the App transport and
/// cached until it is about to expire. Each instance keeps its own cache.
pub struct InstallationTransport {
    app: Arc<AppTransport>,
    installation_id: u64,
    base_url: String,
    token: Mutex<Option<AccessToken>>,
}

impl InstallationTransport {
    /// Derive a transport for `installation_id` from an App transport.
    ///
    /// The base URL is inherited from `app`.
    pub fn from_app(app: Arc<AppTransport>, installation_id: u64) -> Self {
        let base_url = app.base_url().to_string();
        Self {
            app,
            installation_id,
            base_url,
            token: Mutex::new(None),
        }
    }

    /// Set the API root used for token exchange, without trailing slash.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn installation_id(&self) -> u64 {
        self.installation_id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current access token, minting a new one if needed.
    pub async fn token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.as_str().to_string());
        }

        let token = self.refresh().await?;
        let value = token.as_str().to_string();
        *cached = Some(token);
        Ok(value)
    }

    async fn refresh(&self) -> Result<AccessToken> {
        let endpoint = format!(
            "{}/app/installations/{}/access_tokens",
            self.base_url, self.installation_id
        );
        let url = Url::parse(&endpoint).map_err(|e| Error::invalid_base_url(&self.base_url, e))?;

        debug!(
            installation_id = self.installation_id,
            "Requesting installation access token"
        );

        let mut request = Request::new(Method::POST, url);
        request
            .headers_mut()
            .insert(ACCEPT, HeaderValue::from_static(MACHINE_MAN_PREVIEW));

        let response = self.app.execute(request).await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::from_status(status.as_u16(), message));
        }

        let body: AccessTokenResponse = response.json().await.map_err(|e| {
            Error::InvalidData(format!("Failed to parse access token response: {}", e))
        })?;

        debug!(
            installation_id = self.installation_id,
            expires_at = %body.expires_at,
            "Installation access token issued"
        );

        Ok(AccessToken::new(body.token, body.expires_at))
    }
}

#[async_trait]
impl Transport for InstallationTransport {
    async fn execute(&self, mut request: Request) -> Result<Response> {
        let token = self.token().await?;
        request
            .headers_mut()
            .insert(AUTHORIZATION, authorization("token", &token)?);
        self.app.inner().execute(request).await
    }
}
