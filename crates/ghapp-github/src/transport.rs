//! Request executors that decorate one another.

use async_trait::async_trait;
use ghapp_core::{reject_control_characters, Error, Result, SharedTransport, Transport};
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::{Request, Response};
use tracing::debug;
use url::Url;

use crate::{MACHINE_MAN_PREVIEW, USER_AGENT};

/// Innermost transport: sends requests over the network with reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
    insecure_skip_verify: bool,
}

impl HttpTransport {
    /// Create a transport, optionally skipping TLS certificate verification.
    ///
    /// The flag is handed to reqwest's `danger_accept_invalid_certs` as is.
    pub fn new(insecure_skip_verify: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(insecure_skip_verify)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            client,
            insecure_skip_verify,
        })
    }

    /// Whether invalid TLS certificates are accepted.
    pub fn accepts_invalid_certs(&self) -> bool {
        self.insecure_skip_verify
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: Request) -> Result<Response> {
        debug!(method = %request.method(), url = %request.url(), "GitHub request");

        self.client
            .execute(request)
            .await
            .map_err(|e| Error::Http(e.to_string()))
    }
}

/// Forces the `Accept` header to [`MACHINE_MAN_PREVIEW`] on every request.
pub struct AcceptHeaderTransport {
    inner: SharedTransport,
}

impl AcceptHeaderTransport {
    pub fn new(inner: SharedTransport) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Transport for AcceptHeaderTransport {
    async fn execute(&self, mut request: Request) -> Result<Response> {
        // insert() drops every previous value for the header
        request
            .headers_mut()
            .insert(ACCEPT, HeaderValue::from_static(MACHINE_MAN_PREVIEW));
        self.inner.execute(request).await
    }
}

/// Points every request at the scheme and host of a configured base URL.
///
/// Path and query are left untouched. An empty base URL disables rewriting.
pub struct BaseUrlTransport {
    inner: SharedTransport,
    base_url: String,
}

impl BaseUrlTransport {
    pub fn new(inner: SharedTransport, base_url: impl Into<String>) -> Self {
        Self {
            inner,
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for BaseUrlTransport {
    async fn execute(&self, mut request: Request) -> Result<Response> {
        if !self.base_url.is_empty() {
            reject_control_characters(&self.base_url)?;
            let base = Url::parse(&self.base_url)
                .map_err(|e| Error::invalid_base_url(&self.base_url, e))?;
            rewrite_origin(request.url_mut(), &base)?;
        }
        self.inner.execute(request).await
    }
}

/// Copy scheme, host and port from `base` onto `target`.
fn rewrite_origin(target: &mut Url, base: &Url) -> Result<()> {
    let from = target.scheme().to_string();
    target.set_scheme(base.scheme()).map_err(|_| {
        Error::Config(format!(
            "Cannot switch request scheme from '{}' to '{}'",
            from,
            base.scheme()
        ))
    })?;
    target
        .set_host(base.host_str())
        .map_err(|e| Error::invalid_base_url(base.as_str(), e))?;
    target
        .set_port(base.port())
        .map_err(|_| Error::Config(format!("Cannot set port from base URL '{}'", base)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ok_response, MockInner};
    use ghapp_core::BaseUrlError;
    use reqwest::Method;
    use std::sync::Arc;

    fn request(url: &str) -> Request {
        Request::new(Method::GET, Url::parse(url).unwrap())
    }

    #[test]
    fn test_http_transport_tls_flag() {
        assert!(HttpTransport::new(true).unwrap().accepts_invalid_certs());
        assert!(!HttpTransport::new(false).unwrap().accepts_invalid_certs());
    }

    #[tokio::test]
    async fn test_accept_header_is_set() {
        let mut inner = MockInner::new();
        inner
            .expect_execute()
            .withf(|req| req.headers().get(ACCEPT).unwrap() == MACHINE_MAN_PREVIEW)
            .times(1)
            .returning(|_| Ok(ok_response()));

        let transport = AcceptHeaderTransport::new(Arc::new(inner));
        let response = transport
            .execute(request("https://api.github.com/app"))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_accept_header_overwrites_caller_value() {
        let mut inner = MockInner::new();
        inner
            .expect_execute()
            .withf(|req| {
                let values: Vec<_> = req.headers().get_all(ACCEPT).iter().collect();
                values == [MACHINE_MAN_PREVIEW]
            })
            .times(1)
            .returning(|_| Ok(ok_response()));

        let mut req = request("https://api.github.com/app");
        req.headers_mut()
            .append(ACCEPT, HeaderValue::from_static("text/html"));
        req.headers_mut()
            .append(ACCEPT, HeaderValue::from_static("application/json"));

        let transport = AcceptHeaderTransport::new(Arc::new(inner));
        transport.execute(req).await.unwrap();
    }

    #[tokio::test]
    async fn test_accept_header_returns_inner_error_unchanged() {
        let mut inner = MockInner::new();
        inner
            .expect_execute()
            .returning(|_| Err(Error::Http("connection reset".to_string())));

        let transport = AcceptHeaderTransport::new(Arc::new(inner));
        let err = transport
            .execute(request("https://api.github.com/app"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Http(msg) if msg == "connection reset"));
    }

    #[tokio::test]
    async fn test_base_url_rewrites_scheme_and_host() {
        let mut inner = MockInner::new();
        inner
            .expect_execute()
            .withf(|req| {
                req.url().as_str() == "http://ghe.example.com:8080/repos/o/r/issues?state=open&page=2"
            })
            .times(1)
            .returning(|_| Ok(ok_response()));

        let transport = BaseUrlTransport::new(Arc::new(inner), "http://ghe.example.com:8080/api/v3");
        transport
            .execute(request(
                "https://api.github.com/repos/o/r/issues?state=open&page=2",
            ))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_base_url_drops_port_when_base_has_none() {
        let mut inner = MockInner::new();
        inner
            .expect_execute()
            .withf(|req| req.url().as_str() == "https://ghe.example.com/app")
            .times(1)
            .returning(|_| Ok(ok_response()));

        let transport = BaseUrlTransport::new(Arc::new(inner), "https://ghe.example.com");
        transport
            .execute(request("http://127.0.0.1:9000/app"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_empty_base_url_is_pass_through() {
        let mut inner = MockInner::new();
        inner
            .expect_execute()
            .withf(|req| req.url().as_str() == "https://api.github.com/app/installations")
            .times(1)
            .returning(|_| Ok(ok_response()));

        let transport = BaseUrlTransport::new(Arc::new(inner), "");
        assert_eq!(transport.base_url(), "");
        transport
            .execute(request("https://api.github.com/app/installations"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unparsable_base_url_fails_request() {
        let mut inner = MockInner::new();
        inner.expect_execute().never();

        let transport = BaseUrlTransport::new(Arc::new(inner), "not a url");
        let err = transport
            .execute(request("https://api.github.com/app"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidBaseUrl { .. }));
    }

    #[tokio::test]
    async fn test_base_url_with_control_characters_fails_request() {
        for base_url in ["https://ghe.example.com\n", "https://ghe.\texample.com"] {
            let mut inner = MockInner::new();
            inner.expect_execute().never();

            let transport = BaseUrlTransport::new(Arc::new(inner), base_url);
            let err = transport
                .execute(request("https://api.github.com/app"))
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                Error::InvalidBaseUrl {
                    source: BaseUrlError::ControlCharacter { .. },
                    ..
                }
            ));
        }
    }

    #[tokio::test]
    async fn test_decorators_compose() {
        let mut inner = MockInner::new();
        inner
            .expect_execute()
            .withf(|req| {
                req.url().as_str() == "https://ghe.example.com/api/v3/app"
                    && req.headers().get(ACCEPT).unwrap() == MACHINE_MAN_PREVIEW
            })
            .times(1)
            .returning(|_| Ok(ok_response()));

        let base = BaseUrlTransport::new(Arc::new(inner), "https://ghe.example.com");
        let transport = AcceptHeaderTransport::new(Arc::new(base));
        transport
            .execute(request("https://api.github.com/api/v3/app"))
            .await
            .unwrap();
    }
}
