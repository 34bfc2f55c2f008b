//! Request executor trait.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// Executes a single HTTP request.
///
/// Transports are composed as decorators: each one adjusts the outgoing
/// request (headers, URL, credentials) and hands it to the transport it wraps.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute the request and return the raw response.
    ///
    /// Non-2xx responses are not errors at this layer.
    async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response>;
}

/// Transport shared between clients and decorators.
pub type SharedTransport = Arc<dyn Transport>;
