//! Test doubles shared by unit tests.

use async_trait::async_trait;
use ghapp_core::{Result, Transport};
use mockall::mock;

mock! {
    pub Inner {}

    #[async_trait]
    impl Transport for Inner {
        async fn execute(&self, request: reqwest::Request) -> Result<reqwest::Response>;
    }
}

/// Empty 200 response.
pub fn ok_response() -> reqwest::Response {
    json_response(200, "{}")
}

/// Response with the given status and JSON body.
pub fn json_response(status: u16, body: &str) -> reqwest::Response {
    http::Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(body.to_string())
        .unwrap()
        .into()
}
