//! HTTP transport for finished payloads.
//!
//! [`Transport`] is the seam between the client and the network. The default
//! [`HttpTransport`] performs an authenticated JSON POST with `reqwest`.
//! Requests are never retried.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::{NebulyError, Result};

/// Delivery of JSON payloads to the collection endpoints
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `body` to `url` with a bearer token, returning the parsed response body
    async fn post(&self, url: &str, body: &Value, api_key: &str) -> Result<Value>;
}

/// `reqwest`-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with an optional request timeout
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut client_builder = Client::builder();

        if let Some(timeout) = timeout {
            client_builder = client_builder.timeout(timeout);
        }

        let client = client_builder
            .build()
            .map_err(|e| NebulyError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, url: &str, body: &Value, api_key: &str) -> Result<Value> {
        debug!(url = url, "Posting payload");

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(NebulyError::ApiError {
                status: status.as_u16(),
                body: text,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_post_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/events")
            .match_header("authorization", "Bearer test-key")
            .match_header("content-type", "application/json")
            .match_body(mockito::Matcher::Json(json!({"hello": "world"})))
            .with_status(200)
            .with_body(r#"{"status":"ok"}"#)
            .create_async()
            .await;

        let transport = HttpTransport::new(None).unwrap();
        let url = format!("{}/events", server.url());
        let result = transport.post(&url, &json!({"hello": "world"}), "test-key").await;

        mock.assert_async().await;
        assert_eq!(result.unwrap(), json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_post_empty_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/events").with_status(204).create_async().await;

        let transport = HttpTransport::new(None).unwrap();
        let url = format!("{}/events", server.url());
        let result = transport.post(&url, &json!({}), "test-key").await;

        mock.assert_async().await;
        assert_eq!(result.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_post_error_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/events")
            .with_status(401)
            .with_body("Unauthorized")
            .create_async()
            .await;

        let transport = HttpTransport::new(None).unwrap();
        let url = format!("{}/events", server.url());
        let result = transport.post(&url, &json!({}), "bad-key").await;

        mock.assert_async().await;
        match result {
            Err(NebulyError::ApiError { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "Unauthorized");
            }
            other => panic!("Expected ApiError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_post_invalid_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/events")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let transport = HttpTransport::new(None).unwrap();
        let url = format!("{}/events", server.url());
        let result = transport.post(&url, &json!({}), "test-key").await;

        mock.assert_async().await;
        assert!(matches!(result, Err(NebulyError::SerializationError(_))));
    }

    #[tokio::test]
    async fn test_post_network_error() {
        let transport = HttpTransport::new(Some(Duration::from_secs(2))).unwrap();
        let result = transport.post("http://127.0.0.1:1/events", &json!({}), "key").await;

        assert!(matches!(result, Err(NebulyError::HttpError(_))));
    }
}
