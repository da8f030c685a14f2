//! HTTP transport for Overpass queries

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use trajexp_core::error::{ExposureError, Result};

/// Failure of a single request attempt
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The request could not be built, e.g. a malformed endpoint URL
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Timeouts, connection failures, 5xx, 408 and 429 may succeed on retry
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Timeout | TransportError::Connection(_) => true,
            TransportError::Status { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            TransportError::InvalidRequest(_) => false,
        }
    }
}

/// Sends one Overpass query and returns the raw response body
#[async_trait]
pub trait OverpassTransport: Send + Sync {
    async fn execute(&self, endpoint: &str, query: &str) -> std::result::Result<String, TransportError>;
}

/// `reqwest`-backed transport posting the query as the `data` form field
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("trajexp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ExposureError::ConfigInvalid {
                key: "fetchTimeoutSeconds".to_string(),
                reason: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_builder() {
        TransportError::InvalidRequest(error.to_string())
    } else if error.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Connection(error.to_string())
    }
}

#[async_trait]
impl OverpassTransport for ReqwestTransport {
    async fn execute(&self, endpoint: &str, query: &str) -> std::result::Result<String, TransportError> {
        let response = self
            .client
            .post(endpoint)
            .form(&[("data", query)])
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status { status: status.as_u16(), body });
        }

        response.text().await.map_err(classify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(TransportError::Timeout.is_transient());
        assert!(TransportError::Connection("reset".into()).is_transient());
        assert!(TransportError::Status { status: 504, body: String::new() }.is_transient());
        assert!(TransportError::Status { status: 429, body: String::new() }.is_transient());
        assert!(!TransportError::Status { status: 400, body: String::new() }.is_transient());
        assert!(!TransportError::Status { status: 404, body: String::new() }.is_transient());
        assert!(!TransportError::InvalidRequest("bad url".into()).is_transient());
    }

    #[tokio::test]
    async fn test_malformed_endpoint_is_not_transient() {
        let transport = ReqwestTransport::new(Duration::from_secs(1)).unwrap();
        let err = transport.execute("not a url", "q").await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest(_)), "got {:?}", err);
        assert!(!err.is_transient());
    }
}
