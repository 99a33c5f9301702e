//! Access-token refresh

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use crate::error::{GqlError, GqlResult};
use crate::transport::{Transport, TransportRequest};

/// Obtains a new access token
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh_token(&self) -> GqlResult<String>;
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    result: Option<RefreshResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResult {
    access_token: Option<String>,
}

/// Calls the auth service's refresh endpoint, which answers
/// `{"result": {"accessToken": "..."}}`
///
/// The refresh credential travels as a cookie held by the transport.
pub struct HttpTokenRefresher {
    transport: Arc<dyn Transport>,
    path: String,
}

impl HttpTokenRefresher {
    pub fn new(transport: Arc<dyn Transport>, path: impl Into<String>) -> Self {
        Self {
            transport,
            path: path.into(),
        }
    }
}

#[async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh_token(&self) -> GqlResult<String> {
        debug!(path = %self.path, "Requesting new access token");

        let bytes = self
            .transport
            .post(TransportRequest::json(self.path.clone(), json!({})))
            .await
            .map_err(|e| {
                GqlError::Refresh(GqlError::from_transport(e, self.transport.base_url()).to_string())
            })?;

        let response: RefreshResponse = serde_json::from_slice(&bytes)
            .map_err(|e| GqlError::Refresh(format!("Malformed refresh response: {}", e)))?;

        response
            .result
            .and_then(|r| r.access_token)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| GqlError::Refresh("Refresh response contained no access token".to_string()))
    }
}
