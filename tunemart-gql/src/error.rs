//! Error types for the GraphQL client

use thiserror::Error;

use crate::operation::GraphqlError;
use crate::transport::TransportError;

/// Result type for client operations
pub type GqlResult<T> = std::result::Result<T, GqlError>;

/// GraphQL client errors
#[derive(Debug, Error)]
pub enum GqlError {
    /// Server answered with a non-2xx status
    #[error("HTTP Error {status}: {status_text} - {body}")]
    Http {
        status: u16,
        status_text: String,
        body: String,
    },

    /// Request was sent but no response came back
    #[error("Network Error: No response received from server at {endpoint} ({detail})")]
    Network { endpoint: String, detail: String },

    /// Request could not be built
    #[error("Request Setup Error: {0}")]
    Setup(String),

    /// Transport returned an empty body
    #[error("Network error: empty response from GraphQL server")]
    EmptyResponse,

    /// Server returned a non-empty `errors` array
    #[error("GraphQL errors: {}", join_messages(.errors))]
    Graphql { errors: Vec<GraphqlError> },

    /// Response did not follow the GraphQL response format
    #[error("GraphQL protocol error: {0}")]
    Protocol(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Session could not be recovered after an auth failure
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Token refresh call failed
    #[error("Token refresh failed: {0}")]
    Refresh(String),

    /// Session storage failure
    #[error("Session error: {0}")]
    Session(String),
}

fn join_messages(errors: &[GraphqlError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl GqlError {
    /// Map a transport failure, naming the endpoint for network failures
    pub fn from_transport(err: TransportError, endpoint: &str) -> Self {
        match err {
            TransportError::Http {
                status,
                status_text,
                body,
            } => Self::Http {
                status,
                status_text,
                body,
            },
            TransportError::Network { detail } => Self::Network {
                endpoint: endpoint.to_string(),
                detail,
            },
            TransportError::Setup { message } => Self::Setup(message),
        }
    }

    /// True when this is a GraphQL error list carrying an auth-classified error
    pub fn is_auth_error(&self) -> bool {
        match self {
            Self::Graphql { errors } => errors.iter().any(GraphqlError::is_auth_error),
            _ => false,
        }
    }
}
