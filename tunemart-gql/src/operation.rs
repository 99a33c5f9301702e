//! GraphQL wire types and typed documents

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `extensions.code` value the backend uses for an expired or missing token
pub const AUTH_NOT_AUTHENTICATED: &str = "AUTH_NOT_AUTHENTICATED";

/// GraphQL document text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphqlQuery {
    query: String,
}

impl GraphqlQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.query
    }
}

impl From<&str> for GraphqlQuery {
    fn from(query: &str) -> Self {
        Self::new(query)
    }
}

/// Typed GraphQL document: the operation text paired with its variable and
/// result types.
pub trait Operation {
    /// Variables type
    type Variables: Serialize + Send + Sync;
    /// Shape of the `data` field
    type ResponseData: Serialize + for<'de> Deserialize<'de> + Send + Sync;

    /// GraphQL document text
    const QUERY: &'static str;
    /// Operation name (used for logging)
    const OPERATION_NAME: &'static str;

    fn query() -> GraphqlQuery {
        GraphqlQuery::new(Self::QUERY)
    }
}

/// JSON request body: `{query, variables?}`
#[derive(Debug, Clone, Serialize)]
pub struct GraphqlRequest<'a, V> {
    pub query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<V>,
}

/// Location of an error within the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphqlErrorLocation {
    pub line: u32,
    pub column: u32,
}

/// Response path segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GraphqlPathSegment {
    Key(String),
    Index(i64),
}

/// One entry of the response `errors` array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphqlError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<GraphqlErrorLocation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<GraphqlPathSegment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl GraphqlError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: Vec::new(),
            extensions: None,
        }
    }

    pub fn with_extensions(mut self, extensions: Value) -> Self {
        self.extensions = Some(extensions);
        self
    }

    /// `extensions.code == "AUTH_NOT_AUTHENTICATED"` or `extensions.status == 401`
    ///
    /// Some resolvers report the status as a string, so `"401"` also counts.
    pub fn is_auth_error(&self) -> bool {
        let Some(extensions) = &self.extensions else {
            return false;
        };

        let code_matches = extensions
            .get("code")
            .and_then(Value::as_str)
            .is_some_and(|code| code == AUTH_NOT_AUTHENTICATED);

        let status_matches = match extensions.get("status") {
            Some(Value::Number(n)) => n.as_u64() == Some(401),
            Some(Value::String(s)) => s.trim() == "401",
            _ => false,
        };

        code_matches || status_matches
    }
}

/// Response envelope: `{data?, errors?}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphqlResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Option<Vec<GraphqlError>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_auth_classification() {
        let by_code = GraphqlError::new("x").with_extensions(json!({"code": "AUTH_NOT_AUTHENTICATED"}));
        let by_status = GraphqlError::new("x").with_extensions(json!({"status": 401}));
        let by_status_str = GraphqlError::new("x").with_extensions(json!({"status": "401"}));
        let forbidden = GraphqlError::new("x").with_extensions(json!({"code": "FORBIDDEN", "status": 403}));
        let bare = GraphqlError::new("x");

        assert!(by_code.is_auth_error());
        assert!(by_status.is_auth_error());
        assert!(by_status_str.is_auth_error());
        assert!(!forbidden.is_auth_error());
        assert!(!bare.is_auth_error());
    }

    #[test]
    fn test_request_omits_missing_variables() {
        let request: GraphqlRequest<'_, Value> = GraphqlRequest {
            query: "{ me { id } }",
            variables: None,
        };
        assert_eq!(serde_json::to_value(&request).unwrap(), json!({"query": "{ me { id } }"}));
    }

    #[test]
    fn test_error_deserializes_with_path() {
        let error: GraphqlError = serde_json::from_value(json!({
            "message": "boom",
            "locations": [{"line": 1, "column": 3}],
            "path": ["tracks", 0, "artist"]
        }))
        .unwrap();

        assert_eq!(error.locations[0].column, 3);
        assert_eq!(error.path[1], GraphqlPathSegment::Index(0));
        assert!(!error.is_auth_error());
    }
}
