//! HTTP transport
//!
//! The client talks to the backend through the [`Transport`] trait so the
//! retry logic can be exercised against stubs. [`ReqwestTransport`] is the
//! production implementation: a base URL, default headers and a cookie jar
//! (the refresh endpoint authenticates with a cookie).
//!
//! Failures are classified here, once, into [`TransportError`].

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::{GqlError, GqlResult};
use crate::upload::UploadFile;

const USER_AGENT: &str = concat!("tunemart/", env!("CARGO_PKG_VERSION"));

/// Transport failure, decided at the HTTP client boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Non-2xx response
    Http {
        status: u16,
        status_text: String,
        body: String,
    },
    /// Request dispatched but no response arrived
    Network { detail: String },
    /// Request could not be constructed
    Setup { message: String },
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            return Self::Setup {
                message: err.to_string(),
            };
        }
        if let Some(status) = err.status() {
            return Self::Http {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                body: String::new(),
            };
        }
        Self::Network {
            detail: err.to_string(),
        }
    }
}

/// One multipart form field
#[derive(Debug, Clone, PartialEq)]
pub enum FormPart {
    Text { name: String, value: String },
    File { name: String, file: UploadFile },
}

/// Ordered multipart form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartForm {
    parts: Vec<FormPart>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn file(mut self, name: impl Into<String>, file: UploadFile) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            file,
        });
        self
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    /// Look up a text field by name
    pub fn text_field(&self, name: &str) -> Option<&str> {
        self.parts.iter().find_map(|part| match part {
            FormPart::Text { name: n, value } if n == name => Some(value.as_str()),
            _ => None,
        })
    }

    fn into_reqwest(self) -> Result<reqwest::multipart::Form, TransportError> {
        let mut form = reqwest::multipart::Form::new();
        for part in self.parts {
            form = match part {
                FormPart::Text { name, value } => form.text(name, value),
                FormPart::File { name, file } => {
                    let part = reqwest::multipart::Part::bytes(file.bytes)
                        .file_name(file.file_name)
                        .mime_str(&file.content_type)?;
                    form.part(name, part)
                }
            };
        }
        Ok(form)
    }
}

/// Request body
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Multipart(MultipartForm),
}

/// A POST relative to the transport's base URL
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    /// Path appended to the base URL (e.g. `/graphql`)
    pub path: String,
    pub body: RequestBody,
    /// Extra headers for this request only
    pub headers: Vec<(String, String)>,
    /// Sent as `Authorization: Bearer <token>`
    pub bearer_token: Option<String>,
}

impl TransportRequest {
    pub fn json(path: impl Into<String>, body: Value) -> Self {
        Self {
            path: path.into(),
            body: RequestBody::Json(body),
            headers: Vec::new(),
            bearer_token: None,
        }
    }

    pub fn multipart(path: impl Into<String>, form: MultipartForm) -> Self {
        Self {
            path: path.into(),
            body: RequestBody::Multipart(form),
            headers: Vec::new(),
            bearer_token: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token;
        self
    }
}

/// HTTP POST capability used by the client and the token refresher
#[async_trait]
pub trait Transport: Send + Sync {
    /// Base URL, used in diagnostics
    fn base_url(&self) -> &str;

    /// POST the request and return the raw response body of a 2xx response
    async fn post(&self, request: TransportRequest) -> Result<Vec<u8>, TransportError>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> GqlResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(|e| GqlError::Setup(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &tunemart_common::config::ClientConfig) -> GqlResult<Self> {
        Self::new(config.endpoint_str(), config.timeout)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post(&self, request: TransportRequest) -> Result<Vec<u8>, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!(url = %url, "POST");

        let mut builder = self.http.post(&url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(token) = &request.bearer_token {
            builder = builder.bearer_auth(token);
        }
        builder = match request.body {
            RequestBody::Json(body) => builder.json(&body),
            RequestBody::Multipart(form) => builder.multipart(form.into_reqwest()?),
        };

        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        Ok(bytes.to_vec())
    }
}
