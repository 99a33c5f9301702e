//! GraphQL execution with a single auth-refresh retry
//!
//! Both entry points share one attempt loop:
//! 1. POST the operation with the session's current token
//! 2. Return `data` when the response carries no errors
//! 3. On an auth-classified error, and only on the first attempt, refresh
//!    the token, store it, and send the identical request again
//! 4. Anything else fails with the joined GraphQL error messages
//!
//! A second auth failure after the retry is terminal.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{GqlError, GqlResult};
use crate::operation::{GraphqlError, GraphqlQuery, GraphqlRequest, GraphqlResponse, Operation};
use crate::refresh::{HttpTokenRefresher, TokenRefresher};
use crate::session::{SessionContext, LOGIN_ROUTE};
use crate::transport::{ReqwestTransport, RequestBody, Transport, TransportRequest};
use crate::upload::{UploadFile, UploadPlan, VariableTree};

/// Header required by servers with CSRF prevention for multipart requests
pub const PREFLIGHT_HEADER: &str = "GraphQL-Preflight";

/// What to do when the token refresh itself fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshFailure {
    /// Return the refresh error to the caller
    Propagate,
    /// Clear the session, navigate to login, fail with `AuthenticationFailed`
    EndSession,
}

enum Decoded<R> {
    Data(R),
    Errors(Vec<GraphqlError>),
}

/// GraphQL client
#[derive(Clone)]
pub struct GraphqlClient {
    transport: Arc<dyn Transport>,
    session: Arc<dyn SessionContext>,
    refresher: Arc<dyn TokenRefresher>,
    graphql_path: String,
}

impl GraphqlClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        session: Arc<dyn SessionContext>,
        refresher: Arc<dyn TokenRefresher>,
    ) -> Self {
        Self {
            transport,
            session,
            refresher,
            graphql_path: "/graphql".to_string(),
        }
    }

    /// Wire a reqwest transport and HTTP refresher from resolved configuration
    pub fn from_config(
        config: &tunemart_common::config::ClientConfig,
        session: Arc<dyn SessionContext>,
    ) -> GqlResult<Self> {
        let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::from_config(config)?);
        let refresher = Arc::new(HttpTokenRefresher::new(
            transport.clone(),
            config.refresh_path.clone(),
        ));
        Ok(Self::new(transport, session, refresher).with_graphql_path(config.graphql_path.clone()))
    }

    pub fn with_graphql_path(mut self, path: impl Into<String>) -> Self {
        self.graphql_path = path.into();
        self
    }

    pub fn session(&self) -> &Arc<dyn SessionContext> {
        &self.session
    }

    /// Run a typed document
    pub async fn execute<O: Operation>(&self, variables: &O::Variables) -> GqlResult<O::ResponseData> {
        let variables = serde_json::to_value(variables)?;
        self.run_json(O::OPERATION_NAME, &O::query(), Some(variables)).await
    }

    /// Run an arbitrary document and return `data` as `R`
    pub async fn execute_query<R, V>(&self, query: &GraphqlQuery, variables: Option<&V>) -> GqlResult<R>
    where
        R: DeserializeOwned,
        V: Serialize + ?Sized,
    {
        let variables = variables.map(serde_json::to_value).transpose()?;
        self.run_json("anonymous", query, variables).await
    }

    /// Run a typed document whose variables carry files
    pub async fn execute_upload<O: Operation>(
        &self,
        variables: VariableTree<UploadFile>,
    ) -> GqlResult<O::ResponseData> {
        self.run_upload(O::OPERATION_NAME, &O::query(), variables).await
    }

    /// Run an arbitrary document as a multipart upload
    pub async fn execute_with_file_upload<R: DeserializeOwned>(
        &self,
        query: &GraphqlQuery,
        variables: VariableTree<UploadFile>,
    ) -> GqlResult<R> {
        self.run_upload("anonymous", query, variables).await
    }

    async fn run_json<R: DeserializeOwned>(
        &self,
        operation: &str,
        query: &GraphqlQuery,
        variables: Option<Value>,
    ) -> GqlResult<R> {
        let body = serde_json::to_value(GraphqlRequest {
            query: query.as_str(),
            variables,
        })?;
        let request = TransportRequest::json(self.graphql_path.clone(), body);
        self.run_with_auth_retry(operation, request, RefreshFailure::Propagate)
            .await
    }

    async fn run_upload<R: DeserializeOwned>(
        &self,
        operation: &str,
        query: &GraphqlQuery,
        variables: VariableTree<UploadFile>,
    ) -> GqlResult<R> {
        let plan = UploadPlan::build(query, variables)?;
        debug!(operation, files = plan.files.len(), "Prepared multipart upload");

        let request = TransportRequest::multipart(self.graphql_path.clone(), plan.into_form()?)
            .with_header(PREFLIGHT_HEADER, "true");
        self.run_with_auth_retry(operation, request, RefreshFailure::EndSession)
            .await
    }

    async fn run_with_auth_retry<R: DeserializeOwned>(
        &self,
        operation: &str,
        request: TransportRequest,
        on_refresh_failure: RefreshFailure,
    ) -> GqlResult<R> {
        let request_id = Uuid::new_v4();
        let mut retried = false;

        loop {
            let attempt = if retried { 2 } else { 1 };
            debug!(%request_id, operation, attempt, multipart = matches!(request.body, RequestBody::Multipart(_)), "Sending GraphQL request");

            let outgoing = request
                .clone()
                .with_bearer_token(self.session.token().await);
            let bytes = self
                .transport
                .post(outgoing)
                .await
                .map_err(|e| GqlError::from_transport(e, self.transport.base_url()))?;

            match decode_response::<R>(&bytes)? {
                Decoded::Data(data) => return Ok(data),
                Decoded::Errors(errors) => {
                    if !retried && errors.iter().any(GraphqlError::is_auth_error) {
                        info!(%request_id, operation, "Access token rejected; refreshing");
                        self.recover_session(on_refresh_failure).await?;
                        retried = true;
                        continue;
                    }
                    debug!(%request_id, operation, attempt, errors = errors.len(), "GraphQL errors");
                    return Err(GqlError::Graphql { errors });
                }
            }
        }
    }

    async fn recover_session(&self, on_refresh_failure: RefreshFailure) -> GqlResult<()> {
        match self.refresher.refresh_token().await {
            Ok(token) => self.session.set_token(&token).await,
            Err(refresh_err) => match on_refresh_failure {
                RefreshFailure::Propagate => Err(refresh_err),
                RefreshFailure::EndSession => {
                    warn!("Token refresh failed, ending session: {}", refresh_err);
                    if let Err(e) = self.session.clear_session().await {
                        warn!("Failed to clear session: {}", e);
                    }
                    self.session.navigate_to_login(LOGIN_ROUTE).await;
                    Err(GqlError::AuthenticationFailed(refresh_err.to_string()))
                }
            },
        }
    }
}

fn decode_response<R: DeserializeOwned>(bytes: &[u8]) -> GqlResult<Decoded<R>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(GqlError::EmptyResponse);
    }

    let response: GraphqlResponse = serde_json::from_slice(bytes)?;
    if let Some(errors) = response.errors.filter(|errors| !errors.is_empty()) {
        return Ok(Decoded::Errors(errors));
    }

    let data = response.data.unwrap_or(Value::Null);
    let missing = data.is_null();
    match serde_json::from_value(data) {
        Ok(data) => Ok(Decoded::Data(data)),
        Err(_) if missing => Err(GqlError::Protocol(
            "response contained neither data nor errors".to_string(),
        )),
        Err(e) => Err(GqlError::Json(e)),
    }
}
