//! GraphqlClient integration tests against a mock HTTP backend
//!
//! Covers the execute contract (data unwrapping, single auth retry,
//! transport error classification) and the multipart upload variant.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use tunemart_gql::{
    GqlError, GraphqlClient, GraphqlQuery, HttpTokenRefresher, MemorySession, Operation,
    ReqwestTransport, SessionContext, Transport, UploadFile, VariableTree,
};

const ME_QUERY: &str = "query Me($id: ID!) { me(id: $id) { id name } }";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Me {
    id: String,
    name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct MeData {
    me: Me,
}

#[derive(Debug, Serialize)]
struct MeVars {
    id: String,
}

struct MeQuery;

impl Operation for MeQuery {
    type Variables = MeVars;
    type ResponseData = MeData;

    const QUERY: &'static str = ME_QUERY;
    const OPERATION_NAME: &'static str = "Me";
}

/// Replies with each template in turn, repeating the last one
struct Sequence {
    responses: Vec<ResponseTemplate>,
    calls: Arc<AtomicUsize>,
}

impl Respond for Sequence {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses[n.min(self.responses.len() - 1)].clone()
    }
}

fn success_body() -> Value {
    json!({"data": {"me": {"id": "u1", "name": "Nova"}}})
}

fn auth_error_body() -> Value {
    json!({
        "data": null,
        "errors": [{
            "message": "Not authenticated",
            "extensions": {"code": "AUTH_NOT_AUTHENTICATED"}
        }]
    })
}

fn build_client(base_url: &str, session: Arc<MemorySession>) -> GraphqlClient {
    let transport: Arc<dyn Transport> =
        Arc::new(ReqwestTransport::new(base_url, Duration::from_secs(5)).unwrap());
    let refresher = Arc::new(HttpTokenRefresher::new(transport.clone(), "/auth/refresh-token"));
    GraphqlClient::new(transport, session, refresher)
}

async fn mount_refresh(server: &MockServer, template: ResponseTemplate, times: u64) {
    Mock::given(method("POST"))
        .and(path("/auth/refresh-token"))
        .respond_with(template)
        .expect(times)
        .mount(server)
        .await;
}

fn me_vars() -> MeVars {
    MeVars {
        id: "u1".to_string(),
    }
}

#[tokio::test]
async fn test_success_returns_data_unmodified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("authorization", "Bearer t0"))
        .and(body_json(json!({"query": ME_QUERY, "variables": {"id": "u1"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, ResponseTemplate::new(200), 0).await;

    let client = build_client(&server.uri(), Arc::new(MemorySession::with_token("t0")));
    let data = client.execute::<MeQuery>(&me_vars()).await.unwrap();

    assert_eq!(
        data,
        MeData {
            me: Me {
                id: "u1".to_string(),
                name: "Nova".to_string()
            }
        }
    );
}

#[tokio::test]
async fn test_untyped_execute_returns_data_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_json(json!({"query": "{ ping }"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"ping": "pong"}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = build_client(&server.uri(), Arc::new(MemorySession::new()));
    let data: Value = client
        .execute_query::<Value, Value>(&GraphqlQuery::new("{ ping }"), None)
        .await
        .unwrap();

    assert_eq!(data, json!({"ping": "pong"}));
}

#[tokio::test]
async fn test_repeated_calls_are_independent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .expect(2)
        .mount(&server)
        .await;
    mount_refresh(&server, ResponseTemplate::new(200), 0).await;

    let client = build_client(&server.uri(), Arc::new(MemorySession::with_token("t0")));
    let first = client.execute::<MeQuery>(&me_vars()).await.unwrap();
    let second = client.execute::<MeQuery>(&me_vars()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.me.name, "Nova");
}

#[tokio::test]
async fn test_auth_error_refreshes_once_and_retries_with_same_variables() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(Sequence {
            responses: vec![
                ResponseTemplate::new(200).set_body_json(auth_error_body()),
                ResponseTemplate::new(200).set_body_json(success_body()),
            ],
            calls: calls.clone(),
        })
        .expect(2)
        .mount(&server)
        .await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"result": {"accessToken": "fresh"}})),
        1,
    )
    .await;

    let session = Arc::new(MemorySession::with_token("stale"));
    let client = build_client(&server.uri(), session.clone());
    let data = client.execute::<MeQuery>(&me_vars()).await.unwrap();

    assert_eq!(data.me.id, "u1");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(session.token().await.as_deref(), Some("fresh"));

    let graphql_requests: Vec<Request> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/graphql")
        .collect();
    assert_eq!(graphql_requests.len(), 2);

    let first: Value = serde_json::from_slice(&graphql_requests[0].body).unwrap();
    let retry: Value = serde_json::from_slice(&graphql_requests[1].body).unwrap();
    assert_eq!(first, retry);
    assert_eq!(
        graphql_requests[0].headers.get("authorization").unwrap(),
        "Bearer stale"
    );
    assert_eq!(
        graphql_requests[1].headers.get("authorization").unwrap(),
        "Bearer fresh"
    );
}

#[tokio::test]
async fn test_status_401_extension_triggers_retry() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(Sequence {
            responses: vec![
                ResponseTemplate::new(200).set_body_json(json!({
                    "errors": [{"message": "Token expired", "extensions": {"status": 401}}]
                })),
                ResponseTemplate::new(200).set_body_json(success_body()),
            ],
            calls: calls.clone(),
        })
        .mount(&server)
        .await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"result": {"accessToken": "fresh"}})),
        1,
    )
    .await;

    let client = build_client(&server.uri(), Arc::new(MemorySession::with_token("stale")));
    assert!(client.execute::<MeQuery>(&me_vars()).await.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_second_auth_failure_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_error_body()))
        .expect(2)
        .mount(&server)
        .await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"result": {"accessToken": "fresh"}})),
        1,
    )
    .await;

    let client = build_client(&server.uri(), Arc::new(MemorySession::with_token("stale")));
    let err = client.execute::<MeQuery>(&me_vars()).await.unwrap_err();

    assert!(matches!(err, GqlError::Graphql { .. }));
    assert!(err.is_auth_error());
    assert_eq!(err.to_string(), "GraphQL errors: Not authenticated");
}

#[tokio::test]
async fn test_non_auth_errors_are_joined_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [
                {"message": "Track not found", "extensions": {"code": "NOT_FOUND"}},
                {"message": "Playlist is private"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, ResponseTemplate::new(200), 0).await;

    let client = build_client(&server.uri(), Arc::new(MemorySession::with_token("t0")));
    let err = client.execute::<MeQuery>(&me_vars()).await.unwrap_err();

    assert_eq!(
        err.to_string(),
        "GraphQL errors: Track not found, Playlist is private"
    );
}

#[tokio::test]
async fn test_refresh_failure_propagates_for_json_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_error_body()))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, ResponseTemplate::new(401).set_body_string("expired"), 1).await;

    let session = Arc::new(MemorySession::with_token("stale"));
    let client = build_client(&server.uri(), session.clone());
    let err = client.execute::<MeQuery>(&me_vars()).await.unwrap_err();

    assert!(matches!(err, GqlError::Refresh(_)));
    // Plain execute leaves the session alone
    assert_eq!(session.token().await.as_deref(), Some("stale"));
    assert!(session.navigations().await.is_empty());
}

#[tokio::test]
async fn test_http_error_reports_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "database unavailable"})))
        .mount(&server)
        .await;

    let client = build_client(&server.uri(), Arc::new(MemorySession::new()));
    let err = client.execute::<MeQuery>(&me_vars()).await.unwrap_err();

    match &err {
        GqlError::Http {
            status,
            status_text,
            ..
        } => {
            assert_eq!(*status, 500);
            assert_eq!(status_text, "Internal Server Error");
        }
        other => panic!("expected HTTP error, got {:?}", other),
    }
    let message = err.to_string();
    assert!(message.contains("HTTP Error 500"));
    assert!(message.contains(r#"{"error":"database unavailable"}"#));
}

#[tokio::test]
async fn test_unreachable_server_is_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = build_client(&endpoint, Arc::new(MemorySession::new()));
    let err = client.execute::<MeQuery>(&me_vars()).await.unwrap_err();

    assert!(matches!(err, GqlError::Network { .. }));
    let message = err.to_string();
    assert!(message.contains("Network Error"));
    assert!(message.contains(&endpoint));
}

#[tokio::test]
async fn test_empty_body_is_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = build_client(&server.uri(), Arc::new(MemorySession::new()));
    let err = client.execute::<MeQuery>(&me_vars()).await.unwrap_err();
    assert!(matches!(err, GqlError::EmptyResponse));
}

fn upload_variables() -> VariableTree<UploadFile> {
    let nested: VariableTree<UploadFile> = VariableTree::object()
        .with("title", json!("Wedding song"))
        .with("nested", UploadFile::new("brief.pdf", "application/pdf", b"%PDF-1.4".to_vec()));
    VariableTree::object()
        .with("file", UploadFile::new("demo.mp3", "audio/mpeg", b"ID3".to_vec()))
        .with("createRequest", nested)
}

fn find(haystack: &str, needle: &str) -> usize {
    haystack
        .find(needle)
        .unwrap_or_else(|| panic!("'{}' not found in multipart body", needle))
}

/// Multipart body with its random boundary replaced, so two sends compare equal
fn normalized_multipart(request: &Request) -> String {
    let content_type = request.headers.get("content-type").unwrap().to_str().unwrap();
    let boundary = content_type
        .split("boundary=")
        .nth(1)
        .unwrap_or_else(|| panic!("no boundary in '{}'", content_type));
    String::from_utf8_lossy(&request.body).replace(boundary, "BOUNDARY")
}

#[tokio::test]
async fn test_upload_sends_multipart_with_map() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("GraphQL-Preflight", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"createRequest": {"id": "r1"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = build_client(&server.uri(), Arc::new(MemorySession::with_token("t0")));
    let query = GraphqlQuery::new("mutation CreateRequest($file: Upload, $createRequest: CreateRequestInput!) { createRequest(createRequest: $createRequest) { id } }");
    let data: Value = client
        .execute_with_file_upload(&query, upload_variables())
        .await
        .unwrap();
    assert_eq!(data, json!({"createRequest": {"id": "r1"}}));

    let requests = server.received_requests().await.unwrap();
    let request = &requests[0];
    let content_type = request.headers.get("content-type").unwrap().to_str().unwrap();
    assert!(content_type.starts_with("multipart/form-data"));

    let body = String::from_utf8_lossy(&request.body);
    let operations = find(&body, "name=\"operations\"");
    let map = find(&body, "name=\"map\"");
    let file0 = find(&body, "name=\"0\"");
    let file1 = find(&body, "name=\"1\"");
    assert!(operations < map && map < file0 && file0 < file1);

    assert!(body.contains(r#"{"0":["variables.file"],"1":["variables.createRequest.nested"]}"#));
    assert!(body.contains(r#""variables":{"file":null,"createRequest":{"title":"Wedding song","nested":null}}"#));
    assert!(body.contains("filename=\"demo.mp3\""));
    assert!(body.contains("%PDF-1.4"));
}

#[tokio::test]
async fn test_upload_retries_once_after_refresh() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(Sequence {
            responses: vec![
                ResponseTemplate::new(200).set_body_json(auth_error_body()),
                ResponseTemplate::new(200).set_body_json(json!({"data": {"ok": true}})),
            ],
            calls: calls.clone(),
        })
        .expect(2)
        .mount(&server)
        .await;
    mount_refresh(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({"result": {"accessToken": "fresh"}})),
        1,
    )
    .await;

    let session = Arc::new(MemorySession::with_token("stale"));
    let client = build_client(&server.uri(), session.clone());
    let data: Value = client
        .execute_with_file_upload(&GraphqlQuery::new("mutation M { ok }"), upload_variables())
        .await
        .unwrap();

    assert_eq!(data, json!({"ok": true}));
    assert_eq!(session.token().await.as_deref(), Some("fresh"));
    assert!(session.navigations().await.is_empty());

    let graphql: Vec<Request> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/graphql")
        .collect();
    assert_eq!(graphql.len(), 2);
    assert_eq!(normalized_multipart(&graphql[0]), normalized_multipart(&graphql[1]));
    assert!(normalized_multipart(&graphql[1]).contains(r#"{"0":["variables.file"],"1":["variables.createRequest.nested"]}"#));
    assert_eq!(graphql[0].headers.get("authorization").unwrap(), "Bearer stale");
    assert_eq!(graphql[1].headers.get("authorization").unwrap(), "Bearer fresh");
    assert_eq!(graphql[1].headers.get("graphql-preflight").unwrap(), "true");
}

#[tokio::test]
async fn test_upload_refresh_failure_ends_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_error_body()))
        .expect(1)
        .mount(&server)
        .await;
    mount_refresh(&server, ResponseTemplate::new(401).set_body_string("refresh expired"), 1).await;

    let session = Arc::new(MemorySession::with_token("stale"));
    let client = build_client(&server.uri(), session.clone());
    let err = client
        .execute_with_file_upload::<Value>(&GraphqlQuery::new("mutation M { ok }"), upload_variables())
        .await
        .unwrap_err();

    assert!(matches!(err, GqlError::AuthenticationFailed(_)));
    assert!(err.to_string().contains("Authentication failed"));
    assert_eq!(session.token().await, None);
    assert_eq!(session.navigations().await, vec!["/".to_string()]);
}
