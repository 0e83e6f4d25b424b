//! End-to-end tests for the HTTP indexing trigger

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::io::Write;
use tower::ServiceExt;
use wikiqa_core::WikiqaConfig;
use wikiqa_nodes::registry_from_config;
use wikiqa_web::{create_app, AppState, WebConfig};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PIPELINE_YAML: &str = r#"
version: "1.0"
components:
  - name: Loader
    type: WikiDataLoader
    params:
      graphql_url: {url}/graphql
      max_retries: 0
  - name: Store
    type: InMemoryDocumentStore
pipelines:
  - name: indexing
    nodes:
      - name: Loader
        inputs: [File]
      - name: Store
        inputs: [Loader]
"#;

fn pages_response() -> Value {
    json!({
        "data": {
            "pages": {
                "listToC": [{
                    "id": 7,
                    "title": "Onboarding",
                    "path": "en/onboarding",
                    "toc": [
                        {"title": "Laptop", "anchor": "#laptop", "summary": "Pick one up at IT.", "children": []},
                        {"title": "Badge", "anchor": "#badge", "summary": "Ask reception.", "children": []}
                    ]
                }]
            }
        }
    })
}

fn app_for(server: &MockServer) -> (Router, tempfile::NamedTempFile) {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(PIPELINE_YAML.replace("{url}", &server.uri()).as_bytes())
        .unwrap();

    let config = WebConfig {
        pipeline_yaml_path: Some(file.path().display().to_string()),
        ..WebConfig::default()
    };
    let state = AppState::new(config).unwrap();
    (create_app(state), file)
}

async fn send(app: Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_update_index_without_pipeline_is_not_implemented() {
    let app = create_app(AppState::new(WebConfig::default()).unwrap());

    let (status, body) = send(app, Method::POST, "/api/update-index").await;

    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(body, json!({"detail": "Indexing Pipeline is not configured."}));
}

#[tokio::test]
async fn test_update_index_runs_configured_pipeline() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(pages_response()))
        .expect(2)
        .mount(&server)
        .await;
    let (app, _file) = app_for(&server);

    let (status, body) = send(app.clone(), Method::POST, "/api/update-index").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["documents_written"], 2);
    assert_eq!(body["documents"], 2);

    // the store persists across requests and overwrites by default
    let (status, body) = send(app, Method::POST, "/api/update-index").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["documents_written"], 2);
}

#[tokio::test]
async fn test_update_index_reports_pipeline_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    let (app, _file) = app_for(&server);

    let (status, body) = send(app, Method::POST, "/api/update-index").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"].as_str().unwrap().contains("401"));
}

#[tokio::test]
async fn test_health_reports_indexing_state() {
    let app = create_app(AppState::new(WebConfig::default()).unwrap());
    let (status, body) = send(app, Method::GET, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["indexing_configured"], false);

    let server = MockServer::start().await;
    let (app, _file) = app_for(&server);
    let (_, body) = send(app, Method::GET, "/api/health").await;
    assert_eq!(body["indexing_configured"], true);
}

#[tokio::test]
async fn test_loader_endpoint_comes_from_settings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(pages_response()))
        .expect(1)
        .mount(&server)
        .await;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(
        br#"
components:
  - name: Loader
    type: WikiDataLoader
  - name: Store
    type: InMemoryDocumentStore
pipelines:
  - name: indexing
    nodes:
      - name: Loader
        inputs: [File]
      - name: Store
        inputs: [Loader]
"#,
    )
    .unwrap();

    let mut settings = WikiqaConfig::default();
    settings.wiki.graphql_url = format!("{}/graphql", server.uri());
    let registry = registry_from_config(&settings).unwrap();
    let config = WebConfig {
        pipeline_yaml_path: Some(file.path().display().to_string()),
        ..WebConfig::default()
    };
    let app = create_app(AppState::with_registry(config, &registry).unwrap());

    let (status, body) = send(app, Method::POST, "/api/update-index").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["documents_written"], 2);
}
