use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tasklist_server::config::Config;
use tasklist_server::task::TaskState;
use tasklist_server::task::store::JsonFileStore;
use tasklist_server::web::create_app;
use tempfile::TempDir;
use tower::ServiceExt;

/// Test context for endpoint tests.
pub struct TestContext {
    #[allow(dead_code)] // dir is kept so the task file outlives the test body
    pub dir: TempDir,
    pub config: Arc<Config>,
}

impl TestContext {
    #[allow(dead_code)]
    pub fn db_file(&self) -> &std::path::Path {
        &self.config.db_file
    }

    /// Builds a fresh router over the same task file, like a server restart would.
    pub fn app(&self) -> Router {
        let state = TaskState::new(
            JsonFileStore::new(self.config.db_file.clone()),
            self.config.max_body_bytes,
        );
        create_app(self.config.clone(), Arc::new(state))
    }
}

/// Setup function for endpoint tests using a temporary task file.
pub fn setup() -> TestContext {
    setup_with_body_limit(1_000_000)
}

pub fn setup_with_body_limit(max_body_bytes: usize) -> TestContext {
    // Allow multiple calls to init for tests.
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = Config {
        db_file: dir.path().join("tasks-db.json"),
        max_body_bytes,
        ..Config::default()
    };
    TestContext {
        dir,
        config: Arc::new(config),
    }
}

/// Response status, headers and body collected from a single request.
pub struct TestResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl TestResponse {
    #[allow(dead_code)]
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("Response body is not JSON")
    }

    #[allow(dead_code)]
    pub fn text(&self) -> &str {
        std::str::from_utf8(&self.body).expect("Response body is not UTF-8")
    }
}

pub async fn send(app: Router, method: Method, uri: &str, body: Option<&str>) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let request = builder
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    let status = response.status();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    TestResponse {
        status,
        content_type,
        body,
    }
}

/// Creates a task through the API and returns the response collection.
#[allow(dead_code)]
pub async fn create_task(context: &TestContext, title: &str, description: &str) -> Value {
    let payload = serde_json::json!({ "title": title, "description": description }).to_string();
    let response = send(context.app(), Method::POST, "/api/tasks", Some(&payload)).await;
    assert_eq!(response.status, StatusCode::CREATED);
    response.json()["data"].clone()
}

#[allow(dead_code)]
pub fn ids(tasks: &Value) -> Vec<u64> {
    tasks
        .as_array()
        .expect("data is not an array")
        .iter()
        .map(|task| task["id"].as_u64().expect("id is not a number"))
        .collect()
}
