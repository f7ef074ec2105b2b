use axum::http::{Method, StatusCode};

mod common;

use common::{send, setup};

#[tokio::test]
async fn can_render_task_page() {
    let context = setup();

    let response = send(context.app(), Method::GET, "/", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.content_type.as_deref(),
        Some("text/html; charset=utf-8")
    );
    let html = response.text();
    assert!(html.contains("<title>Task List</title>"));
    assert!(html.contains("<code>tasks-db.json</code>"));
    assert!(html.contains("fetchJson(\"/api/tasks\")"));
}

#[tokio::test]
async fn can_ignore_favicon_requests() {
    let context = setup();

    let response = send(context.app(), Method::GET, "/favicon.ico", None).await;

    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn can_check_health_endpoint() {
    let context = setup();

    let response = send(context.app(), Method::GET, "/health", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.text(), "OK");
}
