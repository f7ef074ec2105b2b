use askama::Template;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::{self, Config};
use crate::task::TaskState;
use crate::task::api::{create_task_router, route_not_found_handler};
use crate::task::store::JsonFileStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
}

/// Custom error type for web handler operations.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// Represents an error during template rendering.
    /// The specific `askama::Error` is captured as the source of this error.
    #[error("Template rendering failed")]
    Template(#[from] askama::Error),
}

impl axum::response::IntoResponse for WebError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!("Failed to render page: {}", self);
        let user_facing_error_message =
            "An unexpected error occurred while processing your request. Please try again later.";
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(format!(
                "<h1>Internal Server Error</h1><p>{}</p>",
                user_facing_error_message
            )),
        )
            .into_response()
    }
}

/// Builds the full application router: the task page, the task API and the fallbacks.
pub fn create_app(config: Arc<Config>, task_state: Arc<TaskState>) -> Router {
    let app_state = AppState { config };

    let public_routes = Router::new()
        .route("/", get(index_handler))
        .route("/favicon.ico", get(favicon_handler))
        .route("/health", get(health_check_handler))
        .with_state(app_state);

    Router::new()
        .merge(public_routes)
        .merge(create_task_router(task_state))
        .fallback(route_not_found_handler)
        .method_not_allowed_fallback(route_not_found_handler)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

#[tracing::instrument(skip(config))]
pub async fn start_web_server(config: config::Config) -> anyhow::Result<()> {
    let server_address = format!("0.0.0.0:{}", &config.port);
    let listener = tokio::net::TcpListener::bind(&server_address).await?;
    tracing::info!("Web server running on http://{}", server_address);

    let task_state = Arc::new(TaskState::new(
        JsonFileStore::new(config.db_file.clone()),
        config.max_body_bytes,
    ));
    let task_count = task_state.service().init().await;
    tracing::info!(
        "Loaded {} tasks from {}",
        task_count,
        config.db_file.display()
    );

    let app = create_app(Arc::new(config), task_state);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Web server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[tracing::instrument]
pub async fn health_check_handler() -> &'static str {
    "OK"
}

#[tracing::instrument]
pub async fn favicon_handler() -> StatusCode {
    StatusCode::NO_CONTENT
}

#[tracing::instrument(skip(state))]
pub async fn index_handler(State(state): State<AppState>) -> Result<Html<String>, WebError> {
    let template = IndexTemplate::new(&state.config);
    template.render().map(Html).map_err(WebError::from)
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    db_file: String,
}

impl IndexTemplate {
    pub fn new(config: &Config) -> Self {
        let db_file = config
            .db_file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| config.db_file.display().to_string());
        Self { db_file }
    }
}
