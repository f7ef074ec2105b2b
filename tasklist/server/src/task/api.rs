use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        DefaultBodyLimit, FromRequestParts, Path, State,
        rejection::{BytesRejection, FailedToBufferBody},
    },
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, put},
};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Value, error::Category};
use std::sync::Arc;

use crate::task::{Task, TaskServiceError, TaskState, TaskUpdate};

/// Successful response envelope carrying the whole task collection.
#[derive(Debug, Serialize)]
pub struct TasksResponse {
    success: bool,
    data: Vec<Task>,
}

impl TasksResponse {
    pub fn new(data: Vec<Task>) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Failure response envelope.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    success: bool,
    message: String,
}

impl ErrorResponse {
    pub fn new(message: String) -> Self {
        Self {
            success: false,
            message,
        }
    }
}

/// JSON payload for POST /api/tasks.
#[derive(Debug, Default, Deserialize)]
pub struct CreateTaskRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    description: Option<String>,
}

/// JSON payload for PUT /api/tasks/{id}. Omitted fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    description: Option<String>,
    #[serde(default, deserialize_with = "truthy")]
    completed: Option<bool>,
}

impl From<UpdateTaskRequest> for TaskUpdate {
    fn from(request: UpdateTaskRequest) -> Self {
        Self {
            title: request.title,
            description: request.description,
            completed: request.completed,
        }
    }
}

/// Accepts strings, numbers and booleans as text. `null` counts as not supplied.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(text) => Ok(Some(text)),
        Value::Number(number) => Ok(Some(number.to_string())),
        Value::Bool(flag) => Ok(Some(flag.to_string())),
        other => Err(de::Error::custom(format!("expected text, found {other}"))),
    }
}

fn truthy<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(Some(is_truthy(&value)))
}

/// `false`, `0`, `""` and `null` are false, anything else is true.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Parses a request body. An empty body is read as `{}`.
fn parse_json_body<T>(body: &[u8]) -> Result<T, ApiError>
where
    T: DeserializeOwned + Default,
{
    if body.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|err| match err.classify() {
        Category::Data => ApiError::MalformedInput(format!("Invalid request body: {err}")),
        _ => ApiError::MalformedInput("Invalid JSON".to_string()),
    })
}

/// Error type for the task API. Every variant renders as `{ success: false, message }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents a body that is not the expected JSON payload.
    #[error("{0}")]
    MalformedInput(String),
    /// Represents a body larger than the configured limit.
    #[error("Request body too large")]
    PayloadTooLarge,
    /// Represents an unknown path, an unsupported method or a non-numeric task id.
    #[error("Route not found")]
    RouteNotFound,
    /// Represents a task service error.
    #[error(transparent)]
    Service(#[from] TaskServiceError),
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        match rejection {
            BytesRejection::FailedToBufferBody(FailedToBufferBody::LengthLimitError(_)) => {
                ApiError::PayloadTooLarge
            }
            other => ApiError::MalformedInput(other.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, message) = match &self {
            ApiError::MalformedInput(_) | ApiError::PayloadTooLarge => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            ApiError::RouteNotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::Service(TaskServiceError::Validation(_)) => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            ApiError::Service(TaskServiceError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "Task not found".to_string())
            }
            ApiError::Service(TaskServiceError::IdSpaceExhausted) => {
                tracing::error!("Cannot assign a new task ID");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            ApiError::Service(TaskServiceError::Storage(err)) => {
                tracing::error!("Failed to save tasks: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to save tasks.".to_string(),
                )
            }
        };

        (status_code, Json(ErrorResponse::new(message))).into_response()
    }
}

/// Task id taken from the `{id}` path segment. Only a run of ASCII digits is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskId(pub u64);

impl<S> FromRequestParts<S> for TaskId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::RouteNotFound)?;
        parse_task_id(&raw)
            .map(TaskId)
            .ok_or(ApiError::RouteNotFound)
    }
}

fn parse_task_id(raw: &str) -> Option<u64> {
    if raw.is_empty() || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// Handler for GET /api/tasks.
#[tracing::instrument(skip(state))]
pub async fn list_tasks_handler(State(state): State<Arc<TaskState>>) -> Json<TasksResponse> {
    let tasks = state.service().list_tasks().await;
    Json(TasksResponse::new(tasks))
}

/// Handler for POST /api/tasks.
#[tracing::instrument(skip(state, body))]
pub async fn create_task_handler(
    State(state): State<Arc<TaskState>>,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<TasksResponse>), ApiError> {
    let request: CreateTaskRequest = parse_json_body(&body?)?;
    let tasks = state
        .service()
        .create_task(
            request.title.as_deref().unwrap_or_default(),
            request.description.as_deref().unwrap_or_default(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(TasksResponse::new(tasks))))
}

/// Handler for PUT /api/tasks/{id}.
#[tracing::instrument(skip(state, body))]
pub async fn update_task_handler(
    State(state): State<Arc<TaskState>>,
    TaskId(id): TaskId,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<TasksResponse>, ApiError> {
    let request: UpdateTaskRequest = parse_json_body(&body?)?;
    let tasks = state.service().update_task(id, request.into()).await?;
    Ok(Json(TasksResponse::new(tasks)))
}

/// Handler for DELETE /api/tasks/{id}.
#[tracing::instrument(skip(state))]
pub async fn delete_task_handler(
    State(state): State<Arc<TaskState>>,
    TaskId(id): TaskId,
) -> Result<Json<TasksResponse>, ApiError> {
    let tasks = state.service().delete_task(id).await?;
    Ok(Json(TasksResponse::new(tasks)))
}

/// Fallback for methods /api/tasks/{id} does not serve. An unknown id still reads as a missing task.
#[tracing::instrument(skip(state))]
pub async fn unsupported_task_method_handler(
    State(state): State<Arc<TaskState>>,
    TaskId(id): TaskId,
) -> ApiError {
    match state.service().find_task(id).await {
        Ok(_) => ApiError::RouteNotFound,
        Err(err) => err.into(),
    }
}

/// Fallback for every path or method the API does not serve.
pub async fn route_not_found_handler() -> ApiError {
    ApiError::RouteNotFound
}

/// Creates and returns the task API router.
pub fn create_task_router(state: Arc<TaskState>) -> Router {
    Router::new()
        .route(
            "/api/tasks",
            get(list_tasks_handler).post(create_task_handler),
        )
        .route(
            "/api/tasks/{id}",
            put(update_task_handler)
                .delete(delete_task_handler)
                .fallback(unsupported_task_method_handler),
        )
        .layer(DefaultBodyLimit::max(state.max_body_bytes))
        .with_state(state)
}
