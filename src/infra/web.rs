use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::error;
use serde_json::json;
use uuid::Uuid;

use crate::domain::{
    error::AppError,
    model::{Application, CreateAppInput, UpdateAppInput},
    AppService,
};

pub fn router(service: AppService) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/apps", get(list_apps).post(create_app))
        .route(
            "/api/apps/:id",
            get(get_app).patch(update_app).delete(delete_app),
        )
        .route("/api/apps/:id/restart", post(restart_app))
        .with_state(Arc::new(service))
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Cluster(_) | AppError::Timeout | AppError::Canceled | AppError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn create_app(
    State(service): State<Arc<AppService>>,
    Json(input): Json<CreateAppInput>,
) -> Result<impl IntoResponse, AppError> {
    let app = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(app)))
}

async fn list_apps(
    State(service): State<Arc<AppService>>,
) -> Result<Json<Vec<Application>>, AppError> {
    Ok(Json(service.list().await?))
}

async fn get_app(
    State(service): State<Arc<AppService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Application>, AppError> {
    Ok(Json(service.get(id).await?))
}

async fn update_app(
    State(service): State<Arc<AppService>>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateAppInput>,
) -> Result<Json<Application>, AppError> {
    Ok(Json(service.update(id, input).await?))
}

async fn delete_app(
    State(service): State<Arc<AppService>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn restart_app(
    State(service): State<Arc<AppService>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    service.restart(id).await?;
    Ok(Json(json!({ "message": "app restart initiated" })))
}
