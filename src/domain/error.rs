use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the lifecycle orchestrator and its collaborators.
///
/// Synchronous request paths return these directly; a deploy sequence that
/// fails asynchronously only leaves a `failed` status behind, so `Cluster`
/// and `Store` variants reach callers solely through the startup path and
/// the restart/delete operations.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("app {0} not found")]
    NotFound(Uuid),
    #[error("cluster operation failed: {0}")]
    Cluster(String),
    #[error("timed out waiting for workload to become ready")]
    Timeout,
    #[error("deploy was canceled")]
    Canceled,
    #[error("store operation failed: {0}")]
    Store(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        AppError::Conflict(message.into())
    }

    pub fn cluster(err: impl fmt::Display) -> Self {
        AppError::Cluster(err.to_string())
    }
}
