use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::error::AppError;
use super::model::{AppSpec, AppStatus, Application, UpdateAppInput, WorkloadStatus};

/// Interval between readiness polls while waiting for a rollout.
pub const READY_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Persistence contract for application records. Any engine with
/// read-your-writes consistency fits; uniqueness of slug and domain must be
/// enforced here, the service-level checks are only a fast path.
#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    async fn insert(&self, app: Application) -> Result<Application, AppError>;

    async fn get(&self, id: Uuid) -> Result<Application, AppError>;

    async fn list(&self) -> Result<Vec<Application>, AppError>;

    async fn update(&self, id: Uuid, changes: UpdateAppInput) -> Result<Application, AppError>;

    async fn delete(&self, id: Uuid) -> Result<(), AppError>;

    async fn slug_exists(&self, slug: &str) -> Result<bool, AppError>;

    async fn domain_exists(&self, domain: &str) -> Result<bool, AppError>;

    /// Claim a new deploy generation for the app and return it. Only the
    /// sequence holding the latest generation may write status.
    async fn begin_deploy(&self, id: Uuid) -> Result<u64, AppError>;

    /// Write `status` if `generation` is still the app's current deploy
    /// generation. Returns false when the write was skipped as stale.
    async fn update_status(
        &self,
        id: Uuid,
        generation: u64,
        status: AppStatus,
    ) -> Result<bool, AppError>;
}

/// The only component that talks to the cluster API.
#[async_trait]
pub trait ClusterOrchestrator: Send + Sync {
    /// Create the applications namespace; an already existing namespace is
    /// success.
    async fn ensure_namespace(&self) -> Result<(), AppError>;

    async fn apply_workload(&self, spec: &AppSpec) -> Result<(), AppError>;

    async fn apply_endpoint(&self, spec: &AppSpec) -> Result<(), AppError>;

    async fn apply_route(&self, spec: &AppSpec) -> Result<(), AppError>;

    async fn delete_workload(&self, slug: &str) -> Result<(), AppError>;

    async fn delete_endpoint(&self, slug: &str) -> Result<(), AppError>;

    async fn delete_route(&self, slug: &str) -> Result<(), AppError>;

    async fn workload_status(&self, slug: &str) -> Result<WorkloadStatus, AppError>;

    /// Force a rolling restart of the workload. Does not wait for the
    /// rollout to finish.
    async fn restart(&self, slug: &str) -> Result<(), AppError>;

    /// Poll `workload_status` until every desired instance is ready, the
    /// deadline passes (`Timeout`) or `cancel` fires (`Canceled`).
    async fn wait_ready(
        &self,
        slug: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), AppError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.workload_status(slug).await?.is_ready() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(AppError::Timeout);
            }
            tokio::select! {
                _ = cancel.cancelled() => return Err(AppError::Canceled),
                _ = tokio::time::sleep(READY_POLL_INTERVAL) => {}
            }
        }
    }
}
