use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::error::AppError;
use super::model::{AppSpec, WorkloadStatus};
use super::port::ClusterOrchestrator;

/// Recording stand-in for the cluster gateway. Applies and deletes are
/// logged in call order; `unready` keeps the fake workload from ever
/// reporting ready and `fail_workload_apply` rejects the workload apply.
#[derive(Default)]
pub struct FakeCluster {
    calls: Mutex<Vec<String>>,
    pub fail_workload_apply: AtomicBool,
    pub unready: AtomicBool,
}

impl FakeCluster {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl ClusterOrchestrator for FakeCluster {
    async fn ensure_namespace(&self) -> Result<(), AppError> {
        self.record("ensure_namespace");
        Ok(())
    }

    async fn apply_workload(&self, spec: &AppSpec) -> Result<(), AppError> {
        self.record(format!("apply_workload {}", spec.slug));
        if self.fail_workload_apply.load(Ordering::SeqCst) {
            return Err(AppError::cluster("apply rejected"));
        }
        Ok(())
    }

    async fn apply_endpoint(&self, spec: &AppSpec) -> Result<(), AppError> {
        self.record(format!("apply_endpoint {}", spec.slug));
        Ok(())
    }

    async fn apply_route(&self, spec: &AppSpec) -> Result<(), AppError> {
        self.record(format!("apply_route {}", spec.slug));
        Ok(())
    }

    async fn delete_workload(&self, slug: &str) -> Result<(), AppError> {
        self.record(format!("delete_workload {}", slug));
        Ok(())
    }

    async fn delete_endpoint(&self, slug: &str) -> Result<(), AppError> {
        self.record(format!("delete_endpoint {}", slug));
        Ok(())
    }

    async fn delete_route(&self, slug: &str) -> Result<(), AppError> {
        self.record(format!("delete_route {}", slug));
        Ok(())
    }

    async fn workload_status(&self, _slug: &str) -> Result<WorkloadStatus, AppError> {
        if self.unready.load(Ordering::SeqCst) {
            Ok(WorkloadStatus { ready_replicas: 0, desired_replicas: 1 })
        } else {
            Ok(WorkloadStatus { ready_replicas: 1, desired_replicas: 1 })
        }
    }

    async fn restart(&self, slug: &str) -> Result<(), AppError> {
        self.record(format!("restart {}", slug));
        Ok(())
    }
}
