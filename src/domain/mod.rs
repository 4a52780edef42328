use std::sync::Arc;

use log::warn;
use uuid::Uuid;

use deploy::Deployer;
use error::AppError;
use model::{
    AppStatus, Application, CreateAppInput, UpdateAppInput, DEFAULT_CPU_LIMIT,
    DEFAULT_HEALTH_CHECK_PATH, DEFAULT_MEMORY_LIMIT, DEFAULT_PORT, DEFAULT_REPLICAS,
};
use naming::{slugify, validate_slug};
use port::{ApplicationRepository, ClusterOrchestrator};

pub mod deploy;
pub mod error;
pub mod model;
pub mod naming;
pub mod port;
#[cfg(test)]
pub mod testing;

/// Application lifecycle orchestrator.
///
/// Owns the synchronous request paths (validation, uniqueness checks,
/// record writes) and schedules the asynchronous deploy sequences on the
/// [`Deployer`]. Cluster resources are derived projections of the record;
/// the record store is the only source of truth.
pub struct AppService {
    repository: Arc<dyn ApplicationRepository>,
    cluster: Arc<dyn ClusterOrchestrator>,
    deployer: Deployer,
}

impl AppService {
    pub fn new(
        repository: Arc<dyn ApplicationRepository>,
        cluster: Arc<dyn ClusterOrchestrator>,
        deployer: Deployer,
    ) -> Self {
        AppService {
            repository,
            cluster,
            deployer,
        }
    }

    /// Validate, persist with status `pending` and schedule the first
    /// deploy. Returns as soon as the record is stored; convergence is
    /// observable through the `status` field.
    pub async fn create(&self, input: CreateAppInput) -> Result<Application, AppError> {
        let name = input
            .name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| AppError::validation("name is required"))?;
        let image = input
            .image
            .filter(|i| !i.is_empty())
            .ok_or_else(|| AppError::validation("image is required"))?;

        let slug = match input.slug.filter(|s| !s.is_empty()) {
            Some(slug) => slug,
            None => slugify(&name),
        };
        validate_slug(&slug)?;
        if self.repository.slug_exists(&slug).await? {
            return Err(AppError::conflict(format!(
                "app with slug '{}' already exists",
                slug
            )));
        }

        let domain = input.domain.filter(|d| !d.is_empty());
        if let Some(domain) = &domain {
            if self.repository.domain_exists(domain).await? {
                return Err(AppError::conflict(format!(
                    "domain '{}' already in use",
                    domain
                )));
            }
        }

        let port = input.port.unwrap_or(DEFAULT_PORT);
        if port == 0 {
            return Err(AppError::validation("port must be greater than zero"));
        }
        let replicas = input.replicas.unwrap_or(DEFAULT_REPLICAS);
        if replicas < 0 {
            return Err(AppError::validation("replicas cannot be negative"));
        }

        let app = Application {
            id: Uuid::new_v4(),
            slug,
            name,
            image,
            port,
            replicas,
            cpu_limit: input
                .cpu_limit
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_CPU_LIMIT.to_string()),
            memory_limit: input
                .memory_limit
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_MEMORY_LIMIT.to_string()),
            health_check_path: input
                .health_check_path
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_HEALTH_CHECK_PATH.to_string()),
            domain,
            status: AppStatus::Pending,
            deploy_generation: 0,
        };

        let app = self.repository.insert(app).await?;
        self.schedule_deploy(&app).await?;
        Ok(app)
    }

    pub async fn get(&self, id: Uuid) -> Result<Application, AppError> {
        self.repository.get(id).await
    }

    pub async fn list(&self) -> Result<Vec<Application>, AppError> {
        self.repository.list().await
    }

    /// Apply a partial update and schedule a redeploy when a field that
    /// shapes the cluster resources was supplied.
    pub async fn update(&self, id: Uuid, input: UpdateAppInput) -> Result<Application, AppError> {
        let current = self.repository.get(id).await?;

        if let Some(port) = input.port {
            if port == 0 {
                return Err(AppError::validation("port must be greater than zero"));
            }
        }
        if let Some(replicas) = input.replicas {
            if replicas < 0 {
                return Err(AppError::validation("replicas cannot be negative"));
            }
        }
        if let Some(domain) = input.domain.as_ref().filter(|d| !d.is_empty()) {
            let unchanged = current.domain.as_deref() == Some(domain.as_str());
            if !unchanged && self.repository.domain_exists(domain).await? {
                return Err(AppError::conflict(format!(
                    "domain '{}' already in use",
                    domain
                )));
            }
        }

        let redeploy = input.requires_redeploy();
        let app = self.repository.update(id, input).await?;
        if redeploy {
            self.schedule_deploy(&app).await?;
        }
        Ok(app)
    }

    /// Tear down the derived cluster resources best effort, then delete the
    /// record. Only the record deletion can fail the call.
    pub async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        let app = self.repository.get(id).await?;
        if let Err(err) = self.cluster.delete_route(&app.slug).await {
            warn!("Can't delete route for {}: {}", app.slug, err);
        }
        if let Err(err) = self.cluster.delete_endpoint(&app.slug).await {
            warn!("Can't delete endpoint for {}: {}", app.slug, err);
        }
        if let Err(err) = self.cluster.delete_workload(&app.slug).await {
            warn!("Can't delete workload for {}: {}", app.slug, err);
        }
        self.repository.delete(id).await
    }

    pub async fn restart(&self, id: Uuid) -> Result<(), AppError> {
        let app = self.repository.get(id).await?;
        self.cluster.restart(&app.slug).await
    }

    async fn schedule_deploy(&self, app: &Application) -> Result<(), AppError> {
        let generation = self.repository.begin_deploy(app.id).await?;
        self.deployer.schedule(app.clone(), generation);
        Ok(())
    }
}
