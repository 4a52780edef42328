use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    error::AppError,
    model::{AppStatus, Application, UpdateAppInput},
    port::ApplicationRepository,
};

/// Application record store backed by process memory.
///
/// Uniqueness of slug and domain is enforced inside the write lock; two
/// concurrent creates that both passed the service-level checks cannot
/// both commit here.
#[derive(Default)]
pub struct InMemoryApplicationRepository {
    apps: RwLock<HashMap<Uuid, Application>>,
}

#[async_trait]
impl ApplicationRepository for InMemoryApplicationRepository {
    async fn insert(&self, app: Application) -> Result<Application, AppError> {
        let mut apps = self.apps.write().await;
        if apps.values().any(|existing| existing.slug == app.slug) {
            return Err(AppError::conflict(format!(
                "app with slug '{}' already exists",
                app.slug
            )));
        }
        if let Some(domain) = &app.domain {
            if apps
                .values()
                .any(|existing| existing.domain.as_deref() == Some(domain))
            {
                return Err(AppError::conflict(format!(
                    "domain '{}' already in use",
                    domain
                )));
            }
        }
        apps.insert(app.id, app.clone());
        Ok(app)
    }

    async fn get(&self, id: Uuid) -> Result<Application, AppError> {
        self.apps
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(AppError::NotFound(id))
    }

    async fn list(&self) -> Result<Vec<Application>, AppError> {
        let mut apps: Vec<Application> = self.apps.read().await.values().cloned().collect();
        apps.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(apps)
    }

    async fn update(&self, id: Uuid, changes: UpdateAppInput) -> Result<Application, AppError> {
        let mut apps = self.apps.write().await;
        if let Some(domain) = changes.domain.as_ref().filter(|d| !d.is_empty()) {
            if apps
                .values()
                .any(|other| other.id != id && other.domain.as_deref() == Some(domain.as_str()))
            {
                return Err(AppError::conflict(format!(
                    "domain '{}' already in use",
                    domain
                )));
            }
        }
        let app = apps.get_mut(&id).ok_or(AppError::NotFound(id))?;
        changes.apply(app);
        Ok(app.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), AppError> {
        self.apps
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(AppError::NotFound(id))
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool, AppError> {
        Ok(self.apps.read().await.values().any(|app| app.slug == slug))
    }

    async fn domain_exists(&self, domain: &str) -> Result<bool, AppError> {
        Ok(self
            .apps
            .read()
            .await
            .values()
            .any(|app| app.domain.as_deref() == Some(domain)))
    }

    async fn begin_deploy(&self, id: Uuid) -> Result<u64, AppError> {
        let mut apps = self.apps.write().await;
        let app = apps.get_mut(&id).ok_or(AppError::NotFound(id))?;
        app.deploy_generation += 1;
        Ok(app.deploy_generation)
    }

    async fn update_status(
        &self,
        id: Uuid,
        generation: u64,
        status: AppStatus,
    ) -> Result<bool, AppError> {
        let mut apps = self.apps.write().await;
        let app = apps.get_mut(&id).ok_or(AppError::NotFound(id))?;
        if app.deploy_generation != generation {
            return Ok(false);
        }
        app.status = status;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(slug: &str, domain: Option<&str>) -> Application {
        Application {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            name: slug.to_string(),
            image: "nginx:latest".to_string(),
            port: 8080,
            replicas: 1,
            cpu_limit: "500m".to_string(),
            memory_limit: "256Mi".to_string(),
            health_check_path: "/".to_string(),
            domain: domain.map(str::to_string),
            status: AppStatus::Pending,
            deploy_generation: 0,
        }
    }

    #[tokio::test]
    async fn insert_enforces_slug_uniqueness() {
        let repo = InMemoryApplicationRepository::default();
        repo.insert(app("web", None)).await.unwrap();
        let err = repo.insert(app("web", None)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn insert_enforces_domain_uniqueness() {
        let repo = InMemoryApplicationRepository::default();
        repo.insert(app("web", Some("a.example.com"))).await.unwrap();
        let err = repo
            .insert(app("api", Some("a.example.com")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_enforces_domain_uniqueness_excluding_self() {
        let repo = InMemoryApplicationRepository::default();
        let web = repo.insert(app("web", Some("a.example.com"))).await.unwrap();
        let api = repo.insert(app("api", None)).await.unwrap();

        let err = repo
            .update(
                api.id,
                UpdateAppInput {
                    domain: Some("a.example.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // re-asserting its own domain is fine
        repo.update(
            web.id,
            UpdateAppInput {
                domain: Some("a.example.com".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn cleared_domain_frees_it_for_others() {
        let repo = InMemoryApplicationRepository::default();
        let web = repo.insert(app("web", Some("a.example.com"))).await.unwrap();
        let api = repo.insert(app("api", None)).await.unwrap();

        repo.update(
            web.id,
            UpdateAppInput {
                domain: Some(String::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(!repo.domain_exists("a.example.com").await.unwrap());

        repo.update(
            api.id,
            UpdateAppInput {
                domain: Some("a.example.com".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn stale_generation_writes_are_skipped() {
        let repo = InMemoryApplicationRepository::default();
        let stored = repo.insert(app("web", None)).await.unwrap();
        let stale = repo.begin_deploy(stored.id).await.unwrap();
        let current = repo.begin_deploy(stored.id).await.unwrap();
        assert!(current > stale);

        assert!(!repo
            .update_status(stored.id, stale, AppStatus::Failed)
            .await
            .unwrap());
        assert_eq!(repo.get(stored.id).await.unwrap().status, AppStatus::Pending);

        assert!(repo
            .update_status(stored.id, current, AppStatus::Running)
            .await
            .unwrap());
        assert_eq!(repo.get(stored.id).await.unwrap().status, AppStatus::Running);
    }

    #[tokio::test]
    async fn list_is_sorted_by_slug() {
        let repo = InMemoryApplicationRepository::default();
        repo.insert(app("zulu", None)).await.unwrap();
        repo.insert(app("alpha", None)).await.unwrap();
        let slugs: Vec<String> = repo
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|app| app.slug)
            .collect();
        assert_eq!(slugs, vec!["alpha", "zulu"]);
    }

    #[tokio::test]
    async fn delete_is_final() {
        let repo = InMemoryApplicationRepository::default();
        let stored = repo.insert(app("web", None)).await.unwrap();
        repo.delete(stored.id).await.unwrap();
        assert!(matches!(
            repo.delete(stored.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(!repo.slug_exists("web").await.unwrap());
    }
}
