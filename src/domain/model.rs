use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_REPLICAS: i32 = 1;
pub const DEFAULT_CPU_LIMIT: &str = "500m";
pub const DEFAULT_MEMORY_LIMIT: &str = "256Mi";
pub const DEFAULT_HEALTH_CHECK_PATH: &str = "/";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppStatus {
    Pending,
    Deploying,
    Running,
    Failed,
}

impl fmt::Display for AppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            AppStatus::Pending => "pending",
            AppStatus::Deploying => "deploying",
            AppStatus::Running => "running",
            AppStatus::Failed => "failed",
        };
        write!(f, "{}", status)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Application {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub image: String,
    pub port: u16,
    pub replicas: i32,
    pub cpu_limit: String,
    pub memory_limit: String,
    pub health_check_path: String,
    pub domain: Option<String>,
    pub status: AppStatus,
    #[serde(skip)]
    pub deploy_generation: u64,
}

impl Application {
    pub fn to_spec(&self) -> AppSpec {
        AppSpec {
            slug: self.slug.clone(),
            image: self.image.clone(),
            port: self.port,
            replicas: self.replicas,
            cpu_limit: self.cpu_limit.clone(),
            memory_limit: self.memory_limit.clone(),
            health_check_path: self.health_check_path.clone(),
            domain: self.domain.clone(),
        }
    }
}

/// Everything the cluster needs to know about an application. Derived from
/// the stored record, never the other way around.
#[derive(Clone, Debug)]
pub struct AppSpec {
    pub slug: String,
    pub image: String,
    pub port: u16,
    pub replicas: i32,
    pub cpu_limit: String,
    pub memory_limit: String,
    pub health_check_path: String,
    pub domain: Option<String>,
}

/// Desired vs ready instance counts as reported by the cluster.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkloadStatus {
    pub ready_replicas: i32,
    pub desired_replicas: i32,
}

impl WorkloadStatus {
    pub fn is_ready(&self) -> bool {
        self.ready_replicas > 0 && self.ready_replicas == self.desired_replicas
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CreateAppInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub image: Option<String>,
    pub port: Option<u16>,
    pub replicas: Option<i32>,
    pub cpu_limit: Option<String>,
    pub memory_limit: Option<String>,
    pub domain: Option<String>,
    pub health_check_path: Option<String>,
}

/// Partial update. Absent fields keep their current value; `domain` set to
/// an empty string clears the domain.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct UpdateAppInput {
    pub name: Option<String>,
    pub image: Option<String>,
    pub port: Option<u16>,
    pub replicas: Option<i32>,
    pub cpu_limit: Option<String>,
    pub memory_limit: Option<String>,
    pub domain: Option<String>,
    pub health_check_path: Option<String>,
}

impl UpdateAppInput {
    /// A new deploy sequence is scheduled whenever a field that shapes the
    /// cluster resources was supplied, whether or not its value changed.
    pub fn requires_redeploy(&self) -> bool {
        self.image.is_some()
            || self.port.is_some()
            || self.replicas.is_some()
            || self.cpu_limit.is_some()
            || self.memory_limit.is_some()
            || self.health_check_path.is_some()
            || self.domain.is_some()
    }

    pub fn apply(&self, app: &mut Application) {
        if let Some(name) = &self.name {
            app.name = name.clone();
        }
        if let Some(image) = &self.image {
            app.image = image.clone();
        }
        if let Some(port) = self.port {
            app.port = port;
        }
        if let Some(replicas) = self.replicas {
            app.replicas = replicas;
        }
        if let Some(cpu_limit) = &self.cpu_limit {
            app.cpu_limit = cpu_limit.clone();
        }
        if let Some(memory_limit) = &self.memory_limit {
            app.memory_limit = memory_limit.clone();
        }
        if let Some(health_check_path) = &self.health_check_path {
            app.health_check_path = health_check_path.clone();
        }
        if let Some(domain) = &self.domain {
            app.domain = (!domain.is_empty()).then(|| domain.clone());
        }
    }
}
