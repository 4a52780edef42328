use std::fmt::Debug;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Error};
use async_trait::async_trait;
use k8s_openapi::api::{
    apps::v1::Deployment,
    core::v1::{Namespace, Service},
    networking::v1::Ingress,
};
use kube::{
    api::{DeleteParams, PostParams},
    Api, Client, Resource,
};
use log::info;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;

use crate::domain::{
    error::AppError,
    model::{AppSpec, WorkloadStatus},
    port::ClusterOrchestrator,
};
use crate::infra::manifest::{synthesize, RESTARTED_AT_ANNOTATION};

/// Gateway to the cluster API. Holds a client handle and the namespace all
/// application resources live in; no other state.
pub struct KubernetesOrchestrator {
    client: Client,
    namespace: String,
}

impl KubernetesOrchestrator {
    pub async fn connect(namespace: String) -> Result<Self, Error> {
        let client = Client::try_default()
            .await
            .context("Can't connect to Kubernetes cluster")?;
        Ok(KubernetesOrchestrator { client, namespace })
    }

    fn workloads(&self) -> Api<Deployment> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn endpoints(&self) -> Api<Service> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }

    fn routes(&self) -> Api<Ingress> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

/// Create-or-update. An existing resource is replaced under its current
/// resource version; a resource deleted between the read and the replace is
/// created instead.
async fn apply<K>(api: &Api<K>, name: &str, mut desired: K) -> Result<(), kube::Error>
where
    K: Resource + Clone + Debug + DeserializeOwned + Serialize,
{
    match api.get_opt(name).await? {
        Some(existing) => {
            desired.meta_mut().resource_version = existing.meta().resource_version.clone();
            match api.replace(name, &PostParams::default(), &desired).await {
                Ok(_) => Ok(()),
                Err(kube::Error::Api(err)) if err.code == 404 => {
                    desired.meta_mut().resource_version = None;
                    api.create(&PostParams::default(), &desired).await.map(|_| ())
                }
                Err(err) => Err(err),
            }
        }
        None => api.create(&PostParams::default(), &desired).await.map(|_| ()),
    }
}

async fn delete<K>(api: &Api<K>, name: &str) -> Result<(), AppError>
where
    K: Resource + Clone + Debug + DeserializeOwned,
{
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(err)) if err.code == 404 => Ok(()),
        Err(err) => Err(AppError::cluster(err)),
    }
}

#[async_trait]
impl ClusterOrchestrator for KubernetesOrchestrator {
    async fn ensure_namespace(&self) -> Result<(), AppError> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let namespace: Namespace = serde_json::from_value(json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": {
                "name": self.namespace,
            }
        }))
        .map_err(AppError::cluster)?;
        match namespaces.create(&PostParams::default(), &namespace).await {
            Ok(_) => {
                info!("Created namespace {}", self.namespace);
                Ok(())
            }
            Err(kube::Error::Api(err)) if err.code == 409 => Ok(()),
            Err(err) => Err(AppError::cluster(err)),
        }
    }

    async fn apply_workload(&self, spec: &AppSpec) -> Result<(), AppError> {
        let workload = synthesize(spec).map_err(AppError::cluster)?.workload;
        apply(&self.workloads(), &spec.slug, workload)
            .await
            .map_err(AppError::cluster)
    }

    async fn apply_endpoint(&self, spec: &AppSpec) -> Result<(), AppError> {
        let mut desired = synthesize(spec).map_err(AppError::cluster)?.endpoint;
        let api = self.endpoints();
        match api.get_opt(&spec.slug).await.map_err(AppError::cluster)? {
            Some(existing) => {
                // the assigned internal address must survive the update
                let assigned = existing.spec.as_ref().and_then(|s| s.cluster_ip.clone());
                if let Some(endpoint_spec) = desired.spec.as_mut() {
                    endpoint_spec.cluster_ip = assigned;
                }
                desired.metadata.resource_version = existing.metadata.resource_version.clone();
                match api.replace(&spec.slug, &PostParams::default(), &desired).await {
                    Ok(_) => Ok(()),
                    Err(kube::Error::Api(err)) if err.code == 404 => {
                        desired.metadata.resource_version = None;
                        if let Some(endpoint_spec) = desired.spec.as_mut() {
                            endpoint_spec.cluster_ip = None;
                        }
                        api.create(&PostParams::default(), &desired)
                            .await
                            .map(|_| ())
                            .map_err(AppError::cluster)
                    }
                    Err(err) => Err(AppError::cluster(err)),
                }
            }
            None => api
                .create(&PostParams::default(), &desired)
                .await
                .map(|_| ())
                .map_err(AppError::cluster),
        }
    }

    async fn apply_route(&self, spec: &AppSpec) -> Result<(), AppError> {
        let route = synthesize(spec)
            .map_err(AppError::cluster)?
            .route
            .ok_or_else(|| AppError::cluster("application has no domain, no route to apply"))?;
        apply(&self.routes(), &spec.slug, route)
            .await
            .map_err(AppError::cluster)
    }

    async fn delete_workload(&self, slug: &str) -> Result<(), AppError> {
        delete(&self.workloads(), slug).await
    }

    async fn delete_endpoint(&self, slug: &str) -> Result<(), AppError> {
        delete(&self.endpoints(), slug).await
    }

    async fn delete_route(&self, slug: &str) -> Result<(), AppError> {
        delete(&self.routes(), slug).await
    }

    async fn workload_status(&self, slug: &str) -> Result<WorkloadStatus, AppError> {
        let workload = self
            .workloads()
            .get(slug)
            .await
            .map_err(AppError::cluster)?;
        let status = workload.status.unwrap_or_default();
        Ok(WorkloadStatus {
            ready_replicas: status.ready_replicas.unwrap_or(0),
            desired_replicas: status.replicas.unwrap_or(0),
        })
    }

    async fn restart(&self, slug: &str) -> Result<(), AppError> {
        let api = self.workloads();
        let mut workload = api.get(slug).await.map_err(AppError::cluster)?;
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backward")
            .as_secs()
            .to_string();
        workload
            .spec
            .as_mut()
            .ok_or_else(|| AppError::cluster(format!("workload {} has no spec", slug)))?
            .template
            .metadata
            .get_or_insert_with(Default::default)
            .annotations
            .get_or_insert_with(Default::default)
            .insert(RESTARTED_AT_ANNOTATION.to_string(), stamp);
        api.replace(slug, &PostParams::default(), &workload)
            .await
            .map_err(AppError::cluster)?;
        info!("Rolling restart of {} requested", slug);
        Ok(())
    }
}
