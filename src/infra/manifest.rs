use anyhow::{anyhow, Context, Error};
use k8s_openapi::api::{apps::v1::Deployment, core::v1::Service, networking::v1::Ingress};
use serde_json::json;

use crate::domain::model::AppSpec;

/// Label identifying resources managed by this control plane.
pub const APP_LABEL: &str = "airlift.dev/app";

/// Pod-template annotation bumped to force a rolling restart.
pub const RESTARTED_AT_ANNOTATION: &str = "airlift.dev/restarted-at";

const CLUSTER_ISSUER: &str = "letsencrypt-prod";

/// The cluster resources derived from one application record.
pub struct AppManifests {
    pub workload: Deployment,
    pub endpoint: Service,
    pub route: Option<Ingress>,
}

/// Map an application spec to its resource manifests. Pure and
/// deterministic; the route is produced only when a domain is set.
pub fn synthesize(spec: &AppSpec) -> Result<AppManifests, Error> {
    Ok(AppManifests {
        workload: workload(spec)?,
        endpoint: endpoint(spec)?,
        route: spec.domain.as_deref().map(|domain| route(spec, domain)).transpose()?,
    })
}

fn labels(spec: &AppSpec) -> serde_json::Value {
    json!({
        "app": spec.slug,
        APP_LABEL: spec.slug,
    })
}

fn workload(spec: &AppSpec) -> Result<Deployment, Error> {
    let workload: Deployment = serde_json::from_value(json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {
            "name": spec.slug,
            "labels": labels(spec),
        },
        "spec": {
            "replicas": spec.replicas,
            "selector": {
                "matchLabels": labels(spec),
            },
            "template": {
                "metadata": {
                    "labels": labels(spec),
                    "annotations": {
                        "prometheus.io/scrape": "true",
                        "prometheus.io/port": "9090",
                        "prometheus.io/path": "/metrics",
                    },
                },
                "spec": {
                    "containers": [
                        {
                            "name": "app",
                            "image": spec.image,
                            "ports": [
                                {
                                    "name": "http",
                                    "containerPort": spec.port,
                                    "protocol": "TCP",
                                }
                            ],
                            "resources": {
                                "limits": {
                                    "cpu": spec.cpu_limit,
                                    "memory": spec.memory_limit,
                                },
                                "requests": {
                                    "cpu": halve_quantity(&spec.cpu_limit)?,
                                    "memory": halve_quantity(&spec.memory_limit)?,
                                },
                            },
                            "livenessProbe": {
                                "httpGet": {
                                    "path": spec.health_check_path,
                                    "port": spec.port,
                                },
                                "initialDelaySeconds": 10,
                                "periodSeconds": 10,
                                "timeoutSeconds": 5,
                                "failureThreshold": 3,
                            },
                            "readinessProbe": {
                                "httpGet": {
                                    "path": spec.health_check_path,
                                    "port": spec.port,
                                },
                                "initialDelaySeconds": 5,
                                "periodSeconds": 5,
                                "timeoutSeconds": 3,
                                "failureThreshold": 3,
                            },
                        }
                    ],
                    "restartPolicy": "Always",
                },
            },
            "strategy": {
                "type": "RollingUpdate",
                "rollingUpdate": {
                    "maxUnavailable": 0,
                    "maxSurge": 1,
                },
            },
        }
    }))
    .context("Can't assemble workload manifest")?;
    Ok(workload)
}

fn endpoint(spec: &AppSpec) -> Result<Service, Error> {
    let endpoint: Service = serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": {
            "name": spec.slug,
            "labels": labels(spec),
        },
        "spec": {
            "selector": labels(spec),
            "ports": [
                {
                    "name": "http",
                    "port": 80,
                    "targetPort": spec.port,
                    "protocol": "TCP",
                }
            ],
            "type": "ClusterIP",
        }
    }))
    .context("Can't assemble endpoint manifest")?;
    Ok(endpoint)
}

fn route(spec: &AppSpec, domain: &str) -> Result<Ingress, Error> {
    let route: Ingress = serde_json::from_value(json!({
        "apiVersion": "networking.k8s.io/v1",
        "kind": "Ingress",
        "metadata": {
            "name": spec.slug,
            "labels": labels(spec),
            "annotations": {
                "cert-manager.io/cluster-issuer": CLUSTER_ISSUER,
                "traefik.ingress.kubernetes.io/router.tls": "true",
            },
        },
        "spec": {
            "rules": [
                {
                    "host": domain,
                    "http": {
                        "paths": [
                            {
                                "path": "/",
                                "pathType": "Prefix",
                                "backend": {
                                    "service": {
                                        "name": spec.slug,
                                        "port": {
                                            "number": 80,
                                        }
                                    }
                                },
                            }
                        ]
                    }
                }
            ],
            "tls": [
                {
                    "hosts": [domain],
                    "secretName": format!("{}-tls", spec.slug),
                }
            ],
        }
    }))
    .context("Can't assemble route manifest")?;
    Ok(route)
}

/// Half of a resource quantity, truncating. Milli quantities stay in milli
/// units, binary byte quantities are re-rendered in mebibytes, and a plain
/// core count becomes milli units.
fn halve_quantity(quantity: &str) -> Result<String, Error> {
    if let Some(milli) = quantity.strip_suffix('m') {
        let milli: u64 = milli
            .parse()
            .with_context(|| format!("Unrecognized quantity '{}'", quantity))?;
        return Ok(format!("{}m", milli / 2));
    }
    if let Some(binary) = quantity.strip_suffix('i') {
        let (digits, unit) = binary.split_at(binary.len().saturating_sub(1));
        let factor: u64 = match unit {
            "K" => 1 << 10,
            "M" => 1 << 20,
            "G" => 1 << 30,
            "T" => 1 << 40,
            _ => return Err(anyhow!("Unrecognized quantity '{}'", quantity)),
        };
        let value: u64 = digits
            .parse()
            .with_context(|| format!("Unrecognized quantity '{}'", quantity))?;
        let bytes = value
            .checked_mul(factor)
            .ok_or_else(|| anyhow!("Quantity '{}' overflows", quantity))?;
        return Ok(format!("{}Mi", bytes / 2 / (1 << 20)));
    }
    let cores: u64 = quantity
        .parse()
        .with_context(|| format!("Unrecognized quantity '{}'", quantity))?;
    Ok(format!("{}m", cores * 1000 / 2))
}
