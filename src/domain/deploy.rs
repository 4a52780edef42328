use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use super::error::AppError;
use super::model::{AppStatus, Application};
use super::port::{ApplicationRepository, ClusterOrchestrator};

/// Upper bound on one readiness wait. The rollout can still converge after
/// the bound, so exceeding it is not a failure.
pub const DEPLOY_READY_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Clone)]
pub struct DeployContext {
    pub repository: Arc<dyn ApplicationRepository>,
    pub cluster: Arc<dyn ClusterOrchestrator>,
}

struct DeployJob {
    app: Application,
    generation: u64,
}

/// Handle for scheduling deploy sequences.
///
/// Sequences run detached from the request that triggered them, on a worker
/// task with its own lifetime. Cancelling the shutdown token stops intake,
/// interrupts readiness waits and drains in-flight sequences.
#[derive(Clone)]
pub struct Deployer {
    tx: mpsc::UnboundedSender<DeployJob>,
}

impl Deployer {
    pub fn spawn(ctx: DeployContext, shutdown: CancellationToken) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(worker(ctx, rx, shutdown));
        (Deployer { tx }, handle)
    }

    pub fn schedule(&self, app: Application, generation: u64) {
        let slug = app.slug.clone();
        if self.tx.send(DeployJob { app, generation }).is_err() {
            warn!("Deploy queue is closed, dropping deploy of {}", slug);
        }
    }
}

async fn worker(
    ctx: DeployContext,
    mut rx: mpsc::UnboundedReceiver<DeployJob>,
    shutdown: CancellationToken,
) {
    let mut sequences = JoinSet::new();
    loop {
        tokio::select! {
            job = rx.recv() => match job {
                Some(job) => {
                    let ctx = ctx.clone();
                    let cancel = shutdown.child_token();
                    sequences.spawn(async move { run(ctx, job, cancel).await });
                }
                None => break,
            },
            _ = shutdown.cancelled() => break,
            Some(_) = sequences.join_next(), if !sequences.is_empty() => {}
        }
    }
    while sequences.join_next().await.is_some() {}
}

async fn run(ctx: DeployContext, job: DeployJob, cancel: CancellationToken) {
    let DeployJob { app, generation } = job;
    match deploy_sequence(&ctx, &app, generation, &cancel).await {
        Ok(()) => {}
        Err(AppError::Canceled) => info!("Deploy of {} interrupted by shutdown", app.slug),
        Err(err) => {
            error!("Deploy of {} failed: {}", app.slug, err);
            match ctx
                .repository
                .update_status(app.id, generation, AppStatus::Failed)
                .await
            {
                Ok(true) => {}
                Ok(false) => info!("Not recording failure of superseded deploy for {}", app.slug),
                Err(status_err) => {
                    error!("Can't record failed status for {}: {}", app.slug, status_err)
                }
            }
        }
    }
}

/// One deploy sequence: mark deploying, ensure the namespace, apply the
/// derived resources, wait for readiness, mark running. Cluster errors
/// before the wait abort the sequence; a wait that times out does not.
async fn deploy_sequence(
    ctx: &DeployContext,
    app: &Application,
    generation: u64,
    cancel: &CancellationToken,
) -> Result<(), AppError> {
    if !ctx
        .repository
        .update_status(app.id, generation, AppStatus::Deploying)
        .await?
    {
        info!("Deploy of {} superseded before it started", app.slug);
        return Ok(());
    }

    ctx.cluster.ensure_namespace().await?;

    let spec = app.to_spec();
    ctx.cluster.apply_workload(&spec).await?;
    ctx.cluster.apply_endpoint(&spec).await?;
    if spec.domain.is_some() {
        ctx.cluster.apply_route(&spec).await?;
    }

    match ctx
        .cluster
        .wait_ready(&spec.slug, DEPLOY_READY_TIMEOUT, cancel)
        .await
    {
        Ok(()) => info!("Application {} is ready", spec.slug),
        Err(AppError::Canceled) => return Err(AppError::Canceled),
        Err(err) => warn!(
            "Application {} not ready after rollout wait: {}",
            spec.slug, err
        ),
    }

    if !ctx
        .repository
        .update_status(app.id, generation, AppStatus::Running)
        .await?
    {
        info!("Status of {} now owned by a newer deploy", app.slug);
    }
    Ok(())
}
