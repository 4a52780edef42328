use std::error::Error;
use std::sync::Arc;

use config::load_config;
use domain::deploy::{DeployContext, Deployer};
use domain::AppService;
use infra::{kubernetes::KubernetesOrchestrator, memory::InMemoryApplicationRepository, web::router};
use log::{info, warn};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

mod config;
mod domain;
mod infra;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    info!("Start Airlift - minimal PaaS control plane");

    let config = load_config()?;
    info!("Loaded config {:?}", config);

    let cluster = KubernetesOrchestrator::connect(config.app_namespace.clone()).await?;
    let cluster: Arc<dyn domain::port::ClusterOrchestrator> = Arc::new(cluster);
    if let Err(err) = cluster.ensure_namespace().await {
        warn!("Can't ensure namespace at startup: {}", err);
    }

    let repository = Arc::new(InMemoryApplicationRepository::default());

    let shutdown = CancellationToken::new();
    let (deployer, deploys) = Deployer::spawn(
        DeployContext {
            repository: repository.clone(),
            cluster: cluster.clone(),
        },
        shutdown.clone(),
    );
    let service = AppService::new(repository, cluster, deployer);

    let listener = TcpListener::bind(&config.listen_address).await?;
    info!("Listening on {}", config.listen_address);
    axum::serve(listener, router(service))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    // stop deploy intake, interrupt readiness waits, drain in-flight work
    shutdown.cancel();
    deploys.await?;
    info!("Deploy worker drained, bye");
    Ok(())
}
