//! Solr Operator - runs SolrCloud clusters and their Prometheus exporters

use std::sync::Arc;

use clap::Parser;
use kube::Client;

use solr_common::telemetry::init_tracing;
use solr_operator::cli::{Cli, Commands};
use solr_operator::controller_runner::{build_exporter_controllers, build_solr_cloud_controllers};
use solr_operator::startup::{crd_manifests, ensure_crds_installed};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        print!("{}", crd_manifests()?);
        return Ok(());
    }

    init_tracing(cli.operator.telemetry_config())
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))?;

    match cli.command {
        Some(Commands::Run) | None => run_controllers(&cli).await,
    }
}

async fn run_controllers(cli: &Cli) -> anyhow::Result<()> {
    let config = Arc::new(cli.operator.operator_config());
    tracing::info!(
        use_zk_operator = config.use_zk_operator,
        ingress_base_domain = ?config.ingress_base_domain,
        reconcile_timeout = ?config.reconcile_timeout,
        "Starting Solr operator"
    );

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("failed to create kubernetes client: {}", e))?;

    ensure_crds_installed(&client).await?;

    tracing::info!("Starting controllers:");
    let mut controllers = build_solr_cloud_controllers(client.clone(), config.clone());
    controllers.extend(build_exporter_controllers(client, config));

    futures::future::join_all(controllers).await;

    tracing::info!("Solr operator shutting down");
    Ok(())
}
