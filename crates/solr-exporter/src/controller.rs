//! SolrPrometheusExporter controller implementation
//!
//! Resolves what the exporter should scrape, then converges the optional
//! metrics ConfigMap, the metrics Service and the exporter Deployment.

use std::sync::Arc;
use std::time::Duration;

use kube::runtime::controller::Action;
use kube::{Client, Resource, ResourceExt};
use solr_common::crd::{SolrCloud, SolrPrometheusExporter, SolrPrometheusExporterStatus};
use solr_common::kube_utils::{
    copy_config_map_fields, copy_deployment_fields, copy_service_fields, create_or_update,
    set_owner,
};
use solr_common::{
    Error, OperatorConfig, Store, REQUEUE_AFTER_DEFAULTS_SECS, REQUEUE_ERROR_DELAY_SECS,
};
use tracing::{debug, error, info, instrument};

use crate::resources::{
    generate_exporter_deployment, generate_metrics_config_map, generate_metrics_service,
    SolrConnection,
};

/// Shared state for every exporter reconcile
pub struct ExporterContext {
    /// Object store for the exporter, its dependents and referenced clouds
    pub store: Store,
    /// Process-wide operator configuration
    pub config: Arc<OperatorConfig>,
}

impl ExporterContext {
    /// Create a context from an existing store
    pub fn new(store: Store, config: Arc<OperatorConfig>) -> Self {
        Self { store, config }
    }

    /// Create a context talking to the API server
    pub fn from_client(client: Client, config: Arc<OperatorConfig>) -> Self {
        Self::new(Store::from_client(client), config)
    }
}

fn owned<K: Resource>(exporter: &SolrPrometheusExporter, mut object: K) -> Result<K, Error> {
    set_owner(exporter, object.meta_mut())?;
    Ok(object)
}

/// Work out what the exporter scrapes
///
/// An explicit ZooKeeper connection wins over a referenced SolrCloud, which
/// wins over a standalone address.
pub async fn resolve_connection(
    store: &Store,
    exporter: &SolrPrometheusExporter,
) -> Result<SolrConnection, Error> {
    let reference = &exporter.spec.solr_reference;

    if let Some(cloud) = &reference.cloud {
        if let Some(info) = &cloud.zk_connection_info {
            return Ok(SolrConnection::ZooKeeper(info.zk_connection_string()));
        }
        if let Some(name) = &cloud.name {
            let namespace = cloud
                .namespace
                .clone()
                .or_else(|| exporter.namespace())
                .unwrap_or_default();
            let found = store.get::<SolrCloud>(&namespace, name).await?.ok_or_else(|| {
                Error::dependency_for(
                    exporter.name_any(),
                    format!("SolrCloud {namespace}/{name} does not exist"),
                )
            })?;
            let zk = found
                .status
                .map(|status| status.zk_connection_string())
                .filter(|zk| zk.contains(':'))
                .ok_or_else(|| {
                    Error::dependency_for(
                        exporter.name_any(),
                        format!("SolrCloud {namespace}/{name} has no ZooKeeper connection yet"),
                    )
                })?;
            return Ok(SolrConnection::ZooKeeper(zk));
        }
    }

    match &reference.standalone {
        Some(standalone) if !standalone.address.is_empty() => {
            Ok(SolrConnection::Standalone(standalone.address.clone()))
        }
        _ => Err(Error::bad_request_for(
            exporter.name_any(),
            "solrReference must name a SolrCloud, a ZooKeeper connection or a standalone address",
        )),
    }
}

/// Reconcile a SolrPrometheusExporter
#[instrument(skip(exporter, ctx), fields(exporter = %exporter.name_any()))]
pub async fn reconcile(
    exporter: Arc<SolrPrometheusExporter>,
    ctx: Arc<ExporterContext>,
) -> Result<Action, Error> {
    let name = exporter.name_any();
    let namespace = exporter
        .namespace()
        .ok_or_else(|| Error::missing_metadata("SolrPrometheusExporter", "namespace"))?;
    let deadline = ctx.config.reconcile_timeout;

    match tokio::time::timeout(deadline, converge(&namespace, &name, &ctx)).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(format!("{namespace}/{name}"), deadline)),
    }
}

async fn converge(namespace: &str, name: &str, ctx: &ExporterContext) -> Result<Action, Error> {
    let store = &ctx.store;

    let Some(mut exporter) = store.get::<SolrPrometheusExporter>(namespace, name).await? else {
        debug!("exporter is gone");
        return Ok(Action::await_change());
    };

    if exporter.with_defaults() {
        info!("persisting defaulted spec");
        store.replace(&exporter).await?;
        return Ok(Action::requeue(Duration::from_secs(
            REQUEUE_AFTER_DEFAULTS_SECS,
        )));
    }

    let connection = resolve_connection(store, &exporter).await?;
    debug!(?connection, "resolved Solr connection");

    if let Some(config) = &exporter.spec.metrics_config {
        create_or_update(
            store,
            owned(&exporter, generate_metrics_config_map(&exporter, config))?,
            copy_config_map_fields,
        )
        .await?;
    }

    create_or_update(
        store,
        owned(&exporter, generate_metrics_service(&exporter))?,
        copy_service_fields,
    )
    .await?;

    let deployment = create_or_update(
        store,
        owned(&exporter, generate_exporter_deployment(&exporter, &connection))?,
        copy_deployment_fields,
    )
    .await?;

    let status = SolrPrometheusExporterStatus {
        ready: deployment
            .status
            .and_then(|s| s.ready_replicas)
            .is_some_and(|ready| ready > 0),
    };
    if exporter.status.as_ref() != Some(&status) {
        info!(ready = status.ready, "updating status");
        store.patch_status(&exporter, &status).await?;
    }

    Ok(Action::await_change())
}

/// Error policy for the exporter controller
pub fn error_policy(
    exporter: Arc<SolrPrometheusExporter>,
    error: &Error,
    _ctx: Arc<ExporterContext>,
) -> Action {
    error!(
        ?error,
        exporter = %exporter.name_any(),
        retryable = error.is_retryable(),
        "reconciliation failed"
    );

    if error.is_retryable() {
        Action::requeue(Duration::from_secs(REQUEUE_ERROR_DELAY_SECS))
    } else {
        Action::await_change()
    }
}
