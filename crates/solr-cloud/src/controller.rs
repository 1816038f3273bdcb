//! SolrCloud controller implementation
//!
//! Each pass re-reads the SolrCloud, normalizes its spec and then walks the
//! dependents in a fixed order: ZooKeeper, services, ConfigMap, StatefulSet,
//! status, Ingress. Every step is an idempotent create-or-update, so a pass
//! over a converged cloud performs no writes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use kube::runtime::controller::Action;
use kube::{Client, Resource, ResourceExt};
use solr_common::crd::{ExternalAddressabilityMethod, SolrCloud, SolrCloudStatus};
use solr_common::kube_utils::{
    copy_config_map_fields, copy_ingress_fields, copy_service_fields, copy_stateful_set_fields,
    create_or_update, set_owner,
};
use solr_common::{
    Error, OperatorConfig, Store, REQUEUE_AFTER_DEFAULTS_SECS, REQUEUE_ERROR_DELAY_SECS,
};
use tracing::{debug, error, info, instrument};

use crate::node_service::reconcile_node_service;
use crate::resources::{
    generate_common_service, generate_config_map, generate_headless_service, generate_ingress,
    generate_stateful_set,
};
use crate::status::aggregate_status;
use crate::zookeeper::resolve_zookeeper;

// =============================================================================
// Controller context
// =============================================================================

/// Shared state for every SolrCloud reconcile
pub struct SolrCloudContext {
    /// Object store for the cloud and its dependents
    pub store: Store,
    /// Process-wide operator configuration
    pub config: Arc<OperatorConfig>,
}

impl SolrCloudContext {
    /// Create a context from an existing store
    pub fn new(store: Store, config: Arc<OperatorConfig>) -> Self {
        Self { store, config }
    }

    /// Create a context talking to the API server
    pub fn from_client(client: Client, config: Arc<OperatorConfig>) -> Self {
        Self::new(Store::from_client(client), config)
    }

    /// Context with default configuration over the given store
    #[cfg(test)]
    pub fn for_testing(store: Store) -> Self {
        Self::new(store, Arc::new(OperatorConfig::default()))
    }
}

/// Attach the cloud as controlling owner of a generated object
pub(crate) fn owned<K: Resource>(cloud: &SolrCloud, mut object: K) -> Result<K, Error> {
    set_owner(cloud, object.meta_mut())?;
    Ok(object)
}

// =============================================================================
// Reconciliation
// =============================================================================

/// Reconcile a SolrCloud
///
/// Returns `await_change` once the pass completed, or a short requeue when
/// the spec was normalized and written back. The whole pass is bounded by
/// the configured reconcile timeout.
#[instrument(skip(cloud, ctx), fields(solr_cloud = %cloud.name_any()))]
pub async fn reconcile(cloud: Arc<SolrCloud>, ctx: Arc<SolrCloudContext>) -> Result<Action, Error> {
    let name = cloud.name_any();
    let namespace = cloud
        .namespace()
        .ok_or_else(|| Error::missing_metadata("SolrCloud", "namespace"))?;
    let deadline = ctx.config.reconcile_timeout;

    match tokio::time::timeout(deadline, converge(&namespace, &name, &ctx)).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(format!("{namespace}/{name}"), deadline)),
    }
}

async fn converge(namespace: &str, name: &str, ctx: &SolrCloudContext) -> Result<Action, Error> {
    let store = &ctx.store;

    let Some(mut cloud) = store.get::<SolrCloud>(namespace, name).await? else {
        debug!("SolrCloud is gone");
        return Ok(Action::await_change());
    };

    if cloud.with_defaults(ctx.config.base_domain()) {
        info!("persisting defaulted spec");
        store.replace(&cloud).await?;
        return Ok(Action::requeue(Duration::from_secs(
            REQUEUE_AFTER_DEFAULTS_SECS,
        )));
    }

    let mut status = SolrCloudStatus {
        zookeeper_connection_info: resolve_zookeeper(&cloud, ctx).await?,
        ..Default::default()
    };

    create_or_update(
        store,
        owned(&cloud, generate_common_service(&cloud))?,
        copy_service_fields,
    )
    .await?;

    let mut host_ips = BTreeMap::new();
    let mut awaiting_node_ips = false;
    if cloud.uses_individual_node_services() {
        let use_external_address = cloud.external().is_some_and(|ext| ext.use_external_address);
        for node in cloud.node_names() {
            let ip = reconcile_node_service(store, &cloud, &node).await?;
            if !use_external_address {
                continue;
            }
            if ip.is_empty() {
                awaiting_node_ips = true;
            } else {
                host_ips.insert(cloud.advertised_node_host(&node), ip);
            }
        }
    }

    if cloud.uses_headless_service() {
        create_or_update(
            store,
            owned(&cloud, generate_headless_service(&cloud))?,
            copy_service_fields,
        )
        .await?;
    }

    create_or_update(
        store,
        owned(&cloud, generate_config_map(&cloud))?,
        copy_config_map_fields,
    )
    .await?;

    if !status.zookeeper_connection_info.has_host_and_port() {
        info!("ZooKeeper connection not available yet, deferring StatefulSet");
    } else if awaiting_node_ips {
        info!("node services have no cluster IP yet, deferring StatefulSet");
    } else {
        let stateful_set = create_or_update(
            store,
            owned(&cloud, generate_stateful_set(&cloud, &status, &host_ips))?,
            copy_stateful_set_fields,
        )
        .await?;
        if let Some(sts_status) = stateful_set.status {
            status.replicas = sts_status.replicas;
            status.ready_replicas = sts_status.ready_replicas.unwrap_or_default();
        }
    }

    aggregate_status(store, &cloud, &mut status).await?;

    if cloud
        .external()
        .is_some_and(|ext| ext.method == ExternalAddressabilityMethod::Ingress)
    {
        create_or_update(
            store,
            owned(&cloud, generate_ingress(&cloud, &cloud.node_names()))?,
            copy_ingress_fields,
        )
        .await?;
    }

    if cloud.status.as_ref() != Some(&status) {
        info!(
            ready = status.ready_replicas,
            replicas = status.replicas,
            version = %status.version,
            "updating status"
        );
        store.patch_status(&cloud, &status).await?;
    } else {
        debug!("status unchanged");
    }

    Ok(Action::await_change())
}

/// Error policy for the SolrCloud controller
///
/// Retryable errors requeue after a fixed delay; the rest wait for the
/// SolrCloud to change.
pub fn error_policy(cloud: Arc<SolrCloud>, error: &Error, _ctx: Arc<SolrCloudContext>) -> Action {
    error!(
        ?error,
        solr_cloud = %cloud.name_any(),
        retryable = error.is_retryable(),
        "reconciliation failed"
    );

    if error.is_retryable() {
        Action::requeue(Duration::from_secs(REQUEUE_ERROR_DELAY_SECS))
    } else {
        Action::await_change()
    }
}
