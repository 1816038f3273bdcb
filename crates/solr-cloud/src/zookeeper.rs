//! ZooKeeper resolution
//!
//! A SolrCloud either points at an existing ensemble or asks for one to be
//! provisioned through the ZooKeeper operator.

use kube::ResourceExt;
use solr_common::crd::{ProvidedZookeeper, SolrCloud, ZookeeperConnectionInfo};
use solr_common::kube_utils::{copy_zookeeper_cluster_fields, create_or_update};
use solr_common::Error;
use tracing::debug;

use crate::controller::{owned, SolrCloudContext};
use crate::resources::generate_zookeeper_cluster;

/// Resolve the connection info Solr uses to reach ZooKeeper
///
/// Exactly one of `connectionInfo` and `provided` must be set.
pub(crate) async fn resolve_zookeeper(
    cloud: &SolrCloud,
    ctx: &SolrCloudContext,
) -> Result<ZookeeperConnectionInfo, Error> {
    let resource = cloud.name_any();
    let zk_ref = cloud.spec.zookeeper_ref.as_ref();
    match zk_ref.map(|r| (&r.connection_info, &r.provided)) {
        Some((Some(info), None)) => {
            debug!(connection = %info.zk_connection_string(), "using external ZooKeeper");
            Ok(info.clone())
        }
        Some((None, Some(provided))) => provision(cloud, provided, ctx).await,
        Some((Some(_), Some(_))) => Err(Error::bad_request_for(
            resource,
            "zookeeperRef must set only one of connectionInfo and provided",
        )),
        _ => Err(Error::bad_request_for(
            resource,
            "zookeeperRef must set one of connectionInfo or provided",
        )),
    }
}

async fn provision(
    cloud: &SolrCloud,
    provided: &ProvidedZookeeper,
    ctx: &SolrCloudContext,
) -> Result<ZookeeperConnectionInfo, Error> {
    if !ctx.config.use_zk_operator {
        return Err(Error::bad_request_for(
            cloud.name_any(),
            "a provided ZooKeeper requires the ZooKeeper operator integration",
        ));
    }

    let desired = owned(cloud, generate_zookeeper_cluster(cloud, provided))?;
    let live = create_or_update(&ctx.store, desired, copy_zookeeper_cluster_fields).await?;

    Ok(ZookeeperConnectionInfo {
        internal_connection_string: live.internal_connection_string(),
        external_connection_string: live.external_connection_string(),
        chroot: provided.chroot.clone(),
    })
}
