//! Status aggregation
//!
//! Folds the observed Solr pods into `SolrCloudStatus`: per-node readiness
//! and version, the cloud-wide version (and the target while a rolling
//! upgrade is in flight), addresses and backup readiness.

use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use solr_common::crd::{image_version, SolrCloud, SolrCloudStatus, SolrNodeStatus, BACKUP_RESTORE_VOLUME};
use solr_common::{Error, Store};
use tracing::debug;

/// List the cloud's pods and fill the pod-derived parts of `status`
///
/// `replicas`, `ready_replicas` and the ZooKeeper connection are left as
/// the caller set them.
pub async fn aggregate_status(
    store: &Store,
    cloud: &SolrCloud,
    status: &mut SolrCloudStatus,
) -> Result<(), Error> {
    let pods = store.list::<Pod>(&cloud.ns(), &cloud.pod_selector()).await?;
    debug!(pods = pods.len(), "aggregating status");
    apply_pods(cloud, pods, status);
    Ok(())
}

/// Pure part of [`aggregate_status`]
pub fn apply_pods(cloud: &SolrCloud, mut pods: Vec<Pod>, status: &mut SolrCloudStatus) {
    pods.sort_by_key(|pod| pod.name_any());

    let spec_version = cloud.solr_image().tag;
    let external = cloud.external().filter(|ext| !ext.hide_nodes);
    let mut divergent = Vec::new();
    let mut backup_ready = 0;
    let mut nodes = Vec::with_capacity(pods.len());

    for pod in &pods {
        let name = pod.name_any();
        let version = pod_version(pod).unwrap_or_default();
        if !version.is_empty() && version != spec_version {
            divergent.push(version.clone());
        }
        if mounts_backup_volume(pod) {
            backup_ready += 1;
        }

        nodes.push(SolrNodeStatus {
            node_name: pod
                .spec
                .as_ref()
                .and_then(|s| s.node_name.clone())
                .unwrap_or_default(),
            internal_address: format!("http://{}", cloud.internal_node_url(&name, true)),
            external_address: external
                .map(|ext| format!("http://{}", cloud.external_node_url(&name, &ext.domain_name, true))),
            ready: pod_ready(pod),
            version,
            name,
        });
    }

    status.solr_nodes = nodes;
    match divergent.into_iter().next() {
        Some(first) => {
            status.version = first;
            status.target_version = Some(spec_version);
        }
        None => {
            status.version = spec_version;
            status.target_version = None;
        }
    }

    status.internal_common_address = format!("http://{}", cloud.internal_common_url(true));
    status.external_common_address = cloud
        .external()
        .filter(|ext| !ext.hide_common)
        .map(|ext| format!("http://{}", cloud.external_common_url(&ext.domain_name, true)));

    status.backup_restore_ready = cloud.spec.backup_restore_volume.is_some()
        && backup_ready > 0
        && backup_ready == cloud.replicas();
}

/// Every container reports ready; a pod without container statuses is not
fn pod_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .is_some_and(|statuses| !statuses.is_empty() && statuses.iter().all(|c| c.ready))
}

/// Image tag of the first container, once the pod reports container statuses
fn pod_version(pod: &Pod) -> Option<String> {
    let started = pod
        .status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .is_some_and(|statuses| !statuses.is_empty());
    if !started {
        return None;
    }
    let image = pod
        .spec
        .as_ref()
        .and_then(|s| s.containers.first())
        .and_then(|c| c.image.as_deref())
        .unwrap_or_default();
    Some(image_version(image))
}

fn mounts_backup_volume(pod: &Pod) -> bool {
    pod.spec
        .as_ref()
        .and_then(|s| s.volumes.as_ref())
        .is_some_and(|volumes| volumes.iter().any(|v| v.name == BACKUP_RESTORE_VOLUME))
}
