//! Client-side model of the ZooKeeper operator's ZookeeperCluster
//!
//! Only the fields the Solr operator writes or reads are modelled. The CRD
//! itself is installed by the ZooKeeper operator, never by us.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::PersistentVolumeClaimSpec;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// ZooKeeper client port
pub const ZK_CLIENT_PORT: i32 = 2181;

/// Specification of a ZookeeperCluster
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "zookeeper.pravega.io",
    version = "v1beta1",
    kind = "ZookeeperCluster",
    plural = "zookeeperclusters",
    status = "ZookeeperClusterStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct ZookeeperClusterSpec {
    /// Ensemble size
    #[serde(default)]
    pub replicas: i32,

    /// ZooKeeper image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ZookeeperImage>,

    /// Labels applied to ensemble pods
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Storage for each member
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistence: Option<ZookeeperPersistence>,
}

/// ZooKeeper image reference
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ZookeeperImage {
    /// Image repository
    #[serde(default)]
    pub repository: String,
    /// Image tag
    #[serde(default)]
    pub tag: String,
    /// Pull policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_policy: Option<String>,
}

/// Persistence settings for ensemble members
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ZookeeperPersistence {
    /// Reclaim policy for member volumes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reclaim_policy: Option<String>,
    /// Claim template for each member
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<PersistentVolumeClaimSpec>,
}

/// Observed state reported by the ZooKeeper operator
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ZookeeperClusterStatus {
    /// Members reported by the ensemble's StatefulSet
    #[serde(default)]
    pub replicas: i32,
    /// Ready members
    #[serde(default)]
    pub ready_replicas: i32,
    /// In-cluster client endpoint
    #[serde(default)]
    pub internal_client_endpoint: String,
    /// Client endpoint reachable from outside the cluster, empty when none
    #[serde(default)]
    pub external_client_endpoint: String,
}

impl ZookeeperCluster {
    /// Per-member connection string derived from the declared replica count
    ///
    /// `<zk>-<i>.<zk>-headless.<ns>:2181` for each member, comma separated.
    pub fn internal_connection_string(&self) -> String {
        let name = self.metadata.name.clone().unwrap_or_default();
        let namespace = self.metadata.namespace.clone().unwrap_or_default();
        (0..self.spec.replicas.max(0))
            .map(|i| format!("{name}-{i}.{name}-headless.{namespace}:{ZK_CLIENT_PORT}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// External client endpoint, `None` when unreported or empty
    pub fn external_connection_string(&self) -> Option<String> {
        self.status
            .as_ref()
            .map(|s| s.external_client_endpoint.clone())
            .filter(|endpoint| !endpoint.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(replicas: i32) -> ZookeeperCluster {
        let mut zk = ZookeeperCluster::new(
            "books-solrcloud-zookeeper",
            ZookeeperClusterSpec {
                replicas,
                ..Default::default()
            },
        );
        zk.metadata.namespace = Some("search".to_string());
        zk
    }

    #[test]
    fn connection_string_lists_every_member() {
        assert_eq!(
            cluster(3).internal_connection_string(),
            "books-solrcloud-zookeeper-0.books-solrcloud-zookeeper-headless.search:2181,\
             books-solrcloud-zookeeper-1.books-solrcloud-zookeeper-headless.search:2181,\
             books-solrcloud-zookeeper-2.books-solrcloud-zookeeper-headless.search:2181"
        );
        assert_eq!(cluster(0).internal_connection_string(), "");
    }

    #[test]
    fn empty_external_endpoint_is_none() {
        let mut zk = cluster(1);
        assert_eq!(zk.external_connection_string(), None);

        zk.status = Some(ZookeeperClusterStatus::default());
        assert_eq!(zk.external_connection_string(), None);

        zk.status = Some(ZookeeperClusterStatus {
            external_client_endpoint: "10.0.0.1:2181".to_string(),
            ..Default::default()
        });
        assert_eq!(zk.external_connection_string().as_deref(), Some("10.0.0.1:2181"));
    }
}
