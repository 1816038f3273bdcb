use solr_common::crd::{
    ContainerImage, ProvidedZookeeper, SolrCloud, ZookeeperCluster, ZookeeperClusterSpec,
    ZookeeperImage, ZookeeperPersistence, DEFAULT_ZK_REPO, DEFAULT_ZK_VERSION,
};

use super::object_meta;

/// ZookeeperCluster for a SolrCloud that asked for a provided ensemble
pub fn generate_zookeeper_cluster(cloud: &SolrCloud, provided: &ProvidedZookeeper) -> ZookeeperCluster {
    let mut image = provided
        .image
        .clone()
        .unwrap_or_else(|| ContainerImage::new(DEFAULT_ZK_REPO, DEFAULT_ZK_VERSION));
    image.with_defaults(DEFAULT_ZK_REPO, DEFAULT_ZK_VERSION);
    let image = ZookeeperImage {
        repository: image.repository,
        tag: image.tag,
        pull_policy: image.pull_policy,
    };

    ZookeeperCluster {
        metadata: object_meta(cloud, cloud.provided_zookeeper_name(), None, &[]),
        spec: ZookeeperClusterSpec {
            replicas: provided.replica_count(),
            image: Some(image),
            labels: cloud.shared_labels(),
            persistence: provided
                .persistent_volume_claim_spec
                .clone()
                .map(|spec| ZookeeperPersistence {
                    reclaim_policy: Some("Delete".to_string()),
                    spec: Some(spec),
                }),
        },
        status: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solr_common::crd::SolrCloudSpec;

    #[test]
    fn zookeeper_cluster_follows_provided_spec() {
        let mut cloud = SolrCloud::new("books", SolrCloudSpec::default());
        cloud.metadata.namespace = Some("search".to_string());
        let provided = ProvidedZookeeper {
            replicas: Some(5),
            ..Default::default()
        };

        let zk = generate_zookeeper_cluster(&cloud, &provided);
        assert_eq!(zk.metadata.name.as_deref(), Some("books-solrcloud-zookeeper"));
        assert_eq!(zk.metadata.namespace.as_deref(), Some("search"));
        assert_eq!(zk.spec.replicas, 5);
        assert_eq!(
            zk.spec.image.map(|i| format!("{}:{}", i.repository, i.tag)).as_deref(),
            Some("pravega/zookeeper:0.2.9")
        );
        assert!(zk.spec.persistence.is_none());
    }
}
