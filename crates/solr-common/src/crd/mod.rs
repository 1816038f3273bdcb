//! Custom Resource Definitions for the Solr operator
//!
//! `SolrCloud` and `SolrPrometheusExporter` are owned by this operator;
//! `ZookeeperCluster` belongs to the ZooKeeper operator and is only modelled
//! so we can create and read it.

mod prometheus_exporter;
mod solr_cloud;
mod types;
mod zookeeper;

pub use prometheus_exporter::{
    CustomPrometheusKubeOptions, SolrCloudReference, SolrPrometheusExporter,
    SolrPrometheusExporterSpec, SolrPrometheusExporterStatus, SolrReference,
    StandaloneSolrReference, EXPORTER_TECHNOLOGY,
};
pub use solr_cloud::{
    CustomSolrKubeOptions, ExternalAddressability, ExternalAddressabilityMethod,
    ProvidedZookeeper, SolrAddressabilityOptions, SolrCloud, SolrCloudSpec, SolrCloudStatus,
    SolrNodeStatus, ZookeeperConnectionInfo, ZookeeperRef, BACKUP_RESTORE_VOLUME,
    DEFAULT_COMMON_SERVICE_PORT, DEFAULT_INGRESS_PORT, DEFAULT_SOLR_LOG_LEVEL, DEFAULT_SOLR_PORT,
    DEFAULT_SOLR_REPLICAS, DEFAULT_ZK_REPLICAS, SOLR_CLOUD_LABEL, SOLR_CLOUD_TECHNOLOGY,
};
pub use types::{
    image_version, merge_maps, ContainerImage, MetaOptions, PodOptions, DEFAULT_BUSYBOX_REPO,
    DEFAULT_BUSYBOX_VERSION, DEFAULT_SOLR_REPO, DEFAULT_SOLR_VERSION, DEFAULT_ZK_REPO,
    DEFAULT_ZK_VERSION,
};
pub use zookeeper::{
    ZookeeperCluster, ZookeeperClusterSpec, ZookeeperClusterStatus, ZookeeperImage,
    ZookeeperPersistence, ZK_CLIENT_PORT,
};
