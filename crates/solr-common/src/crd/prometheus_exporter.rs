//! SolrPrometheusExporter Custom Resource Definition
//!
//! Runs the Solr Prometheus exporter against a SolrCloud (through its
//! ZooKeeper connection) or a standalone Solr address.

use std::collections::BTreeMap;

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::solr_cloud::ZookeeperConnectionInfo;
use super::types::{default_image, ContainerImage, MetaOptions, PodOptions, DEFAULT_SOLR_REPO, DEFAULT_SOLR_VERSION};

/// Label carrying the owning exporter's name; also its `technology` value
pub const EXPORTER_TECHNOLOGY: &str = "solr-prometheus-exporter";

/// Specification for a SolrPrometheusExporter
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "solr.bloomberg.com",
    version = "v1beta1",
    kind = "SolrPrometheusExporter",
    plural = "solrprometheusexporters",
    shortname = "solrmetrics",
    status = "SolrPrometheusExporterStatus",
    namespaced,
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SolrPrometheusExporterSpec {
    /// The Solr instance to scrape
    #[serde(default)]
    pub solr_reference: SolrReference,

    /// Exporter image (a Solr image, which bundles the exporter)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ContainerImage>,

    /// Overrides for generated objects
    #[serde(default)]
    pub custom_prometheus_kube_options: CustomPrometheusKubeOptions,

    /// Path of the exporter binary inside the image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exporter_entrypoint: Option<String>,

    /// Exporter worker threads
    #[serde(default)]
    pub num_threads: i32,

    /// Scrape interval in seconds; exporter default when zero
    #[serde(default)]
    pub scrape_interval: i32,

    /// Custom `solr-prometheus-exporter.xml`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_config: Option<String>,
}

/// Which Solr to scrape; one of `cloud` or `standalone`
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SolrReference {
    /// A SolrCloud, by name or by ZooKeeper connection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud: Option<SolrCloudReference>,

    /// A standalone Solr
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standalone: Option<StandaloneSolrReference>,
}

/// Reference to a SolrCloud
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SolrCloudReference {
    /// Name of a SolrCloud managed by this operator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Namespace of that SolrCloud; defaults to the exporter's namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Direct ZooKeeper connection details
    #[serde(default, rename = "zkConnectionInfo", skip_serializing_if = "Option::is_none")]
    pub zk_connection_info: Option<ZookeeperConnectionInfo>,
}

/// Reference to a standalone Solr
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StandaloneSolrReference {
    /// Base URL of the Solr instance
    pub address: String,
}

/// Per-object customizations for an exporter
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomPrometheusKubeOptions {
    /// Exporter pod customizations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_options: Option<PodOptions>,
    /// Deployment metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_options: Option<MetaOptions>,
    /// ConfigMap metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map_options: Option<MetaOptions>,
}

/// Observed state of an exporter
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SolrPrometheusExporterStatus {
    /// At least one exporter pod is ready
    #[serde(default)]
    pub ready: bool,
}

impl SolrPrometheusExporter {
    /// Normalize the spec in place; returns true if anything changed
    pub fn with_defaults(&mut self) -> bool {
        let namespace = self.namespace().unwrap_or_default();
        let spec = &mut self.spec;
        let mut changed = false;

        if let Some(cloud) = spec.solr_reference.cloud.as_mut() {
            if cloud.name.is_some() && cloud.namespace.is_none() {
                cloud.namespace = Some(namespace);
                changed = true;
            }
            if let Some(info) = cloud.zk_connection_info.as_mut() {
                changed |= info.with_defaults();
            }
        }
        changed |= default_image(&mut spec.image, DEFAULT_SOLR_REPO, DEFAULT_SOLR_VERSION);
        if spec.num_threads == 0 {
            spec.num_threads = 1;
            changed = true;
        }

        changed
    }

    /// Name shared by the exporter's Deployment, Service and ConfigMap
    pub fn metrics_resource_name(&self) -> String {
        format!("{}-solr-metrics", self.name_any())
    }

    /// Labels shared by every generated object
    pub fn shared_labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(EXPORTER_TECHNOLOGY.to_string(), self.name_any())])
    }

    /// Shared labels merged over user labels
    pub fn shared_labels_with(&self, labels: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut merged = labels.clone();
        merged.extend(self.shared_labels());
        merged
    }

    /// Selector for the exporter's pods
    pub fn pod_selector_labels(&self) -> BTreeMap<String, String> {
        let mut labels = self.shared_labels();
        labels.insert("technology".to_string(), EXPORTER_TECHNOLOGY.to_string());
        labels
    }

    /// Exporter image, falling back to the default when not normalized yet
    pub fn image(&self) -> ContainerImage {
        self.spec
            .image
            .clone()
            .unwrap_or_else(|| ContainerImage::new(DEFAULT_SOLR_REPO, DEFAULT_SOLR_VERSION))
    }
}
