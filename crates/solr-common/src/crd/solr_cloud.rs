//! SolrCloud Custom Resource Definition
//!
//! A SolrCloud describes a Solr cluster running in cloud mode: the Solr
//! image and replica count, how it reaches ZooKeeper, and how its nodes
//! are addressed from inside and outside the cluster.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{PersistentVolumeClaimSpec, Volume};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{
    default_image, ContainerImage, MetaOptions, PodOptions, DEFAULT_BUSYBOX_REPO,
    DEFAULT_BUSYBOX_VERSION, DEFAULT_SOLR_REPO, DEFAULT_SOLR_VERSION, DEFAULT_ZK_REPO,
    DEFAULT_ZK_VERSION,
};

/// Label carrying the owning SolrCloud's name
pub const SOLR_CLOUD_LABEL: &str = "solr-cloud";
/// Value of the `technology` label on SolrCloud pods
pub const SOLR_CLOUD_TECHNOLOGY: &str = "solr-cloud";
/// Name of the backup/restore volume mounted into Solr pods
pub const BACKUP_RESTORE_VOLUME: &str = "backup-restore";

/// Default replica count for a SolrCloud
pub const DEFAULT_SOLR_REPLICAS: i32 = 3;
/// Default replica count for a provided ZooKeeper ensemble
pub const DEFAULT_ZK_REPLICAS: i32 = 3;
/// Default Solr pod port
pub const DEFAULT_SOLR_PORT: i32 = 8983;
/// Default common service port
pub const DEFAULT_COMMON_SERVICE_PORT: i32 = 80;
/// Default external port when addressed through an Ingress
pub const DEFAULT_INGRESS_PORT: i32 = 80;
/// Default Solr log level
pub const DEFAULT_SOLR_LOG_LEVEL: &str = "INFO";

/// Specification for a SolrCloud
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "solr.bloomberg.com",
    version = "v1beta1",
    kind = "SolrCloud",
    plural = "solrclouds",
    shortname = "solr",
    status = "SolrCloudStatus",
    namespaced,
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".status.version"}"#,
    printcolumn = r#"{"name":"TargetVersion","type":"string","jsonPath":".status.targetVersion"}"#,
    printcolumn = r#"{"name":"DesiredNodes","type":"integer","jsonPath":".spec.replicas"}"#,
    printcolumn = r#"{"name":"Nodes","type":"integer","jsonPath":".status.replicas"}"#,
    printcolumn = r#"{"name":"ReadyNodes","type":"integer","jsonPath":".status.readyReplicas"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SolrCloudSpec {
    /// Number of Solr nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// Solr image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solr_image: Option<ContainerImage>,

    /// Image for the init container that prepares the data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub busy_box_image: Option<ContainerImage>,

    /// How Solr reaches ZooKeeper
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zookeeper_ref: Option<ZookeeperRef>,

    /// Internal and external addressing of nodes and the common endpoint
    #[serde(default)]
    pub solr_addressability: SolrAddressabilityOptions,

    /// Shared volume mounted on every node for collection backups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_restore_volume: Option<Volume>,

    /// Persistent data storage; an emptyDir is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_pvc_spec: Option<PersistentVolumeClaimSpec>,

    /// Value for `SOLR_JAVA_MEM`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solr_java_mem: Option<String>,

    /// Value for `SOLR_OPTS`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solr_opts: Option<String>,

    /// Value for `GC_TUNE`
    #[serde(default, rename = "solrGCTune", skip_serializing_if = "Option::is_none")]
    pub solr_gc_tune: Option<String>,

    /// Value for `SOLR_LOG_LEVEL`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solr_log_level: Option<String>,

    /// Overrides for generated objects
    #[serde(default)]
    pub custom_solr_kube_options: CustomSolrKubeOptions,
}

/// Per-object customizations for a SolrCloud
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomSolrKubeOptions {
    /// Solr pod customizations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_options: Option<PodOptions>,
    /// StatefulSet metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stateful_set_options: Option<MetaOptions>,
    /// Common service metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_service_options: Option<MetaOptions>,
    /// Headless service metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headless_service_options: Option<MetaOptions>,
    /// Per-node service metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_service_options: Option<MetaOptions>,
    /// ConfigMap metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map_options: Option<MetaOptions>,
    /// Ingress metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_options: Option<MetaOptions>,
}

/// Reference to the ZooKeeper ensemble backing a SolrCloud
///
/// Exactly one of `connection_info` and `provided` must be set.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ZookeeperRef {
    /// Connection details of an externally managed ensemble
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_info: Option<ZookeeperConnectionInfo>,

    /// Request that the operator provision an ensemble
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provided: Option<ProvidedZookeeper>,
}

impl ZookeeperRef {
    fn with_defaults(&mut self) -> bool {
        let mut changed = false;
        if let Some(info) = self.connection_info.as_mut() {
            changed |= info.with_defaults();
        }
        if let Some(provided) = self.provided.as_mut() {
            changed |= provided.with_defaults();
        }
        changed
    }
}

/// How to reach a ZooKeeper ensemble
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ZookeeperConnectionInfo {
    /// Comma separated `host:port` list usable from inside the cluster
    #[serde(default)]
    pub internal_connection_string: String,

    /// Connection string usable from outside the cluster, if any
    ///
    /// Serialized as `null` when absent so that status merge patches clear it.
    #[serde(default)]
    pub external_connection_string: Option<String>,

    /// ZNode path Solr is rooted at
    #[serde(default)]
    pub chroot: String,
}

impl ZookeeperConnectionInfo {
    /// Normalize the chroot to an absolute path; returns true if changed
    pub fn with_defaults(&mut self) -> bool {
        normalize_chroot(&mut self.chroot)
    }

    /// Connection string including the chroot, as handed to Solr
    pub fn zk_connection_string(&self) -> String {
        format!("{}{}", self.internal_connection_string, self.chroot)
    }

    /// True when the internal connection string contains a `host:port` pair
    pub fn has_host_and_port(&self) -> bool {
        self.zk_connection_string().contains(':')
    }
}

/// A ZooKeeper ensemble provisioned through the ZooKeeper operator
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProvidedZookeeper {
    /// Ensemble size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    /// ZooKeeper image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ContainerImage>,

    /// Storage for each ZooKeeper member
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_volume_claim_spec: Option<PersistentVolumeClaimSpec>,

    /// ZNode path Solr is rooted at
    #[serde(default)]
    pub chroot: String,
}

impl ProvidedZookeeper {
    fn with_defaults(&mut self) -> bool {
        let mut changed = false;
        if self.replicas.is_none() {
            self.replicas = Some(DEFAULT_ZK_REPLICAS);
            changed = true;
        }
        changed |= default_image(&mut self.image, DEFAULT_ZK_REPO, DEFAULT_ZK_VERSION);
        changed |= normalize_chroot(&mut self.chroot);
        changed
    }

    /// Declared ensemble size
    pub fn replica_count(&self) -> i32 {
        self.replicas.unwrap_or(DEFAULT_ZK_REPLICAS)
    }
}

fn normalize_chroot(chroot: &mut String) -> bool {
    if chroot.is_empty() {
        *chroot = "/".to_string();
        true
    } else if !chroot.starts_with('/') {
        chroot.insert(0, '/');
        true
    } else {
        false
    }
}

/// Addressing of Solr nodes and the common endpoint
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SolrAddressabilityOptions {
    /// External exposure; internal-only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<ExternalAddressability>,

    /// Port Solr listens on inside the pod
    #[serde(default)]
    pub pod_port: i32,

    /// Port of the common service
    #[serde(default)]
    pub common_service_port: i32,
}

impl SolrAddressabilityOptions {
    fn with_defaults(&mut self, ingress_base_domain: Option<&str>) -> bool {
        let mut changed = false;
        if self.external.is_none() {
            if let Some(domain) = ingress_base_domain {
                self.external = Some(ExternalAddressability {
                    method: ExternalAddressabilityMethod::Ingress,
                    domain_name: domain.to_string(),
                    ..Default::default()
                });
                changed = true;
            }
        }
        if let Some(external) = self.external.as_mut() {
            if external.domain_name.is_empty() {
                if let Some(domain) = ingress_base_domain {
                    external.domain_name = domain.to_string();
                    changed = true;
                }
            }
            if external.method == ExternalAddressabilityMethod::Ingress
                && external.node_port_override == 0
            {
                external.node_port_override = DEFAULT_INGRESS_PORT;
                changed = true;
            }
        }
        if self.pod_port == 0 {
            self.pod_port = DEFAULT_SOLR_PORT;
            changed = true;
        }
        if self.common_service_port == 0 {
            self.common_service_port = DEFAULT_COMMON_SERVICE_PORT;
            changed = true;
        }
        changed
    }
}

/// How a SolrCloud is exposed outside the cluster
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ExternalAddressabilityMethod {
    /// Through an Ingress with one host per node plus a common host
    #[default]
    Ingress,
    /// Through DNS records managed by ExternalDNS
    ExternalDNS,
}

impl std::fmt::Display for ExternalAddressabilityMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ingress => write!(f, "Ingress"),
            Self::ExternalDNS => write!(f, "ExternalDNS"),
        }
    }
}

/// External exposure options
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalAddressability {
    /// Exposure mechanism
    #[serde(default)]
    pub method: ExternalAddressabilityMethod,

    /// Advertise the external address to Solr instead of the internal one
    #[serde(default)]
    pub use_external_address: bool,

    /// Do not expose individual nodes
    #[serde(default)]
    pub hide_nodes: bool,

    /// Do not expose the common endpoint
    #[serde(default)]
    pub hide_common: bool,

    /// Base domain for external hostnames
    #[serde(default)]
    pub domain_name: String,

    /// Port nodes are reachable on externally
    #[serde(default)]
    pub node_port_override: i32,
}

/// Observed state of a SolrCloud, recomputed on every pass
///
/// Optional fields serialize as `null` so a merge patch clears stale values.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SolrCloudStatus {
    /// Per-pod status, ordered by pod name
    #[serde(default)]
    pub solr_nodes: Vec<SolrNodeStatus>,

    /// StatefulSet replicas
    #[serde(default)]
    pub replicas: i32,

    /// StatefulSet ready replicas
    #[serde(default)]
    pub ready_replicas: i32,

    /// Solr version currently running
    #[serde(default)]
    pub version: String,

    /// Version being rolled out, when different from `version`
    #[serde(default)]
    pub target_version: Option<String>,

    /// Address of the common service inside the cluster
    #[serde(default)]
    pub internal_common_address: String,

    /// Address of the common endpoint outside the cluster
    #[serde(default)]
    pub external_common_address: Option<String>,

    /// Resolved ZooKeeper connection details
    #[serde(default)]
    pub zookeeper_connection_info: ZookeeperConnectionInfo,

    /// Every node mounts the backup/restore volume
    #[serde(default)]
    pub backup_restore_ready: bool,
}

impl SolrCloudStatus {
    /// Connection string Solr should use, including the chroot
    pub fn zk_connection_string(&self) -> String {
        self.zookeeper_connection_info.zk_connection_string()
    }
}

/// Status of a single Solr pod
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SolrNodeStatus {
    /// Pod name
    pub name: String,

    /// Kubernetes node the pod is scheduled on
    #[serde(default)]
    pub node_name: String,

    /// In-cluster URL
    #[serde(default)]
    pub internal_address: String,

    /// External URL, when nodes are exposed
    #[serde(default)]
    pub external_address: Option<String>,

    /// All containers report ready
    #[serde(default)]
    pub ready: bool,

    /// Solr version from the pod's image tag
    #[serde(default)]
    pub version: String,
}

// =============================================================================
// Defaulting and derived names
// =============================================================================

impl SolrCloud {
    /// Normalize the spec in place; returns true if anything changed
    ///
    /// Applying this twice returns false the second time.
    pub fn with_defaults(&mut self, ingress_base_domain: Option<&str>) -> bool {
        let spec = &mut self.spec;
        let mut changed = false;

        if spec.replicas.is_none() {
            spec.replicas = Some(DEFAULT_SOLR_REPLICAS);
            changed = true;
        }
        changed |= default_image(&mut spec.solr_image, DEFAULT_SOLR_REPO, DEFAULT_SOLR_VERSION);
        changed |= default_image(
            &mut spec.busy_box_image,
            DEFAULT_BUSYBOX_REPO,
            DEFAULT_BUSYBOX_VERSION,
        );
        if let Some(zk_ref) = spec.zookeeper_ref.as_mut() {
            changed |= zk_ref.with_defaults();
        }
        changed |= spec.solr_addressability.with_defaults(ingress_base_domain);
        if spec.solr_log_level.is_none() {
            spec.solr_log_level = Some(DEFAULT_SOLR_LOG_LEVEL.to_string());
            changed = true;
        }

        changed
    }

    /// Declared replica count
    pub fn replicas(&self) -> i32 {
        self.spec.replicas.unwrap_or(DEFAULT_SOLR_REPLICAS)
    }

    /// Solr image, falling back to the default when not normalized yet
    pub fn solr_image(&self) -> ContainerImage {
        self.spec
            .solr_image
            .clone()
            .unwrap_or_else(|| ContainerImage::new(DEFAULT_SOLR_REPO, DEFAULT_SOLR_VERSION))
    }

    /// Busybox image, falling back to the default when not normalized yet
    pub fn busy_box_image(&self) -> ContainerImage {
        self.spec
            .busy_box_image
            .clone()
            .unwrap_or_else(|| ContainerImage::new(DEFAULT_BUSYBOX_REPO, DEFAULT_BUSYBOX_VERSION))
    }

    /// External addressability options, if configured
    pub fn external(&self) -> Option<&ExternalAddressability> {
        self.spec.solr_addressability.external.as_ref()
    }

    /// Namespace or empty string
    pub fn ns(&self) -> String {
        self.namespace().unwrap_or_default()
    }

    /// StatefulSet name
    pub fn stateful_set_name(&self) -> String {
        format!("{}-solrcloud", self.name_any())
    }

    /// Common service name (also used for the Ingress)
    pub fn common_service_name(&self) -> String {
        format!("{}-solrcloud-common", self.name_any())
    }

    /// Headless service name
    pub fn headless_service_name(&self) -> String {
        format!("{}-solrcloud-headless", self.name_any())
    }

    /// ConfigMap name
    pub fn config_map_name(&self) -> String {
        format!("{}-solrcloud-configmap", self.name_any())
    }

    /// Ingress name
    pub fn ingress_name(&self) -> String {
        self.common_service_name()
    }

    /// Name of the provisioned ZookeeperCluster
    pub fn provided_zookeeper_name(&self) -> String {
        format!("{}-solrcloud-zookeeper", self.name_any())
    }

    /// Pod (and per-node service) names, `<sts>-0..<sts>-(replicas-1)`
    pub fn node_names(&self) -> Vec<String> {
        let sts = self.stateful_set_name();
        (0..self.replicas().max(0))
            .map(|i| format!("{sts}-{i}"))
            .collect()
    }

    /// Labels shared by every generated object
    pub fn shared_labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(SOLR_CLOUD_LABEL.to_string(), self.name_any())])
    }

    /// Shared labels merged over user labels
    pub fn shared_labels_with(&self, labels: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut merged = labels.clone();
        merged.extend(self.shared_labels());
        merged
    }

    /// Selector for this cloud's Solr pods
    pub fn pod_selector_labels(&self) -> BTreeMap<String, String> {
        let mut labels = self.shared_labels();
        labels.insert("technology".to_string(), SOLR_CLOUD_TECHNOLOGY.to_string());
        labels
    }

    /// Label selector string for listing this cloud's pods
    pub fn pod_selector(&self) -> String {
        self.pod_selector_labels()
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// True when every node gets its own service
    pub fn uses_individual_node_services(&self) -> bool {
        self.external().is_some_and(|ext| {
            ext.method == ExternalAddressabilityMethod::Ingress && !ext.hide_nodes
        })
    }

    /// True when nodes are addressed through the headless service
    pub fn uses_headless_service(&self) -> bool {
        !self.uses_individual_node_services()
    }

    /// Port nodes are reached on through their own service
    pub fn node_port(&self) -> i32 {
        match self.external() {
            Some(ext) if ext.node_port_override > 0 => ext.node_port_override,
            _ => self.spec.solr_addressability.pod_port,
        }
    }

    // =========================================================================
    // Addresses
    // =========================================================================

    /// In-cluster host of a node
    pub fn internal_node_host(&self, node_name: &str) -> String {
        if self.uses_headless_service() {
            format!("{node_name}.{}.{}", self.headless_service_name(), self.ns())
        } else {
            format!("{node_name}.{}", self.ns())
        }
    }

    /// In-cluster URL of a node
    pub fn internal_node_url(&self, node_name: &str, with_port: bool) -> String {
        let host = self.internal_node_host(node_name);
        if !with_port {
            return host;
        }
        let port = if self.uses_headless_service() {
            self.spec.solr_addressability.pod_port
        } else {
            self.node_port()
        };
        format!("{host}:{port}")
    }

    /// In-cluster URL of the common service
    pub fn internal_common_url(&self, with_port: bool) -> String {
        let host = format!("{}.{}", self.common_service_name(), self.ns());
        if with_port {
            format!("{host}:{}", self.spec.solr_addressability.common_service_port)
        } else {
            host
        }
    }

    /// Ingress host prefix of a node
    pub fn node_ingress_prefix(&self, node_name: &str) -> String {
        format!("{}-{node_name}", self.ns())
    }

    /// Ingress host prefix of the common endpoint
    pub fn common_ingress_prefix(&self) -> String {
        format!("{}-{}-solrcloud", self.ns(), self.name_any())
    }

    /// External URL of a node
    pub fn external_node_url(&self, node_name: &str, domain: &str, with_port: bool) -> String {
        let host = format!("{}.{domain}", self.node_ingress_prefix(node_name));
        let port = self.node_port();
        if with_port && port != DEFAULT_INGRESS_PORT {
            format!("{host}:{port}")
        } else {
            host
        }
    }

    /// External URL of the common endpoint
    pub fn external_common_url(&self, domain: &str, with_port: bool) -> String {
        let host = format!("{}.{domain}", self.common_ingress_prefix());
        let port = self.spec.solr_addressability.common_service_port;
        if with_port && port != DEFAULT_INGRESS_PORT {
            format!("{host}:{port}")
        } else {
            host
        }
    }

    /// Host Solr advertises for a node
    pub fn advertised_node_host(&self, node_name: &str) -> String {
        match self.external() {
            Some(ext) if ext.use_external_address => {
                format!("{}.{}", self.node_ingress_prefix(node_name), ext.domain_name)
            }
            _ => self.internal_node_host(node_name),
        }
    }
}
