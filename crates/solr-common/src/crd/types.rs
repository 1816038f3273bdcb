//! Shared types used across the Solr CRDs

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Affinity, EnvVar, ResourceRequirements, Toleration};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default Solr image repository
pub const DEFAULT_SOLR_REPO: &str = "library/solr";
/// Default Solr image tag
pub const DEFAULT_SOLR_VERSION: &str = "8.2.0";
/// Default busybox image repository (init container)
pub const DEFAULT_BUSYBOX_REPO: &str = "library/busybox";
/// Default busybox image tag
pub const DEFAULT_BUSYBOX_VERSION: &str = "1.28.0-glibc";
/// Default ZooKeeper image repository
pub const DEFAULT_ZK_REPO: &str = "pravega/zookeeper";
/// Default ZooKeeper image tag
pub const DEFAULT_ZK_VERSION: &str = "0.2.9";

/// A container image reference
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerImage {
    /// Image repository, e.g. `library/solr`
    #[serde(default)]
    pub repository: String,

    /// Image tag, e.g. `8.2.0`
    #[serde(default)]
    pub tag: String,

    /// Kubernetes image pull policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_policy: Option<String>,

    /// Name of a secret used to pull the image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_secret: Option<String>,
}

impl ContainerImage {
    /// Create an image reference from repository and tag
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Fill unset repository/tag; returns true if anything changed
    pub fn with_defaults(&mut self, repository: &str, tag: &str) -> bool {
        let mut changed = false;
        if self.repository.is_empty() {
            self.repository = repository.to_string();
            changed = true;
        }
        if self.tag.is_empty() {
            self.tag = tag.to_string();
            changed = true;
        }
        changed
    }

    /// Full image name, `repository:tag`
    pub fn to_image_name(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

/// Fill an optional image, inserting an empty one first when absent
pub(crate) fn default_image(image: &mut Option<ContainerImage>, repository: &str, tag: &str) -> bool {
    let inserted = image.is_none();
    let filled = image
        .get_or_insert_with(ContainerImage::default)
        .with_defaults(repository, tag);
    inserted || filled
}

/// Extract the tag from a full image name
///
/// `library/solr:8.2.0` yields `8.2.0`; a registry port such as
/// `registry:5000/solr` is not mistaken for a tag and yields `latest`.
pub fn image_version(image: &str) -> String {
    let without_digest = image.split('@').next().unwrap_or(image);
    match without_digest.rsplit_once(':') {
        Some((_, tag)) if !tag.contains('/') => tag.to_string(),
        _ => "latest".to_string(),
    }
}

/// Customizations applied to generated pods
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PodOptions {
    /// Scheduling affinity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affinity: Option<Affinity>,

    /// Resource requests and limits for the main container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceRequirements>,

    /// Extra environment variables for the main container
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env_variables: Vec<EnvVar>,

    /// Pod annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    /// Pod labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Tolerations
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tolerations: Vec<Toleration>,

    /// Node selector
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,
}

/// Extra labels and annotations for a generated object
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetaOptions {
    /// Annotations merged into the object's metadata
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    /// Labels merged into the object's metadata
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// Merge `extra` into `base`, returning the combined map
pub fn merge_maps(
    base: BTreeMap<String, String>,
    extra: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = base;
    merged.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}
