//! Generators for the objects a SolrCloud owns
//!
//! Every function here is pure: it turns a (normalized) SolrCloud into the
//! desired form of one dependent object. Owner references are attached by
//! the controller.

mod config_map;
mod ingress;
mod service;
mod stateful_set;
mod zookeeper;

pub use config_map::{generate_config_map, DEFAULT_SOLR_XML, SOLR_XML_KEY};
pub use ingress::generate_ingress;
pub use service::{generate_common_service, generate_headless_service, generate_node_service};
pub use stateful_set::{generate_stateful_set, SOLR_DATA_DIR, SOLR_NODE_CONTAINER};
pub use zookeeper::generate_zookeeper_cluster;

use std::collections::BTreeMap;

use kube::api::ObjectMeta;
use solr_common::crd::{MetaOptions, SolrCloud};

/// Name of the Solr client port inside pods
pub const SOLR_CLIENT_PORT_NAME: &str = "solr-client";
/// Name of the client port exposed by services
pub const EXT_SOLR_CLIENT_PORT_NAME: &str = "ext-solr-client";

/// Metadata for a generated object: shared labels plus user customizations
fn object_meta(
    cloud: &SolrCloud,
    name: String,
    options: Option<&MetaOptions>,
    extra_labels: &[(&str, &str)],
) -> ObjectMeta {
    let user_labels = options.map(|o| o.labels.clone()).unwrap_or_default();
    let mut labels = cloud.shared_labels_with(&user_labels);
    for (key, value) in extra_labels {
        labels.insert(key.to_string(), value.to_string());
    }
    let annotations: BTreeMap<String, String> =
        options.map(|o| o.annotations.clone()).unwrap_or_default();

    ObjectMeta {
        name: Some(name),
        namespace: Some(cloud.ns()),
        labels: Some(labels),
        annotations: (!annotations.is_empty()).then_some(annotations),
        ..Default::default()
    }
}
