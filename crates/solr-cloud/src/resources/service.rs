//! Common, headless and per-node Service generators

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use solr_common::crd::SolrCloud;

use super::{object_meta, EXT_SOLR_CLIENT_PORT_NAME, SOLR_CLIENT_PORT_NAME};

/// Label the StatefulSet controller puts on every pod
const POD_NAME_LABEL: &str = "statefulset.kubernetes.io/pod-name";

fn client_port(name: &str, port: i32) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        port,
        protocol: Some("TCP".to_string()),
        target_port: Some(IntOrString::String(SOLR_CLIENT_PORT_NAME.to_string())),
        ..Default::default()
    }
}

/// Service load balancing across every Solr node
pub fn generate_common_service(cloud: &SolrCloud) -> Service {
    let options = cloud.spec.custom_solr_kube_options.common_service_options.as_ref();
    Service {
        metadata: object_meta(
            cloud,
            cloud.common_service_name(),
            options,
            &[("service-type", "common")],
        ),
        spec: Some(ServiceSpec {
            ports: Some(vec![client_port(
                EXT_SOLR_CLIENT_PORT_NAME,
                cloud.spec.solr_addressability.common_service_port,
            )]),
            selector: Some(cloud.pod_selector_labels()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Headless service giving each pod a stable DNS name
pub fn generate_headless_service(cloud: &SolrCloud) -> Service {
    let options = cloud.spec.custom_solr_kube_options.headless_service_options.as_ref();
    Service {
        metadata: object_meta(
            cloud,
            cloud.headless_service_name(),
            options,
            &[("service-type", "headless")],
        ),
        spec: Some(ServiceSpec {
            cluster_ip: Some("None".to_string()),
            publish_not_ready_addresses: Some(true),
            ports: Some(vec![client_port(
                SOLR_CLIENT_PORT_NAME,
                cloud.spec.solr_addressability.pod_port,
            )]),
            selector: Some(cloud.pod_selector_labels()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Service fronting a single Solr node, named after the node
pub fn generate_node_service(cloud: &SolrCloud, node_name: &str) -> Service {
    let options = cloud.spec.custom_solr_kube_options.node_service_options.as_ref();
    let mut selector = cloud.pod_selector_labels();
    selector.insert(POD_NAME_LABEL.to_string(), node_name.to_string());

    Service {
        metadata: object_meta(
            cloud,
            node_name.to_string(),
            options,
            &[("service-type", "external")],
        ),
        spec: Some(ServiceSpec {
            publish_not_ready_addresses: Some(true),
            ports: Some(vec![client_port(EXT_SOLR_CLIENT_PORT_NAME, cloud.node_port())]),
            selector: Some(selector),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solr_common::crd::{ExternalAddressability, MetaOptions, SolrCloudSpec};
    use std::collections::BTreeMap;

    fn cloud() -> SolrCloud {
        let mut cloud = SolrCloud::new("books", SolrCloudSpec::default());
        cloud.metadata.namespace = Some("search".to_string());
        cloud.spec.solr_addressability.external = Some(ExternalAddressability {
            domain_name: "example.com".to_string(),
            ..Default::default()
        });
        cloud.with_defaults(None);
        cloud
    }

    #[test]
    fn common_service_targets_all_pods() {
        let mut cloud = cloud();
        cloud.spec.custom_solr_kube_options.common_service_options = Some(MetaOptions {
            annotations: BTreeMap::from([("team".to_string(), "search".to_string())]),
            ..Default::default()
        });
        let svc = generate_common_service(&cloud);

        assert_eq!(svc.metadata.name.as_deref(), Some("books-solrcloud-common"));
        assert_eq!(svc.metadata.namespace.as_deref(), Some("search"));
        assert_eq!(
            svc.metadata.annotations.as_ref().and_then(|a| a.get("team")).map(String::as_str),
            Some("search")
        );
        let spec = svc.spec.unwrap();
        assert_eq!(spec.selector, Some(cloud.pod_selector_labels()));
        assert_eq!(spec.ports.unwrap()[0].port, 80);
        assert!(spec.cluster_ip.is_none());
    }

    #[test]
    fn headless_service_publishes_unready_pods() {
        let svc = generate_headless_service(&cloud());
        let spec = svc.spec.unwrap();
        assert_eq!(spec.cluster_ip.as_deref(), Some("None"));
        assert_eq!(spec.publish_not_ready_addresses, Some(true));
        assert_eq!(spec.ports.unwrap()[0].port, 8983);
    }

    #[test]
    fn node_service_selects_exactly_one_pod() {
        let svc = generate_node_service(&cloud(), "books-solrcloud-2");
        assert_eq!(svc.metadata.name.as_deref(), Some("books-solrcloud-2"));
        let spec = svc.spec.unwrap();
        let selector = spec.selector.unwrap();
        assert_eq!(
            selector.get(POD_NAME_LABEL).map(String::as_str),
            Some("books-solrcloud-2")
        );
        assert_eq!(spec.ports.unwrap()[0].port, 80);
    }
}
