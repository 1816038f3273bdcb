use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule, IngressServiceBackend,
    IngressSpec, ServiceBackendPort,
};
use solr_common::crd::SolrCloud;

use super::object_meta;

fn rule(host: String, service: String, port: i32) -> IngressRule {
    IngressRule {
        host: Some(host),
        http: Some(HTTPIngressRuleValue {
            paths: vec![HTTPIngressPath {
                path: None,
                path_type: "ImplementationSpecific".to_string(),
                backend: IngressBackend {
                    service: Some(IngressServiceBackend {
                        name: service,
                        port: Some(ServiceBackendPort {
                            number: Some(port),
                            ..Default::default()
                        }),
                    }),
                    ..Default::default()
                },
            }],
        }),
    }
}

/// Ingress with a host for the common endpoint and one per node
///
/// Hosts hidden through the external addressability options are left out.
pub fn generate_ingress(cloud: &SolrCloud, node_names: &[String]) -> Ingress {
    let external = cloud.external().cloned().unwrap_or_default();
    let domain = &external.domain_name;
    let mut rules = Vec::new();

    if !external.hide_common {
        rules.push(rule(
            cloud.external_common_url(domain, false),
            cloud.common_service_name(),
            cloud.spec.solr_addressability.common_service_port,
        ));
    }
    if !external.hide_nodes {
        for node in node_names {
            rules.push(rule(
                cloud.external_node_url(node, domain, false),
                node.clone(),
                cloud.node_port(),
            ));
        }
    }

    Ingress {
        metadata: object_meta(
            cloud,
            cloud.ingress_name(),
            cloud.spec.custom_solr_kube_options.ingress_options.as_ref(),
            &[],
        ),
        spec: Some(IngressSpec {
            rules: Some(rules),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solr_common::crd::{ExternalAddressability, SolrCloudSpec};

    fn cloud(hide_common: bool) -> SolrCloud {
        let mut cloud = SolrCloud::new("books", SolrCloudSpec::default());
        cloud.metadata.namespace = Some("search".to_string());
        cloud.spec.replicas = Some(2);
        cloud.spec.solr_addressability.external = Some(ExternalAddressability {
            domain_name: "example.com".to_string(),
            hide_common,
            ..Default::default()
        });
        cloud.with_defaults(None);
        cloud
    }

    fn hosts(ingress: &Ingress) -> Vec<String> {
        ingress
            .spec
            .as_ref()
            .and_then(|s| s.rules.as_ref())
            .map(|rules| rules.iter().filter_map(|r| r.host.clone()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn ingress_has_common_and_node_hosts() {
        let cloud = cloud(false);
        let ingress = generate_ingress(&cloud, &cloud.node_names());

        assert_eq!(ingress.metadata.name.as_deref(), Some("books-solrcloud-common"));
        assert_eq!(
            hosts(&ingress),
            vec![
                "search-books-solrcloud.example.com",
                "search-books-solrcloud-0.example.com",
                "search-books-solrcloud-1.example.com",
            ]
        );

        let rules = ingress.spec.unwrap().rules.unwrap();
        let backend = rules[1].http.as_ref().unwrap().paths[0].backend.service.clone().unwrap();
        assert_eq!(backend.name, "books-solrcloud-0");
        assert_eq!(backend.port.unwrap().number, Some(80));
    }

    #[test]
    fn hidden_common_endpoint_is_omitted() {
        let cloud = cloud(true);
        let ingress = generate_ingress(&cloud, &cloud.node_names());
        assert_eq!(hosts(&ingress).len(), 2);
    }
}
